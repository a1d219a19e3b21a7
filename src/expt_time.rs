//! Elapsed experiment time from start and end timestamps of each incubation bottle.
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::info;

use crate::error::Error;
use crate::table::{format_number, Table};
use crate::Result;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M";
pub const HOURS_COLUMN: &str = "expt_time_hours";

/// Parse a timestamp of data row `row` (1-based, header excluded)
pub fn parse_timestamp(value: &str, row: usize) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT).map_err(|_| Error::Timestamp {
        row,
        value: value.to_owned(),
    })
}

#[allow(clippy::cast_precision_loss)]
pub fn elapsed_hours(t0: NaiveDateTime, tf: NaiveDateTime) -> f64 {
    (tf - t0).num_seconds() as f64 / 3600.0
}

/// Add `expt_time_hours = tf - t0` to every row
pub fn add_experiment_time(table: &mut Table) -> Result<()> {
    let t0 = table.column_index("t0")?;
    let tf = table.column_index("tf")?;

    let hours = table
        .rows()
        .enumerate()
        .map(|(i, row)| {
            let start = parse_timestamp(row.text(t0), i + 1)?;
            let end = parse_timestamp(row.text(tf), i + 1)?;
            Ok(format_number(elapsed_hours(start, end)))
        })
        .collect::<Result<Vec<_>>>()?;

    table.set_column(HOURS_COLUMN, hours);
    Ok(())
}

/// Add experiment times to the CSV at `input`, writing to `output` or back in place
pub fn run(input: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let mut table = Table::from_path(input)?;
    add_experiment_time(&mut table)?;

    let destination = output.unwrap_or(input);
    table.write_csv(destination)?;
    info!(rows = table.len(), path = %destination.display(), "wrote experiment times");
    Ok(destination.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::{add_experiment_time, parse_timestamp, HOURS_COLUMN};
    use crate::error::Error;
    use crate::table::Table;

    #[test]
    fn hours_span_midnight() {
        let mut table = Table::from_reader(
            "bottle,t0,tf\ncontrol1,2019-10-02T08:30,2019-10-03T09:00\ntreatment1,2019-10-02T08:45,2019-10-02T20:45\n"
                .as_bytes(),
        )
        .unwrap();
        add_experiment_time(&mut table).unwrap();

        assert_eq!(table.headers().last().unwrap(), HOURS_COLUMN);
        assert_eq!(table.numbers(HOURS_COLUMN).unwrap(), [24.5, 12.0]);
    }

    #[test]
    fn malformed_timestamps_name_their_row() {
        let mut table = Table::from_reader(
            "bottle,t0,tf\ncontrol1,2019-10-02T08:30,2019-10-03T09:00\ncontrol2,10/02/2019 08:30,2019-10-03T09:00\n"
                .as_bytes(),
        )
        .unwrap();
        match add_experiment_time(&mut table) {
            Err(Error::Timestamp { row, value }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "10/02/2019 08:30");
            }
            other => panic!("expected a timestamp error, got {other:?}"),
        }
        assert!(parse_timestamp("", 1).is_err());
    }
}
