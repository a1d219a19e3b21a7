//! Volume of water filtered by a plankton net, from flowmeter readings.
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::NetSettings;
use crate::table::{format_number, Table};
use crate::Result;

/// Counts per rotor revolution in the flowmeter calibration
const COUNTS: f64 = 999_999.0;
/// Historical volumes were computed with pi truncated to two decimals
#[allow(clippy::approx_constant)]
const PI_TWO_DECIMALS: f64 = 3.14;

/// Cubic metres sampled over `counts` flowmeter counts
///
/// Distance towed times the area of the net opening:
///
/// $$
///     V = \frac{\Delta c \, k}{999999} \pi r^2
/// $$
pub fn volume_sampled_m3(counts: f64, net: &NetSettings) -> f64 {
    counts * net.rotor_constant / COUNTS * (PI_TWO_DECIMALS * net.radius_m * net.radius_m)
}

/// Add `flowmeter_diff` and `vol_sampled_m3` columns
pub fn add_volume_sampled(table: &mut Table, net: &NetSettings) -> Result<()> {
    let start = table.numbers("flowmeter_start")?;
    let end = table.numbers("flowmeter_end")?;

    let diff = start.iter().zip(&end).map(|(s, e)| e - s).collect::<Vec<_>>();
    let volume = diff
        .iter()
        .map(|&d| format_number(volume_sampled_m3(d, net)))
        .collect();

    table.set_column("flowmeter_diff", diff.into_iter().map(format_number).collect());
    table.set_column("vol_sampled_m3", volume);
    Ok(())
}

pub fn run(input: &Path, output: Option<&Path>, net: &NetSettings) -> Result<PathBuf> {
    let mut table = Table::from_path(input)?;
    add_volume_sampled(&mut table, net)?;

    let destination = output.unwrap_or(input);
    table.write_csv(destination)?;
    info!(tows = table.len(), path = %destination.display(), "wrote volumes sampled");
    Ok(destination.to_path_buf())
}
