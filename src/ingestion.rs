//! Zooplankton grazing experiments: clearance and ingestion rates from chlorophyll depletion.
//!
//! Each station (or treatment) of a cruise holds control bottles without grazers and treatment
//! bottles with a known number of copepods. Controls give the phytoplankton growth constant
//!
//! $$
//!     k = \frac{\ln\left(c_{tf} / c_{t0}\right)}{t_c}
//! $$
//!
//! and each treatment bottle then gives its grazing coefficient, clearance rate and ingestion
//! rate relative to that background growth.
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::descriptive::{finite, mean, Summary};
use crate::error::Error;
use crate::hypothesis::{t_test_independent, TTest};
use crate::plot::{BarChart, BarSeries, FIREBRICK, MEDIUM_SEA_GREEN, PURPLE, SEA_GREEN, STEEL_BLUE};
use crate::table::{format_number, Table};
use crate::workbook::Workbook;
use crate::Result;

pub const SUMMARY_HEADERS: [&str; 9] = [
    "cruise",
    "treatment",
    "full_treatment",
    "chl_t0",
    "chl_tf",
    "time_hours",
    "clearance_rate (mls/individual/hour)",
    "ingestion_rate (ug Chl/ind/hr)",
    "ingestion_rate (ug Chl/ind/day)",
];

pub const AGGREGATE_HEADERS: [&str; 4] = [
    "cruise",
    "treatment",
    "ingestion_rate_avg (ug Chl/ind/day)",
    "ingestion_rate_stdev (ug Chl/ind/day)",
];

/// Display names of the stations and treatments
pub const LABELS: [(&str, &str); 4] = [
    ("inside_front", "Inside Front"),
    ("outside_front", "Outside Front"),
    ("algae", "Algal Culture"),
    ("algae_plastic", "Algal Culture + Plastic"),
];

/// Treatment pairs compared with a t-test, first match wins, with the p-value precision
const COMPARISONS: [(&str, &str, usize); 2] = [
    ("inside_front", "outside_front", 3),
    ("algae", "algae_plastic", 4),
];

/// Mean chlorophyll of the control bottles and their mean incubation time
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Controls {
    pub chl_t0: f64,
    pub chl_tf: f64,
    pub time_hours: f64,
}

impl Controls {
    /// Phytoplankton growth constant $k$ in the absence of grazers, per hour
    pub fn growth_constant(&self) -> f64 {
        (self.chl_tf / self.chl_t0).ln() / self.time_hours
    }
}

/// Rates derived from one treatment bottle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BottleRates {
    /// Net specific rate of change of chlorophyll, $g'$
    pub neg_g_prime: f64,
    /// Grazing coefficient, $g = k - g'$
    pub g: f64,
    /// mL per individual per hour
    pub clearance_rate: f64,
    /// Mean chlorophyll concentration over the incubation, µg per mL
    pub mean_concentration: f64,
    /// µg Chl per individual per hour
    pub ingestion_hourly: f64,
    /// µg Chl per individual per day
    pub ingestion_daily: f64,
}

impl BottleRates {
    /// Rates of a bottle ending at `chl` after `time_hours`, holding `volume_ml` and `grazers`
    ///
    /// $$
    ///     g' = \frac{\ln(c / c_{t0})}{t}, \quad
    ///     F = \frac{V g}{N}, \quad
    ///     C = \frac{c_{t0} \left(e^{g' t} - 1\right)}{1000 \, g' t}, \quad
    ///     I = F C
    /// $$
    pub fn compute(chl: f64, time_hours: f64, volume_ml: f64, grazers: f64, controls: &Controls) -> Self {
        let neg_g_prime = (chl / controls.chl_t0).ln() / time_hours;
        let g = -neg_g_prime + controls.growth_constant();
        let clearance_rate = volume_ml * g / grazers;
        let exponent = neg_g_prime * time_hours;
        let mean_concentration = controls.chl_t0 * (exponent.exp() - 1.0) / exponent / 1000.0;
        let ingestion_hourly = clearance_rate * mean_concentration;

        Self {
            neg_g_prime,
            g,
            clearance_rate,
            mean_concentration,
            ingestion_hourly,
            ingestion_daily: ingestion_hourly * 24.0,
        }
    }
}

/// One line of the per-bottle block of the summary
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryRow {
    pub cruise: String,
    pub treatment: String,
    pub full_treatment: String,
    pub chl_t0: f64,
    pub chl_tf: f64,
    pub time_hours: f64,
    /// `None` on the control average lines
    pub rates: Option<BottleRates>,
}

/// Mean daily ingestion of one station of a cruise
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub cruise: String,
    pub treatment: String,
    /// Daily ingestion rates with missing values dropped and negatives set to zero
    pub rates: Vec<f64>,
    pub summary: Summary,
}

/// Daily ingestion rates ready for averaging: missing values dropped, negatives set to zero
pub fn clamp_rates(rates: &[f64]) -> Vec<f64> {
    finite(rates).into_iter().map(|r| r.max(0.0)).collect()
}

/// Stations in sorted order, with the front pair drawn outside first
pub fn station_order(mut stations: Vec<String>) -> Vec<String> {
    if stations == ["inside_front", "outside_front"] {
        stations.reverse();
    }
    stations
}

/// Result of a t-test between two treatments of the first cruise
#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub first: String,
    pub second: String,
    pub test: TTest,
    /// Decimals shown for the p-value
    pub decimals: usize,
}

impl Comparison {
    pub fn annotation(&self) -> Vec<String> {
        vec![
            format!("t = {:.2}", self.test.statistic.abs()),
            format!("p = {:.*}", self.decimals, self.test.p_value),
        ]
    }
}

/// The per-bottle rows and per-station aggregates of an experiment
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IngestionSummary {
    pub rows: Vec<SummaryRow>,
    pub aggregates: Vec<Aggregate>,
}

impl IngestionSummary {
    pub fn cruises(&self) -> Vec<&str> {
        let mut cruises = Vec::new();
        for aggregate in &self.aggregates {
            if !cruises.contains(&aggregate.cruise.as_str()) {
                cruises.push(aggregate.cruise.as_str());
            }
        }
        cruises
    }

    /// The summary as written to CSV: the bottle block, a blank line, then the aggregate block
    pub fn to_table(&self) -> Table {
        let width = SUMMARY_HEADERS.len();
        let mut table = Table::new(SUMMARY_HEADERS);

        for row in &self.rows {
            let mut cells = vec![
                row.cruise.clone(),
                row.treatment.clone(),
                row.full_treatment.clone(),
                format_number(row.chl_t0),
                format_number(row.chl_tf),
                format_number(row.time_hours),
            ];
            if let Some(rates) = &row.rates {
                cells.extend(
                    [rates.clearance_rate, rates.ingestion_hourly, rates.ingestion_daily]
                        .map(format_number),
                );
            }
            cells.resize(width, String::new());
            table.push_row(cells);
        }

        table.push_row(vec![String::new(); width]);
        let mut header = AGGREGATE_HEADERS.map(str::to_owned).to_vec();
        header.resize(width, String::new());
        table.push_row(header);

        for aggregate in &self.aggregates {
            let mut cells = vec![
                aggregate.cruise.clone(),
                aggregate.treatment.clone(),
                format_number(aggregate.summary.mean),
                format_number(aggregate.summary.standard_deviation),
            ];
            cells.resize(width, String::new());
            table.push_row(cells);
        }
        table
    }

    /// t-test of the first known treatment pair present in the first cruise
    pub fn comparison(&self) -> Option<Comparison> {
        let cruise = *self.cruises().first()?;
        let rates = |treatment: &str| {
            self.aggregates
                .iter()
                .find(|a| a.cruise == cruise && a.treatment == treatment)
                .map(|a| a.rates.as_slice())
        };

        COMPARISONS.iter().find_map(|&(first, second, decimals)| {
            let (a, b) = (rates(first)?, rates(second)?);
            match t_test_independent(a, b) {
                Ok(test) => Some(Comparison {
                    first: first.to_owned(),
                    second: second.to_owned(),
                    test,
                    decimals,
                }),
                Err(e) => {
                    warn!(cruise, first, second, error = %e, "skipping t-test");
                    None
                }
            }
        })
    }
}

/// Column positions of the chlorophyll sheet
struct ChlColumns {
    cruise: usize,
    station: usize,
    bottle: usize,
    time_point: usize,
    chl: usize,
    volume: usize,
    grazers: usize,
}

impl ChlColumns {
    fn of(table: &Table) -> Result<Self> {
        Ok(Self {
            cruise: table.column_index("Cruise")?,
            station: table.resolve(&["Station", "Treatment"])?.0,
            bottle: table.column_index("Bottle")?,
            time_point: table.column_index("Time Point")?,
            chl: table.column_index("Chl (ug/l)")?,
            volume: table.column_index("expt_vol_ml")?,
            grazers: table.column_index("num_copes")?,
        })
    }
}

/// Column positions of the experiment time records
struct TimeColumns {
    cruise: usize,
    station: usize,
    bottle: usize,
    hours: usize,
}

impl TimeColumns {
    fn of(table: &Table) -> Result<Self> {
        Ok(Self {
            cruise: table.column_index("cruise")?,
            station: table.resolve(&["station", "treatment"])?.0,
            bottle: table.column_index("bottle")?,
            hours: table.column_index("expt_time_hours")?,
        })
    }
}

/// Average the controls of one station
fn average_controls(
    chla: &Table,
    columns: &ChlColumns,
    times: &Table,
    time_columns: &TimeColumns,
    cruise: &str,
    station: &str,
) -> Result<Controls> {
    let control_rows = chla.filter(|row| {
        row.text(columns.cruise) == cruise
            && row.text(columns.station) == station
            && format!("{}_{}", row.text(columns.bottle), row.text(columns.time_point))
                .contains("control")
    });

    let mut time_points = control_rows
        .rows()
        .map(|row| row.text(columns.time_point).to_owned())
        .collect::<Vec<_>>();
    time_points.sort();
    time_points.dedup();

    let (mut chl_t0, mut chl_tf) = (None, None);
    for time_point in &time_points {
        let chl = control_rows
            .rows()
            .filter(|row| row.text(columns.time_point) == time_point)
            .map(|row| row.number(columns.chl))
            .collect::<Vec<_>>();
        if time_point.contains("t0") || time_point.contains("T0") {
            chl_t0 = Some(mean(&chl));
        } else if time_point.contains("tf") || time_point.contains("Tf") {
            chl_tf = Some(mean(&chl));
        }
    }
    let missing = |time_point| Error::MissingControl {
        cruise: cruise.to_owned(),
        station: station.to_owned(),
        time_point,
    };
    let chl_t0 = chl_t0.ok_or_else(|| missing("t0"))?;
    let chl_tf = chl_tf.ok_or_else(|| missing("tf"))?;

    let control_times = times
        .rows()
        .filter(|row| {
            row.text(time_columns.cruise) == cruise
                && row.text(time_columns.station) == station
                && row.text(time_columns.bottle).contains("control")
        })
        .map(|row| row.number(time_columns.hours))
        .collect::<Vec<_>>();
    if control_times.is_empty() {
        return Err(Error::ExperimentTime {
            cruise: cruise.to_owned(),
            station: station.to_owned(),
            bottle: "control".to_owned(),
            matches: 0,
        });
    }

    Ok(Controls {
        chl_t0,
        chl_tf,
        time_hours: mean(&control_times),
    })
}

/// Incubation time of a single treatment bottle, which must have exactly one record
fn bottle_time(
    times: &Table,
    columns: &TimeColumns,
    cruise: &str,
    station: &str,
    bottle: &str,
) -> Result<f64> {
    let matches = times
        .rows()
        .filter(|row| {
            row.text(columns.cruise) == cruise
                && row.text(columns.station) == station
                && row.text(columns.bottle) == bottle
        })
        .map(|row| row.number(columns.hours))
        .collect::<Vec<_>>();

    match matches.as_slice() {
        [hours] => Ok(*hours),
        _ => Err(Error::ExperimentTime {
            cruise: cruise.to_owned(),
            station: station.to_owned(),
            bottle: bottle.to_owned(),
            matches: matches.len(),
        }),
    }
}

/// Ingestion rates of every treatment bottle in `chla`, with incubation times from `times`
pub fn compute(chla: &Table, times: &Table) -> Result<IngestionSummary> {
    let columns = ChlColumns::of(chla)?;
    let time_columns = TimeColumns::of(times)?;
    let mut summary = IngestionSummary::default();

    for cruise in chla.unique("Cruise")? {
        let cruise_rows = chla.filter(|row| row.text(columns.cruise) == cruise);
        let stations = station_order(
            cruise_rows
                .rows()
                .map(|row| row.text(columns.station).to_owned())
                .filter(|station| !station.is_empty())
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect(),
        );

        for station in &stations {
            let controls = average_controls(chla, &columns, times, &time_columns, &cruise, station)?;
            debug!(cruise, station, k = controls.growth_constant(), "control averages");

            summary.rows.push(SummaryRow {
                cruise: cruise.clone(),
                treatment: station.clone(),
                full_treatment: format!("{station}_control_avg"),
                chl_t0: controls.chl_t0,
                chl_tf: controls.chl_tf,
                time_hours: controls.time_hours,
                rates: None,
            });

            let bottles = cruise_rows.filter(|row| {
                row.text(columns.station) == station
                    && format!("{}_{}", row.text(columns.bottle), row.text(columns.time_point))
                        .contains("treatment")
            });
            let mut daily = Vec::with_capacity(bottles.len());
            for row in bottles.rows() {
                let bottle = row.text(columns.bottle);
                let hours = bottle_time(times, &time_columns, &cruise, station, bottle)?;
                let chl = row.number(columns.chl);
                let rates = BottleRates::compute(
                    chl,
                    hours,
                    row.number(columns.volume),
                    row.number(columns.grazers),
                    &controls,
                );
                daily.push(rates.ingestion_daily);

                summary.rows.push(SummaryRow {
                    cruise: cruise.clone(),
                    treatment: station.clone(),
                    full_treatment: format!("{station}_{bottle}"),
                    chl_t0: controls.chl_t0,
                    chl_tf: chl,
                    time_hours: hours,
                    rates: Some(rates),
                });
            }

            let rates = clamp_rates(&daily);
            summary.aggregates.push(Aggregate {
                cruise: cruise.clone(),
                treatment: station.clone(),
                summary: Summary::of(&rates),
                rates,
            });
        }
    }

    Ok(summary)
}

/// Where the experiment times come from, which also fixes the output file names
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeSource {
    /// The `expt_data` sheet next to the `chla` sheet
    Workbook,
    /// A separate CSV, with chlorophyll on the workbook's default sheet
    Csv(PathBuf),
}

#[derive(Clone, Debug)]
pub struct IngestionOptions {
    /// Experiment name, e.g. `expt1`
    pub experiment: String,
    /// File name prefix of the summary CSV
    pub prefix: String,
    pub times: TimeSource,
    /// Destination instead of the workbook's directory
    pub output_dir: Option<PathBuf>,
}

/// Files written by [`run`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestionOutputs {
    pub summary: PathBuf,
    pub figure: PathBuf,
}

impl IngestionOptions {
    fn file_names(&self) -> (String, String) {
        let (prefix, expt) = (&self.prefix, &self.experiment);
        match self.times {
            TimeSource::Workbook => (
                format!("{prefix}_{expt}_chla_ingest_rates_summary.csv"),
                format!("Chla_ingest_rates_{expt}.png"),
            ),
            TimeSource::Csv(_) => (
                format!("{prefix}_{expt}_ingest_rates.csv"),
                format!("ingest_rates_{expt}.png"),
            ),
        }
    }
}

/// Mean daily ingestion per treatment, one series per cruise
pub fn chart(summary: &IngestionSummary, experiment: &str, settings: &Settings) -> BarChart {
    let cruises = summary.cruises();

    let mut treatments: Vec<&str> = Vec::new();
    for aggregate in &summary.aggregates {
        if !treatments.contains(&aggregate.treatment.as_str()) {
            treatments.push(aggregate.treatment.as_str());
        }
    }

    let palette = [FIREBRICK, MEDIUM_SEA_GREEN, PURPLE];
    let series = cruises
        .iter()
        .enumerate()
        .map(|(i, &cruise)| {
            let colour = if cruises.len() == 1 {
                if experiment == "expt1" {
                    STEEL_BLUE
                } else {
                    SEA_GREEN
                }
            } else {
                palette
                    .get(i)
                    .copied()
                    .unwrap_or_else(|| crate::plot::cycle(i))
            };
            let lookup = |treatment: &str| {
                summary
                    .aggregates
                    .iter()
                    .find(|a| a.cruise == cruise && a.treatment == treatment)
            };
            BarSeries {
                label: cruise.to_owned(),
                colour,
                values: treatments
                    .iter()
                    .map(|&t| lookup(t).map_or(f64::NAN, |a| a.summary.mean))
                    .collect(),
                errors: Some(
                    treatments
                        .iter()
                        .map(|&t| lookup(t).map_or(f64::NAN, |a| a.summary.standard_deviation))
                        .collect(),
                ),
            }
        })
        .collect();

    let categories = treatments
        .iter()
        .map(|&t| settings.label(t, &LABELS))
        .collect();
    let mut chart = BarChart::new(categories, series);
    chart.title = (cruises.len() == 1).then(|| cruises[0].to_owned());
    chart.x_desc = "Treatment".to_owned();
    chart.y_desc = "Ingestion Rates (µg Chl ind⁻¹ day⁻¹)".to_owned();
    if let Some(comparison) = summary.comparison() {
        chart.annotation = comparison.annotation();
    }
    chart
}

/// Compute the ingestion rates of the workbook at `path`, writing the summary CSV and bar chart
pub fn run(path: &Path, options: &IngestionOptions, settings: &Settings) -> Result<IngestionOutputs> {
    let workbook = Workbook::open(path)?;
    let (chla, times) = match &options.times {
        TimeSource::Workbook => (workbook.sheet("chla")?, workbook.sheet("expt_data")?),
        TimeSource::Csv(times) => (workbook.first_sheet()?, Table::from_path(times)?),
    };

    let summary = compute(&chla, &times)?;
    info!(
        bottles = summary.rows.iter().filter(|r| r.rates.is_some()).count(),
        stations = summary.aggregates.len(),
        "computed ingestion rates"
    );

    let base = options
        .output_dir
        .clone()
        .unwrap_or_else(|| workbook.location().to_path_buf());
    let (csv_name, figure_name) = options.file_names();

    let figure = base.join("figures").join(figure_name);
    let chart = chart(&summary, &options.experiment, settings);
    chart.draw(&figure, (settings.figure.width, settings.figure.height))?;

    if !base.as_os_str().is_empty() {
        std::fs::create_dir_all(&base).map_err(|e| Error::io(&base, e))?;
    }
    let csv = base.join(csv_name);
    summary.to_table().write_csv(&csv)?;
    info!(path = %csv.display(), "wrote ingestion summary");

    Ok(IngestionOutputs {
        summary: csv,
        figure,
    })
}
