//! Fecal pellet sinking rates per treatment, summarised and compared in box plots.
use std::path::{Path, PathBuf};

use tabled::Tabled;
use tracing::{info, warn};

use crate::config::Settings;
use crate::descriptive::{round_to, Summary};
use crate::error::Error;
use crate::hypothesis::{t_test_independent, TTest};
use crate::plot::{BoxPlot, DARK_GRAY, SEA_GREEN, STEEL_BLUE};
use crate::report::titled;
use crate::table::{format_number, Table};
use crate::workbook::Workbook;
use crate::Result;

pub const LABELS: [(&str, &str); 4] = [
    ("inside_front", "Inside Front"),
    ("outside_front", "Outside Front"),
    ("algae", "Algae Only"),
    ("algae_plastic", "Algae + Plastic"),
];

pub const SUMMARY_HEADERS: [&str; 5] = ["cruise", "treatment", "mean", "sd", "n"];

/// Sinking rates of one treatment of a cruise
#[derive(Clone, Debug, PartialEq)]
pub struct TreatmentRates {
    pub treatment: String,
    pub rates: Vec<f64>,
    pub summary: Summary,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CruiseRates {
    pub cruise: String,
    pub treatments: Vec<TreatmentRates>,
    /// t-test between the first two treatments, when there are two with enough data
    pub test: Option<TTest>,
}

#[derive(Debug, Clone, Tabled)]
struct SinkingEntry {
    #[tabled(rename = "Treatment")]
    treatment: String,
    #[tabled(rename = "Avg (m/day)")]
    mean: f64,
    #[tabled(rename = "SD")]
    standard_deviation: f64,
    #[tabled(rename = "n")]
    n: usize,
}

/// Group the sinking rates by cruise and station, both in sorted order
pub fn compute(table: &Table) -> Result<Vec<CruiseRates>> {
    let cruise_column = table.column_index("cruise")?;
    let station_column = table.column_index("station")?;
    let rate_column = table.column_index("sinking_rate_m_day")?;

    table
        .unique("cruise")?
        .into_iter()
        .map(|cruise| {
            let rows = table.filter(|row| row.text(cruise_column) == cruise);
            let treatments = rows
                .unique("station")?
                .into_iter()
                .map(|treatment| {
                    let rates = rows
                        .rows()
                        .filter(|row| row.text(station_column) == treatment)
                        .map(|row| row.number(rate_column))
                        .collect::<Vec<_>>();
                    TreatmentRates {
                        summary: Summary::of(&rates),
                        treatment,
                        rates,
                    }
                })
                .collect::<Vec<_>>();

            let test = match treatments.as_slice() {
                [first, second, ..] => t_test_independent(&first.rates, &second.rates)
                    .map_err(|e| warn!(cruise, error = %e, "skipping t-test"))
                    .ok(),
                _ => None,
            };

            Ok(CruiseRates {
                cruise,
                treatments,
                test,
            })
        })
        .collect()
}

/// Per-treatment summary in the layout of the summary CSV
pub fn summary_table(cruises: &[CruiseRates]) -> Table {
    let mut table = Table::new(SUMMARY_HEADERS);
    for cruise in cruises {
        for treatment in &cruise.treatments {
            table.push_row([
                cruise.cruise.clone(),
                treatment.treatment.clone(),
                format_number(treatment.summary.mean),
                format_number(treatment.summary.standard_deviation),
                treatment.summary.n.to_string(),
            ]);
        }
    }
    table
}

pub fn box_plot(cruise: &CruiseRates, experiment: &str, settings: &Settings) -> BoxPlot {
    let mut plot = BoxPlot::new(
        cruise
            .treatments
            .iter()
            .map(|t| settings.label(&t.treatment, &LABELS))
            .collect(),
        cruise.treatments.iter().map(|t| t.rates.clone()).collect(),
    );
    plot.fills = vec![
        DARK_GRAY,
        if experiment == "expt1" {
            STEEL_BLUE
        } else {
            SEA_GREEN
        },
    ];
    plot.title = Some(cruise.cruise.clone());
    plot.x_desc = "Treatment".to_owned();
    plot.y_desc = "FP sinking rate (m day⁻¹)".to_owned();
    if let Some(test) = &cruise.test {
        plot.annotation = vec![
            format!("t = {:.2}", test.statistic.abs()),
            format!("p = {:.4}", test.p_value),
        ];
    }
    plot
}

/// Summarise and plot the sinking rates on the default sheet of the workbook at `path`
///
/// Returns the summary CSV and the figures, one per cruise.
pub fn run(
    path: &Path,
    experiment: &str,
    output_dir: Option<&Path>,
    settings: &Settings,
) -> Result<(PathBuf, Vec<PathBuf>)> {
    let workbook = Workbook::open(path)?;
    let cruises = compute(&workbook.first_sheet()?)?;
    let base = output_dir.map_or_else(|| workbook.location().to_path_buf(), Path::to_path_buf);

    let mut figures = Vec::with_capacity(cruises.len());
    for cruise in &cruises {
        let entries = cruise
            .treatments
            .iter()
            .map(|t| SinkingEntry {
                treatment: t.treatment.clone(),
                mean: round_to(t.summary.mean, 2),
                standard_deviation: round_to(t.summary.standard_deviation, 2),
                n: t.summary.n,
            })
            .collect::<Vec<_>>();
        println!("{}", titled(&format!("Sinking rates: {}", cruise.cruise), &entries));

        let name = if cruises.len() > 1 {
            format!("FP_sinking_rates_{experiment}_{}.png", cruise.cruise)
        } else {
            format!("FP_sinking_rates_{experiment}.png")
        };
        let figure = base.join("figures").join(name);
        box_plot(cruise, experiment, settings).draw(&figure, (settings.figure.width, settings.figure.height))?;
        figures.push(figure);
    }

    if !base.as_os_str().is_empty() {
        std::fs::create_dir_all(&base).map_err(|e| Error::io(&base, e))?;
    }
    let csv = base.join(format!("FP_sinking_rates_{experiment}_summary.csv"));
    summary_table(&cruises).write_csv(&csv)?;
    info!(path = %csv.display(), "wrote sinking rate summary");

    Ok((csv, figures))
}

#[cfg(test)]
mod tests {
    use super::{box_plot, compute, summary_table, SUMMARY_HEADERS};
    use crate::config::Settings;
    use crate::plot::STEEL_BLUE;
    use crate::table::Table;

    fn rates() -> Table {
        Table::from_reader(
            "cruise,station,sinking_rate_m_day
Fall2019,algae_plastic,40
Fall2019,algae,10
Fall2019,algae,20
Fall2019,algae,30
Fall2019,algae_plastic,50
Fall2019,algae_plastic,60
Fall2019,algae_plastic,
"
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn treatments_are_summarised_in_sorted_order() {
        let cruises = compute(&rates()).unwrap();
        assert_eq!(cruises.len(), 1);

        let treatments = &cruises[0].treatments;
        assert_eq!(treatments[0].treatment, "algae");
        assert_eq!(treatments[1].treatment, "algae_plastic");
        approx::assert_relative_eq!(treatments[0].summary.mean, 20.0);
        approx::assert_relative_eq!(treatments[1].summary.mean, 50.0);
        assert_eq!(treatments[1].summary.n, 3);

        // Equal spreads of 10 with a difference of 30 in the means
        let test = cruises[0].test.unwrap();
        approx::assert_relative_eq!(test.statistic, -30.0 / (100.0_f64 * 2.0 / 3.0).sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn summary_table_has_a_row_per_treatment() {
        let table = summary_table(&compute(&rates()).unwrap());
        assert_eq!(table.headers(), SUMMARY_HEADERS);
        assert_eq!(table.texts("treatment").unwrap(), ["algae", "algae_plastic"]);
        assert_eq!(table.texts("n").unwrap(), ["3", "3"]);
    }

    #[test]
    fn box_plot_uses_display_labels_and_annotation() {
        let cruises = compute(&rates()).unwrap();
        let plot = box_plot(&cruises[0], "expt1", &Settings::default());
        assert_eq!(plot.labels, ["Algae Only", "Algae + Plastic"]);
        assert_eq!(plot.fills[1], STEEL_BLUE);
        assert_eq!(plot.annotation.len(), 2);
        assert!(plot.annotation[0].starts_with("t = 3.67"));
    }
}
