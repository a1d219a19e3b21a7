//! Krill lengths from the grazing experiments, rank transformed and compared across experiments.
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Settings;
use crate::descriptive::{finite, Histogram, Summary};
use crate::hypothesis::{one_way_anova, tukey_hsd, Group, OneWayAnova, ShapiroWilk, TukeyHsd};
use crate::plot::HistogramPlot;
use crate::ranking::rank_transformation;
use crate::report::{normality_annotation, print_anova_report, titled, GroupEntry};
use crate::table::Table;
use crate::workbook::Workbook;
use crate::Result;

pub const SHEET: &str = "krill_length";
const X_DESC: &str = "Rank Transformed Krill Length";

/// Lengths measured in one experiment
#[derive(Clone, Debug, PartialEq)]
pub struct Experiment {
    pub name: String,
    pub lengths: Vec<f64>,
    pub transformed: Vec<f64>,
    /// Normality of the transformed lengths, absent when the sample cannot be tested
    pub normality: Option<ShapiroWilk>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KrillStats {
    pub experiments: Vec<Experiment>,
    /// Every length, experiments in column order, transformed together
    pub pooled: Vec<f64>,
    pub pooled_normality: ShapiroWilk,
    pub anova: OneWayAnova,
    /// Absent when the design leaves too few residual degrees of freedom
    pub hsd: Option<TukeyHsd>,
    pub residual_normality: ShapiroWilk,
}

/// Run the normality checks and the ANOVA on a sheet with one column of lengths per experiment
pub fn compute(table: &Table, alpha: f64) -> Result<KrillStats> {
    let experiments = table
        .headers()
        .iter()
        .map(|name| {
            let lengths = finite(&table.numbers(name)?);
            let transformed = rank_transformation(&lengths);
            let normality = ShapiroWilk::test(&transformed)
                .map_err(|e| warn!(experiment = %name, error = %e, "skipping normality test"))
                .ok();
            Ok(Experiment {
                name: name.clone(),
                lengths,
                transformed,
                normality,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let (labels, lengths): (Vec<&str>, Vec<f64>) = experiments
        .iter()
        .flat_map(|e| e.lengths.iter().map(move |&l| (e.name.as_str(), l)))
        .unzip();
    let pooled = rank_transformation(&lengths);
    let pooled_normality = ShapiroWilk::test(&pooled)?;

    let groups = Group::from_long(&labels, &pooled);
    let anova = one_way_anova(&groups, "treatments")?;
    let hsd = tukey_hsd(&groups, alpha)
        .map_err(|e| warn!(error = %e, "skipping pairwise comparisons"))
        .ok();
    let residual_normality = ShapiroWilk::test(&anova.residuals)?;

    Ok(KrillStats {
        experiments,
        pooled,
        pooled_normality,
        anova,
        hsd,
        residual_normality,
    })
}

fn histogram(values: &[f64], normality: Option<&ShapiroWilk>, alpha: f64) -> HistogramPlot {
    let mut plot = HistogramPlot::new(Histogram::of(values, Histogram::DEFAULT_BINS));
    plot.x_desc = X_DESC.to_owned();
    plot.y_desc = "Frequency".to_owned();
    if let Some(test) = normality {
        plot.annotation = normality_annotation(test, alpha);
    }
    plot
}

/// Print the statistics and draw the histograms into `figs/krill_length` beside the workbook's
/// directory
pub fn run(path: &Path, output_dir: Option<&Path>, settings: &Settings) -> Result<Vec<PathBuf>> {
    let workbook = Workbook::open(path)?;
    let alpha = settings.significance_level;
    let stats = compute(&workbook.sheet(SHEET)?, alpha)?;

    let figures_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => workbook
            .location()
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("figs"),
    }
    .join("krill_length");
    let size = (settings.figure.width, settings.figure.height);

    let entries = stats
        .experiments
        .iter()
        .map(|e| GroupEntry::new(&e.name, Summary::of(&e.lengths), e.normality.as_ref(), alpha))
        .collect::<Vec<_>>();
    println!("{}", titled("Krill length", &entries));

    let mut figures = Vec::with_capacity(stats.experiments.len() + 1);
    for experiment in &stats.experiments {
        let figure = figures_dir.join(format!(
            "hist_krill_length_{}_ranktransformed.png",
            experiment.name
        ));
        histogram(&experiment.transformed, experiment.normality.as_ref(), alpha).draw(&figure, size)?;
        figures.push(figure);
    }

    let figure = figures_dir.join("hist_krill_length_ranktransformed.png");
    histogram(&stats.pooled, Some(&stats.pooled_normality), alpha).draw(&figure, size)?;
    figures.push(figure);

    print_anova_report(&stats.anova, stats.hsd.as_ref(), &stats.residual_normality, alpha);
    info!(experiments = stats.experiments.len(), "krill length statistics done");
    Ok(figures)
}

#[cfg(test)]
mod tests {
    use super::compute;
    use crate::table::Table;

    fn lengths() -> Table {
        Table::from_reader(
            "Expt1,Expt2,Expt3
30.1,35.2,28.4
31.5,36.8,29.9
29.8,34.1,27.5
32.0,37.5,
30.7,,
"
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn blanks_are_dropped_per_experiment() {
        let stats = compute(&lengths(), 0.05).unwrap();
        let sizes = stats
            .experiments
            .iter()
            .map(|e| e.lengths.len())
            .collect::<Vec<_>>();
        assert_eq!(sizes, [5, 4, 3]);
        assert_eq!(stats.pooled.len(), 12);
        assert!(stats.experiments.iter().all(|e| e.normality.is_some()));
    }

    #[test]
    fn pooled_scores_are_symmetric() {
        let stats = compute(&lengths(), 0.05).unwrap();
        let total = stats.pooled.iter().sum::<f64>();
        approx::assert_abs_diff_eq!(total, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn anova_compares_every_experiment() {
        let stats = compute(&lengths(), 0.05).unwrap();
        approx::assert_relative_eq!(stats.anova.treatments.df, 2.0);
        approx::assert_relative_eq!(stats.anova.residual.df, 9.0);
        assert_eq!(stats.hsd.as_ref().unwrap().comparisons.len(), 3);
        assert_eq!(stats.anova.residuals.len(), 12);
        // Expt2 lengths all rank above the others
        assert!(stats.anova.p_value < 0.05);
    }
}
