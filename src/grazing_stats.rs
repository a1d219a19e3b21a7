//! Ross Sea ingestion rates per experiment: normality, box plots and a one-way ANOVA.
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Settings;
use crate::descriptive::{Histogram, Summary};
use crate::hypothesis::{one_way_anova, tukey_hsd, Group, OneWayAnova, ShapiroWilk, TukeyHsd};
use crate::plot::{BoxPlot, HistogramPlot};
use crate::report::{normality_annotation, print_anova_report, titled, GroupEntry};
use crate::table::Table;
use crate::workbook::Workbook;
use crate::Result;

pub const SHEET: &str = "forpython";

/// The two ingestion rates reported per experiment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Measure {
    Individual,
    Community,
}

impl Measure {
    pub const ALL: [Self; 2] = [Self::Individual, Self::Community];

    pub const fn column(self) -> &'static str {
        match self {
            Self::Individual => "Daily Individual Ingestion Rate",
            Self::Community => "Community Ingestion Rate",
        }
    }

    /// Name used in figure file names
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Community => "community",
        }
    }

    pub const fn axis_label(self) -> &'static str {
        match self {
            Self::Individual => "Daily Individual Ingestion Rate (µg Chl-a equiv ind⁻¹ day⁻¹)",
            Self::Community => "Community Ingestion Rate (µg Chl-a equiv m⁻² day⁻¹)",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExperimentRates {
    pub group: Group,
    pub summary: Summary,
    pub normality: Option<ShapiroWilk>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeasureStats {
    pub measure: Measure,
    pub experiments: Vec<ExperimentRates>,
    pub anova: OneWayAnova,
    /// Absent when the design leaves too few residual degrees of freedom
    pub hsd: Option<TukeyHsd>,
    pub residual_normality: ShapiroWilk,
}

impl MeasureStats {
    /// Every rate of every experiment
    pub fn values(&self) -> Vec<f64> {
        self.experiments
            .iter()
            .flat_map(|e| e.group.values.iter().copied())
            .collect()
    }
}

pub fn compute(table: &Table, measure: Measure, alpha: f64) -> Result<MeasureStats> {
    let labels = table.texts("Experiment")?;
    let rates = table.numbers(measure.column())?;
    let groups = Group::from_long(&labels, &rates);

    let experiments = groups
        .iter()
        .map(|group| ExperimentRates {
            summary: Summary::of(&group.values),
            normality: ShapiroWilk::test(&group.values)
                .map_err(|e| warn!(experiment = %group.name, error = %e, "skipping normality test"))
                .ok(),
            group: group.clone(),
        })
        .collect();

    let anova = one_way_anova(&groups, "treatments")?;
    let hsd = tukey_hsd(&groups, alpha)
        .map_err(|e| warn!(error = %e, "skipping pairwise comparisons"))
        .ok();
    let residual_normality = ShapiroWilk::test(&anova.residuals)?;

    Ok(MeasureStats {
        measure,
        experiments,
        anova,
        hsd,
        residual_normality,
    })
}

fn histogram(values: &[f64], measure: Measure) -> HistogramPlot {
    let mut plot = HistogramPlot::new(Histogram::of(values, Histogram::DEFAULT_BINS));
    plot.x_desc = measure.axis_label().to_owned();
    plot.y_desc = "Frequency".to_owned();
    plot
}

pub fn box_plot(stats: &MeasureStats) -> BoxPlot {
    let mut plot = BoxPlot::new(
        stats.experiments.iter().map(|e| e.group.name.clone()).collect(),
        stats.experiments.iter().map(|e| e.group.values.clone()).collect(),
    );
    plot.x_desc = "Experiment".to_owned();
    plot.y_desc = stats.measure.axis_label().to_owned();
    plot
}

/// Print the statistics of both measures and draw their figures into `figs` beside the
/// workbook's directory
pub fn run(path: &Path, output_dir: Option<&Path>, settings: &Settings) -> Result<Vec<PathBuf>> {
    let workbook = Workbook::open(path)?;
    let table = workbook.sheet(SHEET)?;
    let alpha = settings.significance_level;
    let size = (settings.figure.width, settings.figure.height);
    let figures_dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => workbook
            .location()
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("figs"),
    };

    let mut figures = Vec::new();
    for measure in Measure::ALL {
        let stats = compute(&table, measure, alpha)?;
        let slug = measure.slug();

        let entries = stats
            .experiments
            .iter()
            .map(|e| GroupEntry::new(&e.group.name, e.summary, e.normality.as_ref(), alpha))
            .collect::<Vec<_>>();
        println!("{}", titled(measure.column(), &entries));

        for experiment in &stats.experiments {
            let mut plot = histogram(&experiment.group.values, measure);
            plot.title = Some(format!("Histogram of ingestion rates: {}", experiment.group.name));
            if let Some(test) = &experiment.normality {
                plot.annotation = normality_annotation(test, alpha);
            }
            let figure = figures_dir.join(format!(
                "hist_ingestion_rate_{slug}_{}.png",
                experiment.group.name
            ));
            plot.draw(&figure, size)?;
            figures.push(figure);
        }

        let figure = figures_dir.join(format!("ingestion_rate_{slug}.png"));
        box_plot(&stats).draw(&figure, size)?;
        figures.push(figure);

        print_anova_report(&stats.anova, stats.hsd.as_ref(), &stats.residual_normality, alpha);

        let mut plot = histogram(&stats.values(), measure);
        plot.title = Some("Histogram of ingestion rates".to_owned());
        plot.annotation = normality_annotation(&stats.residual_normality, alpha);
        let figure = figures_dir.join(format!("hist_ingestion_rate_{slug}_allexpts.png"));
        plot.draw(&figure, size)?;
        figures.push(figure);

        info!(measure = measure.column(), experiments = stats.experiments.len(), "ingestion statistics done");
    }
    Ok(figures)
}
