//! Command line entry point, one subcommand per analysis.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use zooplankton_tools::config::Settings;
use zooplankton_tools::ingestion::{IngestionOptions, TimeSource};
use zooplankton_tools::{abundance, expt_time, grazing_stats, ingestion, krill, net_volume, sinking};

#[derive(Parser)]
#[command(name = "zooplankton-tools")]
#[command(about = "Analyse zooplankton grazing, abundance and sinking-rate experiments", long_about = None)]
struct Cli {
    /// TOML file overriding the default settings
    #[arg(long, global = true, value_name = "SETTINGS")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grazing and ingestion rates from chlorophyll depletion in incubation bottles
    IngestionRates {
        /// Workbook with `chla` and `expt_data` sheets, or the chlorophyll CSV with --times
        #[arg(value_name = "WORKBOOK")]
        input: PathBuf,

        /// Experiment name used in the output file names
        #[arg(short, long)]
        experiment: String,

        /// Prefix of the summary CSV
        #[arg(short, long, default_value = "DEBay_MP")]
        prefix: String,

        /// Separate CSV of experiment times
        #[arg(short, long)]
        times: Option<PathBuf>,

        /// Directory for the outputs instead of the input's directory
        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,
    },
    /// Fecal pellet sinking rates per treatment
    SinkingRates {
        #[arg(value_name = "WORKBOOK")]
        input: PathBuf,

        #[arg(short, long)]
        experiment: String,

        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,
    },
    /// Zooplankton abundance charts
    Abundance {
        #[command(subcommand)]
        survey: Survey,
    },
    /// Rank-transformed krill lengths compared across experiments
    KrillLength {
        #[arg(value_name = "WORKBOOK")]
        input: PathBuf,

        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,
    },
    /// Ross Sea ingestion rates compared across experiments
    IngestionStats {
        #[arg(value_name = "WORKBOOK")]
        input: PathBuf,

        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,
    },
    /// Add elapsed experiment hours to a CSV of start and end timestamps
    ExptTime {
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Write here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Add the volume of water sampled to a CSV of flowmeter readings
    NetVolume {
        #[arg(value_name = "CSV")]
        input: PathBuf,

        /// Write here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum Survey {
    /// Copepods per station, grouped and with a broken y axis
    DeBay(SurveyArgs),
    /// Copepods stacked by station
    RaritanBay(SurveyArgs),
    /// Tows stacked by species, per sampling period
    RossSea(SurveyArgs),
    /// Grazing tows stacked by species
    RossSeaGrazing(SurveyArgs),
}

#[derive(clap::Args)]
struct SurveyArgs {
    #[arg(value_name = "WORKBOOK")]
    input: PathBuf,

    #[arg(short = 'd', long)]
    output_dir: Option<PathBuf>,
}

type SurveyRun = fn(&Path, Option<&Path>, &Settings) -> zooplankton_tools::Result<Vec<PathBuf>>;

fn log_figures(figures: &[PathBuf]) {
    info!(figures = figures.len(), "done");
}

fn execute(command: Commands, settings: &Settings) -> zooplankton_tools::Result<()> {
    match command {
        Commands::IngestionRates {
            input,
            experiment,
            prefix,
            times,
            output_dir,
        } => {
            let options = IngestionOptions {
                experiment,
                prefix,
                times: times.map_or(TimeSource::Workbook, TimeSource::Csv),
                output_dir,
            };
            let outputs = ingestion::run(&input, &options, settings)?;
            info!(summary = %outputs.summary.display(), figure = %outputs.figure.display(), "done");
        }
        Commands::SinkingRates {
            input,
            experiment,
            output_dir,
        } => {
            let (summary, figures) = sinking::run(&input, &experiment, output_dir.as_deref(), settings)?;
            info!(summary = %summary.display(), figures = figures.len(), "done");
        }
        Commands::Abundance { survey } => {
            let (run, args) = match survey {
                Survey::DeBay(args) => (abundance::run_de_bay as SurveyRun, args),
                Survey::RaritanBay(args) => (abundance::run_raritan as SurveyRun, args),
                Survey::RossSea(args) => (abundance::run_ross_sea as SurveyRun, args),
                Survey::RossSeaGrazing(args) => (abundance::run_ross_sea_grazing as SurveyRun, args),
            };
            log_figures(&run(&args.input, args.output_dir.as_deref(), settings)?);
        }
        Commands::KrillLength { input, output_dir } => {
            log_figures(&krill::run(&input, output_dir.as_deref(), settings)?);
        }
        Commands::IngestionStats { input, output_dir } => {
            log_figures(&grazing_stats::run(&input, output_dir.as_deref(), settings)?);
        }
        Commands::ExptTime { input, output } => {
            expt_time::run(&input, output.as_deref())?;
        }
        Commands::NetVolume { input, output } => {
            net_volume::run(&input, output.as_deref(), &settings.net)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));
    tracing_subscriber::registry().with(stderr_layer).init();

    let cli = Cli::parse();

    let result = Settings::load(cli.config.as_deref()).and_then(|settings| execute(cli.command, &settings));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "analysis failed");
            ExitCode::FAILURE
        }
    }
}
