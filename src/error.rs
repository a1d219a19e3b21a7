use std::path::PathBuf;

/// Errors raised while loading experiment data, computing statistics or rendering figures
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("row {row}: cannot parse timestamp {value:?} (expected %Y-%m-%dT%H:%M)")]
    Timestamp { row: usize, value: String },

    /// None of the candidate headers are present in the table
    #[error("missing column {name:?} (looked for {candidates:?})")]
    MissingColumn {
        name: String,
        candidates: Vec<String>,
    },

    #[error("failed to read spreadsheet {path}: {source}")]
    Spreadsheet {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {workbook} has no sheet named {sheet:?}")]
    MissingSheet { workbook: PathBuf, sheet: String },

    #[error("no {time_point} control bottles for {cruise} {station}")]
    MissingControl {
        cruise: String,
        station: String,
        time_point: &'static str,
    },

    /// A treatment bottle must match exactly one experiment time record
    #[error("Check experiment times: {cruise} {station} {bottle} ({matches} matching records)")]
    ExperimentTime {
        cruise: String,
        station: String,
        bottle: String,
        matches: usize,
    },

    #[error("{what} needs at least {needed} values, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("all values are identical, the sample has zero range")]
    ZeroRange,

    #[error("failed to draw figure: {0}")]
    Plot(String),
}

impl Error {
    pub(crate) fn spreadsheet(path: impl Into<PathBuf>, source: calamine::Error) -> Self {
        Self::Spreadsheet {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
