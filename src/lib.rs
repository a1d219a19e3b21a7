#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

//! Analyses of zooplankton grazing experiments and field surveys
//!
//! Each analysis reads a workbook of named sheets, computes its statistics and writes summary
//! tables and figures next to its input.

pub mod abundance;
pub mod config;
pub mod descriptive;
pub mod distributions;
pub mod error;
pub mod expt_time;
pub mod grazing_stats;
pub mod hypothesis;
pub mod ingestion;
pub mod krill;
pub mod net_volume;
pub mod plot;
pub mod ranking;
pub mod report;
pub mod sinking;
pub(crate) mod special;
pub mod table;
pub mod workbook;

pub use error::Error;

pub type Result<T> = ::std::result::Result<T, Error>;
