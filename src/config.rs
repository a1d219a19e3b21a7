use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::Result;

/// Settings shared by the analyses, read from an optional TOML file
///
/// Every field has a default, so a settings file only needs the values it changes:
///
/// ```toml
/// significance_level = 0.01
///
/// [net]
/// radius_m = 0.5
///
/// [labels]
/// algae = "Algae"
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Threshold below which a test rejects its null hypothesis
    pub significance_level: f64,
    pub figure: FigureSettings,
    pub net: NetSettings,
    pub abundance: AbundanceSettings,
    /// Display names for treatments and stations, overriding the built-in ones
    pub labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FigureSettings {
    pub width: u32,
    pub height: u32,
}

/// Flowmeter and ring-net constants used to compute the volume of water sampled
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NetSettings {
    /// Rotor constant specific to the flowmeter
    pub rotor_constant: f64,
    /// Radius of the net opening in metres
    pub radius_m: f64,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AbundanceSettings {
    pub title: String,
    /// Stations drawn side by side in the grouped copepod chart, in order
    pub stations: Vec<String>,
    /// y ranges of the lower and upper panel of the broken-axis chart
    pub broken_axis: [(f64, f64); 2],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            figure: FigureSettings::default(),
            net: NetSettings::default(),
            abundance: AbundanceSettings::default(),
            labels: BTreeMap::new(),
        }
    }
}

impl Default for FigureSettings {
    fn default() -> Self {
        Self {
            width: 960,
            height: 720,
        }
    }
}

impl Default for NetSettings {
    fn default() -> Self {
        Self {
            rotor_constant: 26873.0,
            radius_m: 0.25,
        }
    }
}

impl Default for AbundanceSettings {
    fn default() -> Self {
        Self {
            title: "Fall 2019 Copepods".to_owned(),
            stations: vec![
                "outside_front".to_owned(),
                "inside_front".to_owned(),
                "marine".to_owned(),
            ],
            broken_axis: [(0.0, 400.0), (1000.0, 1100.0)],
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Settings from `path` when given, otherwise the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Display name for a station or treatment key
    ///
    /// User overrides win over the analysis' built-in names; unknown keys are shown as-is.
    pub fn label(&self, key: &str, builtin: &[(&str, &str)]) -> String {
        self.labels
            .get(key)
            .map(String::as_str)
            .or_else(|| {
                builtin
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, label)| *label)
            })
            .unwrap_or(key)
            .to_owned()
    }
}
