//! Analysis settings: decibel references and band colours.
//!
//! Read from a JSON file. Missing fields take their defaults, so `{}` is a
//! valid configuration.
//!
//! ```json
//! {
//!   "decibel_references": { "ref1": 0.00002, "vibref1": 50000.0 },
//!   "band_colours": ["blue", "orange", "green"]
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::channel::{DecibelReferences, RECORDS_PER_POINT};
use crate::data::plane::DEFAULT_BAND_COLOURS;

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "VIBROSCAN_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub decibel_references: DecibelReferences,
    /// Band colour names, cycled when there are more bands.
    pub band_colours: Vec<String>,
    /// Channel records per scan point. Only used in messages; scan points
    /// always carry eight channels.
    pub records_per_point: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            decibel_references: DecibelReferences::default(),
            band_colours: DEFAULT_BAND_COLOURS.iter().map(|c| c.to_string()).collect(),
            records_per_point: RECORDS_PER_POINT,
        }
    }
}

impl AnalysisConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration {}", path.display()))?;
        let config: AnalysisConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing configuration {}", path.display()))?;
        if config.records_per_point != RECORDS_PER_POINT {
            log::warn!(
                "records_per_point = {} ignored, scan points always have {RECORDS_PER_POINT} channels",
                config.records_per_point
            );
        }
        log::debug!("configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).context("serializing configuration")?;
        std::fs::write(path, text)
            .with_context(|| format!("writing configuration {}", path.display()))
    }

    /// Explicit path first, then `VIBROSCAN_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::channel::Channel;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "decibel_references": { "vib": 2.5 } }"#).unwrap();
        let config = AnalysisConfig::from_file(&path).unwrap();
        assert_eq!(config.decibel_references.get(Channel::Vib), 2.5);
        assert_eq!(config.decibel_references.get(Channel::Ref1), 0.00002);
        assert_eq!(config.band_colours[1], "orange");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AnalysisConfig::default();
        config.band_colours = vec!["red".into()];
        config.save_to_file(&path).unwrap();
        assert_eq!(AnalysisConfig::resolve(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(AnalysisConfig::from_file(&path).is_err());
    }
}
