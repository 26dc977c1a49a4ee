//! Runtime configuration for the labeler and its command-line tool
//!
//! Settings come from a TOML file, then `VID_LABELER_*` environment
//! variables override individual keys. Values that fail to parse are
//! ignored with a warning.

use crate::errors::{LabelerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

const ENV_PREFIX: &str = "VID_LABELER_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerConfig {
    pub labeler: LabelerSettings,
    pub logging: LoggingConfig,
}

/// Evaluation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelerSettings {
    /// Fill `serialized_debug_trace` in every output
    pub debug_trace: bool,
    /// Label batches on a thread pool
    pub parallel: bool,
    /// Worker threads for parallel labeling; 0 means one per CPU
    pub threads: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = LabelerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            other => Err(LabelerError::Config(format!("unknown log format: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl LabelerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| LabelerError::Config(format!("Failed to parse config: {e}")))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LabelerError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults overridden by the process environment.
    pub fn load_from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies `VID_LABELER_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        override_parsed(&mut self.labeler.debug_trace, "DEBUG_TRACE", get("DEBUG_TRACE"));
        override_parsed(&mut self.labeler.parallel, "PARALLEL", get("PARALLEL"));
        override_parsed(&mut self.labeler.threads, "THREADS", get("THREADS"));
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        override_parsed(&mut self.logging.format, "LOG_FORMAT", get("LOG_FORMAT"));
    }

    /// Number of worker threads to use for parallel labeling.
    pub fn effective_threads(&self) -> usize {
        match self.labeler.threads {
            0 => num_cpus::get(),
            n => n,
        }
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, name: &str, value: Option<String>) {
    let Some(value) = value else {
        return;
    };
    match value.trim().parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!("Ignoring unparsable {ENV_PREFIX}{name}={value}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LabelerConfig::default();
        assert!(!config.labeler.debug_trace);
        assert!(!config.labeler.parallel);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.effective_threads() >= 1);
    }

    #[test]
    fn test_partial_toml() {
        let config: LabelerConfig = toml::from_str(
            r#"
            [labeler]
            parallel = true
            threads = 3

            [logging]
            format = "pretty"
            "#,
        )
        .unwrap();
        assert!(config.labeler.parallel);
        assert!(!config.labeler.debug_trace);
        assert_eq!(config.effective_threads(), 3);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("labeler.toml");

        let mut config = LabelerConfig::default();
        config.labeler.debug_trace = true;
        config.logging.level = "debug".into();
        config.save_to_file(&path).unwrap();

        assert_eq!(LabelerConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "labeler = 3").unwrap();
        assert!(matches!(
            LabelerConfig::load_from_file(&path),
            Err(LabelerError::Config(_))
        ));
        assert!(LabelerConfig::load_from_file(temp_dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LabelerConfig::default();
        config.apply_overrides(env(&[
            ("VID_LABELER_DEBUG_TRACE", "true"),
            ("VID_LABELER_PARALLEL", "true"),
            ("VID_LABELER_THREADS", " 8 "),
            ("VID_LABELER_LOG_LEVEL", "vid_labeler=trace"),
            ("VID_LABELER_LOG_FORMAT", "Pretty"),
        ]));
        assert!(config.labeler.debug_trace);
        assert!(config.labeler.parallel);
        assert_eq!(config.labeler.threads, 8);
        assert_eq!(config.logging.level, "vid_labeler=trace");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_unparsable_env_is_ignored() {
        let mut config = LabelerConfig::default();
        config.labeler.threads = 2;
        config.apply_overrides(env(&[
            ("VID_LABELER_THREADS", "many"),
            ("VID_LABELER_PARALLEL", "yes please"),
            ("VID_LABELER_LOG_FORMAT", "json"),
        ]));
        assert_eq!(config.labeler.threads, 2);
        assert!(!config.labeler.parallel);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }
}
