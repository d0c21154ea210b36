//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] on top of a single JSON document.  A missing
//! file is not an error: the fixture falls back to
//! [`BenchConfig::default()`].

use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::BenchConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<BenchConfig, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", self.path.display());
                return Ok(BenchConfig::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: BenchConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        config
            .validate()
            .map_err(|_| ConfigError::ValidationFailed("fixture config rejected"))?;
        info!("Loaded config from {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &BenchConfig) -> Result<(), ConfigError> {
        config
            .validate()
            .map_err(|_| ConfigError::ValidationFailed("fixture config rejected"))?;
        let text = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}
