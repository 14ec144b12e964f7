//! Configuration loading and defaults.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

/// Runtime configuration for SeqDB.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding table files (`<name>.heap`, `<name>_<col>.sf`).
    /// Default "data".
    pub data_dir: String,

    /// Remove existing demo table files on startup. Default true.
    pub reset: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            reset: true,
        }
    }
}

impl Config {
    /// Load config from a TOML file. Empty file returns default config.
    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let c: Config = toml::from_str(&s)?;
        c.validate()?;
        Ok(c)
    }

    /// Use default config. Convenience for tests and minimal setups.
    pub fn default_config() -> Self {
        Self::default()
    }

    fn validate(&self) -> Result<()> {
        if self.data_dir.is_empty() {
            anyhow::bail!("data_dir must not be empty");
        }
        Ok(())
    }
}
