//! Configuration file support
//!
//! Loads config from ~/.nimbus/config.toml

use serde::Deserialize;
use std::path::PathBuf;

/// Configuration for the nimbus binary
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Login name for the sandbox identity
    pub username: Option<String>,

    /// Data directory for sandbox storage
    pub data_dir: Option<String>,
}

impl Config {
    /// Load config from ~/.nimbus/config.toml
    pub fn load() -> Self {
        let path = config_path();

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".nimbus")
        .join("config.toml")
}
