//! Configuration loading and management

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the configuration file within the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Client configuration, read from `<data-dir>/config.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Shared folder acting as the remote store (default: `<data-dir>/remote`)
    #[serde(default)]
    pub remote_dir: Option<String>,

    /// Page size for remote listings and the change feed
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Label for this device in status output and logs
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

fn default_page_size() -> usize {
    100
}

fn default_device_name() -> String {
    "local".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_dir: None,
            page_size: default_page_size(),
            device_name: default_device_name(),
        }
    }
}

impl Config {
    /// Load configuration from the data directory, writing defaults if absent
    pub fn load(data_dir: &Path) -> Result<Self> {
        let config_file = data_dir.join(CONFIG_FILE);

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {:?}", config_file))?;
            tracing::debug!("Loaded configuration from {:?}", config_file);
            Ok(config)
        } else {
            let config = Config::default();

            std::fs::create_dir_all(data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }

    /// Remote folder to sync through, resolved against `data_dir`
    pub fn remote_dir(&self, data_dir: &Path) -> PathBuf {
        match &self.remote_dir {
            Some(dir) => expand_tilde(dir),
            None => data_dir.join("remote"),
        }
    }
}

/// Expand ~ or ~/ prefix to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}
