//! Whole-document JSON persistence for the file-backed store and remote.
//!
//! A document is read in full and replaced in full. Saves write a sibling
//! temp file and rename it over the target, so readers never observe a
//! half-written document.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum JsonFileError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, JsonFileError>;

fn io_error(path: &Path, source: io::Error) -> JsonFileError {
    JsonFileError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> JsonFileError {
    JsonFileError::Json {
        path: path.display().to_string(),
        source,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a document, or the default value if the file doesn't exist yet.
pub async fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read_to_string(path).await {
        Ok(contents) => serde_json::from_str(&contents).map_err(|e| json_error(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(io_error(path, e)),
    }
}

/// Replace a document atomically, creating parent directories as needed.
pub async fn save_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let contents = serde_json::to_string_pretty(value).map_err(|e| json_error(path, e))?;
    let temp = temp_path(path);
    fs::write(&temp, contents)
        .await
        .map_err(|e| io_error(&temp, e))?;
    fs::rename(&temp, path)
        .await
        .map_err(|e| io_error(path, e))
}
