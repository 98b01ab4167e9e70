//! Runtime configuration.

use crate::error::{Result, SignError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for signing sessions and the command-line front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the filesystem document store.
    pub data_dir: PathBuf,

    /// Directory holding one private key per identity.
    pub key_dir: PathBuf,

    /// Undo already-written rows and the blob when a signing step fails.
    ///
    /// When `false`, a failed sequence leaves earlier writes in place.
    pub transactional: bool,

    /// Let an owner sign content they already signed.
    pub allow_resign: bool,

    /// Write an audit row for verifications made by an authenticated identity.
    pub audit_verifications: bool,

    /// `tracing-subscriber` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("docsign-data"),
            key_dir: PathBuf::from("docsign-data/keys"),
            transactional: true,
            allow_resign: false,
            audit_verifications: true,
            log_filter: "docsign=info".to_string(),
        }
    }
}

impl Config {
    /// Read a TOML file, or fall back to defaults when it does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse TOML text; unset keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SignError::Config(e.to_string()))
    }
}
