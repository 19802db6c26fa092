//! Declarative description of a file-backed dataset

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which store to open and which arrays to expose as fields
///
/// ```json
/// { "path": "train.safetensors", "keys": ["images", "labels"], "info_key": "classes" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    /// Store file
    pub path: PathBuf,

    /// Field keys in sample order
    pub keys: Vec<String>,

    /// Optional side-channel array exposed through `FileDataset::info`
    #[serde(default)]
    pub info_key: Option<String>,
}

impl DatasetConfig {
    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    ///
    /// A relative `path` inside the file is resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_json(&fs::read_to_string(path)?)?;
        if config.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.path = dir.join(&config.path);
            }
        }
        Ok(config)
    }
}
