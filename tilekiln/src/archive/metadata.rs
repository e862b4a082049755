//! Archive metadata and `metadata.json` merging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::coord::ZoomRange;

/// Optional metadata override file in the source directory.
pub const METADATA_FILENAME: &str = "metadata.json";

/// Errors from reading a metadata override file.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{path} must contain a JSON object")]
    NotAnObject { path: PathBuf },
}

/// Flat key/value metadata stored alongside the tiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveMetadata {
    entries: BTreeMap<String, String>,
}

impl ArchiveMetadata {
    /// Creates empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the default metadata for a generated tile set.
    pub fn defaults(name: &str, format: &str, zooms: ZoomRange) -> Self {
        let mut metadata = Self::new();
        metadata.insert("name", name);
        metadata.insert("format", format);
        metadata.insert("minzoom", zooms.min.to_string());
        metadata.insert("maxzoom", zooms.max.to_string());
        metadata.insert("type", "overlay");
        metadata
    }

    /// Sets a value, replacing any existing one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merges a JSON object over the current entries.
    ///
    /// Keys from `object` win. String values are stored as-is, anything else
    /// as its JSON text.
    pub fn merge_json(&mut self, object: &serde_json::Map<String, Value>) {
        for (key, value) in object {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            self.entries.insert(key.clone(), text);
        }
    }

    /// Merges `<dir>/metadata.json` if it exists.
    ///
    /// Returns `Ok(false)` when there is no file.
    pub fn merge_file(&mut self, dir: &Path) -> Result<bool, MetadataError> {
        let path = dir.join(METADATA_FILENAME);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(MetadataError::Read { path, source }),
        };

        let value: Value = serde_json::from_str(&text).map_err(|source| MetadataError::Parse {
            path: path.clone(),
            source,
        })?;

        match value {
            Value::Object(object) => {
                self.merge_json(&object);
                Ok(true)
            }
            _ => Err(MetadataError::NotAnObject { path }),
        }
    }

    /// Merges `<dir>/metadata.json`, logging and ignoring any error.
    pub fn merge_file_or_warn(&mut self, dir: &Path) {
        match self.merge_file(dir) {
            Ok(true) => debug!(dir = %dir.display(), "Merged metadata.json"),
            Ok(false) => debug!(dir = %dir.display(), "No metadata.json, using defaults"),
            Err(e) => warn!(error = %e, "Ignoring invalid metadata.json"),
        }
    }
}
