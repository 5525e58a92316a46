//! Configuration for file-backed volumes

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::volume::VolumeError;

/// Settings for opening a raw image file as a volume
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FileVolumeConfig {
    /// Path to the raw image file
    pub path: PathBuf,

    /// Open without write access; writes fail with `VolumeError::ReadOnly`
    pub read_only: bool,

    /// Create the image if missing and extend it to at least this many bytes
    pub create_size: Option<u64>,

    /// Whether `flush()` syncs file data to disk. When false the volume
    /// reports flush as unsupported.
    pub sync_on_flush: bool,
}

impl Default for FileVolumeConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./volume.img"),
            read_only: false,
            create_size: None,
            sync_on_flush: true,
        }
    }
}

impl FileVolumeConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn create_size(mut self, size: u64) -> Self {
        self.create_size = Some(size);
        self
    }

    pub fn sync_on_flush(mut self, sync: bool) -> Self {
        self.sync_on_flush = sync;
        self
    }

    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, VolumeError> {
        let data = std::fs::read(path.as_ref())?;
        serde_json::from_slice(&data).map_err(|e| {
            VolumeError::ConfigError(format!(
                "Failed to parse {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }
}
