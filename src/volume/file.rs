//! Raw image files as volumes

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{VolumeError, VolumeHandle};
use crate::config::FileVolumeConfig;

/// A volume backed by a raw image file on the local filesystem
#[derive(Debug)]
pub struct FileVolume {
    file: Mutex<File>,
    path: PathBuf,
    read_only: bool,
    sync_on_flush: bool,
}

impl FileVolume {
    pub fn open(config: &FileVolumeConfig) -> Result<Self, VolumeError> {
        if config.read_only && config.create_size.is_some() {
            return Err(VolumeError::ConfigError(
                "create_size cannot be used with a read-only volume".to_string(),
            ));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(!config.read_only)
            .create(config.create_size.is_some())
            .open(&config.path)?;

        if let Some(size) = config.create_size {
            // Never truncate an existing image.
            if file.metadata()?.len() < size {
                file.set_len(size)?;
            }
        }

        log::debug!(
            "Opened volume image {} ({})",
            config.path.display(),
            if config.read_only { "read-only" } else { "read-write" }
        );

        Ok(Self {
            file: Mutex::new(file),
            path: config.path.clone(),
            read_only: config.read_only,
            sync_on_flush: config.sync_on_flush,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl VolumeHandle for FileVolume {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, VolumeError> {
        let mut file = self.file.lock()?;
        file.seek(SeekFrom::Start(offset))?;

        let mut buf = Vec::new();
        (&mut *file).take(length).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<usize, VolumeError> {
        if self.read_only {
            return Err(VolumeError::ReadOnly);
        }

        let mut file = self.file.lock()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(data.len())
    }

    fn size(&self) -> Result<u64, VolumeError> {
        Ok(self.file.lock()?.metadata()?.len())
    }

    fn flush(&self) -> Result<(), VolumeError> {
        if !self.sync_on_flush {
            return Err(VolumeError::UnsupportedOperation("flush".to_string()));
        }

        let mut file = self.file.lock()?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_config(dir: &tempfile::TempDir) -> FileVolumeConfig {
        FileVolumeConfig::new(dir.path().join("disk.img"))
    }

    #[test]
    fn test_create_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let volume = FileVolume::open(&image_config(&dir).create_size(4096)).unwrap();
        assert_eq!(volume.size().unwrap(), 4096);
        assert!(volume.path().ends_with("disk.img"));
    }

    #[test]
    fn test_create_size_does_not_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let config = image_config(&dir);
        std::fs::write(&config.path, vec![1u8; 100]).unwrap();

        let volume = FileVolume::open(&config.create_size(10)).unwrap();
        assert_eq!(volume.size().unwrap(), 100);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let volume = FileVolume::open(&image_config(&dir).create_size(64)).unwrap();

        assert_eq!(volume.write(10, b"hello").unwrap(), 5);
        assert_eq!(volume.read(10, 5).unwrap(), b"hello");
        assert_eq!(volume.read(8, 4).unwrap(), b"\0\0he");
    }

    #[test]
    fn test_short_read_at_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = image_config(&dir);
        std::fs::write(&config.path, b"abcdef").unwrap();

        let volume = FileVolume::open(&config).unwrap();
        assert_eq!(volume.read(4, 100).unwrap(), b"ef");
        assert!(volume.read(6, 10).unwrap().is_empty());
        assert!(volume.read(60, 10).unwrap().is_empty());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let config = image_config(&dir);
        std::fs::write(&config.path, b"abcd").unwrap();

        let volume = FileVolume::open(&config.read_only(true)).unwrap();
        assert!(volume.is_read_only());
        assert!(matches!(volume.write(0, b"x"), Err(VolumeError::ReadOnly)));
        assert_eq!(volume.read(0, 4).unwrap(), b"abcd");
    }

    #[test]
    fn test_read_only_with_create_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = image_config(&dir).read_only(true).create_size(16);
        assert!(matches!(
            FileVolume::open(&config),
            Err(VolumeError::ConfigError(_))
        ));
    }

    #[test]
    fn test_missing_image_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileVolume::open(&image_config(&dir)),
            Err(VolumeError::IoError(_))
        ));
    }

    #[test]
    fn test_flush_depends_on_sync_setting() {
        let dir = tempfile::tempdir().unwrap();
        let config = image_config(&dir).create_size(8);

        let volume = FileVolume::open(&config).unwrap();
        volume.flush().unwrap();

        let volume = FileVolume::open(&config.sync_on_flush(false)).unwrap();
        assert!(matches!(
            volume.flush(),
            Err(VolumeError::UnsupportedOperation(_))
        ));
    }
}
