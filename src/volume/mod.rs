//! Volume handles
//!
//! A volume handle is the narrow capability set a `VolumeStream` needs from
//! a block volume: byte-range read and write, the current size, and an
//! optional flush. Backends live outside this crate except for two:
//! - `MemoryVolume`: an in-process buffer, used as a fake in tests
//! - `FileVolume`: a raw image file on the local filesystem

pub mod file;
pub mod memory;

pub use file::FileVolume;
pub use memory::MemoryVolume;

use std::io;
use std::sync::{Arc, PoisonError};
use thiserror::Error;

/// Error types for volume handle operations
#[derive(Error, Debug)]
pub enum VolumeError {
    /// The volume does not implement the named capability at all.
    #[error("Operation not supported by this volume: {0}")]
    UnsupportedOperation(String),

    #[error("Volume is read-only")]
    ReadOnly,

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl<T> From<PoisonError<T>> for VolumeError {
    fn from(_: PoisonError<T>) -> Self {
        VolumeError::Backend("volume lock poisoned".to_string())
    }
}

impl From<VolumeError> for io::Error {
    fn from(err: VolumeError) -> Self {
        match err {
            VolumeError::IoError(e) => e,
            VolumeError::UnsupportedOperation(op) => io::Error::new(
                io::ErrorKind::Unsupported,
                format!("{} not supported by this volume", op),
            ),
            VolumeError::ReadOnly => {
                io::Error::new(io::ErrorKind::PermissionDenied, "volume is read-only")
            }
            VolumeError::ConfigError(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VolumeError::Backend(msg) => io::Error::new(io::ErrorKind::Other, msg),
        }
    }
}

/// Byte-addressed access to a block volume.
///
/// Methods take `&self` so one handle can back several streams; backends
/// that mutate state use interior mutability.
pub trait VolumeHandle {
    /// Read up to `length` bytes starting at `offset`. Short reads near the
    /// end of the volume are not errors.
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, VolumeError>;

    /// Write `data` at `offset` and return the number of bytes written.
    fn write(&self, offset: u64, data: &[u8]) -> Result<usize, VolumeError>;

    /// Current logical size of the volume in bytes.
    fn size(&self) -> Result<u64, VolumeError>;

    /// Persist outstanding writes. Volumes without flush semantics keep the
    /// default, which reports `UnsupportedOperation`.
    fn flush(&self) -> Result<(), VolumeError> {
        Err(VolumeError::UnsupportedOperation("flush".to_string()))
    }
}

macro_rules! forward_volume_handle {
    ($($ty:ty),*) => {
        $(
            impl<V: VolumeHandle + ?Sized> VolumeHandle for $ty {
                fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, VolumeError> {
                    (**self).read(offset, length)
                }

                fn write(&self, offset: u64, data: &[u8]) -> Result<usize, VolumeError> {
                    (**self).write(offset, data)
                }

                fn size(&self) -> Result<u64, VolumeError> {
                    (**self).size()
                }

                fn flush(&self) -> Result<(), VolumeError> {
                    (**self).flush()
                }
            }
        )*
    };
}

forward_volume_handle!(&V, Box<V>, Arc<V>);

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedVolume;

    impl VolumeHandle for FixedVolume {
        fn read(&self, _offset: u64, length: u64) -> Result<Vec<u8>, VolumeError> {
            Ok(vec![7; length as usize])
        }

        fn write(&self, _offset: u64, data: &[u8]) -> Result<usize, VolumeError> {
            Ok(data.len())
        }

        fn size(&self) -> Result<u64, VolumeError> {
            Ok(16)
        }
    }

    #[test]
    fn test_default_flush_is_unsupported() {
        match FixedVolume.flush() {
            Err(VolumeError::UnsupportedOperation(op)) => assert_eq!(op, "flush"),
            other => panic!("unexpected flush result: {:?}", other),
        }
    }

    #[test]
    fn test_forwarding_keeps_flush_capability() {
        let memory = Arc::new(MemoryVolume::new(4));
        let shared: Arc<dyn VolumeHandle> = memory.clone();
        shared.flush().unwrap();
        (&*memory).flush().unwrap();
        assert_eq!(memory.flush_count(), 2);

        let boxed: Box<dyn VolumeHandle> = Box::new(FixedVolume);
        assert!(matches!(
            boxed.flush(),
            Err(VolumeError::UnsupportedOperation(_))
        ));
        assert_eq!(boxed.size().unwrap(), 16);
    }

    #[test]
    fn test_io_error_conversion() {
        let err: io::Error = VolumeError::UnsupportedOperation("flush".to_string()).into();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);

        let err: io::Error = VolumeError::ReadOnly.into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

        let inner = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        let err: io::Error = VolumeError::from(inner).into();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
