//! In-memory volume
//!
//! Backs a volume with a plain byte buffer. Used as a fake wherever a real
//! block device is not available, and handy for staging images in memory.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{VolumeError, VolumeHandle};

/// Default cap on how far writes may grow a `MemoryVolume` (1 GiB).
pub const DEFAULT_SIZE_LIMIT: usize = 1 << 30;

/// A volume held entirely in memory.
///
/// Writes past the end zero-fill the gap, so a sparse write allocates every
/// byte up to it. Growth through `write` is capped at `size_limit`; writes
/// that would go further fail with `VolumeError::Backend` instead of
/// attempting the allocation.
#[derive(Debug)]
pub struct MemoryVolume {
    data: RwLock<Vec<u8>>,
    size_limit: usize,
    /// Whether `flush()` succeeds or reports `UnsupportedOperation`.
    flush_supported: bool,
    /// Number of `flush()` calls, supported or not.
    flush_calls: AtomicUsize,
}

impl MemoryVolume {
    /// Create a zero-filled volume of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::from_bytes(vec![0; size])
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: RwLock::new(data.into()),
            size_limit: DEFAULT_SIZE_LIMIT,
            flush_supported: true,
            flush_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_flush_support(mut self, supported: bool) -> Self {
        self.flush_supported = supported;
        self
    }

    /// Largest size, in bytes, that writes may grow the volume to.
    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.size_limit = limit;
        self
    }

    pub fn flush_count(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }

    /// Grow (zero-filling) or shrink the volume.
    pub fn resize(&self, len: usize) -> Result<(), VolumeError> {
        self.data.write()?.resize(len, 0);
        Ok(())
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Result<Vec<u8>, VolumeError> {
        Ok(self.data.read()?.clone())
    }
}

impl VolumeHandle for MemoryVolume {
    fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, VolumeError> {
        let data = self.data.read()?;
        let len = data.len() as u64;
        // Both bounds are clamped to the buffer length, so they fit in usize.
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(length).min(len) as usize;
        Ok(data[start..end].to_vec())
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize, VolumeError> {
        let start = usize::try_from(offset).map_err(|_| {
            VolumeError::Backend(format!("offset {} exceeds addressable memory", offset))
        })?;
        let end = start.checked_add(buf.len()).ok_or_else(|| {
            VolumeError::Backend(format!("write of {} bytes at {} overflows", buf.len(), offset))
        })?;

        let mut data = self.data.write()?;
        if end > data.len() {
            if end > self.size_limit {
                return Err(VolumeError::Backend(format!(
                    "write of {} bytes at {} exceeds the {} byte memory volume limit",
                    buf.len(),
                    offset,
                    self.size_limit
                )));
            }
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn size(&self) -> Result<u64, VolumeError> {
        Ok(self.data.read()?.len() as u64)
    }

    fn flush(&self) -> Result<(), VolumeError> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        if self.flush_supported {
            Ok(())
        } else {
            Err(VolumeError::UnsupportedOperation("flush".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_clamps_at_end() {
        let volume = MemoryVolume::from_bytes(b"abcdef".to_vec());
        assert_eq!(volume.read(0, 3).unwrap(), b"abc");
        assert_eq!(volume.read(4, 10).unwrap(), b"ef");
        assert!(volume.read(6, 1).unwrap().is_empty());
        assert!(volume.read(100, 1).unwrap().is_empty());
        assert_eq!(volume.read(2, u64::MAX).unwrap(), b"cdef");
    }

    #[test]
    fn test_write_past_end_grows_volume() {
        let volume = MemoryVolume::new(4);
        assert_eq!(volume.write(6, b"xy").unwrap(), 2);
        assert_eq!(volume.size().unwrap(), 8);
        assert_eq!(volume.snapshot().unwrap(), vec![0, 0, 0, 0, 0, 0, b'x', b'y']);
    }

    #[test]
    fn test_sparse_write_beyond_limit_is_rejected() {
        let volume = MemoryVolume::new(4);
        assert!(matches!(
            volume.write(1 << 40, b"far"),
            Err(VolumeError::Backend(_))
        ));
        assert_eq!(volume.size().unwrap(), 4);

        let volume = MemoryVolume::new(4).with_size_limit(8);
        assert_eq!(volume.write(5, b"abc").unwrap(), 3);
        assert!(volume.write(6, b"abc").is_err());
        assert_eq!(volume.size().unwrap(), 8);

        // Overwrites inside an already larger buffer are not limited.
        let volume = MemoryVolume::new(16).with_size_limit(8);
        assert_eq!(volume.write(12, b"abcd").unwrap(), 4);
    }

    #[test]
    fn test_flush_support_is_configurable() {
        let volume = MemoryVolume::new(0);
        volume.flush().unwrap();

        let volume = MemoryVolume::new(0).with_flush_support(false);
        assert!(matches!(
            volume.flush(),
            Err(VolumeError::UnsupportedOperation(_))
        ));
        assert_eq!(volume.flush_count(), 1);
    }

    #[test]
    fn test_resize() {
        let volume = MemoryVolume::from_bytes(b"abcd".to_vec());
        volume.resize(2).unwrap();
        assert_eq!(volume.snapshot().unwrap(), b"ab");
        volume.resize(3).unwrap();
        assert_eq!(volume.snapshot().unwrap(), b"ab\0");
    }
}
