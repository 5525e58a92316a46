//! File-like streams over volume handles
//!
//! `VolumeStream` keeps a byte offset on top of a `VolumeHandle` and turns
//! the usual stream calls (read, write, seek, tell, flush, close) into
//! offset-addressed calls on the handle. It also implements
//! `std::io::{Read, Write, Seek}` so generic copy and hashing code can run
//! over a volume directly.
//!
//! The stream holds no locks. Share it across threads by wrapping it in a
//! `Mutex`; share the underlying volume by handing each stream a `&V` or
//! `Arc<V>`.

pub mod error;
pub mod whence;

pub use error::{Result, StreamError};
pub use whence::{Whence, SEEK_CUR, SEEK_END, SEEK_SET};

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::volume::{VolumeError, VolumeHandle};

/// A positioned stream over a volume handle.
///
/// The stream never releases the backing volume; dropping it or calling
/// `close` only ends this session.
#[derive(Debug)]
pub struct VolumeStream<V> {
    volume: V,
    offset: u64,
    closed: bool,
}

impl<V: VolumeHandle> VolumeStream<V> {
    /// Wrap `volume` with the offset at 0. Performs no I/O.
    pub fn new(volume: V) -> Self {
        Self {
            volume,
            offset: 0,
            closed: false,
        }
    }

    pub fn get_ref(&self) -> &V {
        &self.volume
    }

    pub fn into_inner(self) -> V {
        self.volume
    }

    /// Read up to `length` bytes from the current offset, or everything up
    /// to the volume's end when `length` is `None`.
    ///
    /// The volume size is queried on every call, so a volume that grew since
    /// the last read can be read further. At or past the end this returns an
    /// empty vector without touching the volume.
    pub fn read(&mut self, length: Option<u64>) -> Result<Vec<u8>> {
        let remaining = self.volume.size()?.saturating_sub(self.offset);
        let length = length.map_or(remaining, |len| len.min(remaining));
        if length == 0 {
            return Ok(Vec::new());
        }

        let mut data = self.volume.read(self.offset, length)?;
        if data.len() as u64 > length {
            data.truncate(length as usize);
        }
        self.inc_offset(data.len() as u64)?;
        Ok(data)
    }

    /// Write `data` at the current offset and advance by the number of bytes
    /// the volume reports as written.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let written = self.volume.write(self.offset, data)?;
        self.inc_offset(written as u64)?;
        Ok(written)
    }

    /// Move the offset and return the new position. `whence` is one of
    /// `SEEK_SET`, `SEEK_CUR` or `SEEK_END`.
    ///
    /// Fails with `InvalidArgument` for any other `whence`, or when the target
    /// would be negative. The offset is unchanged on failure. Seeking past the
    /// end is allowed.
    pub fn seek(&mut self, offset: i64, whence: i32) -> Result<u64> {
        let whence = Whence::try_from(whence)?;
        self.seek_whence(offset, whence)
    }

    pub fn seek_whence(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => self.offset,
            Whence::End => self.volume.size()?,
        };

        let target = i128::from(base) + i128::from(offset);
        if target < 0 {
            return Err(StreamError::InvalidArgument(
                "negative seek offset".to_string(),
            ));
        }
        let target = u64::try_from(target).map_err(|_| {
            StreamError::InvalidArgument(format!("seek offset {} out of range", target))
        })?;

        self.offset = target;
        Ok(target)
    }

    pub fn seek_from(&mut self, pos: SeekFrom) -> Result<u64> {
        match pos {
            SeekFrom::Start(offset) => {
                self.offset = offset;
                Ok(offset)
            }
            SeekFrom::Current(delta) => self.seek_whence(delta, Whence::Current),
            SeekFrom::End(delta) => self.seek_whence(delta, Whence::End),
        }
    }

    pub fn tell(&self) -> u64 {
        self.offset
    }

    pub fn is_seekable(&self) -> bool {
        true
    }

    /// Flush the volume. Volumes that have no flush are logged and skipped.
    pub fn flush(&self) -> Result<()> {
        match self.volume.flush() {
            Ok(()) => Ok(()),
            Err(VolumeError::UnsupportedOperation(op)) => {
                log::warn!("{}() not supported by this volume, skipping", op);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Volume streams have no OS file descriptor; this always fails.
    pub fn fileno(&self) -> Result<i32> {
        Err(StreamError::Unsupported("fileno()".to_string()))
    }

    /// End the session. Idempotent, never fails, and leaves the volume
    /// untouched. Later calls are not rejected.
    pub fn close(&mut self) {
        if !self.closed {
            log::debug!("Closing volume stream at offset {}", self.offset);
            self.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Advance by a transferred byte count. Fails, leaving the offset alone,
    /// if the count would carry it past `u64::MAX`.
    fn inc_offset(&mut self, length: u64) -> Result<()> {
        self.offset = self.offset.checked_add(length).ok_or_else(|| {
            VolumeError::Backend(format!(
                "transfer of {} bytes at offset {} overflows the stream position",
                length, self.offset
            ))
        })?;
        Ok(())
    }
}

impl<V: VolumeHandle> Read for VolumeStream<V> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let data = VolumeStream::read(self, Some(buf.len() as u64))?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<V: VolumeHandle> Write for VolumeStream<V> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(VolumeStream::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(VolumeStream::flush(self)?)
    }
}

impl<V: VolumeHandle> Seek for VolumeStream<V> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_from(pos)?)
    }
}
