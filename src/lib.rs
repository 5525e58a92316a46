// volstream - File-like streams over random-access block volumes

pub mod config;
pub mod stream;
pub mod volume;

pub use config::FileVolumeConfig;
pub use stream::{StreamError, VolumeStream, Whence, SEEK_CUR, SEEK_END, SEEK_SET};
pub use volume::{FileVolume, MemoryVolume, VolumeError, VolumeHandle};
