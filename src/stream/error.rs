use std::io;

use thiserror::Error;

use crate::volume::VolumeError;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),

    #[error("{0} not supported by volume streams")]
    Unsupported(String),

    #[error(transparent)]
    Volume(#[from] VolumeError),
}

impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::InvalidArgument(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
            }
            StreamError::Unsupported(_) => io::Error::new(io::ErrorKind::Unsupported, err.to_string()),
            StreamError::Volume(e) => e.into(),
        }
    }
}
