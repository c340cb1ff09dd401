//! Error types for PetalSonic I/O

use thiserror::Error;

/// Outcome classes reported across the data-source and VFS protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotSupported,
    EndOfInput,
    IoError,
    Uninitialized,
}

#[derive(Error, Debug)]
pub enum PetalSonicError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(u64),

    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    #[error("End of input after {bytes_read} bytes")]
    EndOfInput { bytes_read: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Uninitialized: {0}")]
    Uninitialized(String),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),
}

impl PetalSonicError {
    /// Classifies the error into the protocol outcome it stands for.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::InvalidHandle(_) => ErrorKind::InvalidArgument,
            Self::NotSupported(_) => ErrorKind::NotSupported,
            Self::EndOfInput { .. } => ErrorKind::EndOfInput,
            Self::Io(_) | Self::AudioLoading(_) => ErrorKind::IoError,
            Self::Uninitialized(_) => ErrorKind::Uninitialized,
        }
    }
}

pub type Result<T> = std::result::Result<T, PetalSonicError>;
