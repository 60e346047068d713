//! Protocol error types.

use marshal_buffer::BufferError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing messages and package headers.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("codec error: {0}")]
    Buffer(#[from] BufferError),

    #[error("unknown message signature: {0:#010x}")]
    UnknownSignature(u32),

    #[error("invalid signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },

    #[error("invalid package name: {0:?}")]
    InvalidPackageName(String),

    #[error("package already exists: {}", .0.display())]
    PackageExists(PathBuf),

    #[error("package not found: {name}.{version}")]
    PackageNotFound { name: String, version: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProtocolError::Io(_) => true,
            ProtocolError::Buffer(e) => e.is_retryable(),
            _ => false,
        }
    }
}
