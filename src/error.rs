// SPDX-License-Identifier: MIT
//! Error types for container reading and writing

/// Errors that can occur while encoding, writing or reading a container
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Bad magic bytes: expected fafa, got {}", hex::encode(.0))]
    BadMagic([u8; 2]),

    #[error("Short read on {what}: expected {expected} bytes, got {actual}")]
    ShortRead {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Truncated header: {field} needs {needed} bytes, {remaining} remaining")]
    TruncatedHeader {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("Failed to initialize decompressor: {0}")]
    DecompressionInit(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContainerError {
    /// Re-label a short read inside an in-memory header buffer as a truncated field
    pub(crate) fn into_truncated(self, field: &'static str) -> Self {
        match self {
            ContainerError::ShortRead {
                expected, actual, ..
            } => ContainerError::TruncatedHeader {
                field,
                needed: expected,
                remaining: actual,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
