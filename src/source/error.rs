//! Source error types

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a positioned read.
///
/// Both variants carry the number of bytes already written to the front of
/// the caller's buffer; those bytes are valid.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("short read: end of stream after {read} bytes")]
    ShortRead { read: usize },

    #[error("read failed after {read} bytes: {source}")]
    Io {
        read: usize,
        #[source]
        source: std::io::Error,
    },
}

impl ReadError {
    /// Bytes written into the buffer before the read stopped
    pub fn bytes_read(&self) -> usize {
        match self {
            ReadError::ShortRead { read } | ReadError::Io { read, .. } => *read,
        }
    }

    /// End of stream rather than a fault
    pub fn is_short_read(&self) -> bool {
        matches!(self, ReadError::ShortRead { .. })
    }

    /// Shift the byte count by `offset`, for errors raised by a nested source
    pub(crate) fn after(self, offset: usize) -> Self {
        match self {
            ReadError::ShortRead { read } => ReadError::ShortRead { read: read + offset },
            ReadError::Io { read, source } => ReadError::Io {
                read: read + offset,
                source,
            },
        }
    }
}

/// Source construction error type
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot open part '{}': {source}", path.display())]
    PartOpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Read(#[from] ReadError),
}

impl From<ReadError> for std::io::Error {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::ShortRead { read } => std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("source ended after {} bytes", read),
            ),
            ReadError::Io { source, .. } => source,
        }
    }
}
