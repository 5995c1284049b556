//! Errors reported while reading framed requests from a byte stream.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::protocol::DecodeError;

/// A frame could not be read. Only [`StreamError::Io`] stops a reader.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The stream ended part-way through a frame.
    #[error("end of stream while reading {field}")]
    EndOfStream {
        /// Field being read when the stream ended.
        field: &'static str,
    },
    /// The frame violated the framing protocol.
    #[error("command channel protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },
    /// The embedded request body could not be decoded.
    #[error("invalid request body: {0}")]
    Decode(#[source] DecodeError),
    /// The underlying stream failed.
    #[error("failed to read {field}: {source}")]
    Io {
        /// Field being read.
        field: &'static str,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
}

impl StreamError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn io(field: &'static str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            Self::EndOfStream { field }
        } else {
            Self::Io {
                field,
                source: Arc::new(source),
            }
        }
    }

    /// Whether the reader must stop after reporting this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
