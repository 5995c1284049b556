//! Codec errors.

use std::str::Utf8Error;

use thiserror::Error;

/// A request or response body could not be decoded.
///
/// No partially decoded value accompanies this error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes remained than the field requires.
    #[error("truncated {field}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Bytes the field requires.
        needed: usize,
        /// Bytes left in the input.
        available: usize,
    },
    /// A length prefix was negative.
    #[error("negative {field}: {length}")]
    NegativeLength {
        /// Field whose length was read.
        field: &'static str,
        /// Value read from the wire.
        length: i32,
    },
    /// The parameter count was negative or larger than the input can hold.
    #[error("implausible parameter count {count} with {remaining} bytes remaining")]
    ParameterCount {
        /// Count read from the wire.
        count: i32,
        /// Bytes left after the count.
        remaining: usize,
    },
    /// The request type name is not a known type.
    #[error("unknown request type '{name}'")]
    UnknownRequestType {
        /// Name read from the wire.
        name: String,
    },
    /// The response type name is not a known type.
    #[error("unknown response type '{name}'")]
    UnknownResponseType {
        /// Name read from the wire.
        name: String,
    },
    /// A string field was not valid UTF-8.
    #[error("{field} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        /// Field being read.
        field: &'static str,
        /// Position of the invalid sequence.
        #[source]
        source: Utf8Error,
    },
}

/// A request or frame could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Requests built without a type cannot be sent.
    #[error("request has no type")]
    MissingRequestType,
    /// A field does not fit its length prefix.
    #[error("{field} is {length} bytes, limit is {max}")]
    TooLong {
        /// Field being written.
        field: &'static str,
        /// Actual length.
        length: usize,
        /// Largest length the prefix can express.
        max: usize,
    },
}
