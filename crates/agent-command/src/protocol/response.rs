//! Responses returned by receivers.

use std::fmt;

use strum::{EnumString, IntoStaticStr};

/// Outcome reported back to the command channel client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    /// The request was handled.
    Ok,
    /// The request was malformed, unroutable or failed.
    Error,
    /// The request's tokens did not verify.
    AuthFailed,
}

impl ResponseType {
    /// Name written on the wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.wire_name())
    }
}

/// Immutable response to a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Response {
    response_type: ResponseType,
}

impl Response {
    /// Wraps a response type.
    #[must_use]
    pub const fn new(response_type: ResponseType) -> Self {
        Self { response_type }
    }

    /// Successful response.
    #[must_use]
    pub const fn ok() -> Self {
        Self::new(ResponseType::Ok)
    }

    /// Generic failure.
    #[must_use]
    pub const fn error() -> Self {
        Self::new(ResponseType::Error)
    }

    /// Authentication failure.
    #[must_use]
    pub const fn auth_failed() -> Self {
        Self::new(ResponseType::AuthFailed)
    }

    /// The response type.
    #[must_use]
    pub const fn response_type(self) -> ResponseType {
        self.response_type
    }
}
