//! Requests addressed to agent receivers.

use std::collections::BTreeMap;
use std::fmt;

use strum::{EnumString, IntoStaticStr};

/// Parameter naming the receiver a request is routed to.
pub const RECEIVER_PARAMETER: &str = "receiver";
/// Parameter carrying the base64 authentication token.
pub const AUTH_TOKEN_PARAMETER: &str = "auth-token";
/// Parameter carrying the base64 client token.
pub const CLIENT_TOKEN_PARAMETER: &str = "client-token";
/// Parameter naming the action checked during token verification.
pub const ACTION_PARAMETER: &str = "action-name";

/// Kind of request. Wire names are matched case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    /// The sender does not wait for a response.
    NoResponseExpected,
    /// The sender waits for a response.
    ResponseExpected,
    /// Liveness probe.
    Ping,
}

impl RequestType {
    /// Name written on the wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.wire_name())
    }
}

/// Agent address a request was sent to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTarget {
    host: String,
    port: u16,
}

impl RequestTarget {
    /// Builds a target from a host name or address and a port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

/// A command for one of the agent's receivers.
///
/// Receiver name, tokens and action travel as ordinary parameters under the
/// reserved names exported by this module. A request built in code may lack a
/// type; the wire decoder never produces one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    request_type: Option<RequestType>,
    target: RequestTarget,
    parameters: BTreeMap<String, String>,
}

impl Request {
    /// Creates a request with no parameters.
    #[must_use]
    pub const fn new(request_type: RequestType, target: RequestTarget) -> Self {
        Self::from_parts(Some(request_type), target, BTreeMap::new())
    }

    /// Creates a request without a type.
    #[must_use]
    pub const fn untyped(target: RequestTarget) -> Self {
        Self::from_parts(None, target, BTreeMap::new())
    }

    pub(crate) const fn from_parts(
        request_type: Option<RequestType>,
        target: RequestTarget,
        parameters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            request_type,
            target,
            parameters,
        }
    }

    /// Request type, when known.
    #[must_use]
    pub const fn request_type(&self) -> Option<RequestType> {
        self.request_type
    }

    /// Agent address the request was sent to.
    #[must_use]
    pub const fn target(&self) -> &RequestTarget {
        &self.target
    }

    /// Value of the named parameter.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// All parameters, ordered by name.
    #[must_use]
    pub const fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Sets a parameter, replacing any previous value.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    /// Builder form of [`Request::set_parameter`].
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Name of the receiver this request is routed to.
    #[must_use]
    pub fn receiver(&self) -> Option<&str> {
        self.parameter(RECEIVER_PARAMETER)
    }

    /// Builder form that sets the receiver name.
    #[must_use]
    pub fn with_receiver(self, receiver: impl Into<String>) -> Self {
        self.with_parameter(RECEIVER_PARAMETER, receiver)
    }
}
