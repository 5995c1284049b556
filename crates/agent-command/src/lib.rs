//! Agent side of the command channel.
//!
//! A monitoring agent receives commands through a separate command channel
//! server process. This crate owns that process: it launches it, hosts the
//! IPC server it connects back to, completes a STARTED/READY handshake that
//! hands the server its SSL configuration, and then answers every request
//! frame the server forwards by routing it to a registered receiver.
//!
//! The building blocks are usable on their own:
//!
//! - [`protocol`] encodes and decodes [`Request`] and [`Response`] bodies.
//! - [`stream`] wraps request bodies in begin/end framed records and reads
//!   them back from a process's output, recovering from damaged frames.
//! - [`ssl`] serialises the SSL configuration sent during the handshake.
//! - [`auth`] verifies the token pair a request may carry.
//! - [`receiver`] maps receiver names to handlers.
//! - [`delegate`] ties these together around a server process.
//!
//! Structured telemetry is installed through [`telemetry::initialise`].

pub mod auth;
pub mod delegate;
pub mod fs;
pub mod process;
pub mod protocol;
pub mod receiver;
pub mod ssl;
pub mod stream;
pub mod telemetry;

pub use auth::{AuthOutcome, AuthToken, SecureStorage, StorageError};
pub use delegate::{
    COMMAND_CHANNEL_SERVER_NAME, CommandChannelDelegate, DelegatePaths, DelegateServices,
    HandshakePhase, RequestDispatcher, SERVER_READY_TOKEN, SERVER_STARTED_TOKEN, StartupError,
};
pub use protocol::{Request, RequestTarget, RequestType, Response, ResponseType};
pub use receiver::{ReceiverLookup, ReceiverRegistry, RegistryError, RequestReceiver};
pub use ssl::SslConfiguration;
pub use telemetry::{TelemetryError, TelemetryHandle};
