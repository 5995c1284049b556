//! Named, reply-capable IPC servers for the agent command channel.
//!
//! An [`IpcService`] hosts servers identified by name. Each message a peer
//! sends arrives at the server's [`IpcCallbacks`] as an [`IpcMessage`] that
//! can be answered in place. On Unix the service is backed by one domain
//! socket per server inside the configured socket directory, and payloads are
//! framed with a four byte big-endian length prefix.

mod errors;
pub mod frame;
mod message;
mod service;
#[cfg(unix)]
mod client;
#[cfg(unix)]
mod unix;

pub use errors::IpcError;
pub use message::{IpcCallbacks, IpcMessage, OwnerPrincipal};
pub use service::{IpcService, validate_server_name};

#[cfg(unix)]
pub use client::IpcClient;
#[cfg(unix)]
pub use unix::UnixIpcService;

#[cfg(unix)]
const IPC_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
