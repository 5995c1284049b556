//! Error types for IPC server and client operations.

use std::io;

use agent_command_config::IpcSettingsError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors surfaced while hosting or talking to an IPC server.
#[derive(Debug, Error)]
pub enum IpcError {
    /// Server names become file names, so only a restricted alphabet is allowed.
    #[error("invalid IPC server name '{name}'")]
    InvalidServerName {
        /// Rejected name.
        name: String,
    },
    /// A server with the same name is already hosted by this service.
    #[error("IPC server '{name}' already exists")]
    DuplicateServer {
        /// Name of the existing server.
        name: String,
    },
    /// No server with the given name is hosted by this service.
    #[error("IPC server '{name}' does not exist")]
    UnknownServer {
        /// Name that was looked up.
        name: String,
    },
    /// The socket directory could not be prepared.
    #[error("failed to prepare IPC socket directory: {source}")]
    Prepare {
        /// Underlying preparation failure.
        #[source]
        source: IpcSettingsError,
    },
    /// Binding the server socket failed.
    #[error("failed to bind IPC socket at {path}: {source}")]
    Bind {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Another live process is serving the socket path.
    #[error("IPC socket {path} is already in use")]
    InUse {
        /// Socket path.
        path: Utf8PathBuf,
    },
    /// A non-socket file occupies the socket path.
    #[error("IPC socket path {path} is not a socket")]
    NotSocket {
        /// Offending path.
        path: Utf8PathBuf,
    },
    /// Metadata for an existing socket path could not be read.
    #[error("failed to read metadata for IPC socket {path}: {source}")]
    Metadata {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A stale socket file could not be removed.
    #[error("failed to remove stale IPC socket {path}: {source}")]
    Cleanup {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Connecting to a server socket failed.
    #[error("failed to connect to IPC socket {path}: {source}")]
    Connect {
        /// Socket path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to non-blocking mode.
    #[error("failed to enable non-blocking IPC listener: {source}")]
    NonBlocking {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Socket permissions could not be restricted.
    #[error("failed to restrict permissions on IPC path {path}: {source}")]
    Permissions {
        /// Socket or socket directory path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Socket ownership could not be transferred to the owning principal.
    #[error("failed to hand IPC path {path} to uid {uid}: {source}")]
    Ownership {
        /// Socket or socket directory path.
        path: Utf8PathBuf,
        /// Intended owner.
        uid: u32,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// A frame exceeded the maximum payload size.
    #[error("IPC frame of {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Declared or attempted payload length.
        length: usize,
        /// Maximum accepted payload length.
        max: usize,
    },
    /// Reading from the peer failed.
    #[error("failed to read IPC frame: {source}")]
    Read {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Writing to the peer failed.
    #[error("failed to write IPC frame: {source}")]
    Write {
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The peer closed the connection before a complete frame arrived.
    #[error("IPC connection closed by peer")]
    Closed,
    /// The message was already answered.
    #[error("IPC message already replied to")]
    AlreadyReplied,
    /// The server registry lock was poisoned by a panicking thread.
    #[error("IPC server registry lock poisoned")]
    LockPoisoned,
    /// The listener thread panicked.
    #[error("IPC listener thread panicked")]
    ThreadPanic,
}
