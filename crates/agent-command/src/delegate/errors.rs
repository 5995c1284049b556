//! Failures raised while starting the command channel.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use agent_ipc::IpcError;
use camino::Utf8PathBuf;
use thiserror::Error;

use crate::process::ProcessError;
use crate::ssl::SslConfigError;

use super::HandshakePhase;

/// Errors returned by [`super::CommandChannelDelegate::start_listening`].
///
/// Every variant leaves cleanup to
/// [`super::CommandChannelDelegate::stop_listening`].
#[derive(Debug, Error)]
pub enum StartupError {
    /// The delegate is already running a server process.
    #[error("the command channel is already listening")]
    AlreadyListening,

    /// The server process could not be launched.
    #[error("failed to launch the command channel server: {0}")]
    Launch(#[source] ProcessError),

    /// The owner of the launch script could not be determined.
    #[error("failed to determine the owner of {path}: {source}")]
    OwnerLookup {
        /// Launch script whose owner was requested.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },

    /// The IPC server could not be created.
    #[error("failed to create the IPC server: {0}")]
    IpcServer(#[source] IpcError),

    /// A handshake message did not arrive in time.
    #[error("timed out after {timeout:?} waiting for the {phase} token")]
    HandshakeTimeout {
        /// Token being awaited.
        phase: HandshakePhase,
        /// Configured wait.
        timeout: Duration,
    },

    /// A handshake message carried the wrong token.
    #[error("expected the {phase} token from the command channel server")]
    UnexpectedToken {
        /// Token that was expected.
        phase: HandshakePhase,
    },

    /// The SSL configuration could not be encoded for the server.
    #[error("failed to encode the SSL configuration: {0}")]
    SslEncode(#[source] SslConfigError),

    /// The SSL configuration could not be sent to the server.
    #[error("failed to reply to the {phase} token: {source}")]
    Reply {
        /// Token being answered.
        phase: HandshakePhase,
        /// Transport failure.
        #[source]
        source: IpcError,
    },

    /// The IPC server stopped delivering messages mid-handshake.
    #[error("the IPC server closed before the {phase} token arrived")]
    ChannelClosed {
        /// Token being awaited.
        phase: HandshakePhase,
    },
}
