//! Client side of an IPC server connection.

use std::os::unix::net::UnixStream;
use std::thread;
use std::time::Duration;

use agent_command_config::IpcSettings;
use tracing::debug;

use crate::frame::{read_frame, write_frame};
use crate::{IPC_TARGET, IpcError, validate_server_name};

/// Connection to a named IPC server.
///
/// The command channel process uses this to deliver handshake tokens and
/// request frames; each [`IpcClient::send`] is answered by at most one
/// [`IpcClient::receive`].
#[derive(Debug)]
pub struct IpcClient {
    stream: UnixStream,
}

impl IpcClient {
    /// Connects to the server called `server_name`.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::InvalidServerName`] for malformed names and
    /// [`IpcError::Connect`] when no server is listening.
    pub fn connect(settings: &IpcSettings, server_name: &str) -> Result<Self, IpcError> {
        validate_server_name(server_name)?;
        let path = settings.socket_path(server_name);
        let stream = UnixStream::connect(&path).map_err(|source| IpcError::Connect {
            path: path.clone(),
            source,
        })?;
        debug!(target: IPC_TARGET, server = server_name, "IPC client connected");
        Ok(Self { stream })
    }

    /// Connects, retrying up to `attempts` times while the server comes up.
    ///
    /// # Errors
    ///
    /// Returns the last connection error once the attempts are exhausted.
    pub fn connect_with_retry(
        settings: &IpcSettings,
        server_name: &str,
        attempts: usize,
        delay: Duration,
    ) -> Result<Self, IpcError> {
        let mut remaining = attempts.max(1);
        loop {
            match Self::connect(settings, server_name) {
                Ok(client) => return Ok(client),
                Err(IpcError::Connect { .. }) if remaining > 1 => {
                    remaining -= 1;
                    thread::sleep(delay);
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Bounds how long [`IpcClient::receive`] may block.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Read`] when the socket rejects the timeout.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), IpcError> {
        self.stream
            .set_read_timeout(timeout)
            .map_err(|source| IpcError::Read { source })
    }

    /// Sends one payload.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::FrameTooLarge`] or [`IpcError::Write`].
    pub fn send(&mut self, payload: &[u8]) -> Result<(), IpcError> {
        write_frame(&mut self.stream, payload)
    }

    /// Waits for the next payload from the server.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Closed`] when the server hangs up and
    /// [`IpcError::Read`] on other failures, including timeouts.
    pub fn receive(&mut self) -> Result<Vec<u8>, IpcError> {
        read_frame(&mut self.stream)?.ok_or(IpcError::Closed)
    }

    /// Sends `payload` and waits for the reply.
    ///
    /// # Errors
    ///
    /// Propagates write failures, read failures and [`IpcError::Closed`].
    pub fn send_and_receive(&mut self, payload: &[u8]) -> Result<Vec<u8>, IpcError> {
        self.send(payload)?;
        self.receive()
    }
}
