//! Lifecycle of the command channel server process.
//!
//! [`CommandChannelDelegate::start_listening`] launches the server process,
//! registers an IPC server for it to connect back to, and blocks until the
//! STARTED/READY handshake completes or times out. Afterwards each IPC
//! message is one request frame, answered with an encoded response by
//! [`RequestDispatcher`].

mod dispatcher;
mod errors;
mod handshake;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

#[cfg(unix)]
use agent_command_config::{Config, IpcSettingsError};
use agent_ipc::{IpcCallbacks, IpcService};
use camino::Utf8PathBuf;
use tracing::{info, warn};

pub use self::dispatcher::RequestDispatcher;
pub use self::errors::StartupError;
pub use self::handshake::{HandshakePhase, SERVER_READY_TOKEN, SERVER_STARTED_TOKEN};

use self::handshake::ChannelCallbacks;
use crate::auth::SecureStorage;
use crate::fs::{FileSystemUtils, SystemFileSystem};
use crate::process::{ChildProcess, PlatformCommand, ProcessCreator, SystemProcessCreator};
use crate::receiver::ReceiverLookup;
use crate::ssl::{SslConfiguration, encode_ssl_configuration};

const DELEGATE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::delegate");

/// Name of the IPC server the command channel process connects to.
pub const COMMAND_CHANNEL_SERVER_NAME: &str = "command-channel";

/// Filesystem locations handed to the server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatePaths {
    /// Directory containing the launch script.
    pub bin_dir: Utf8PathBuf,
    /// IPC settings file passed as the last launch argument.
    pub ipc_settings_path: Utf8PathBuf,
}

/// Collaborators the delegate drives.
#[derive(Clone)]
pub struct DelegateServices {
    /// Token store; `None` fails every request that carries tokens.
    pub storage: Option<Arc<dyn SecureStorage>>,
    /// Transport hosting the command channel server.
    pub ipc: Arc<dyn IpcService>,
    /// Launcher for the server process.
    pub processes: Arc<dyn ProcessCreator>,
    /// Ownership and privilege queries.
    pub fs: Arc<dyn FileSystemUtils>,
}

impl DelegateServices {
    /// Uses the host's process launcher and filesystem with `ipc`.
    #[must_use]
    pub fn system(ipc: Arc<dyn IpcService>, storage: Option<Arc<dyn SecureStorage>>) -> Self {
        Self {
            storage,
            ipc,
            processes: Arc::new(SystemProcessCreator),
            fs: Arc::new(SystemFileSystem),
        }
    }
}

/// Owns the command channel server process and its IPC server.
pub struct CommandChannelDelegate {
    dispatcher: RequestDispatcher,
    ssl: SslConfiguration,
    paths: DelegatePaths,
    ipc: Arc<dyn IpcService>,
    processes: Arc<dyn ProcessCreator>,
    fs: Arc<dyn FileSystemUtils>,
    platform: PlatformCommand,
    startup_timeout: Duration,
    child: Option<Box<dyn ChildProcess>>,
}

impl CommandChannelDelegate {
    /// Creates a delegate that has not started a server yet.
    #[must_use]
    pub fn new(
        receivers: Arc<dyn ReceiverLookup>,
        ssl: SslConfiguration,
        paths: DelegatePaths,
        services: DelegateServices,
        startup_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher: RequestDispatcher::new(receivers, services.storage),
            ssl,
            paths,
            ipc: services.ipc,
            processes: services.processes,
            fs: services.fs,
            platform: PlatformCommand::current(),
            startup_timeout,
            child: None,
        }
    }

    /// Builds a delegate backed by Unix sockets placed per `config`.
    ///
    /// Creates the socket directory and writes the IPC settings file the
    /// server process reads on startup.
    ///
    /// # Errors
    ///
    /// Returns [`IpcSettingsError`] when the directory or settings file
    /// cannot be written.
    #[cfg(unix)]
    pub fn from_config(
        config: &Config,
        receivers: Arc<dyn ReceiverLookup>,
        ssl: SslConfiguration,
        storage: Option<Arc<dyn SecureStorage>>,
    ) -> Result<Self, IpcSettingsError> {
        let settings = config.ipc_settings();
        settings.prepare_filesystem()?;
        let ipc_settings_path = config.ipc_settings_path();
        settings.write_to(&ipc_settings_path)?;

        let ipc = Arc::new(agent_ipc::UnixIpcService::new(settings));
        Ok(Self::new(
            receivers,
            ssl,
            DelegatePaths {
                bin_dir: config.bin_dir().to_owned(),
                ipc_settings_path,
            },
            DelegateServices::system(ipc, storage),
            config.startup_timeout(),
        ))
    }

    /// Dispatcher used for steady-state requests.
    #[must_use]
    pub const fn dispatcher(&self) -> &RequestDispatcher {
        &self.dispatcher
    }

    /// Whether a server process is currently owned by this delegate.
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.child.is_some()
    }

    /// Launches the server process for `host:port` and completes the
    /// handshake.
    ///
    /// On failure the process and IPC server may still be running; call
    /// [`Self::stop_listening`] to release them.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] describing the step that failed.
    pub fn start_listening(&mut self, host: &str, port: u16) -> Result<(), StartupError> {
        if self.child.is_some() {
            return Err(StartupError::AlreadyListening);
        }

        let command = self
            .platform
            .command_line(&self.paths.bin_dir, host, port, &self.paths.ipc_settings_path)
            .map_err(StartupError::Launch)?;
        info!(target: DELEGATE_TARGET, host, port, "starting command channel server process");
        let child = self.processes.spawn(&command).map_err(StartupError::Launch)?;
        self.child = Some(child);

        let (callbacks, waiter) = ChannelCallbacks::new(self.dispatcher.clone());
        self.register_server(Arc::new(callbacks))?;

        let mut started = waiter.expect(HandshakePhase::Started, self.startup_timeout)?;
        let ssl = encode_ssl_configuration(&self.ssl).map_err(StartupError::SslEncode)?;
        started
            .reply(&ssl)
            .map_err(|source| StartupError::Reply {
                phase: HandshakePhase::Started,
                source,
            })?;
        waiter.expect(HandshakePhase::Ready, self.startup_timeout)?;

        info!(target: DELEGATE_TARGET, host, port, "command channel server ready");
        Ok(())
    }

    fn register_server(&self, callbacks: Arc<dyn IpcCallbacks>) -> Result<(), StartupError> {
        if !self.fs.is_privileged_user() {
            return self
                .ipc
                .create_server(COMMAND_CHANNEL_SERVER_NAME, callbacks)
                .map_err(StartupError::IpcServer);
        }

        let script = self.platform.launch_script(&self.paths.bin_dir);
        let owner = self
            .fs
            .owner_of(&script)
            .map_err(|source| StartupError::OwnerLookup {
                path: script.clone(),
                source: Arc::new(source),
            })?;
        info!(
            target: DELEGATE_TARGET,
            uid = owner.uid(),
            "restricting command channel server to the launch script owner"
        );
        self.ipc
            .create_server_for_owner(COMMAND_CHANNEL_SERVER_NAME, callbacks, owner)
            .map_err(StartupError::IpcServer)
    }

    /// Stops the server process and removes the IPC server if it exists.
    ///
    /// Safe to call repeatedly and after a failed start. Failures are logged.
    pub fn stop_listening(&mut self) {
        if let Some(mut child) = self.child.take() {
            info!(target: DELEGATE_TARGET, pid = child.id(), "stopping command channel server process");
            if let Err(error) = child.destroy() {
                warn!(target: DELEGATE_TARGET, %error, "failed to stop command channel server process");
            }
        }

        match self.ipc.server_exists(COMMAND_CHANNEL_SERVER_NAME) {
            Ok(true) => {
                if let Err(error) = self.ipc.destroy_server(COMMAND_CHANNEL_SERVER_NAME) {
                    warn!(target: DELEGATE_TARGET, %error, "failed to destroy command channel IPC server");
                }
            }
            Ok(false) => {}
            Err(error) => {
                warn!(target: DELEGATE_TARGET, %error, "failed to query command channel IPC server");
            }
        }
    }
}

impl Drop for CommandChannelDelegate {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.stop_listening();
        }
    }
}

impl std::fmt::Debug for CommandChannelDelegate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandChannelDelegate")
            .field("paths", &self.paths)
            .field("platform", &self.platform)
            .field("startup_timeout", &self.startup_timeout)
            .field("listening", &self.child.is_some())
            .finish_non_exhaustive()
    }
}
