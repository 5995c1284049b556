//! Unix domain socket implementation of [`IpcService`].

mod connection;
mod listener;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use agent_command_config::IpcSettings;
use tracing::{debug, info};

use self::listener::{ListenerHandle, SocketListener, restrict_directory};
use crate::{IPC_TARGET, IpcCallbacks, IpcError, IpcService, OwnerPrincipal, validate_server_name};

/// Hosts each named server on `<socket_dir>/<name>.sock`.
pub struct UnixIpcService {
    settings: IpcSettings,
    servers: Mutex<HashMap<String, ListenerHandle>>,
}

impl UnixIpcService {
    /// Creates a service that places sockets according to `settings`.
    #[must_use]
    pub fn new(settings: IpcSettings) -> Self {
        Self {
            settings,
            servers: Mutex::new(HashMap::new()),
        }
    }

    fn servers(&self) -> Result<MutexGuard<'_, HashMap<String, ListenerHandle>>, IpcError> {
        self.servers.lock().map_err(|_| IpcError::LockPoisoned)
    }

    fn start_server(
        &self,
        name: &str,
        callbacks: Arc<dyn IpcCallbacks>,
        owner: Option<OwnerPrincipal>,
    ) -> Result<(), IpcError> {
        validate_server_name(name)?;
        let mut servers = self.servers()?;
        if servers.contains_key(name) {
            return Err(IpcError::DuplicateServer {
                name: name.to_owned(),
            });
        }

        self.settings
            .prepare_filesystem()
            .map_err(|source| IpcError::Prepare { source })?;
        if let Some(principal) = owner {
            restrict_directory(self.settings.socket_dir(), principal)?;
        }
        let path = self.settings.socket_path(name);
        let listener = SocketListener::bind(&path)?;
        if let Some(principal) = owner {
            listener.restrict_to(principal)?;
        }
        let handle = listener.start(name, callbacks)?;
        servers.insert(name.to_owned(), handle);

        info!(
            target: IPC_TARGET,
            server = name,
            owner = owner.map(OwnerPrincipal::uid),
            "IPC server created"
        );
        Ok(())
    }
}

impl IpcService for UnixIpcService {
    fn create_server(&self, name: &str, callbacks: Arc<dyn IpcCallbacks>) -> Result<(), IpcError> {
        self.start_server(name, callbacks, None)
    }

    fn create_server_for_owner(
        &self,
        name: &str,
        callbacks: Arc<dyn IpcCallbacks>,
        owner: OwnerPrincipal,
    ) -> Result<(), IpcError> {
        self.start_server(name, callbacks, Some(owner))
    }

    fn server_exists(&self, name: &str) -> Result<bool, IpcError> {
        Ok(self.servers()?.contains_key(name))
    }

    fn destroy_server(&self, name: &str) -> Result<(), IpcError> {
        let handle = self
            .servers()?
            .remove(name)
            .ok_or_else(|| IpcError::UnknownServer {
                name: name.to_owned(),
            })?;
        handle.join()?;
        debug!(target: IPC_TARGET, server = name, "IPC server destroyed");
        Ok(())
    }
}

impl Drop for UnixIpcService {
    fn drop(&mut self) {
        let servers = match self.servers.get_mut() {
            Ok(servers) => servers,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, handle) in servers.drain() {
            if handle.join().is_err() {
                debug!(target: IPC_TARGET, "IPC listener panicked during shutdown");
            }
        }
    }
}
