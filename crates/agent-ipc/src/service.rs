//! The IPC service seam.

use std::sync::Arc;

use crate::{IpcCallbacks, IpcError, OwnerPrincipal};

/// Hosts named IPC servers.
///
/// Implementations own the servers they create until
/// [`IpcService::destroy_server`] is called for them.
pub trait IpcService: Send + Sync {
    /// Starts a server reachable by any local user allowed into the socket
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError`] when the name is invalid or already hosted, or
    /// the server cannot be bound.
    fn create_server(&self, name: &str, callbacks: Arc<dyn IpcCallbacks>) -> Result<(), IpcError>;

    /// Starts a server that only `owner` may connect to.
    ///
    /// The socket directory and socket are handed to `owner` and closed to
    /// everyone else.
    ///
    /// # Errors
    ///
    /// Fails as [`IpcService::create_server`] does, and with
    /// [`IpcError::Ownership`] or [`IpcError::Permissions`] when access
    /// cannot be restricted.
    fn create_server_for_owner(
        &self,
        name: &str,
        callbacks: Arc<dyn IpcCallbacks>,
        owner: OwnerPrincipal,
    ) -> Result<(), IpcError>;

    /// Reports whether this service currently hosts a server called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::LockPoisoned`] when the server table is unusable.
    fn server_exists(&self, name: &str) -> Result<bool, IpcError>;

    /// Stops the named server and releases its resources.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::UnknownServer`] when no such server is hosted.
    fn destroy_server(&self, name: &str) -> Result<(), IpcError>;
}

/// Checks that `name` is usable as a server name.
///
/// Names must be non-empty and consist of ASCII letters, digits, `-` or `_`.
///
/// # Errors
///
/// Returns [`IpcError::InvalidServerName`] for any other name.
pub fn validate_server_name(name: &str) -> Result<(), IpcError> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
    if valid {
        Ok(())
    } else {
        Err(IpcError::InvalidServerName {
            name: name.to_owned(),
        })
    }
}
