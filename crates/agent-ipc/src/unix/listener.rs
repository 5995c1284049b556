//! Socket binding and the background accept loop.

use std::fs;
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use nix::unistd::{Uid, chown};
use tracing::{info, warn};

use super::connection::{ActiveConnections, serve_connection};
use crate::{IPC_TARGET, IpcCallbacks, IpcError, OwnerPrincipal};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const OWNER_ONLY_MODE: u32 = 0o600;
const OWNER_ONLY_DIR_MODE: u32 = 0o700;

/// A bound, not yet accepting, server socket.
#[derive(Debug)]
pub(super) struct SocketListener {
    path: Utf8PathBuf,
    listener: UnixListener,
}

impl SocketListener {
    pub(super) fn bind(path: &Utf8Path) -> Result<Self, IpcError> {
        remove_stale_socket(path)?;
        let listener = UnixListener::bind(path).map_err(|source| IpcError::Bind {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            listener,
        })
    }

    /// Hands the socket file to `owner` and removes access for everyone else.
    pub(super) fn restrict_to(&self, owner: OwnerPrincipal) -> Result<(), IpcError> {
        let restricted = chown(
            self.path.as_std_path(),
            Some(Uid::from_raw(owner.uid())),
            None,
        )
        .map_err(|errno| IpcError::Ownership {
            path: self.path.clone(),
            uid: owner.uid(),
            source: io::Error::from(errno),
        })
        .and_then(|()| {
            fs::set_permissions(
                self.path.as_std_path(),
                fs::Permissions::from_mode(OWNER_ONLY_MODE),
            )
            .map_err(|source| IpcError::Permissions {
                path: self.path.clone(),
                source,
            })
        });
        if restricted.is_err() {
            cleanup_socket(&self.path);
        }
        restricted
    }

    pub(super) fn start(
        self,
        server_name: &str,
        callbacks: Arc<dyn IpcCallbacks>,
    ) -> Result<ListenerHandle, IpcError> {
        if let Err(source) = self.listener.set_nonblocking(true) {
            cleanup_socket(&self.path);
            return Err(IpcError::NonBlocking { source });
        }
        let shutdown = Arc::new(AtomicBool::new(false));
        let connections = Arc::new(ActiveConnections::default());
        let shutdown_flag = Arc::clone(&shutdown);
        let tracked = Arc::clone(&connections);
        let name = server_name.to_owned();
        let handle =
            thread::spawn(move || run_accept_loop(&self, &name, &shutdown_flag, &tracked, &callbacks));
        Ok(ListenerHandle {
            shutdown,
            connections,
            handle: Some(handle),
        })
    }
}

/// Handle to a running server's accept loop.
pub(super) struct ListenerHandle {
    shutdown: Arc<AtomicBool>,
    connections: Arc<ActiveConnections>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stops accepting and disconnects every open connection.
    pub(super) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.connections.close_all();
    }

    pub(super) fn join(mut self) -> Result<(), IpcError> {
        self.shutdown();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| IpcError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Hands the socket directory to `owner` so it can reach the sockets inside.
pub(super) fn restrict_directory(dir: &Utf8Path, owner: OwnerPrincipal) -> Result<(), IpcError> {
    chown(dir.as_std_path(), Some(Uid::from_raw(owner.uid())), None).map_err(|errno| {
        IpcError::Ownership {
            path: dir.to_path_buf(),
            uid: owner.uid(),
            source: io::Error::from(errno),
        }
    })?;
    fs::set_permissions(
        dir.as_std_path(),
        fs::Permissions::from_mode(OWNER_ONLY_DIR_MODE),
    )
    .map_err(|source| IpcError::Permissions {
        path: dir.to_path_buf(),
        source,
    })
}

fn run_accept_loop(
    listener: &SocketListener,
    server_name: &str,
    shutdown: &AtomicBool,
    connections: &Arc<ActiveConnections>,
    callbacks: &Arc<dyn IpcCallbacks>,
) {
    info!(
        target: IPC_TARGET,
        server = server_name,
        path = %listener.path,
        "IPC server listening"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                let id = connections.track(&stream);
                let handler = Arc::clone(callbacks);
                let registry = Arc::clone(connections);
                thread::spawn(move || {
                    serve_connection(stream, handler.as_ref());
                    if let Some(connection_id) = id {
                        registry.release(connection_id);
                    }
                });
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: IPC_TARGET,
                        server = server_name,
                        error = %error,
                        "IPC accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    cleanup_socket(&listener.path);
    info!(target: IPC_TARGET, server = server_name, "IPC server stopped");
}

fn accept_connection(listener: &UnixListener) -> io::Result<Option<UnixStream>> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn remove_stale_socket(path: &Utf8Path) -> Result<(), IpcError> {
    if !path.exists() {
        return Ok(());
    }
    let metadata = fs::symlink_metadata(path).map_err(|source| IpcError::Metadata {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.file_type().is_socket() {
        return Err(IpcError::NotSocket {
            path: path.to_path_buf(),
        });
    }
    match UnixStream::connect(path) {
        Ok(_live) => Err(IpcError::InUse {
            path: path.to_path_buf(),
        }),
        Err(error)
            if error.kind() == io::ErrorKind::ConnectionRefused
                || error.kind() == io::ErrorKind::NotFound =>
        {
            fs::remove_file(path).map_err(|source| IpcError::Cleanup {
                path: path.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(IpcError::Connect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn cleanup_socket(path: &Utf8Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: IPC_TARGET,
            error = %error,
            path = %path,
            "failed to remove IPC socket file"
        );
    }
}
