//! Per-connection message loop and reply handling.

use std::collections::HashMap;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use tracing::{debug, warn};

use crate::frame::{read_frame, write_frame};
use crate::{IPC_TARGET, IpcCallbacks, IpcError, IpcMessage};

/// Clones of the streams served by one listener, kept so shutdown can
/// disconnect peers blocked in a read.
#[derive(Debug, Default)]
pub(super) struct ActiveConnections {
    next_id: AtomicU64,
    streams: Mutex<HashMap<u64, UnixStream>>,
}

impl ActiveConnections {
    pub(super) fn track(&self, stream: &UnixStream) -> Option<u64> {
        match stream.try_clone() {
            Ok(clone) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                self.streams
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id, clone);
                Some(id)
            }
            Err(error) => {
                warn!(
                    target: IPC_TARGET,
                    error = %error,
                    "failed to track IPC connection"
                );
                None
            }
        }
    }

    pub(super) fn release(&self, id: u64) {
        self.streams
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub(super) fn close_all(&self) {
        let mut streams = self.streams.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, stream) in streams.drain() {
            if let Err(error) = stream.shutdown(Shutdown::Both) {
                debug!(
                    target: IPC_TARGET,
                    error = %error,
                    "IPC connection already closed"
                );
            }
        }
    }
}

/// Message read from a Unix socket, answered on the same connection.
struct SocketMessage {
    payload: Vec<u8>,
    writer: UnixStream,
    replied: bool,
}

impl IpcMessage for SocketMessage {
    fn content(&self) -> &[u8] {
        &self.payload
    }

    fn reply(&mut self, payload: &[u8]) -> Result<(), IpcError> {
        if self.replied {
            return Err(IpcError::AlreadyReplied);
        }
        write_frame(&mut self.writer, payload)?;
        self.replied = true;
        Ok(())
    }
}

/// Reads frames from `stream` until the peer disconnects, handing each one to
/// `callbacks` in arrival order.
pub(super) fn serve_connection(mut stream: UnixStream, callbacks: &dyn IpcCallbacks) {
    loop {
        let payload = match read_frame(&mut stream) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(target: IPC_TARGET, "IPC peer disconnected");
                return;
            }
            Err(error) => {
                warn!(target: IPC_TARGET, error = %error, "IPC connection error");
                return;
            }
        };
        let writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(error) => {
                warn!(
                    target: IPC_TARGET,
                    error = %error,
                    "failed to clone IPC connection for replies"
                );
                return;
            }
        };
        callbacks.data_received(Box::new(SocketMessage {
            payload,
            writer,
            replied: false,
        }));
    }
}
