//! Message and callback abstractions shared by every IPC transport.

use crate::IpcError;

/// A payload received by an IPC server that may be answered once.
pub trait IpcMessage: Send {
    /// Bytes sent by the peer.
    fn content(&self) -> &[u8];

    /// Sends `payload` back to the peer that sent this message.
    fn reply(&mut self, payload: &[u8]) -> Result<(), IpcError>;
}

/// Receives messages delivered to an IPC server.
///
/// Calls for one connection arrive sequentially on the thread serving that
/// connection; separate connections may call concurrently.
pub trait IpcCallbacks: Send + Sync + 'static {
    /// Handles one inbound message. Implementations should avoid panicking.
    fn data_received(&self, message: Box<dyn IpcMessage>);
}

/// Operating-system principal allowed to connect to a restricted server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerPrincipal {
    uid: u32,
}

impl OwnerPrincipal {
    /// Principal identified by a numeric user id.
    #[must_use]
    pub const fn from_uid(uid: u32) -> Self {
        Self { uid }
    }

    /// Numeric user id of the principal.
    #[must_use]
    pub const fn uid(self) -> u32 {
        self.uid
    }
}
