//! The STARTED/READY exchange that precedes request dispatch.
//!
//! The server process sends [`SERVER_STARTED_TOKEN`], waits for the encoded
//! SSL configuration as the reply, then sends [`SERVER_READY_TOKEN`]. Both
//! messages are handed to the thread blocked in
//! [`super::CommandChannelDelegate::start_listening`] through a single-slot
//! channel; every later message is dispatched as a request.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use agent_ipc::{IpcCallbacks, IpcMessage};
use strum::Display;
use tracing::{debug, warn};

use super::DELEGATE_TARGET;
use super::dispatcher::RequestDispatcher;
use super::errors::StartupError;

/// Token announcing that the server process is up.
pub const SERVER_STARTED_TOKEN: &[u8] = b"<SERVER STARTED>";
/// Token announcing that the server process is accepting requests.
pub const SERVER_READY_TOKEN: &[u8] = b"<SERVER READY>";

const HANDSHAKE_MESSAGES: usize = 2;

/// Handshake step being awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum HandshakePhase {
    /// Waiting for [`SERVER_STARTED_TOKEN`].
    Started,
    /// Waiting for [`SERVER_READY_TOKEN`].
    Ready,
}

impl HandshakePhase {
    /// Token expected in this phase.
    #[must_use]
    pub const fn token(self) -> &'static [u8] {
        match self {
            Self::Started => SERVER_STARTED_TOKEN,
            Self::Ready => SERVER_READY_TOKEN,
        }
    }
}

/// IPC callbacks owned by the command channel server.
pub(super) struct ChannelCallbacks {
    received: AtomicUsize,
    handshake: Mutex<Option<SyncSender<Box<dyn IpcMessage>>>>,
    dispatcher: RequestDispatcher,
}

impl ChannelCallbacks {
    /// Creates callbacks and the receiving end of the handshake rendezvous.
    pub(super) fn new(dispatcher: RequestDispatcher) -> (Self, HandshakeWaiter) {
        let (sender, receiver) = sync_channel(1);
        let callbacks = Self {
            received: AtomicUsize::new(0),
            handshake: Mutex::new(Some(sender)),
            dispatcher,
        };
        (callbacks, HandshakeWaiter { receiver })
    }

    fn forward_handshake(&self, index: usize, message: Box<dyn IpcMessage>) {
        let mut slot = self
            .handshake
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sent = slot
            .as_ref()
            .is_some_and(|sender| sender.send(message).is_ok());
        if !sent {
            warn!(target: DELEGATE_TARGET, index, "handshake message arrived after startup gave up");
        }
        if index + 1 == HANDSHAKE_MESSAGES {
            slot.take();
        }
    }
}

impl IpcCallbacks for ChannelCallbacks {
    fn data_received(&self, message: Box<dyn IpcMessage>) {
        let index = self.received.fetch_add(1, Ordering::SeqCst);
        if index < HANDSHAKE_MESSAGES {
            self.forward_handshake(index, message);
        } else {
            self.dispatcher.handle(message);
        }
    }
}

/// Blocking side of the handshake rendezvous.
pub(super) struct HandshakeWaiter {
    receiver: Receiver<Box<dyn IpcMessage>>,
}

impl HandshakeWaiter {
    /// Waits up to `timeout` for the message of `phase` and checks its token.
    pub(super) fn expect(
        &self,
        phase: HandshakePhase,
        timeout: Duration,
    ) -> Result<Box<dyn IpcMessage>, StartupError> {
        let message = self
            .receiver
            .recv_timeout(timeout)
            .map_err(|error| match error {
                RecvTimeoutError::Timeout => StartupError::HandshakeTimeout { phase, timeout },
                RecvTimeoutError::Disconnected => StartupError::ChannelClosed { phase },
            })?;
        if message.content() != phase.token() {
            return Err(StartupError::UnexpectedToken { phase });
        }
        debug!(target: DELEGATE_TARGET, %phase, "handshake token received");
        Ok(message)
    }
}
