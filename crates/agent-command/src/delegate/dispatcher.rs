//! Steady-state request dispatch.

use std::sync::Arc;

use agent_ipc::IpcMessage;
use tracing::{debug, info, warn};

use crate::auth::{AuthOutcome, SecureStorage, authenticate};
use crate::protocol::{Request, Response, encode_response};
use crate::receiver::ReceiverLookup;
use crate::stream::decode_request_frame;

use super::DELEGATE_TARGET;

/// Routes decoded requests to receivers.
///
/// Every failure becomes an `ERROR` or `AUTH_FAILED` response; nothing is
/// propagated to the transport.
#[derive(Clone)]
pub struct RequestDispatcher {
    receivers: Arc<dyn ReceiverLookup>,
    storage: Option<Arc<dyn SecureStorage>>,
}

impl RequestDispatcher {
    /// Creates a dispatcher over `receivers`, verifying tokens with `storage`.
    #[must_use]
    pub const fn new(
        receivers: Arc<dyn ReceiverLookup>,
        storage: Option<Arc<dyn SecureStorage>>,
    ) -> Self {
        Self { receivers, storage }
    }

    /// Decodes one request frame and dispatches it.
    #[must_use]
    pub fn dispatch(&self, payload: &[u8]) -> Response {
        match decode_request_frame(payload) {
            Ok(request) => self.dispatch_request(&request),
            Err(error) => {
                warn!(target: DELEGATE_TARGET, %error, "discarding undecodable request");
                Response::error()
            }
        }
    }

    /// Dispatches an already decoded request.
    #[must_use]
    pub fn dispatch_request(&self, request: &Request) -> Response {
        let Some(receiver_name) = request.receiver().filter(|name| !name.trim().is_empty()) else {
            info!(target: DELEGATE_TARGET, "request names no receiver");
            return Response::error();
        };
        let Some(request_type) = request.request_type() else {
            info!(target: DELEGATE_TARGET, receiver = receiver_name, "request has no type");
            return Response::error();
        };
        info!(
            target: DELEGATE_TARGET,
            receiver = receiver_name,
            request_type = %request_type,
            "request received"
        );

        let Some(receiver) = self.receivers.receiver(receiver_name) else {
            info!(target: DELEGATE_TARGET, receiver = receiver_name, "receiver not found");
            return Response::error();
        };

        let outcome = authenticate(request, self.storage.as_deref());
        if !outcome.permits_dispatch() {
            info!(target: DELEGATE_TARGET, receiver = receiver_name, "authentication for request failed");
            return Response::auth_failed();
        }
        if outcome == AuthOutcome::Verified {
            debug!(target: DELEGATE_TARGET, receiver = receiver_name, "request authenticated");
        }

        receiver.receive(request)
    }

    /// Dispatches `message` and replies with the encoded response.
    pub(super) fn handle(&self, mut message: Box<dyn IpcMessage>) {
        let response = self.dispatch(message.content());
        if let Err(error) = message.reply(&encode_response(response)) {
            warn!(
                target: DELEGATE_TARGET,
                %error,
                response = %response.response_type(),
                "failed to send response"
            );
        }
    }
}

impl std::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("secure_storage", &self.storage.is_some())
            .finish_non_exhaustive()
    }
}
