//! Request authentication against a secure token store.
//!
//! A request opts into authentication by carrying both the
//! [`AUTH_TOKEN_PARAMETER`] and [`CLIENT_TOKEN_PARAMETER`] parameters, each
//! base64 encoded. Requests missing either parameter are passed through
//! without consulting the store.


use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{ACTION_PARAMETER, AUTH_TOKEN_PARAMETER, CLIENT_TOKEN_PARAMETER, Request};

const AUTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::auth");

/// Decoded token pair presented by a client.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    token: Vec<u8>,
    client_token: Vec<u8>,
}

impl AuthToken {
    /// Pairs a server-issued token with the client's token.
    #[must_use]
    pub const fn new(token: Vec<u8>, client_token: Vec<u8>) -> Self {
        Self {
            token,
            client_token,
        }
    }

    /// Server-issued token bytes.
    #[must_use]
    pub fn token(&self) -> &[u8] {
        &self.token
    }

    /// Client token bytes.
    #[must_use]
    pub fn client_token(&self) -> &[u8] {
        &self.client_token
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("client_token", &"<redacted>")
            .finish()
    }
}

/// Failures raised by a [`SecureStorage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached.
    #[error("secure storage is unavailable: {message}")]
    Unavailable {
        /// Backend-specific description.
        message: String,
    },
    /// The backend rejected or failed the lookup.
    #[error("secure storage lookup failed: {message}")]
    Lookup {
        /// Backend-specific description.
        message: String,
    },
}

/// Store of issued tokens able to verify a presented pair.
pub trait SecureStorage: Send + Sync {
    /// Reports whether `token` was issued for `action`.
    ///
    /// Requests that name no action are checked against the empty action.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] when the store cannot answer.
    fn verify_token(&self, token: &AuthToken, action: &str) -> Result<bool, StorageError>;
}

/// Result of checking a request's credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The request carried no complete token pair and was not checked.
    Skipped,
    /// The store accepted the token pair.
    Verified,
    /// The token pair was rejected or could not be checked.
    Failed,
}

impl AuthOutcome {
    /// Whether the request may reach its receiver.
    #[must_use]
    pub const fn permits_dispatch(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Checks the token parameters of `request` against `storage`.
///
/// Every failure, including a missing store, malformed base64 and storage
/// errors, yields [`AuthOutcome::Failed`].
#[must_use]
pub fn authenticate(request: &Request, storage: Option<&dyn SecureStorage>) -> AuthOutcome {
    let (Some(token), Some(client_token)) = (
        request.parameter(AUTH_TOKEN_PARAMETER),
        request.parameter(CLIENT_TOKEN_PARAMETER),
    ) else {
        debug!(target: AUTH_TARGET, "request carries no token pair, skipping verification");
        return AuthOutcome::Skipped;
    };

    let Some(storage) = storage else {
        warn!(target: AUTH_TARGET, "no secure storage available to verify tokens");
        return AuthOutcome::Failed;
    };
    let auth_token = match decode_token_pair(token, client_token) {
        Ok(auth_token) => auth_token,
        Err(error) => {
            warn!(target: AUTH_TARGET, %error, "request tokens are not valid base64");
            return AuthOutcome::Failed;
        }
    };

    let action = request.parameter(ACTION_PARAMETER).unwrap_or_default();
    match storage.verify_token(&auth_token, action) {
        Ok(true) => AuthOutcome::Verified,
        Ok(false) => {
            warn!(target: AUTH_TARGET, action, "token verification rejected request");
            AuthOutcome::Failed
        }
        Err(error) => {
            warn!(target: AUTH_TARGET, action, %error, "token verification failed");
            AuthOutcome::Failed
        }
    }
}

fn decode_token_pair(token: &str, client_token: &str) -> Result<AuthToken, base64::DecodeError> {
    Ok(AuthToken::new(
        STANDARD.decode(token)?,
        STANDARD.decode(client_token)?,
    ))
}
