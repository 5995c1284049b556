//! TLS settings handed to the command channel process during the handshake.
//!
//! The settings travel as a single JSON document:
//!
//! ```json
//! {"sslConfiguration": {
//!     "keystoreFile": "/path/or/null",
//!     "keystorePass": "secret-or-null",
//!     "commandChannelUsesSSL": true,
//!     "backingStorageUsesSSL": false,
//!     "disableHostnameVerification": false}}
//! ```
//!
//! Absent values are written as explicit `null`s, and the decoder insists on
//! every key being present.

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// TLS settings for the agent's outward connections.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SslConfiguration {
    keystore_file: Option<PathBuf>,
    keystore_password: Option<String>,
    enable_for_backing_storage: bool,
    enable_for_command_channel: bool,
    disable_hostname_verification: bool,
}

impl SslConfiguration {
    /// Settings with TLS disabled and no keystore.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the keystore file.
    #[must_use]
    pub fn with_keystore_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.keystore_file = Some(path.into());
        self
    }

    /// Sets the keystore password.
    #[must_use]
    pub fn with_keystore_password(mut self, password: impl Into<String>) -> Self {
        self.keystore_password = Some(password.into());
        self
    }

    /// Enables TLS towards backing storage.
    #[must_use]
    pub const fn with_backing_storage_ssl(mut self, enabled: bool) -> Self {
        self.enable_for_backing_storage = enabled;
        self
    }

    /// Enables TLS on the command channel.
    #[must_use]
    pub const fn with_command_channel_ssl(mut self, enabled: bool) -> Self {
        self.enable_for_command_channel = enabled;
        self
    }

    /// Disables hostname verification.
    #[must_use]
    pub const fn with_hostname_verification_disabled(mut self, disabled: bool) -> Self {
        self.disable_hostname_verification = disabled;
        self
    }

    /// Keystore file, if configured.
    #[must_use]
    pub fn keystore_file(&self) -> Option<&Path> {
        self.keystore_file.as_deref()
    }

    /// Keystore password, if configured.
    #[must_use]
    pub fn keystore_password(&self) -> Option<&str> {
        self.keystore_password.as_deref()
    }

    /// Whether TLS is used towards backing storage.
    #[must_use]
    pub const fn enable_for_backing_storage(&self) -> bool {
        self.enable_for_backing_storage
    }

    /// Whether TLS is used on the command channel.
    #[must_use]
    pub const fn enable_for_command_channel(&self) -> bool {
        self.enable_for_command_channel
    }

    /// Whether hostname verification is disabled.
    #[must_use]
    pub const fn disable_hostname_verification(&self) -> bool {
        self.disable_hostname_verification
    }
}

impl fmt::Debug for SslConfiguration {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SslConfiguration")
            .field("keystore_file", &self.keystore_file)
            .field(
                "keystore_password",
                &self.keystore_password.as_ref().map(|_| "<redacted>"),
            )
            .field("enable_for_backing_storage", &self.enable_for_backing_storage)
            .field("enable_for_command_channel", &self.enable_for_command_channel)
            .field(
                "disable_hostname_verification",
                &self.disable_hostname_verification,
            )
            .finish()
    }
}

/// Errors raised while encoding or decoding the TLS settings document.
#[derive(Debug, Error)]
pub enum SslConfigError {
    /// JSON strings cannot carry a non-UTF-8 keystore path.
    #[error("keystore path {path:?} is not valid UTF-8")]
    NonUtf8KeystorePath {
        /// Offending path.
        path: PathBuf,
    },
    /// The document could not be serialised.
    #[error("failed to encode SSL configuration: {0}")]
    Encode(#[source] serde_json::Error),
    /// The document was malformed or incomplete.
    #[error("failed to decode SSL configuration: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Document {
    #[serde(rename = "sslConfiguration")]
    ssl_configuration: Fields,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fields {
    #[serde(deserialize_with = "Option::deserialize")]
    keystore_file: Option<String>,
    #[serde(rename = "keystorePass", deserialize_with = "Option::deserialize")]
    keystore_password: Option<String>,
    #[serde(rename = "commandChannelUsesSSL")]
    command_channel_uses_ssl: bool,
    #[serde(rename = "backingStorageUsesSSL")]
    backing_storage_uses_ssl: bool,
    disable_hostname_verification: bool,
}

/// Encodes `config` as the handshake JSON document.
///
/// # Errors
///
/// Fails when the keystore path is not UTF-8 or serialisation fails.
pub fn encode_ssl_configuration(config: &SslConfiguration) -> Result<Vec<u8>, SslConfigError> {
    let keystore_file = config
        .keystore_file()
        .map(|path| {
            path.to_str()
                .map(str::to_owned)
                .ok_or_else(|| SslConfigError::NonUtf8KeystorePath {
                    path: path.to_path_buf(),
                })
        })
        .transpose()?;
    let document = Document {
        ssl_configuration: Fields {
            keystore_file,
            keystore_password: config.keystore_password.clone(),
            command_channel_uses_ssl: config.enable_for_command_channel,
            backing_storage_uses_ssl: config.enable_for_backing_storage,
            disable_hostname_verification: config.disable_hostname_verification,
        },
    };
    serde_json::to_vec(&document).map_err(SslConfigError::Encode)
}

/// Decodes a document produced by [`encode_ssl_configuration`].
///
/// # Errors
///
/// Fails when the input is not JSON or any key is missing.
pub fn decode_ssl_configuration(bytes: &[u8]) -> Result<SslConfiguration, SslConfigError> {
    let Document { ssl_configuration } =
        serde_json::from_slice(bytes).map_err(SslConfigError::Decode)?;
    Ok(SslConfiguration {
        keystore_file: ssl_configuration.keystore_file.map(PathBuf::from),
        keystore_password: ssl_configuration.keystore_password,
        enable_for_backing_storage: ssl_configuration.backing_storage_uses_ssl,
        enable_for_command_channel: ssl_configuration.command_channel_uses_ssl,
        disable_hostname_verification: ssl_configuration.disable_hostname_verification,
    })
}
