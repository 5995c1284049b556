//! Layered configuration for the agent command channel.
//!
//! Values are merged from built-in defaults, an optional configuration file,
//! `AGENT_COMMAND_*` environment variables and command-line flags, in that
//! order of increasing precedence.

mod defaults;
mod ipc;
mod logging;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_STARTUP_TIMEOUT_SECS, IPC_DIRECTORY_NAME, default_bin_dir,
    default_ipc_socket_dir, default_log_filter, default_log_filter_string, default_log_format,
    default_startup_timeout_secs,
};
pub use ipc::{IPC_SETTINGS_FILE_NAME, IpcSettings, IpcSettingsError, IpcTransport};
pub use logging::{LogFormat, LogFormatParseError};

/// Runtime configuration for the agent side of the command channel.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "AGENT_COMMAND")]
pub struct Config {
    /// Tracing filter expression, in `EnvFilter` syntax.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Telemetry output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Upper bound, in seconds, on the wait for each handshake token.
    #[serde(default = "default_startup_timeout_secs")]
    #[ortho_config(default = default_startup_timeout_secs())]
    pub startup_timeout_secs: u64,
    /// Directory containing the command channel launch scripts.
    #[serde(default = "default_bin_dir")]
    #[ortho_config(default = default_bin_dir())]
    pub bin_dir: Utf8PathBuf,
    /// Directory holding IPC sockets and the IPC settings file.
    #[serde(default = "default_ipc_socket_dir")]
    #[ortho_config(default = default_ipc_socket_dir())]
    pub ipc_socket_dir: Utf8PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            startup_timeout_secs: default_startup_timeout_secs(),
            bin_dir: default_bin_dir(),
            ipc_socket_dir: default_ipc_socket_dir(),
        }
    }
}

impl Config {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Telemetry output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Handshake timeout as a [`Duration`].
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Directory containing the command channel launch scripts.
    #[must_use]
    pub fn bin_dir(&self) -> &Utf8Path {
        &self.bin_dir
    }

    /// IPC settings derived from the socket directory.
    #[must_use]
    pub fn ipc_settings(&self) -> IpcSettings {
        IpcSettings::unix(self.ipc_socket_dir.clone())
    }

    /// Path of the IPC settings file handed to the command channel process.
    #[must_use]
    pub fn ipc_settings_path(&self) -> Utf8PathBuf {
        self.ipc_socket_dir.join(IPC_SETTINGS_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_documented_values() {
        let config = Config::default();
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.startup_timeout(), Duration::from_secs(10));
        assert!(config.ipc_socket_dir.as_str().contains(IPC_DIRECTORY_NAME));
    }

    #[test]
    fn settings_path_lives_beside_sockets() {
        let config = Config {
            ipc_socket_dir: Utf8PathBuf::from("/run/agent"),
            ..Config::default()
        };
        assert_eq!(
            config.ipc_settings_path(),
            Utf8PathBuf::from("/run/agent/ipc.json")
        );
        assert_eq!(
            config.ipc_settings().socket_dir(),
            Utf8Path::new("/run/agent")
        );
    }
}
