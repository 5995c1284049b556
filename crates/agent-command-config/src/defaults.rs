use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Seconds the delegate waits for each handshake token by default.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Directory name appended to the runtime or temporary directory.
pub const IPC_DIRECTORY_NAME: &str = "agent-command";

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter used where serde needs an allocated value.
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default telemetry output format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default handshake timeout in seconds.
#[must_use]
pub const fn default_startup_timeout_secs() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_SECS
}

/// Directory holding the command channel launch scripts.
///
/// Falls back to the working directory when the executable location cannot
/// be expressed as UTF-8.
#[must_use]
pub fn default_bin_dir() -> Utf8PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(std::path::Path::to_path_buf))
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}

/// Directory that holds IPC sockets and the IPC settings file.
#[must_use]
pub fn default_ipc_socket_dir() -> Utf8PathBuf {
    default_ipc_socket_dir_inner()
}

#[cfg(unix)]
fn default_ipc_socket_dir_inner() -> Utf8PathBuf {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push(IPC_DIRECTORY_NAME);
    if apply_namespace {
        base.push(user_namespace());
    }
    base
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_ipc_socket_dir_inner() -> Utf8PathBuf {
    fallback_base_directory().join(IPC_DIRECTORY_NAME)
}
