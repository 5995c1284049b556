//! Settings shared between the agent and the command channel process.
//!
//! The agent writes an [`IpcSettings`] document to disk before spawning the
//! command channel server. The child reads the same file to find the socket
//! it must connect back to.

use std::fs::{self, DirBuilder};
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the IPC settings document inside the socket directory.
pub const IPC_SETTINGS_FILE_NAME: &str = "ipc.json";

const SOCKET_EXTENSION: &str = "sock";

/// Transport used for agent IPC servers.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpcTransport {
    /// Unix domain sockets inside the socket directory.
    #[default]
    UnixSocket,
}

/// Location and transport of every IPC server owned by the agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct IpcSettings {
    transport: IpcTransport,
    socket_dir: Utf8PathBuf,
}

impl IpcSettings {
    /// Builds Unix socket settings rooted at `socket_dir`.
    #[must_use]
    pub fn unix(socket_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            transport: IpcTransport::UnixSocket,
            socket_dir: socket_dir.into(),
        }
    }

    /// Directory that holds the server sockets.
    #[must_use]
    pub fn socket_dir(&self) -> &Utf8Path {
        &self.socket_dir
    }

    /// Socket path for the named server.
    #[must_use]
    pub fn socket_path(&self, server_name: &str) -> Utf8PathBuf {
        self.socket_dir
            .join(server_name)
            .with_extension(SOCKET_EXTENSION)
    }

    /// Default location of the settings document.
    #[must_use]
    pub fn settings_path(&self) -> Utf8PathBuf {
        self.socket_dir.join(IPC_SETTINGS_FILE_NAME)
    }

    /// Creates the socket directory, restricted to the current user.
    ///
    /// # Errors
    ///
    /// Returns [`IpcSettingsError::CreateDirectory`] when the directory
    /// cannot be created.
    pub fn prepare_filesystem(&self) -> Result<(), IpcSettingsError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        if let Err(source) = builder.create(self.socket_dir.as_std_path())
            && source.kind() != io::ErrorKind::AlreadyExists
        {
            return Err(IpcSettingsError::CreateDirectory {
                path: self.socket_dir.clone(),
                source,
            });
        }
        Ok(())
    }

    /// Serialises the settings to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`IpcSettingsError::Serialise`] or [`IpcSettingsError::Write`].
    pub fn write_to(&self, path: &Utf8Path) -> Result<(), IpcSettingsError> {
        let document = serde_json::to_vec_pretty(self)
            .map_err(|source| IpcSettingsError::Serialise { source })?;
        fs::write(path, document).map_err(|source| IpcSettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads settings previously written by [`IpcSettings::write_to`].
    ///
    /// # Errors
    ///
    /// Returns [`IpcSettingsError::Read`] or [`IpcSettingsError::Parse`].
    pub fn read_from(path: &Utf8Path) -> Result<Self, IpcSettingsError> {
        let document = fs::read(path).map_err(|source| IpcSettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&document).map_err(|source| IpcSettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Errors raised while preparing or persisting [`IpcSettings`].
#[derive(Debug, Error)]
pub enum IpcSettingsError {
    /// The socket directory could not be created.
    #[error("failed to create IPC socket directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The settings could not be encoded as JSON.
    #[error("failed to encode IPC settings: {source}")]
    Serialise {
        /// Underlying encoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// The settings file could not be written.
    #[error("failed to write IPC settings to '{path}': {source}")]
    Write {
        /// Destination path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The settings file could not be read.
    #[error("failed to read IPC settings from '{path}': {source}")]
    Read {
        /// Source path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The settings file did not contain valid settings.
    #[error("invalid IPC settings in '{path}': {source}")]
    Parse {
        /// Source path.
        path: Utf8PathBuf,
        /// Underlying decoder failure.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf8_dir(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
    }

    #[test]
    fn socket_path_uses_server_name() {
        let settings = IpcSettings::unix("/run/agent-command");
        assert_eq!(
            settings.socket_path("command-channel"),
            Utf8PathBuf::from("/run/agent-command/command-channel.sock")
        );
    }

    #[test]
    fn settings_survive_a_trip_through_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let settings = IpcSettings::unix(utf8_dir(&dir).join("sockets"));
        let path = utf8_dir(&dir).join(IPC_SETTINGS_FILE_NAME);

        settings.write_to(&path).expect("write settings");
        let loaded = IpcSettings::read_from(&path).expect("read settings");

        assert_eq!(loaded, settings);
    }

    #[test]
    fn document_names_the_transport() {
        let settings = IpcSettings::unix("/tmp/sockets");
        let json = serde_json::to_value(&settings).expect("encode settings");
        assert_eq!(json["transport"], "unix_socket");
        assert_eq!(json["socket_dir"], "/tmp/sockets");
    }

    #[test]
    fn reading_garbage_reports_parse_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = utf8_dir(&dir).join(IPC_SETTINGS_FILE_NAME);
        fs::write(&path, b"not json").expect("write garbage");

        let error = IpcSettings::read_from(&path).expect_err("garbage must not parse");
        assert!(matches!(error, IpcSettingsError::Parse { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn prepare_filesystem_restricts_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("temp dir");
        let settings = IpcSettings::unix(utf8_dir(&dir).join("nested").join("sockets"));

        settings.prepare_filesystem().expect("prepare directory");
        settings.prepare_filesystem().expect("prepare is repeatable");

        let mode = fs::metadata(settings.socket_dir())
            .expect("directory metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
