//! Launching and tearing down the command channel server process.
//!
//! The launch command line differs by platform. [`PlatformCommand::current`]
//! picks the variant once; everything downstream works with the resulting
//! [`LaunchCommand`] and the [`ProcessCreator`] seam.

use std::ffi::{OsStr, OsString};
use std::io;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::debug;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Base name of the command channel launch script inside the bin directory.
pub const LAUNCHER_NAME: &str = "agent-command-channel";

/// Failures while starting or stopping the server process.
#[derive(Debug, Clone, Error)]
pub enum ProcessError {
    /// A path could not be made absolute.
    #[error("failed to resolve absolute path for {path}: {source}")]
    ResolvePath {
        /// The relative path.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
    /// An absolute path was not valid UTF-8.
    #[error("resolved path for {path} is not valid UTF-8")]
    NonUtf8Path {
        /// The path that was being resolved.
        path: Utf8PathBuf,
    },
    /// The process could not be started.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
    /// The process could not be stopped.
    #[error("failed to stop process {pid}: {source}")]
    Destroy {
        /// Operating-system process id.
        pid: u32,
        /// Underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },
}

/// A fully resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    program: OsString,
    args: Vec<OsString>,
}

impl LaunchCommand {
    /// Builds an invocation of `program` with `args`.
    pub fn new<I, A>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Program to execute.
    #[must_use]
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

/// How the launch script is invoked on the running platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCommand {
    /// The script is executed directly.
    Direct,
    /// The script is a batch file run through `cmd /c`.
    CmdShell,
}

impl PlatformCommand {
    /// Variant for the platform this binary was built for.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::CmdShell
        } else {
            Self::Direct
        }
    }

    /// Path of the launch script inside `bin_dir`.
    #[must_use]
    pub fn launch_script(self, bin_dir: &Utf8Path) -> Utf8PathBuf {
        match self {
            Self::Direct => bin_dir.join(LAUNCHER_NAME),
            Self::CmdShell => bin_dir.join(format!("{LAUNCHER_NAME}.cmd")),
        }
    }

    /// Builds the command that starts the server for `host:port`.
    ///
    /// The script and IPC settings paths are made absolute against the
    /// current directory.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] when a path cannot be resolved.
    pub fn command_line(
        self,
        bin_dir: &Utf8Path,
        host: &str,
        port: u16,
        ipc_settings_path: &Utf8Path,
    ) -> Result<LaunchCommand, ProcessError> {
        let script = absolute(&self.launch_script(bin_dir))?;
        let settings = absolute(ipc_settings_path)?;
        let tail = [host.to_owned(), port.to_string(), settings.into_string()];
        Ok(match self {
            Self::Direct => LaunchCommand::new(script.into_string(), tail),
            Self::CmdShell => LaunchCommand::new(
                "cmd",
                [String::from("/c"), script.into_string()]
                    .into_iter()
                    .chain(tail),
            ),
        })
    }
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, ProcessError> {
    let resolved = std::path::absolute(path).map_err(|source| ProcessError::ResolvePath {
        path: path.to_owned(),
        source: Arc::new(source),
    })?;
    Utf8PathBuf::try_from(resolved).map_err(|_| ProcessError::NonUtf8Path {
        path: path.to_owned(),
    })
}

/// A running child process owned by the caller.
pub trait ChildProcess: Send {
    /// Operating-system process id.
    fn id(&self) -> u32;

    /// Terminates the process and reaps it. Stopping an exited process
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Destroy`] when the process cannot be stopped.
    fn destroy(&mut self) -> Result<(), ProcessError>;
}

/// Starts processes.
pub trait ProcessCreator: Send + Sync {
    /// Starts `command` with the parent's standard streams.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] when the process cannot be started.
    fn spawn(&self, command: &LaunchCommand) -> Result<Box<dyn ChildProcess>, ProcessError>;
}

/// [`ProcessCreator`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessCreator;

impl ProcessCreator for SystemProcessCreator {
    fn spawn(&self, command: &LaunchCommand) -> Result<Box<dyn ChildProcess>, ProcessError> {
        let child = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: command.program().to_string_lossy().into_owned(),
                source: Arc::new(source),
            })?;
        debug!(
            target: PROCESS_TARGET,
            pid = child.id(),
            program = %command.program().to_string_lossy(),
            "spawned command channel process"
        );
        Ok(Box::new(SystemChild { child }))
    }
}

struct SystemChild {
    child: Child,
}

impl ChildProcess for SystemChild {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn destroy(&mut self) -> Result<(), ProcessError> {
        let pid = self.child.id();
        let destroy_error = |source: io::Error| ProcessError::Destroy {
            pid,
            source: Arc::new(source),
        };
        if self.child.try_wait().map_err(destroy_error)?.is_some() {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => {}
            // Already exited between the poll and the kill.
            Err(error) if error.kind() == io::ErrorKind::InvalidInput => {}
            Err(error) => return Err(destroy_error(error)),
        }
        let status = self.child.wait().map_err(destroy_error)?;
        debug!(target: PROCESS_TARGET, pid, %status, "command channel process stopped");
        Ok(())
    }
}
