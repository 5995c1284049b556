//! File ownership and privilege queries used to restrict the IPC server.

use std::io;

use agent_ipc::OwnerPrincipal;
use camino::Utf8Path;

/// Filesystem and identity queries.
pub trait FileSystemUtils: Send + Sync {
    /// Principal owning the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while reading the file's metadata.
    fn owner_of(&self, path: &Utf8Path) -> io::Result<OwnerPrincipal>;

    /// Whether the current process runs with administrative privileges.
    fn is_privileged_user(&self) -> bool;
}

/// [`FileSystemUtils`] backed by the host operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFileSystem;

#[cfg(unix)]
impl FileSystemUtils for SystemFileSystem {
    fn owner_of(&self, path: &Utf8Path) -> io::Result<OwnerPrincipal> {
        use std::os::unix::fs::MetadataExt;

        let metadata = std::fs::metadata(path)?;
        Ok(OwnerPrincipal::from_uid(metadata.uid()))
    }

    fn is_privileged_user(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }
}

#[cfg(not(unix))]
impl FileSystemUtils for SystemFileSystem {
    fn owner_of(&self, path: &Utf8Path) -> io::Result<OwnerPrincipal> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("file ownership is not available for {path}"),
        ))
    }

    fn is_privileged_user(&self) -> bool {
        false
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn owner_matches_the_creating_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Utf8PathBuf::try_from(dir.path().join("script")).expect("utf-8 path");
        std::fs::write(&path, b"#!/bin/sh\n").expect("write script");

        let owner = SystemFileSystem.owner_of(&path).expect("owner");

        assert_eq!(owner.uid(), nix::unistd::geteuid().as_raw());
    }

    #[test]
    fn missing_files_have_no_owner() {
        let error = SystemFileSystem
            .owner_of(Utf8Path::new("/nonexistent/agent-command-channel"))
            .expect_err("missing file");
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn privilege_follows_the_effective_user() {
        assert_eq!(
            SystemFileSystem.is_privileged_user(),
            nix::unistd::geteuid().is_root()
        );
    }
}
