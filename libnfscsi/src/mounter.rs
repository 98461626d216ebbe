//! Attaching and detaching NFS exports on the local host.
//!
//! The provisioning workflow only talks to the [`Mounter`] trait.
//! [`NfsMounter`] is the system implementation: it shells out to
//! `mount -t nfs` and unmounts through `umount(2)`.

use std::path::Path;

use async_trait::async_trait;
use nix::errno::Errno;
use tracing::{debug, info, instrument};

use crate::error::CsiError;

/// Local attachment of a remote export.
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Mount `server:share` at `target`.  `target` already exists.
    async fn attach(&self, target: &Path, server: &str, share: &str) -> Result<(), CsiError>;

    /// Unmount whatever is mounted at `target`.
    async fn detach(&self, target: &Path) -> Result<(), CsiError>;
}

/// [`Mounter`] backed by the host's NFS client.
#[derive(Debug, Clone, Default)]
pub struct NfsMounter {
    /// Passed to `mount -o`, e.g. `["nfsvers=4.1"]`.
    options: Vec<String>,
}

impl NfsMounter {
    pub fn new(options: Vec<String>) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Mounter for NfsMounter {
    #[instrument(skip(self), fields(target = %target.display()))]
    async fn attach(&self, target: &Path, server: &str, share: &str) -> Result<(), CsiError> {
        if is_mountpoint(target).await {
            debug!("target already mounted, assuming idempotent retry");
            return Ok(());
        }

        let source = format!("{server}:{share}");
        let mut cmd = tokio::process::Command::new("mount");
        cmd.args(["-t", "nfs"]);
        if !self.options.is_empty() {
            cmd.arg("-o").arg(self.options.join(","));
        }
        cmd.arg(&source).arg(target);

        let output = cmd.output().await.map_err(|e| CsiError::MountFailed {
            path: target.display().to_string(),
            reason: format!("spawn mount: {e}"),
        })?;
        if !output.status.success() {
            return Err(CsiError::MountFailed {
                path: target.display().to_string(),
                reason: format!(
                    "mount {source} exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        info!(%source, "nfs export mounted");
        Ok(())
    }

    #[instrument(skip(self), fields(target = %target.display()))]
    async fn detach(&self, target: &Path) -> Result<(), CsiError> {
        // Skip only when the mount table positively says the target is not
        // mounted; otherwise let the kernel decide.
        if mount_state(target).await == Some(false) {
            debug!("target not mounted, nothing to detach");
            return Ok(());
        }

        let owned = target.to_path_buf();
        let result = tokio::task::spawn_blocking(move || nix::mount::umount(&owned))
            .await
            .map_err(CsiError::internal)?;
        match result {
            Ok(()) => info!("nfs export unmounted"),
            Err(Errno::EINVAL | Errno::ENOENT) => debug!("target is not a mount point"),
            Err(e) => {
                return Err(CsiError::UnmountFailed {
                    path: target.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Return `true` if `path` is currently listed as a mount point in
/// `/proc/self/mounts`.
pub async fn is_mountpoint(path: &Path) -> bool {
    mount_state(path).await == Some(true)
}

/// Whether `path` is a mount point, or `None` when `/proc/self/mounts`
/// cannot be read.
///
/// The path is canonicalized first since the mount table lists resolved
/// absolute paths.  `/proc/self/mounts` uses octal escapes (`\040` for
/// space); working mount paths are built from volume names that never
/// contain whitespace, so a plain string comparison is enough.
pub async fn mount_state(path: &Path) -> Option<bool> {
    let resolved = tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf());
    let contents = tokio::fs::read_to_string("/proc/self/mounts").await.ok()?;
    Some(
        resolved
            .to_str()
            .is_some_and(|p| mounts_contain(&contents, p)),
    )
}

// Format: <device> <mountpoint> <fstype> <options> <dump> <pass>
fn mounts_contain(mounts: &str, path: &str) -> bool {
    mounts
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUNTS: &str = "\
proc /proc proc rw,nosuid,nodev,noexec,relatime 0 0
10.0.0.5:/exports /tmp/nfs-csi/controller/pvc-1 nfs4 rw,relatime,vers=4.1 0 0
tmpfs /run tmpfs rw,nosuid,nodev 0 0
";

    #[test]
    fn finds_listed_mountpoint() {
        assert!(mounts_contain(MOUNTS, "/tmp/nfs-csi/controller/pvc-1"));
        assert!(mounts_contain(MOUNTS, "/run"));
    }

    #[test]
    fn ignores_device_column_and_prefixes() {
        assert!(!mounts_contain(MOUNTS, "10.0.0.5:/exports"));
        assert!(!mounts_contain(MOUNTS, "/tmp/nfs-csi/controller"));
    }

    #[tokio::test]
    async fn fresh_directory_is_not_a_mountpoint() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(!is_mountpoint(tmp.path()).await);
    }

    #[tokio::test]
    async fn non_canonical_paths_resolve_to_mount_table_entry() {
        assert_eq!(mount_state(Path::new("/proc/../proc")).await, Some(true));

        let tmp = tempfile::tempdir().unwrap();
        let link = tmp.path().join("proc-link");
        std::os::unix::fs::symlink("/proc", &link).unwrap();
        assert!(is_mountpoint(&link).await);
    }

    #[tokio::test]
    async fn detach_of_unmounted_target_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        NfsMounter::default().detach(tmp.path()).await.unwrap();
    }
}
