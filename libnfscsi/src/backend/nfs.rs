//! NFS provisioning backend for CSI.
//!
//! [`NfsController`] implements [`CsiIdentity`] and [`CsiController`] by
//! turning each volume into a sub-directory of a base directory on an NFS
//! export.  To create or delete that sub-directory the controller attaches
//! the export's base directory under its working directory, mutates the
//! tree, and detaches again.
//!
//! # Working directory layout
//!
//! ```text
//! <working_mount_dir>/
//!   <subDir>/             # private mount of server:/baseDir for one request
//!     <subDir>/           # the volume itself
//! ```
//!
//! The mount point is keyed by the volume name rather than by export, so
//! concurrent requests against the same export each get their own mount and
//! no reference counting is needed.  Two concurrent requests for the *same*
//! name share a mount point and are not serialized.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::capability;
use crate::config::{ControllerConfig, DriverConfig};
use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::mounter::{Mounter, NfsMounter};
use crate::types::*;
use crate::volume::NfsVolume;

/// Permissions of newly provisioned volume directories.
const VOLUME_DIR_MODE: u32 = 0o755;

/// CSI controller that provisions volumes as directories on NFS exports.
///
/// Holds no per-volume state; everything is re-derived from the request or
/// the volume id.
pub struct NfsController {
    driver: Arc<DriverConfig>,
    /// Working directory for temporarily mounting NFS exports.
    working_mount_dir: PathBuf,
    mounter: Arc<dyn Mounter>,
}

impl NfsController {
    pub fn new(
        driver: Arc<DriverConfig>,
        config: ControllerConfig,
        mounter: Arc<dyn Mounter>,
    ) -> Self {
        // Mount points are matched against `/proc/self/mounts`, which only
        // lists absolute paths.
        let working_mount_dir = std::path::absolute(&config.working_mount_dir)
            .unwrap_or(config.working_mount_dir);
        Self {
            driver,
            working_mount_dir,
            mounter,
        }
    }

    /// Controller that mounts through the host NFS client.
    pub fn with_nfs_mounter(driver: Arc<DriverConfig>, config: ControllerConfig) -> Self {
        let mounter = Arc::new(NfsMounter::new(config.mount_options.clone()));
        Self::new(driver, config, mounter)
    }

    pub fn working_mount_dir(&self) -> &Path {
        &self.working_mount_dir
    }

    /// Private mount point for requests on `vol`.
    fn internal_mount_path(&self, vol: &NfsVolume) -> PathBuf {
        self.working_mount_dir.join(vol.sub_dir())
    }

    /// Where the volume directory appears while the export is attached.
    ///
    /// Really `<working>/<volume id>/<subDir>`, with the mount keyed by
    /// `subDir` because it is unique per volume.
    fn internal_volume_path(&self, vol: &NfsVolume) -> PathBuf {
        self.internal_mount_path(vol).join(vol.sub_dir())
    }

    /// Attach `server:/baseDir` at the volume's private mount point.
    async fn internal_mount(&self, vol: &NfsVolume) -> Result<InternalMount, CsiError> {
        let target = self.internal_mount_path(vol);
        debug!(
            server = vol.server(),
            share = %vol.base_share_path(),
            target = %target.display(),
            "internally mounting nfs export",
        );
        InternalMount::acquire(Arc::clone(&self.mounter), target, vol).await
    }
}

// ---------------------------------------------------------------------------
// Scoped internal mount
// ---------------------------------------------------------------------------

/// An attached export that must be detached once the directory work is done.
///
/// Call [`InternalMount::release`] on every path.  If the guard is dropped
/// without it (the request future was cancelled or panicked) the detach is
/// spawned onto the current runtime instead.
struct InternalMount {
    target: PathBuf,
    mounter: Arc<dyn Mounter>,
    released: bool,
}

impl InternalMount {
    async fn acquire(
        mounter: Arc<dyn Mounter>,
        target: PathBuf,
        vol: &NfsVolume,
    ) -> Result<Self, CsiError> {
        tokio::fs::create_dir_all(&target)
            .await
            .map_err(|e| CsiError::MountFailed {
                path: target.display().to_string(),
                reason: format!("create mount point: {e}"),
            })?;

        if let Err(e) = mounter
            .attach(&target, vol.server(), &vol.base_share_path())
            .await
        {
            remove_mount_point(&target).await;
            return Err(e);
        }

        Ok(Self {
            target,
            mounter,
            released: false,
        })
    }

    /// Detach the export.  Failures are logged, never returned: by the time
    /// this runs the result of the request is already decided.
    async fn release(mut self) {
        self.released = true;
        detach_best_effort(self.mounter.as_ref(), &self.target).await;
    }
}

impl Drop for InternalMount {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let target = std::mem::take(&mut self.target);
        let mounter = Arc::clone(&self.mounter);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(target = %target.display(), "internal mount dropped without release, detaching in background");
                handle.spawn(async move {
                    detach_best_effort(mounter.as_ref(), &target).await;
                });
            }
            Err(_) => {
                warn!(target = %target.display(), "internal mount dropped outside a runtime, leaving it in place");
            }
        }
    }
}

async fn detach_best_effort(mounter: &dyn Mounter, target: &Path) {
    debug!(target = %target.display(), "internally unmounting nfs export");
    match mounter.detach(target).await {
        Ok(()) => remove_mount_point(target).await,
        Err(e) => warn!(target = %target.display(), error = %e, "failed to unmount nfs server"),
    }
}

// Only an empty directory is removed; anything else is left for inspection.
async fn remove_mount_point(target: &Path) {
    match tokio::fs::remove_dir(target).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            debug!(target = %target.display(), error = %e, "mount point left in place");
        }
    }
}

// ---------------------------------------------------------------------------
// CsiIdentity
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiIdentity for NfsController {
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError> {
        Ok(PluginInfo {
            name: self.driver.name.clone(),
            vendor_version: self.driver.vendor_version.clone(),
        })
    }

    async fn probe(&self) -> Result<bool, CsiError> {
        // Healthy as long as exports can be mounted under the working dir.
        match tokio::fs::create_dir_all(&self.working_mount_dir).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(path = %self.working_mount_dir.display(), error = %e, "working mount dir unusable");
                Ok(false)
            }
        }
    }

    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError> {
        Ok(vec![PluginCapability::ControllerService])
    }
}

// ---------------------------------------------------------------------------
// CsiController
// ---------------------------------------------------------------------------

#[async_trait]
impl CsiController for NfsController {
    #[instrument(skip(self, req), fields(name = %req.name))]
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError> {
        debug!(?req, "CreateVolume called");

        if req.name.is_empty() {
            return Err(CsiError::invalid("CreateVolume name must be provided"));
        }
        capability::validate_volume_capabilities(&self.driver, &req.volume_capabilities)?;
        let vol = NfsVolume::from_parameters(&req.name, &req.parameters)?;

        let mount = self.internal_mount(&vol).await?;

        // TODO: revisit permissions once ownership is configurable per storage class.
        let internal_path = self.internal_volume_path(&vol);
        debug!(path = %internal_path.display(), "creating subdirectory");
        let created = tokio::fs::DirBuilder::new()
            .mode(VOLUME_DIR_MODE)
            .create(&internal_path)
            .await
            .map_err(|e| {
                CsiError::Internal(format!(
                    "failed to make subdirectory {}: {e}",
                    internal_path.display()
                ))
            });

        mount.release().await;
        created?;

        // Capacity is echoed back, not enforced.
        let capacity = req
            .capacity_range
            .map(|r| r.required_bytes)
            .unwrap_or_default();
        info!(volume_id = %vol.id(), share = %vol, "volume created");
        Ok(vol.to_csi(capacity))
    }

    #[instrument(skip(self))]
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError> {
        if volume_id.is_empty() {
            return Err(CsiError::invalid("volume id is empty"));
        }

        // An id that does not decode cannot name a volume we created, so it
        // is treated as already deleted.
        let vol = match NfsVolume::try_from(volume_id) {
            Ok(vol) => vol,
            Err(e) => {
                debug!(error = %e, "failed to decode volume id, treating as deleted");
                return Ok(());
            }
        };

        let mount = self.internal_mount(&vol).await?;

        let internal_path = self.internal_volume_path(&vol);
        debug!(path = %internal_path.display(), "removing subdirectory");
        let removed = match tokio::fs::remove_dir_all(&internal_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("subdirectory already absent");
                Ok(())
            }
            Err(e) => Err(CsiError::Internal(format!(
                "failed to delete subdirectory {}: {e}",
                internal_path.display()
            ))),
        };

        mount.release().await;
        removed?;

        info!(%volume_id, "volume deleted");
        Ok(())
    }

    async fn validate_volume_capabilities(
        &self,
        volume_id: &VolumeId,
        capabilities: &[Option<VolumeCapability>],
    ) -> Result<bool, CsiError> {
        NfsVolume::try_from(volume_id)
            .map_err(|_| CsiError::VolumeNotFound(volume_id.to_string()))?;
        capability::validate_volume_capabilities(&self.driver, capabilities)?;
        Ok(true)
    }

    async fn list_volumes(&self) -> Result<Vec<Volume>, CsiError> {
        Err(CsiError::Unimplemented("ListVolumes".into()))
    }

    async fn get_capacity(&self) -> Result<u64, CsiError> {
        Err(CsiError::Unimplemented("GetCapacity".into()))
    }

    async fn get_capabilities(&self) -> Result<Vec<ControllerServiceCapability>, CsiError> {
        Ok(self.driver.controller_capabilities.clone())
    }
}
