//! CSI Controller service trait.
//!
//! The Controller service manages the centralized volume lifecycle.  For NFS
//! that means creating and removing sub-directories on an export; publish,
//! snapshot and expansion are not offered.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{
    ControllerServiceCapability, CreateVolumeRequest, Volume, VolumeCapability, VolumeId,
};

/// Controller service — centralized volume management.
#[async_trait]
pub trait CsiController: Send + Sync {
    /// Provision a new volume.
    ///
    /// The returned [`Volume`] contains the assigned `volume_id` and the
    /// `volume_context` that must be forwarded to subsequent Node operations.
    async fn create_volume(&self, req: CreateVolumeRequest) -> Result<Volume, CsiError>;

    /// Delete a previously provisioned volume.
    ///
    /// This is idempotent — deleting a volume that does not exist succeeds.
    async fn delete_volume(&self, volume_id: &VolumeId) -> Result<(), CsiError>;

    /// Check whether the given capabilities are compatible with the volume.
    async fn validate_volume_capabilities(
        &self,
        volume_id: &VolumeId,
        capabilities: &[Option<VolumeCapability>],
    ) -> Result<bool, CsiError>;

    /// List all volumes known to this controller.
    async fn list_volumes(&self) -> Result<Vec<Volume>, CsiError>;

    /// Return the total available capacity in bytes.
    async fn get_capacity(&self) -> Result<u64, CsiError>;

    /// RPCs supported by this controller.
    async fn get_capabilities(&self) -> Result<Vec<ControllerServiceCapability>, CsiError>;
}
