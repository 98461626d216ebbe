//! Core CSI types: volume ids, capabilities, requests and plugin info.
//!
//! These types form the data model shared by the CSI traits, the message
//! envelope and the NFS backend.  They are all [`Serialize`]/[`Deserialize`]
//! so they can be carried as JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Volume identity
// ---------------------------------------------------------------------------

/// Opaque identifier for a volume, as seen by callers.
///
/// The NFS backend gives it the shape `server/baseDir/subDir`; see
/// [`crate::volume`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VolumeId(pub String);

impl VolumeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for VolumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for VolumeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VolumeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Access mode & capabilities
// ---------------------------------------------------------------------------

/// Describes how a volume may be accessed, mirroring the CSI access modes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessMode {
    /// Can only be published once as read/write on a single node.
    SingleNodeWriter,
    /// Can only be published once as readonly on a single node.
    SingleNodeReaderOnly,
    /// Can be published as readonly at multiple nodes simultaneously.
    MultiNodeReaderOnly,
    /// Can be published at multiple nodes, only one of which may write.
    MultiNodeSingleWriter,
    /// Can be published as read/write at multiple nodes simultaneously.
    MultiNodeMultiWriter,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SingleNodeWriter => "SINGLE_NODE_WRITER",
            Self::SingleNodeReaderOnly => "SINGLE_NODE_READER_ONLY",
            Self::MultiNodeReaderOnly => "MULTI_NODE_READER_ONLY",
            Self::MultiNodeSingleWriter => "MULTI_NODE_SINGLE_WRITER",
            Self::MultiNodeMultiWriter => "MULTI_NODE_MULTI_WRITER",
        };
        f.write_str(s)
    }
}

/// Filesystem-style access to a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountVolume {
    /// Requested filesystem type.  Accepted but not enforced for NFS.
    #[serde(default)]
    pub fs_type: String,
    /// Additional mount flags (e.g. `"noatime"`).
    #[serde(default)]
    pub mount_flags: Vec<String>,
}

/// Whether a volume is consumed as a mounted filesystem or a raw block
/// device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessType {
    Mount(MountVolume),
    Block,
}

/// Describes the capabilities required from a volume.
///
/// Both fields are optional on the wire; an unset field is rejected by the
/// [capability validator](crate::capability).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeCapability {
    #[serde(default)]
    pub access_mode: Option<AccessMode>,
    #[serde(default)]
    pub access_type: Option<AccessType>,
}

impl VolumeCapability {
    /// A mount-type capability with the given access mode.
    pub fn mount(access_mode: AccessMode) -> Self {
        Self {
            access_mode: Some(access_mode),
            access_type: Some(AccessType::Mount(MountVolume::default())),
        }
    }
}

// ---------------------------------------------------------------------------
// Volume metadata
// ---------------------------------------------------------------------------

/// Capacity bounds requested for a volume.  Advisory only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityRange {
    #[serde(default)]
    pub required_bytes: u64,
    #[serde(default)]
    pub limit_bytes: u64,
}

/// A provisioned volume as returned to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    /// Unique volume identifier.
    pub volume_id: VolumeId,
    /// Capacity in bytes, echoed from the request.
    pub capacity_bytes: u64,
    /// Opaque context passed from Controller to Node operations.
    #[serde(default)]
    pub volume_context: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request to create a new volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    /// Caller-assigned name for the volume.  Becomes the sub-directory name.
    pub name: String,
    /// Desired capacity.
    #[serde(default)]
    pub capacity_range: Option<CapacityRange>,
    /// Required capabilities.  A `null` entry is carried as `None` so that it
    /// can be rejected explicitly.
    #[serde(default)]
    pub volume_capabilities: Vec<Option<VolumeCapability>>,
    /// Storage class parameters (`server`, `base-dir`).
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Plugin info
// ---------------------------------------------------------------------------

/// Information about the CSI plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginInfo {
    /// Plugin name, e.g. `"nfs.csi.rk8s.io"`.
    pub name: String,
    /// Vendor-provided version string.
    pub vendor_version: String,
}

/// Capabilities advertised by the CSI plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PluginCapability {
    /// Plugin provides a Controller service.
    ControllerService,
}

/// RPCs a controller advertises through `ControllerGetCapabilities`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ControllerServiceCapability {
    Unknown,
    CreateDeleteVolume,
    PublishUnpublishVolume,
    ListVolumes,
    GetCapacity,
    CreateDeleteSnapshot,
    ListSnapshots,
    ExpandVolume,
}

impl fmt::Display for ControllerServiceCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "UNKNOWN",
            Self::CreateDeleteVolume => "CREATE_DELETE_VOLUME",
            Self::PublishUnpublishVolume => "PUBLISH_UNPUBLISH_VOLUME",
            Self::ListVolumes => "LIST_VOLUMES",
            Self::GetCapacity => "GET_CAPACITY",
            Self::CreateDeleteSnapshot => "CREATE_DELETE_SNAPSHOT",
            Self::ListSnapshots => "LIST_SNAPSHOTS",
            Self::ExpandVolume => "EXPAND_VOLUME",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_id_display() {
        let id = VolumeId::from("srv/base/vol");
        assert_eq!(id.to_string(), "srv/base/vol");
        assert!(!id.is_empty());
        assert!(VolumeId::default().is_empty());
    }

    #[test]
    fn null_capability_entries_deserialize_as_none() {
        let json = r#"{
            "name": "vol1",
            "volume_capabilities": [
                null,
                {"access_mode": "MultiNodeMultiWriter", "access_type": {"Mount": {}}}
            ]
        }"#;
        let req: CreateVolumeRequest = serde_json::from_str(json).expect("deserialize");
        assert_eq!(req.volume_capabilities.len(), 2);
        assert!(req.volume_capabilities[0].is_none());
        assert_eq!(
            req.volume_capabilities[1],
            Some(VolumeCapability::mount(AccessMode::MultiNodeMultiWriter))
        );
        assert!(req.capacity_range.is_none());
    }

    #[test]
    fn access_mode_display() {
        assert_eq!(
            AccessMode::MultiNodeMultiWriter.to_string(),
            "MULTI_NODE_MULTI_WRITER"
        );
    }
}
