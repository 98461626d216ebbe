//! CSI protocol messages.
//!
//! [`CsiMessage`] is the envelope for every request and response exchanged
//! with the controller, serialized as JSON.  Carrying the envelope over a
//! socket is left to the embedding process; [`dispatch`] maps one request
//! onto a handler and produces the response.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::controller::CsiController;
use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::types::*;

/// Top-level message envelope.
///
/// A caller sends a *request* variant and receives the corresponding
/// *response* variant (or [`CsiMessage::Error`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CsiMessage {
    // ----- Requests --------------------------------------------------------
    /// Create a new volume (Controller).
    CreateVolume(CreateVolumeRequest),
    /// Delete a volume (Controller).
    DeleteVolume(VolumeId),
    /// Validate volume capabilities (Controller).
    ValidateVolumeCapabilities {
        volume_id: VolumeId,
        capabilities: Vec<Option<VolumeCapability>>,
    },
    /// List all known volumes (Controller).
    ListVolumes,
    /// Query remaining capacity (Controller).
    GetCapacity,
    /// Query supported controller RPCs (Controller).
    ControllerGetCapabilities,

    /// Health probe (Identity).
    Probe,
    /// Query plugin info (Identity).
    GetPluginInfo,
    /// Query plugin capabilities (Identity).
    GetPluginCapabilities,

    // ----- Responses -------------------------------------------------------
    /// A volume was successfully created.
    VolumeCreated(Volume),
    /// A list of volumes.
    VolumeList(Vec<Volume>),
    /// Available capacity in bytes.
    Capacity(u64),
    /// Whether the requested capabilities are valid.
    CapabilitiesValid(bool),
    /// Controller capabilities.
    ControllerCapabilitiesResponse(Vec<ControllerServiceCapability>),
    /// Plugin information.
    PluginInfoResponse(PluginInfo),
    /// Plugin capabilities.
    PluginCapabilitiesResponse(Vec<PluginCapability>),

    /// Generic success acknowledgement (no payload).
    Ok,
    /// Probe result.
    ProbeResult(bool),
    /// An error occurred.
    Error(CsiError),
}

impl std::fmt::Display for CsiMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateVolume(req) => write!(f, "CreateVolume(name={})", req.name),
            Self::DeleteVolume(id) => write!(f, "DeleteVolume({})", id),
            Self::ValidateVolumeCapabilities { volume_id, .. } => {
                write!(f, "ValidateVolumeCapabilities({})", volume_id)
            }
            Self::ListVolumes => f.write_str("ListVolumes"),
            Self::GetCapacity => f.write_str("GetCapacity"),
            Self::ControllerGetCapabilities => f.write_str("ControllerGetCapabilities"),
            Self::Probe => f.write_str("Probe"),
            Self::GetPluginInfo => f.write_str("GetPluginInfo"),
            Self::GetPluginCapabilities => f.write_str("GetPluginCapabilities"),
            Self::VolumeCreated(v) => write!(f, "VolumeCreated({})", v.volume_id),
            Self::VolumeList(vs) => write!(f, "VolumeList(count={})", vs.len()),
            Self::Capacity(c) => write!(f, "Capacity({})", c),
            Self::CapabilitiesValid(v) => write!(f, "CapabilitiesValid({})", v),
            Self::ControllerCapabilitiesResponse(caps) => {
                write!(f, "ControllerCapabilities(count={})", caps.len())
            }
            Self::PluginInfoResponse(info) => write!(f, "PluginInfo(name={})", info.name),
            Self::PluginCapabilitiesResponse(caps) => {
                write!(f, "PluginCapabilities(count={})", caps.len())
            }
            Self::Ok => f.write_str("Ok"),
            Self::ProbeResult(ok) => write!(f, "ProbeResult({})", ok),
            Self::Error(e) => write!(f, "Error({})", e),
        }
    }
}

/// Map a request [`CsiMessage`] to the matching handler call and wrap the
/// result in a response [`CsiMessage`].
#[instrument(skip_all, fields(request = %request))]
pub async fn dispatch<T>(handler: &T, request: CsiMessage) -> CsiMessage
where
    T: CsiIdentity + CsiController + ?Sized,
{
    let response = match request {
        // --- Identity -------------------------------------------------------
        CsiMessage::Probe => match handler.probe().await {
            Ok(ok) => CsiMessage::ProbeResult(ok),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::GetPluginInfo => match handler.get_plugin_info().await {
            Ok(info) => CsiMessage::PluginInfoResponse(info),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::GetPluginCapabilities => match handler.get_plugin_capabilities().await {
            Ok(caps) => CsiMessage::PluginCapabilitiesResponse(caps),
            Err(e) => CsiMessage::Error(e),
        },

        // --- Controller -----------------------------------------------------
        CsiMessage::CreateVolume(req) => match handler.create_volume(req).await {
            Ok(vol) => CsiMessage::VolumeCreated(vol),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::DeleteVolume(id) => match handler.delete_volume(&id).await {
            Ok(()) => CsiMessage::Ok,
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::ValidateVolumeCapabilities {
            volume_id,
            capabilities,
        } => match handler
            .validate_volume_capabilities(&volume_id, &capabilities)
            .await
        {
            Ok(valid) => CsiMessage::CapabilitiesValid(valid),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::ListVolumes => match handler.list_volumes().await {
            Ok(vols) => CsiMessage::VolumeList(vols),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::GetCapacity => match handler.get_capacity().await {
            Ok(cap) => CsiMessage::Capacity(cap),
            Err(e) => CsiMessage::Error(e),
        },
        CsiMessage::ControllerGetCapabilities => match handler.get_capabilities().await {
            Ok(caps) => CsiMessage::ControllerCapabilitiesResponse(caps),
            Err(e) => CsiMessage::Error(e),
        },

        // --- Response variants should never arrive as requests --------------
        other => {
            warn!(msg = %other, "unexpected message variant received as request");
            CsiMessage::Error(CsiError::InvalidArgument(format!(
                "unexpected message: {other}"
            )))
        }
    };
    debug!(%response, "CSI response ready");
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::nfs::NfsController;
    use crate::config::{ControllerConfig, DriverConfig};
    use crate::mounter::NfsMounter;
    use crate::volume::{PARAM_BASE_DIR, PARAM_SERVER};

    fn controller(dir: &std::path::Path) -> NfsController {
        NfsController::new(
            Arc::new(DriverConfig::new()),
            ControllerConfig::new(dir),
            Arc::new(NfsMounter::default()),
        )
    }

    #[test]
    fn message_serde_roundtrip() {
        let msg = CsiMessage::CreateVolume(CreateVolumeRequest {
            name: "test".into(),
            capacity_range: Some(CapacityRange {
                required_bytes: 1024,
                limit_bytes: 0,
            }),
            volume_capabilities: vec![Some(VolumeCapability::mount(
                AccessMode::MultiNodeMultiWriter,
            ))],
            parameters: [
                (PARAM_SERVER.to_owned(), "s".to_owned()),
                (PARAM_BASE_DIR.to_owned(), "b".to_owned()),
            ]
            .into(),
        });
        let json = serde_json::to_string(&msg).expect("serialize");
        let de: CsiMessage = serde_json::from_str(&json).expect("deserialize");
        assert!(matches!(de, CsiMessage::CreateVolume(req) if req.name == "test"));
    }

    #[test]
    fn display_formatting() {
        assert_eq!(CsiMessage::Ok.to_string(), "Ok");
        assert_eq!(
            CsiMessage::DeleteVolume(VolumeId::from("s/b/v")).to_string(),
            "DeleteVolume(s/b/v)"
        );
    }

    #[tokio::test]
    async fn dispatch_identity_requests() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl = controller(tmp.path());

        assert!(matches!(
            dispatch(&ctrl, CsiMessage::Probe).await,
            CsiMessage::ProbeResult(true)
        ));
        assert!(matches!(
            dispatch(&ctrl, CsiMessage::GetPluginInfo).await,
            CsiMessage::PluginInfoResponse(info) if info.name == crate::config::DRIVER_NAME
        ));
    }

    #[tokio::test]
    async fn dispatch_maps_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl = controller(tmp.path());

        let resp = dispatch(&ctrl, CsiMessage::DeleteVolume(VolumeId::default())).await;
        assert!(matches!(resp, CsiMessage::Error(CsiError::InvalidArgument(_))));

        // A malformed id never reaches the mounter.
        let resp = dispatch(&ctrl, CsiMessage::DeleteVolume(VolumeId::from("a/b/c/d"))).await;
        assert!(matches!(resp, CsiMessage::Ok));

        let resp = dispatch(&ctrl, CsiMessage::ListVolumes).await;
        assert!(matches!(resp, CsiMessage::Error(CsiError::Unimplemented(_))));
    }

    #[tokio::test]
    async fn dispatch_rejects_response_variants() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl = controller(tmp.path());

        let resp = dispatch(&ctrl, CsiMessage::Capacity(1)).await;
        assert!(matches!(resp, CsiMessage::Error(CsiError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn dispatch_controller_capabilities() {
        let tmp = tempfile::tempdir().unwrap();
        let ctrl = controller(tmp.path());

        let resp = dispatch(&ctrl, CsiMessage::ControllerGetCapabilities).await;
        assert!(matches!(
            resp,
            CsiMessage::ControllerCapabilitiesResponse(caps)
                if caps == vec![ControllerServiceCapability::CreateDeleteVolume]
        ));
    }
}
