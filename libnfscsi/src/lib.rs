//! # libnfscsi — NFS volume provisioner for RK8s CSI
//!
//! `libnfscsi` implements the Controller and Identity halves of a
//! [Container Storage Interface][csi] plugin whose volumes are
//! sub-directories of a shared NFS export.  A volume id encodes the export
//! and directory (`server/baseDir/subDir`), so the controller keeps no state
//! of its own.  It follows the RK8s conventions (Tokio async runtime,
//! `tracing` for observability, `thiserror` for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: `VolumeId`, capabilities, requests. |
//! | [`error`] | [`CsiError`] enum covering all failure modes. |
//! | [`volume`] | [`NfsVolume`] and the volume id codec. |
//! | [`config`] | [`DriverConfig`] and [`ControllerConfig`]. |
//! | [`capability`] | Volume capability validation. |
//! | [`mounter`] | [`Mounter`] trait and the host NFS implementation. |
//! | [`identity`] | [`CsiIdentity`] trait — plugin discovery & health. |
//! | [`controller`] | [`CsiController`] trait — volume create/delete. |
//! | [`message`] | [`CsiMessage`] protocol envelope and dispatch. |
//! | [`backend`] | The NFS provisioning backend. |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod backend;
pub mod capability;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod message;
pub mod mounter;
pub mod types;
pub mod volume;

// Re-export the most commonly used items at crate root for convenience.
pub use backend::nfs::NfsController;
pub use config::{ControllerConfig, DriverConfig};
pub use controller::CsiController;
pub use error::{CsiError, StatusCode};
pub use identity::CsiIdentity;
pub use message::CsiMessage;
pub use mounter::{Mounter, NfsMounter};
pub use types::*;
pub use volume::NfsVolume;
