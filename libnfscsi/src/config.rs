//! Driver and controller configuration.
//!
//! [`DriverConfig`] is built once at startup and shared read-only (behind an
//! `Arc`) by every service.  [`ControllerConfig`] holds the provisioner's
//! local settings.
//!
//! Environment variables read by [`ControllerConfig::from_env`]:
//! - `NFS_CSI_WORKING_MOUNT_DIR`: directory under which exports are
//!   temporarily mounted.  Defaults to `/tmp/nfs-csi/controller`.
//! - `NFS_CSI_MOUNT_OPTIONS`: comma-separated NFS mount options used for
//!   those temporary mounts, e.g. `nfsvers=4.1,hard`.  Defaults to none.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{AccessMode, ControllerServiceCapability};

/// Name the plugin reports through `GetPluginInfo`.
pub const DRIVER_NAME: &str = "nfs.csi.rk8s.io";

pub const ENV_WORKING_MOUNT_DIR: &str = "NFS_CSI_WORKING_MOUNT_DIR";
pub const ENV_MOUNT_OPTIONS: &str = "NFS_CSI_MOUNT_OPTIONS";

const DEFAULT_WORKING_MOUNT_DIR: &str = "/tmp/nfs-csi/controller";

/// Process-wide, immutable driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriverConfig {
    pub name: String,
    pub vendor_version: String,
    /// Access modes accepted by the capability validator.
    pub access_modes: BTreeSet<AccessMode>,
    /// Capabilities advertised through `ControllerGetCapabilities`.
    pub controller_capabilities: Vec<ControllerServiceCapability>,
}

impl DriverConfig {
    /// Default NFS driver configuration: every access mode is supported and
    /// only create/delete is advertised.
    pub fn new() -> Self {
        Self {
            name: DRIVER_NAME.to_owned(),
            vendor_version: env!("CARGO_PKG_VERSION").to_owned(),
            access_modes: BTreeSet::from([
                AccessMode::SingleNodeWriter,
                AccessMode::SingleNodeReaderOnly,
                AccessMode::MultiNodeReaderOnly,
                AccessMode::MultiNodeSingleWriter,
                AccessMode::MultiNodeMultiWriter,
            ]),
            controller_capabilities: vec![ControllerServiceCapability::CreateDeleteVolume],
        }
    }

    pub fn with_access_modes(mut self, modes: impl IntoIterator<Item = AccessMode>) -> Self {
        self.access_modes = modes.into_iter().collect();
        self
    }

    pub fn with_controller_capabilities(
        mut self,
        caps: impl IntoIterator<Item = ControllerServiceCapability>,
    ) -> Self {
        self.controller_capabilities = caps.into_iter().collect();
        self
    }

    pub fn supports(&self, mode: AccessMode) -> bool {
        self.access_modes.contains(&mode)
    }

    /// Log the driver identity, enabled access modes and controller
    /// capabilities.  Call once at startup.
    pub fn log_enabled(&self) {
        info!(driver = %self.name, version = %self.vendor_version, "driver configured");
        for mode in &self.access_modes {
            info!(%mode, "enabling volume access mode");
        }
        for cap in &self.controller_capabilities {
            info!(%cap, "enabling controller service capability");
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings for the provisioning controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Working directory where exports are temporarily mounted.
    pub working_mount_dir: PathBuf,
    /// NFS mount options for the temporary mounts.
    #[serde(default)]
    pub mount_options: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            working_mount_dir: PathBuf::from(DEFAULT_WORKING_MOUNT_DIR),
            mount_options: Vec::new(),
        }
    }
}

impl ControllerConfig {
    pub fn new(working_mount_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_mount_dir: working_mount_dir.into(),
            mount_options: Vec::new(),
        }
    }

    /// Read overrides from the environment, falling back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_WORKING_MOUNT_DIR).filter(|d| !d.is_empty()) {
            config.working_mount_dir = PathBuf::from(dir);
        }
        if let Some(opts) = lookup(ENV_MOUNT_OPTIONS) {
            config.mount_options = opts
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    use super::*;

    #[test]
    fn default_driver_supports_all_modes() {
        let config = DriverConfig::new();
        assert_eq!(config.name, DRIVER_NAME);
        assert_eq!(config.access_modes.len(), 5);
        assert!(config.supports(AccessMode::MultiNodeMultiWriter));
        assert_eq!(
            config.controller_capabilities,
            vec![ControllerServiceCapability::CreateDeleteVolume]
        );
    }

    #[derive(Clone, Default)]
    struct CountEvents(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for CountEvents {
        fn on_event(&self, _event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn driver_logs_only_when_asked() {
        let events = CountEvents::default();
        let subscriber = tracing_subscriber::registry().with(events.clone());
        tracing::subscriber::with_default(subscriber, || {
            let config = DriverConfig::new();
            assert_eq!(events.0.load(Ordering::SeqCst), 0);

            config.log_enabled();
            // identity line + 5 access modes + 1 capability
            assert_eq!(events.0.load(Ordering::SeqCst), 7);
        });
    }

    #[test]
    fn restricted_access_modes() {
        let config = DriverConfig::new().with_access_modes([AccessMode::SingleNodeWriter]);
        assert_eq!(DriverConfig::default().access_modes.len(), 5);
        assert!(config.supports(AccessMode::SingleNodeWriter));
        assert!(!config.supports(AccessMode::MultiNodeMultiWriter));
    }

    #[test]
    fn controller_config_from_lookup() {
        let env = HashMap::from([
            (ENV_WORKING_MOUNT_DIR, "/var/lib/nfs-csi"),
            (ENV_MOUNT_OPTIONS, "nfsvers=4.1, hard,,"),
        ]);
        let config = ControllerConfig::from_lookup(|k| env.get(k).map(|v| (*v).to_owned()));
        assert_eq!(config.working_mount_dir, PathBuf::from("/var/lib/nfs-csi"));
        assert_eq!(config.mount_options, vec!["nfsvers=4.1", "hard"]);
    }

    #[test]
    fn controller_config_defaults() {
        let config = ControllerConfig::from_lookup(|_| None);
        assert_eq!(config, ControllerConfig::default());
        assert_eq!(
            config.working_mount_dir,
            PathBuf::from(DEFAULT_WORKING_MOUNT_DIR)
        );
    }

    #[test]
    fn driver_config_serde_roundtrip() {
        let config = DriverConfig::new();
        let json = serde_json::to_string(&config).expect("serialize");
        let de: DriverConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(config, de);
    }
}
