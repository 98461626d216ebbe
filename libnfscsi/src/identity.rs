//! CSI Identity service trait.
//!
//! Orchestrators call the Identity service before anything else to learn the
//! driver name and whether a Controller service is offered.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{PluginCapability, PluginInfo};

/// Identity service — plugin discovery and health probing.
#[async_trait]
pub trait CsiIdentity: Send + Sync {
    /// Driver name and version, taken from the [`DriverConfig`](crate::DriverConfig).
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError>;

    /// Readiness probe.  `Ok(false)` means the plugin is up but cannot
    /// serve requests yet.
    async fn probe(&self) -> Result<bool, CsiError>;

    /// Services offered by this plugin.
    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError>;
}
