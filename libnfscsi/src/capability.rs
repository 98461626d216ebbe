//! Volume capability validation.
//!
//! NFS volumes are always consumed as mounted filesystems, so only mount
//! access types are accepted, and only with an access mode listed in the
//! [`DriverConfig`].

use crate::config::DriverConfig;
use crate::error::CsiError;
use crate::types::{AccessType, VolumeCapability};

/// Validate every requested capability.  The list must not be empty.
pub fn validate_volume_capabilities(
    config: &DriverConfig,
    caps: &[Option<VolumeCapability>],
) -> Result<(), CsiError> {
    if caps.is_empty() {
        return Err(CsiError::invalid("volume capabilities must be provided"));
    }
    caps.iter()
        .try_for_each(|c| validate_volume_capability(config, c.as_ref()))
}

/// Validate a single capability.
pub fn validate_volume_capability(
    config: &DriverConfig,
    cap: Option<&VolumeCapability>,
) -> Result<(), CsiError> {
    let cap = cap.ok_or_else(|| CsiError::invalid("volume capability must be provided"))?;

    let mode = cap
        .access_mode
        .ok_or_else(|| CsiError::invalid("volume capability access mode not set"))?;
    if !config.supports(mode) {
        return Err(CsiError::invalid(format!(
            "driver does not support access mode: {mode}"
        )));
    }

    match &cap.access_type {
        None => Err(CsiError::invalid("volume capability access type not set")),
        Some(AccessType::Block) => Err(CsiError::invalid(
            "driver only supports mount access type volume capability",
        )),
        // fs_type and mount flags are accepted as-is.
        Some(AccessType::Mount(_)) => Ok(()),
    }
}
