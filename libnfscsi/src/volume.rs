//! NFS volume identity.
//!
//! A provisioned volume is a sub-directory one level below a base directory
//! on an NFS export.  Nothing about it is stored by the driver: the volume id
//! carries everything needed to find it again.
//!
//! # Id format
//!
//! ```text
//! {server}/{baseDir}/{subDir}
//! ```
//!
//! Exactly three non-empty segments with no escaping.  Ids are persisted by
//! the orchestrator, so the segment order and separator must never change.
//! The format limits `baseDir` and `subDir` to a single directory level each.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CsiError;
use crate::types::{Volume, VolumeId};

/// `CreateVolume` parameter: address of the NFS server.
pub const PARAM_SERVER: &str = "server";
/// `CreateVolume` parameter: base directory to create volumes under.
///
/// Must be a direct child of the export root and is given without the
/// leading slash, e.g. `"base"` rather than `"/base"`.
pub const PARAM_BASE_DIR: &str = "base-dir";

/// Volume context key: address of the NFS server.
pub const ATTR_SERVER: &str = "server";
/// Volume context key: absolute path of the share on the server.
pub const ATTR_SHARE: &str = "share";

const ID_SEPARATOR: char = '/';

// Position of each element in the id.  New elements go at the end, before
// `ID_SEGMENTS`.
const ID_SERVER: usize = 0;
const ID_BASE_DIR: usize = 1;
const ID_SUB_DIR: usize = 2;
const ID_SEGMENTS: usize = 3;

/// Join the three segments into a volume id.
///
/// Callers guarantee no segment contains `/`.
pub fn encode(server: &str, base_dir: &str, sub_dir: &str) -> VolumeId {
    let mut elements = [""; ID_SEGMENTS];
    elements[ID_SERVER] = server;
    elements[ID_BASE_DIR] = base_dir;
    elements[ID_SUB_DIR] = sub_dir;
    VolumeId(elements.join("/"))
}

/// Split a volume id into `(server, base_dir, sub_dir)`.
pub fn decode(id: &str) -> Result<(String, String, String), CsiError> {
    let tokens: Vec<&str> = if id.is_empty() {
        Vec::new()
    } else {
        id.split(ID_SEPARATOR).collect()
    };

    if tokens.len() != ID_SEGMENTS {
        return Err(CsiError::MalformedIdentifier {
            id: id.to_owned(),
            reason: format!("got {} tokens", tokens.len()),
        });
    }
    if let Some(pos) = tokens.iter().position(|t| t.is_empty()) {
        return Err(CsiError::MalformedIdentifier {
            id: id.to_owned(),
            reason: format!("token {pos} is empty"),
        });
    }
    // `.` and `..` would escape the private mount path once joined.
    if let Some(pos) = tokens.iter().position(|t| is_dot_segment(t)) {
        return Err(CsiError::MalformedIdentifier {
            id: id.to_owned(),
            reason: format!("token {pos} is a relative path component"),
        });
    }

    Ok((
        tokens[ID_SERVER].to_owned(),
        tokens[ID_BASE_DIR].to_owned(),
        tokens[ID_SUB_DIR].to_owned(),
    ))
}

/// Internal representation of a volume created by the provisioner.
///
/// Immutable once built; `id` is always `encode(server, base_dir, sub_dir)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfsVolume {
    id: VolumeId,
    server: String,
    base_dir: String,
    sub_dir: String,
}

impl NfsVolume {
    pub fn new(
        server: impl Into<String>,
        base_dir: impl Into<String>,
        sub_dir: impl Into<String>,
    ) -> Self {
        let (server, base_dir, sub_dir) = (server.into(), base_dir.into(), sub_dir.into());
        let id = encode(&server, &base_dir, &sub_dir);
        Self {
            id,
            server,
            base_dir,
            sub_dir,
        }
    }

    /// Build a volume from `CreateVolume` parameters.
    ///
    /// Keys are matched case-insensitively.  Unknown keys are rejected, and
    /// both `server` and `base-dir` are required.
    pub fn from_parameters(
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<Self, CsiError> {
        let mut server = None;
        let mut base_dir = None;

        for (key, value) in params {
            match key.to_lowercase().as_str() {
                PARAM_SERVER => server = Some(value.as_str()),
                PARAM_BASE_DIR => base_dir = Some(value.as_str()),
                _ => return Err(CsiError::invalid(format!("invalid parameter {key:?}"))),
            }
        }

        let server = required(PARAM_SERVER, server)?;
        let base_dir = required(PARAM_BASE_DIR, base_dir)?;
        check_segment(PARAM_BASE_DIR, base_dir)?;
        check_segment(PARAM_SERVER, server)?;
        check_segment("name", name)?;

        Ok(Self::new(server, base_dir, name))
    }

    pub fn id(&self) -> &VolumeId {
        &self.id
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn sub_dir(&self) -> &str {
        &self.sub_dir
    }

    /// Remote path attached while provisioning: `/baseDir`.
    pub fn base_share_path(&self) -> String {
        format!("/{}", self.base_dir)
    }

    /// User-visible share path of the volume: `/baseDir/subDir`.
    pub fn share_path(&self) -> String {
        format!("/{}/{}", self.base_dir, self.sub_dir)
    }

    /// Convert into the [`Volume`] returned by `CreateVolume`.
    pub fn to_csi(&self, capacity_bytes: u64) -> Volume {
        Volume {
            volume_id: self.id.clone(),
            capacity_bytes,
            volume_context: HashMap::from([
                (ATTR_SERVER.to_owned(), self.server.clone()),
                (ATTR_SHARE.to_owned(), self.share_path()),
            ]),
        }
    }
}

impl FromStr for NfsVolume {
    type Err = CsiError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let (server, base_dir, sub_dir) = decode(id)?;
        Ok(Self {
            id: VolumeId(id.to_owned()),
            server,
            base_dir,
            sub_dir,
        })
    }
}

impl TryFrom<&VolumeId> for NfsVolume {
    type Error = CsiError;

    fn try_from(id: &VolumeId) -> Result<Self, Self::Error> {
        id.as_str().parse()
    }
}

impl fmt::Display for NfsVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.share_path())
    }
}

fn required<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str, CsiError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CsiError::invalid(format!("{key} is a required parameter"))),
    }
}

// Each segment must be a single plain directory name.
fn check_segment(what: &str, value: &str) -> Result<(), CsiError> {
    if value.contains(ID_SEPARATOR) {
        return Err(CsiError::invalid(format!(
            "{what} {value:?} must not contain {ID_SEPARATOR:?}"
        )));
    }
    if is_dot_segment(value) {
        return Err(CsiError::invalid(format!(
            "{what} {value:?} is not a directory name"
        )));
    }
    Ok(())
}

fn is_dot_segment(value: &str) -> bool {
    value == "." || value == ".."
}
