//! CSI error types.
//!
//! All errors in the `libnfscsi` crate are represented by the [`CsiError`]
//! enum, which derives [`thiserror::Error`] for ergonomic error handling and
//! also implements [`Serialize`]/[`Deserialize`] so errors can be carried
//! inside a [`CsiMessage`](crate::message::CsiMessage).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for CSI operations.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum CsiError {
    /// The caller supplied an invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A volume id did not decode into `server/baseDir/subDir`.
    #[error("volume id {id:?} unexpected format: {reason}")]
    MalformedIdentifier {
        /// The offending identifier.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The requested volume was not found.
    #[error("volume {0} not found")]
    VolumeNotFound(String),

    /// Attaching the remote export failed.
    #[error("mount failed at {path}: {reason}")]
    MountFailed {
        /// Local path where the mount was attempted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// Detaching the remote export failed.
    #[error("unmount failed at {path}: {reason}")]
    UnmountFailed {
        /// Local path where the unmount was attempted.
        path: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// The operation is not supported by this driver.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    /// An unclassified internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse status classification of a [`CsiError`], following the CSI RPC
/// status codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    Internal,
    Unimplemented,
}

impl CsiError {
    /// Create a [`CsiError::InvalidArgument`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn invalid<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidArgument(e.to_string())
    }

    /// Create a [`CsiError::Internal`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }

    /// Status code reported to the caller for this error.
    pub fn code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) | Self::MalformedIdentifier { .. } => {
                StatusCode::InvalidArgument
            }
            Self::VolumeNotFound(_) => StatusCode::NotFound,
            Self::MountFailed { .. } | Self::UnmountFailed { .. } | Self::Internal(_) => {
                StatusCode::Internal
            }
            Self::Unimplemented(_) => StatusCode::Unimplemented,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CsiError::MalformedIdentifier {
            id: "a/b".into(),
            reason: "got 2 tokens".into(),
        };
        assert_eq!(
            err.to_string(),
            "volume id \"a/b\" unexpected format: got 2 tokens"
        );
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            CsiError::invalid("name must be provided").code(),
            StatusCode::InvalidArgument
        );
        assert_eq!(
            CsiError::MountFailed {
                path: "/mnt/x".into(),
                reason: "EACCES".into(),
            }
            .code(),
            StatusCode::Internal
        );
        assert_eq!(
            CsiError::VolumeNotFound("v".into()).code(),
            StatusCode::NotFound
        );
        assert_eq!(
            CsiError::Unimplemented("ListVolumes".into()).code(),
            StatusCode::Unimplemented
        );
    }

    #[test]
    fn error_serde_roundtrip() {
        let err = CsiError::UnmountFailed {
            path: "/mnt/test".into(),
            reason: "device busy".into(),
        };
        let json = serde_json::to_string(&err).expect("serialize");
        let de: CsiError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(err, de);
    }
}
