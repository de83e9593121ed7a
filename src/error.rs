//! Error taxonomy of the engine.
//!
//! | Condition               | Raised by            | Policy                                  |
//! |-------------------------|----------------------|-----------------------------------------|
//! | `UnsupportedVersion`    | catalog / encoder    | fatal to the operation, never degraded  |
//! | `InvalidState`          | actor, pipeline      | contract violation, returned loudly     |
//! | `SkinError`             | skin resolver        | logged, cosmetic left unchanged         |
//! | `ClassificationError`   | interceptor          | logged at debug, frame passes through   |
//! | `Transport`             | observer connection  | returned to the caller                  |

use thiserror::Error;

use crate::protocol::{PacketKind, ProtocolVersion};

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("protocol {version} cannot encode {what}")]
    UnsupportedVersion {
        version: ProtocolVersion,
        what: String,
    },

    #[error("unknown protocol version '{0}'")]
    UnknownVersion(String),

    #[error("invalid state for {operation}: {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Skin(#[from] SkinError),
}

impl EngineError {
    pub fn unsupported(version: ProtocolVersion, what: impl Into<String>) -> Self {
        EngineError::UnsupportedVersion {
            version,
            what: what.into(),
        }
    }

    pub fn missing_layout(version: ProtocolVersion, kind: PacketKind) -> Self {
        Self::unsupported(version, format!("{:?} packets", kind))
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            EngineError::UnsupportedVersion { .. } | EngineError::UnknownVersion(_)
        )
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, EngineError::InvalidState { .. })
    }
}

/// Failure during the two-step skin lookup.
#[derive(Debug, Error)]
pub enum SkinError {
    #[error("'{0}' is not a valid account name")]
    InvalidName(String),

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("profile {0} carries no textures property")]
    MissingProperty(String),

    #[error("resolver task failed: {0}")]
    Join(String),
}

/// Why an inbound frame could not be classified. Never propagated past the
/// interceptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("frame is empty")]
    Empty,

    #[error("truncated {0}")]
    Truncated(&'static str),

    #[error("varint longer than 5 bytes")]
    VarIntTooLong,

    #[error("unknown use-entity action {0}")]
    UnknownAction(i32),
}
