//! Error taxonomy shared by every rigkit crate.
//!
//! Three categories exist:
//! - `StructuralInvalid`: a mutation would break a data-model invariant. It is
//!   rejected before any state changes.
//! - `PreconditionUnmet`: an editing mode was entered on an object lacking a
//!   capability it needs. Mode entry aborts without partial state.
//! - `ResourceUnavailable`: an external resource is missing. Playback keeps
//!   the last good value.
//!
//! None of them is fatal to a document; callers decide whether to re-prompt.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{BoneId, ObjectId, TriangleId, VertexId};
use crate::resource::ResourceId;
use crate::Frame;

/// The specific invariant a rejected mutation would have violated.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Invalid {
    #[error("no key at frame {frame}")]
    KeyNotFound { frame: Frame },

    #[error("frame {frame} already holds a key")]
    FrameOccupied { frame: Frame },

    #[error("frame {frame} is beyond the last frame {max}")]
    FrameOutOfRange { frame: Frame, max: Frame },

    #[error("triangle {0:?} is degenerate")]
    DegenerateTriangle([VertexId; 3]),

    #[error("triangle {0:?} already exists")]
    DuplicateTriangle([VertexId; 3]),

    #[error("vertex {0} does not exist")]
    MissingVertex(VertexId),

    #[error("vertex {0} already exists")]
    DuplicateVertex(VertexId),

    #[error("triangle {0} does not exist")]
    MissingTriangle(TriangleId),

    #[error("edge index {0} is not in 0..3")]
    InvalidEdge(u8),

    #[error("split position {0} is not strictly inside the edge")]
    InvalidSplit(f32),

    #[error("bone {0} does not exist")]
    MissingBone(BoneId),

    #[error("bone {0} already exists")]
    DuplicateBone(BoneId),

    #[error("parenting bone {bone} under {parent} would create a cycle")]
    CyclicParent { bone: BoneId, parent: BoneId },

    #[error("object {0} does not exist")]
    MissingObject(ObjectId),

    #[error("binding {object} to {owner} would create a cycle")]
    CyclicBinding { object: ObjectId, owner: ObjectId },

    #[error("weight {0} is outside [0, 1]")]
    WeightOutOfRange(f32),

    #[error("vertex {vertex} already has {max} bone influences")]
    InfluenceCapacity { vertex: VertexId, max: usize },

    #[error("displacement grid {found:?} does not match lattice {expected:?}")]
    LatticeMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("lattice cell size {0} must be positive and finite")]
    InvalidCellSize(f32),

    #[error("easing weight {0} is outside [0, 1]")]
    InvalidEasing(f32),

    #[error("{0}")]
    Other(String),
}

/// Structured report explaining why an editing mode could not be entered or
/// why a gesture could not start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Mode (or operation) that was refused.
    pub mode: String,
    /// Human-readable reason.
    pub reason: String,
}

impl Diagnostic {
    pub fn new(mode: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.mode, self.reason)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RigError {
    #[error("structural invalid: {0}")]
    StructuralInvalid(#[from] Invalid),

    #[error("precondition unmet: {0}")]
    PreconditionUnmet(Diagnostic),

    #[error("resource unavailable: {resource}")]
    ResourceUnavailable { resource: ResourceId },
}

impl RigError {
    pub fn precondition(mode: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PreconditionUnmet(Diagnostic::new(mode, reason))
    }

    /// Every rigkit error leaves the document usable.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Error category for logging and UI routing.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::StructuralInvalid(_) => "structural",
            Self::PreconditionUnmet(_) => "precondition",
            Self::ResourceUnavailable { .. } => "resource",
        }
    }

    /// The violated invariant, if this is a structural rejection.
    pub fn invalid(&self) -> Option<&Invalid> {
        match self {
            Self::StructuralInvalid(inv) => Some(inv),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        let err: RigError = Invalid::FrameOccupied { frame: 3 }.into();
        assert_eq!(err.category(), "structural");
        assert_eq!(
            err.invalid(),
            Some(&Invalid::FrameOccupied { frame: 3 })
        );

        let err = RigError::precondition("ffd-drag", "object has no mesh");
        assert_eq!(err.category(), "precondition");
        assert_eq!(
            err.to_string(),
            "precondition unmet: ffd-drag: object has no mesh"
        );
    }

    #[test]
    fn serialization() {
        let err = RigError::ResourceUnavailable {
            resource: ResourceId::new("img/arm.png"),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: RigError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
        assert!(back.is_recoverable());
    }
}
