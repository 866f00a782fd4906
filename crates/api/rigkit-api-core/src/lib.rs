//! rigkit-api-core: shared contracts for the rigkit posture engine.
//!
//! Holds the pieces every other rigkit crate agrees on: stable ids, the frame
//! unit, the error taxonomy, the `Blend` interpolation contract and the rigid
//! 2D transform used for object SRT.

pub mod blend;
pub mod error;
pub mod ids;
pub mod resource;
pub mod transform;

pub use blend::{lerp_f32, Blend};
pub use error::{Diagnostic, Invalid, RigError};
pub use ids::{BoneId, IdAllocator, ObjectId, TriangleId, VertexId};
pub use resource::ResourceId;
pub use transform::{approx_eq, rotation_about, Srt};

pub use glam::{Affine2, Vec2};

/// Integer frame index; the unit of keyframe placement and playback.
pub type Frame = u32;
