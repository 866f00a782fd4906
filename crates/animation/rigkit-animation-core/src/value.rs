//! Type-erased attribute values so commands and events can address any
//! attribute kind uniformly.

use std::fmt;

use glam::Vec2;
use rigkit_api_core::{Blend, ResourceId};
use rigkit_rig_core::{FfdDisplacement, MeshTopology, PoseValue};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeKind {
    Move,
    Rotate,
    Scale,
    Depth,
    Opacity,
    Pose,
    Mesh,
    Ffd,
    Image,
}

impl AttributeKind {
    pub const ALL: [AttributeKind; 9] = [
        AttributeKind::Move,
        AttributeKind::Rotate,
        AttributeKind::Scale,
        AttributeKind::Depth,
        AttributeKind::Opacity,
        AttributeKind::Pose,
        AttributeKind::Mesh,
        AttributeKind::Ffd,
        AttributeKind::Image,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AttributeKind::Move => "move",
            AttributeKind::Rotate => "rotate",
            AttributeKind::Scale => "scale",
            AttributeKind::Depth => "depth",
            AttributeKind::Opacity => "opacity",
            AttributeKind::Pose => "pose",
            AttributeKind::Mesh => "mesh",
            AttributeKind::Ffd => "ffd",
            AttributeKind::Image => "image",
        }
    }

    /// Kinds whose samples hold the earlier key instead of blending.
    pub fn is_stepped(self) -> bool {
        matches!(self, AttributeKind::Mesh | AttributeKind::Image)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Image key payload: an opaque resource handle and a placement offset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageValue {
    pub resource: Option<ResourceId>,
    #[serde(default)]
    pub offset: Vec2,
}

impl ImageValue {
    pub fn new(resource: impl Into<ResourceId>) -> Self {
        Self {
            resource: Some(resource.into()),
            offset: Vec2::ZERO,
        }
    }
}

impl Blend for ImageValue {
    fn blend(from: &Self, _to: &Self, _t: f32) -> Self {
        from.clone()
    }

    fn is_stepped() -> bool {
        true
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum AttrValue {
    Move(Vec2),
    /// Radians.
    Rotate(f32),
    Scale(Vec2),
    Depth(f32),
    Opacity(f32),
    Pose(PoseValue),
    Mesh(MeshTopology),
    Ffd(FfdDisplacement),
    Image(ImageValue),
}

impl AttrValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttrValue::Move(_) => AttributeKind::Move,
            AttrValue::Rotate(_) => AttributeKind::Rotate,
            AttrValue::Scale(_) => AttributeKind::Scale,
            AttrValue::Depth(_) => AttributeKind::Depth,
            AttrValue::Opacity(_) => AttributeKind::Opacity,
            AttrValue::Pose(_) => AttributeKind::Pose,
            AttrValue::Mesh(_) => AttributeKind::Mesh,
            AttrValue::Ffd(_) => AttributeKind::Ffd,
            AttrValue::Image(_) => AttributeKind::Image,
        }
    }
}
