//! Bone records and posing values.

use std::collections::BTreeMap;

use glam::{Affine2, Vec2};
use rigkit_api_core::{lerp_f32, Blend, BoneId};
use serde::{Deserialize, Serialize};

/// Rest-pose placement of a bone relative to its parent (or to the object
/// origin for top bones).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneRest {
    /// Joint position in the parent bone's frame.
    pub offset: Vec2,
    /// Radians, relative to the parent bone's direction.
    pub angle: f32,
    pub length: f32,
}

impl BoneRest {
    pub fn new(offset: Vec2, angle: f32, length: f32) -> Self {
        Self {
            offset,
            angle,
            length,
        }
    }

    #[inline]
    pub fn local(&self) -> Affine2 {
        Affine2::from_angle_translation(self.angle, self.offset)
    }

    /// Local transform with a posing delta applied.
    #[inline]
    pub fn posed(&self, pose: &BonePose) -> Affine2 {
        Affine2::from_angle_translation(self.angle + pose.rotate, self.offset + pose.translate)
    }

    /// Express a world-space joint and direction as a rest relative to
    /// `parent_world`.
    pub fn from_world(parent_world: &Affine2, joint: Vec2, angle: f32, length: f32) -> Self {
        let inv = parent_world.inverse();
        let offset = inv.transform_point2(joint);
        let dir = inv.transform_vector2(Vec2::from_angle(angle));
        Self {
            offset,
            angle: dir.y.atan2(dir.x),
            length,
        }
    }
}

/// Radii (object units) around the bone segment used for automatic weights.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InfluenceRange {
    pub inner: f32,
    pub outer: f32,
}

impl InfluenceRange {
    pub fn new(inner: f32, outer: f32) -> Self {
        let inner = inner.max(0.0);
        Self {
            inner,
            outer: outer.max(inner),
        }
    }

    /// 1 inside `inner`, linear falloff to 0 at `outer`.
    pub fn weight_at(&self, distance: f32) -> f32 {
        if distance <= self.inner {
            1.0
        } else if distance >= self.outer {
            0.0
        } else {
            (self.outer - distance) / (self.outer - self.inner)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub id: BoneId,
    pub name: String,
    /// `None` for top bones.
    pub parent: Option<BoneId>,
    pub rest: BoneRest,
    #[serde(default)]
    pub range: Option<InfluenceRange>,
}

/// Posing delta for one bone: rotation primarily, optional translation pull.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BonePose {
    pub rotate: f32,
    #[serde(default)]
    pub translate: Vec2,
}

impl BonePose {
    pub const REST: BonePose = BonePose {
        rotate: 0.0,
        translate: Vec2::ZERO,
    };

    pub fn rotation(rotate: f32) -> Self {
        Self {
            rotate,
            translate: Vec2::ZERO,
        }
    }
}

/// Value of one posing key: a delta per bone. Bones without an entry are at
/// rest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseValue {
    pub bones: BTreeMap<BoneId, BonePose>,
}

impl PoseValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, bone: BoneId, pose: BonePose) -> Self {
        self.bones.insert(bone, pose);
        self
    }

    #[inline]
    pub fn get(&self, bone: BoneId) -> BonePose {
        self.bones.get(&bone).copied().unwrap_or(BonePose::REST)
    }

    pub fn set(&mut self, bone: BoneId, pose: Option<BonePose>) -> Option<BonePose> {
        match pose {
            Some(p) => self.bones.insert(bone, p),
            None => self.bones.remove(&bone),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

impl Blend for PoseValue {
    /// Per-bone blend over the union of both bone sets.
    fn blend(from: &Self, to: &Self, t: f32) -> Self {
        let mut out = PoseValue::new();
        for bone in from.bones.keys().chain(to.bones.keys()) {
            if out.bones.contains_key(bone) {
                continue;
            }
            let a = from.get(*bone);
            let b = to.get(*bone);
            out.bones.insert(
                *bone,
                BonePose {
                    rotate: lerp_f32(a.rotate, b.rotate, t),
                    translate: Vec2::blend(&a.translate, &b.translate, t),
                },
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_api_core::approx_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn from_world_inverts_local() {
        let parent = Affine2::from_angle_translation(FRAC_PI_2, Vec2::new(3.0, 4.0));
        let rest = BoneRest::from_world(&parent, Vec2::new(3.0, 9.0), FRAC_PI_2, 2.0);
        let world = parent * rest.local();
        assert!(approx_eq(world.translation, Vec2::new(3.0, 9.0), 1e-5));
        assert!(rest.angle.abs() < 1e-5);
    }

    #[test]
    fn pose_blend_treats_missing_bones_as_rest() {
        let a = PoseValue::new().with(BoneId(0), BonePose::rotation(1.0));
        let b = PoseValue::new().with(BoneId(1), BonePose::rotation(2.0));
        let mid = PoseValue::blend(&a, &b, 0.5);
        assert_eq!(mid.get(BoneId(0)).rotate, 0.5);
        assert_eq!(mid.get(BoneId(1)).rotate, 1.0);
        assert_eq!(mid.get(BoneId(7)), BonePose::REST);
    }

    #[test]
    fn range_weights() {
        let r = InfluenceRange::new(2.0, 4.0);
        assert_eq!(r.weight_at(1.0), 1.0);
        assert_eq!(r.weight_at(3.0), 0.5);
        assert_eq!(r.weight_at(5.0), 0.0);
    }
}
