//! One keyed attribute per kind for an animatable object.

use glam::Vec2;
use rigkit_api_core::{BoneId, Frame, RigError};
use rigkit_rig_core::{BonePose, FfdDisplacement, MeshTopology, PoseValue};
use serde::{Deserialize, Serialize};

use crate::easing::Easing;
use crate::keyframe::{KeyedAttribute, Keyframe};
use crate::value::{AttrValue, AttributeKind, ImageValue};

/// A key lifted out of its typed attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeySnapshot {
    pub frame: Frame,
    pub value: AttrValue,
    pub easing: Easing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectTimeline {
    pub movement: KeyedAttribute<Vec2>,
    pub rotation: KeyedAttribute<f32>,
    pub scaling: KeyedAttribute<Vec2>,
    pub depth: KeyedAttribute<f32>,
    pub opacity: KeyedAttribute<f32>,
    pub pose: KeyedAttribute<PoseValue>,
    pub mesh: KeyedAttribute<MeshTopology>,
    pub ffd: KeyedAttribute<FfdDisplacement>,
    pub image: KeyedAttribute<ImageValue>,
}

impl Default for ObjectTimeline {
    fn default() -> Self {
        Self {
            movement: KeyedAttribute::new(Vec2::ZERO),
            rotation: KeyedAttribute::new(0.0),
            scaling: KeyedAttribute::new(Vec2::ONE),
            depth: KeyedAttribute::new(0.0),
            opacity: KeyedAttribute::new(1.0),
            pose: KeyedAttribute::new(PoseValue::new()),
            mesh: KeyedAttribute::new(MeshTopology::new()),
            ffd: KeyedAttribute::new(FfdDisplacement::default()),
            image: KeyedAttribute::new(ImageValue::default()),
        }
    }
}

/// Everything an object's timeline says about one frame. Stepped kinds are
/// borrowed.
#[derive(Clone, Debug, PartialEq)]
pub struct TimelineSample<'a> {
    pub frame: Frame,
    pub movement: Vec2,
    pub rotation: f32,
    pub scaling: Vec2,
    pub depth: f32,
    pub opacity: f32,
    pub pose: PoseValue,
    pub mesh: &'a MeshTopology,
    pub ffd: FfdDisplacement,
    pub image: &'a ImageValue,
}

fn snapshot<T>(key: Keyframe<T>, wrap: impl FnOnce(T) -> AttrValue) -> KeySnapshot {
    KeySnapshot {
        frame: key.frame,
        value: wrap(key.value),
        easing: key.easing,
    }
}

/// Generates the type-erased accessors, one match arm per attribute field.
macro_rules! erased_accessors {
    ($($field:ident => $variant:ident),* $(,)?) => {
        impl ObjectTimeline {
            pub fn sample(&self, kind: AttributeKind, frame: Frame) -> AttrValue {
                match kind {
                    $(AttributeKind::$variant => AttrValue::$variant(self.$field.sample(frame)),)*
                }
            }

            pub fn default_value(&self, kind: AttributeKind) -> AttrValue {
                match kind {
                    $(AttributeKind::$variant => AttrValue::$variant(self.$field.default_value().clone()),)*
                }
            }

            /// Replace the default of `value`'s kind. Returns the previous default.
            pub fn set_default(&mut self, value: AttrValue) -> AttrValue {
                match value {
                    $(AttrValue::$variant(v) => AttrValue::$variant(self.$field.set_default(v)),)*
                }
            }

            /// Push a key of `value`'s kind; a key at the same frame is
            /// replaced and returned.
            pub fn push_key(&mut self, frame: Frame, value: AttrValue, easing: Easing) -> Option<KeySnapshot> {
                match value {
                    $(AttrValue::$variant(v) => self
                        .$field
                        .push_key(frame, v, easing)
                        .map(|k| snapshot(k, AttrValue::$variant)),)*
                }
            }

            pub fn key(&self, kind: AttributeKind, frame: Frame) -> Option<KeySnapshot> {
                match kind {
                    $(AttributeKind::$variant => self
                        .$field
                        .key(frame)
                        .cloned()
                        .map(|k| snapshot(k, AttrValue::$variant)),)*
                }
            }

            pub fn delete_key(&mut self, kind: AttributeKind, frame: Frame) -> Result<KeySnapshot, RigError> {
                match kind {
                    $(AttributeKind::$variant => self
                        .$field
                        .delete_key(frame)
                        .map(|k| snapshot(k, AttrValue::$variant)),)*
                }
            }

            pub fn move_key(
                &mut self,
                kind: AttributeKind,
                from: Frame,
                to: Frame,
                overwrite: bool,
            ) -> Result<Option<KeySnapshot>, RigError> {
                match kind {
                    $(AttributeKind::$variant => Ok(self
                        .$field
                        .move_key(from, to, overwrite)?
                        .map(|k| snapshot(k, AttrValue::$variant))),)*
                }
            }

            pub fn set_easing(&mut self, kind: AttributeKind, frame: Frame, easing: Easing) -> Result<Easing, RigError> {
                match kind {
                    $(AttributeKind::$variant => self.$field.set_easing(frame, easing),)*
                }
            }

            pub fn has_key(&self, kind: AttributeKind, frame: Frame) -> bool {
                match kind {
                    $(AttributeKind::$variant => self.$field.has_key(frame),)*
                }
            }

            pub fn key_frames(&self, kind: AttributeKind) -> Vec<Frame> {
                match kind {
                    $(AttributeKind::$variant => self.$field.key_frames(),)*
                }
            }

            pub fn key_count(&self, kind: AttributeKind) -> usize {
                match kind {
                    $(AttributeKind::$variant => self.$field.len(),)*
                }
            }

            fn prev_key_of(&self, kind: AttributeKind, frame: Frame) -> Option<Frame> {
                match kind {
                    $(AttributeKind::$variant => self.$field.prev_key_frame(frame),)*
                }
            }

            fn next_key_of(&self, kind: AttributeKind, frame: Frame) -> Option<Frame> {
                match kind {
                    $(AttributeKind::$variant => self.$field.next_key_frame(frame),)*
                }
            }

            fn last_frame_of(&self, kind: AttributeKind) -> Option<Frame> {
                match kind {
                    $(AttributeKind::$variant => self.$field.last_frame(),)*
                }
            }

            pub fn validate(&self) -> Result<(), RigError> {
                $(self.$field.validate()?;)*
                Ok(())
            }
        }
    };
}

erased_accessors! {
    movement => Move,
    rotation => Rotate,
    scaling => Scale,
    depth => Depth,
    opacity => Opacity,
    pose => Pose,
    mesh => Mesh,
    ffd => Ffd,
    image => Image,
}

impl ObjectTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeline whose default mesh is `mesh`.
    pub fn with_mesh(mesh: MeshTopology) -> Self {
        let mut timeline = Self::default();
        timeline.mesh.set_default(mesh);
        timeline
    }

    pub fn sample_all(&self, frame: Frame) -> TimelineSample<'_> {
        TimelineSample {
            frame,
            movement: self.movement.sample(frame),
            rotation: self.rotation.sample(frame),
            scaling: self.scaling.sample(frame),
            depth: self.depth.sample(frame),
            opacity: self.opacity.sample(frame).clamp(0.0, 1.0),
            pose: self.pose.sample(frame),
            mesh: self.mesh.hold_value(frame),
            ffd: self.ffd.sample(frame),
            image: self.image.hold_value(frame),
        }
    }

    /// Nearest key before `frame` across the given kinds.
    pub fn prev_key_frame(&self, kinds: &[AttributeKind], frame: Frame) -> Option<Frame> {
        kinds.iter().filter_map(|k| self.prev_key_of(*k, frame)).max()
    }

    /// Nearest key after `frame` across the given kinds.
    pub fn next_key_frame(&self, kinds: &[AttributeKind], frame: Frame) -> Option<Frame> {
        kinds.iter().filter_map(|k| self.next_key_of(*k, frame)).min()
    }

    pub fn last_key_frame(&self) -> Option<Frame> {
        AttributeKind::ALL
            .iter()
            .filter_map(|k| self.last_frame_of(*k))
            .max()
    }

    /// Drop `bone` from the pose default and every pose key. Returns the
    /// removed entries keyed by frame (`None` is the default).
    pub fn strip_bone(&mut self, bone: BoneId) -> Vec<(Option<Frame>, BonePose)> {
        let mut removed = Vec::new();
        self.pose.for_each_value_mut(|frame, pose| {
            if let Some(old) = pose.set(bone, None) {
                removed.push((frame, old));
            }
        });
        removed
    }

    pub fn restore_bone(&mut self, bone: BoneId, entries: &[(Option<Frame>, BonePose)]) {
        for (frame, pose) in entries {
            if let Some(value) = self.pose.target_mut(*frame) {
                value.set(bone, Some(*pose));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erased_push_and_sample_agree_with_typed() {
        let mut tl = ObjectTimeline::new();
        assert!(tl.push_key(4, AttrValue::Rotate(1.0), Easing::LINEAR).is_none());
        tl.push_key(8, AttrValue::Rotate(3.0), Easing::LINEAR);
        assert_eq!(tl.sample(AttributeKind::Rotate, 6), AttrValue::Rotate(2.0));
        assert_eq!(tl.rotation.sample(6), 2.0);
        assert_eq!(tl.sample(AttributeKind::Opacity, 6), AttrValue::Opacity(1.0));
    }

    #[test]
    fn image_keys_step() {
        let mut tl = ObjectTimeline::new();
        tl.push_key(0, AttrValue::Image(ImageValue::new("a.png")), Easing::LINEAR);
        tl.push_key(10, AttrValue::Image(ImageValue::new("b.png")), Easing::LINEAR);
        let s = tl.sample_all(9);
        assert_eq!(s.image, &ImageValue::new("a.png"));
        assert_eq!(tl.sample_all(10).image, &ImageValue::new("b.png"));
    }

    #[test]
    fn navigation_spans_kinds() {
        let mut tl = ObjectTimeline::new();
        tl.push_key(5, AttrValue::Move(Vec2::ONE), Easing::LINEAR);
        tl.push_key(12, AttrValue::Depth(2.0), Easing::LINEAR);
        let all = AttributeKind::ALL;
        assert_eq!(tl.next_key_frame(&all, 0), Some(5));
        assert_eq!(tl.next_key_frame(&all, 5), Some(12));
        assert_eq!(tl.prev_key_frame(&all, 12), Some(5));
        assert_eq!(tl.next_key_frame(&[AttributeKind::Move], 5), None);
        assert_eq!(tl.last_key_frame(), Some(12));
    }

    #[test]
    fn strip_and_restore_bone() {
        let b = BoneId(3);
        let mut tl = ObjectTimeline::new();
        tl.push_key(
            2,
            AttrValue::Pose(PoseValue::new().with(b, BonePose::rotation(0.5))),
            Easing::LINEAR,
        );
        let before = tl.clone();
        let removed = tl.strip_bone(b);
        assert_eq!(removed.len(), 1);
        assert!(tl.pose.key(2).unwrap().value.is_empty());
        tl.restore_bone(b, &removed);
        assert_eq!(tl, before);
    }
}
