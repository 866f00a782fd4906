use rigkit_animation_core::{AttrValue, AttributeKind, Easing, KeySnapshot};
use rigkit_api_core::{BoneId, Frame, Invalid, ObjectId, RigError};
use rigkit_posture_core::Document;
use rigkit_rig_core::BonePose;

use super::not_applied;
use crate::command::Command;

/// Key `value` at `frame`; an existing key there is replaced and comes back
/// on revert.
#[derive(Debug)]
pub struct PushKey {
    object: ObjectId,
    frame: Frame,
    value: AttrValue,
    easing: Easing,
    replaced: Option<KeySnapshot>,
}

impl PushKey {
    pub fn new(object: ObjectId, frame: Frame, value: AttrValue, easing: Easing) -> Self {
        Self {
            object,
            frame,
            value,
            easing,
            replaced: None,
        }
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }
}

impl Command for PushKey {
    fn label(&self) -> String {
        format!("push {} key at {}", self.value.kind(), self.frame)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.replaced = doc.push_key(self.object, self.frame, self.value.clone(), self.easing)?;
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let timeline = &mut doc.object_mut(self.object)?.timeline;
        match self.replaced.take() {
            Some(old) => {
                timeline.push_key(old.frame, old.value, old.easing);
            }
            None => {
                timeline.delete_key(self.value.kind(), self.frame)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct DeleteKey {
    object: ObjectId,
    kind: AttributeKind,
    frame: Frame,
    removed: Option<KeySnapshot>,
}

impl DeleteKey {
    pub fn new(object: ObjectId, kind: AttributeKind, frame: Frame) -> Self {
        Self {
            object,
            kind,
            frame,
            removed: None,
        }
    }
}

impl Command for DeleteKey {
    fn label(&self) -> String {
        format!("delete {} key at {}", self.kind, self.frame)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.removed = Some(doc.delete_key(self.object, self.kind, self.frame)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let key = self.removed.take().ok_or_else(|| not_applied("delete key"))?;
        doc.object_mut(self.object)?
            .timeline
            .push_key(key.frame, key.value, key.easing);
        Ok(())
    }
}

/// Move a key to another frame. Without `overwrite` an occupied target frame
/// is rejected.
#[derive(Debug)]
pub struct MoveKey {
    object: ObjectId,
    kind: AttributeKind,
    from: Frame,
    to: Frame,
    overwrite: bool,
    overwritten: Option<KeySnapshot>,
}

impl MoveKey {
    pub fn new(object: ObjectId, kind: AttributeKind, from: Frame, to: Frame, overwrite: bool) -> Self {
        Self {
            object,
            kind,
            from,
            to,
            overwrite,
            overwritten: None,
        }
    }
}

impl Command for MoveKey {
    fn label(&self) -> String {
        format!("move {} key {} -> {}", self.kind, self.from, self.to)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.overwritten = doc.move_key(self.object, self.kind, self.from, self.to, self.overwrite)?;
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let timeline = &mut doc.object_mut(self.object)?.timeline;
        timeline.move_key(self.kind, self.to, self.from, false)?;
        if let Some(old) = self.overwritten.take() {
            timeline.push_key(old.frame, old.value, old.easing);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetKeyEasing {
    object: ObjectId,
    kind: AttributeKind,
    frame: Frame,
    easing: Easing,
    old: Option<Easing>,
}

impl SetKeyEasing {
    pub fn new(object: ObjectId, kind: AttributeKind, frame: Frame, easing: Easing) -> Self {
        Self {
            object,
            kind,
            frame,
            easing,
            old: None,
        }
    }
}

impl Command for SetKeyEasing {
    fn label(&self) -> String {
        format!("set {} easing at {}", self.kind, self.frame)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(doc.set_easing(self.object, self.kind, self.frame, self.easing)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set easing"))?;
        doc.object_mut(self.object)?
            .timeline
            .set_easing(self.kind, self.frame, old)?;
        Ok(())
    }
}

/// Replace the unkeyed value of one attribute.
#[derive(Debug)]
pub struct SetDefault {
    object: ObjectId,
    value: AttrValue,
    old: Option<AttrValue>,
}

impl SetDefault {
    pub fn new(object: ObjectId, value: AttrValue) -> Self {
        Self {
            object,
            value,
            old: None,
        }
    }
}

impl Command for SetDefault {
    fn label(&self) -> String {
        format!("set {} default", self.value.kind())
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(doc.set_default(self.object, self.value.clone())?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set default"))?;
        doc.object_mut(self.object)?.timeline.set_default(old);
        Ok(())
    }
}

/// Set (or clear, with `None`) one bone's entry in a pose key, or in the pose
/// default when `frame` is `None`.
#[derive(Debug)]
pub struct SetBonePose {
    object: ObjectId,
    frame: Option<Frame>,
    bone: BoneId,
    pose: Option<BonePose>,
    old: Option<Option<BonePose>>,
}

impl SetBonePose {
    pub fn new(object: ObjectId, frame: Option<Frame>, bone: BoneId, pose: Option<BonePose>) -> Self {
        Self {
            object,
            frame,
            bone,
            pose,
            old: None,
        }
    }

    fn swap(&self, doc: &mut Document, pose: Option<BonePose>) -> Result<Option<BonePose>, RigError> {
        let object = doc.object_mut(self.object)?;
        if pose.is_some() && !object.rig.as_ref().is_some_and(|r| r.contains(self.bone)) {
            return Err(Invalid::MissingBone(self.bone).into());
        }
        let value = object
            .timeline
            .pose
            .target_mut(self.frame)
            .ok_or(Invalid::KeyNotFound {
                frame: self.frame.unwrap_or_default(),
            })?;
        Ok(value.set(self.bone, pose))
    }
}

impl Command for SetBonePose {
    fn label(&self) -> String {
        match self.pose {
            Some(_) => format!("pose {}", self.bone),
            None => format!("clear pose of {}", self.bone),
        }
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(self.swap(doc, self.pose)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set bone pose"))?;
        // restoring an entry for a bone deleted since is still exact
        let object = doc.object_mut(self.object)?;
        if let Some(value) = object.timeline.pose.target_mut(self.frame) {
            value.set(self.bone, old);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn push_over_existing_key_restores_it() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        doc.push_key(id, 4, AttrValue::Move(Vec2::ONE), Easing::LINEAR).unwrap();
        let before = doc.clone();

        let mut cmd = PushKey::new(id, 4, AttrValue::Move(Vec2::ZERO), Easing::HOLD);
        cmd.apply(&mut doc).unwrap();
        assert_eq!(doc.object(id).unwrap().timeline.movement.len(), 1);
        cmd.revert(&mut doc).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn move_onto_occupied_frame_needs_overwrite() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        doc.push_key(id, 1, AttrValue::Depth(1.0), Easing::LINEAR).unwrap();
        doc.push_key(id, 2, AttrValue::Depth(2.0), Easing::LINEAR).unwrap();
        let before = doc.clone();

        let mut refused = MoveKey::new(id, AttributeKind::Depth, 1, 2, false);
        let err = refused.apply(&mut doc).unwrap_err();
        assert_eq!(err.invalid(), Some(&Invalid::FrameOccupied { frame: 2 }));
        assert_eq!(doc, before);

        let mut forced = MoveKey::new(id, AttributeKind::Depth, 1, 2, true);
        forced.apply(&mut doc).unwrap();
        assert_eq!(doc.object(id).unwrap().timeline.key_frames(AttributeKind::Depth), vec![2]);
        forced.revert(&mut doc).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn bone_pose_needs_a_key() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let mut cmd = SetBonePose::new(id, Some(3), BoneId(0), None);
        assert!(cmd.apply(&mut doc).is_err());
    }
}
