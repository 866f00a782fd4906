use glam::Vec2;
use rigkit_api_core::{BoneId, ObjectId, RigError};
use rigkit_posture_core::{Document, RemovedBoneRecord};
use rigkit_rig_core::{BoneRest, BoneRig, InfluenceRange, RemovedBone};

use super::not_applied;
use crate::command::Command;

fn rig_mut(doc: &mut Document, object: ObjectId) -> Result<&mut BoneRig, RigError> {
    doc.object_mut(object)?
        .rig
        .as_mut()
        .ok_or_else(|| RigError::precondition("bone", format!("{object} has no bones")))
}

/// Add a bone, creating the object's rig if it has none.
#[derive(Debug)]
pub struct AddBone {
    object: ObjectId,
    name: String,
    parent: Option<BoneId>,
    rest: BoneRest,
    created: Option<BoneId>,
    created_rig: bool,
    removed: Option<RemovedBone>,
}

impl AddBone {
    pub fn new(object: ObjectId, name: impl Into<String>, parent: Option<BoneId>, rest: BoneRest) -> Self {
        Self {
            object,
            name: name.into(),
            parent,
            rest,
            created: None,
            created_rig: false,
            removed: None,
        }
    }

    pub fn bone(&self) -> Option<BoneId> {
        self.created
    }
}

impl Command for AddBone {
    fn label(&self) -> String {
        format!("add bone '{}'", self.name)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let object = doc.object_mut(self.object)?;
        if let Some(removed) = &self.removed {
            object
                .rig
                .get_or_insert_with(BoneRig::new)
                .restore_bone(removed.clone())?;
            self.removed = None;
            return Ok(());
        }
        let created_rig = object.rig.is_none();
        let rig = object.rig.get_or_insert_with(BoneRig::new);
        match rig.add_bone(self.name.clone(), self.parent, self.rest) {
            Ok(id) => {
                self.created = Some(id);
                self.created_rig = created_rig;
                Ok(())
            }
            Err(err) => {
                if created_rig {
                    object.rig = None;
                }
                Err(err)
            }
        }
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let id = self.created.ok_or_else(|| not_applied("add bone"))?;
        let object = doc.object_mut(self.object)?;
        let rig = object
            .rig
            .as_mut()
            .ok_or_else(|| not_applied("add bone"))?;
        self.removed = Some(rig.remove_bone(id)?);
        if self.created_rig && rig.is_empty() {
            object.rig = None;
        }
        Ok(())
    }
}

/// Delete a bone with everything that referenced it (children are lifted,
/// weights, pose entries and bindings are dropped).
#[derive(Debug)]
pub struct RemoveBone {
    object: ObjectId,
    bone: BoneId,
    record: Option<RemovedBoneRecord>,
}

impl RemoveBone {
    pub fn new(object: ObjectId, bone: BoneId) -> Self {
        Self {
            object,
            bone,
            record: None,
        }
    }
}

impl Command for RemoveBone {
    fn label(&self) -> String {
        format!("delete {}", self.bone)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.record = Some(doc.remove_bone(self.object, self.bone)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let record = self.record.take().ok_or_else(|| not_applied("delete bone"))?;
        doc.restore_bone(&record)
    }
}

/// Re-parent a bone, keeping its rest placement in object space.
#[derive(Debug)]
pub struct SetBoneParent {
    object: ObjectId,
    bone: BoneId,
    parent: Option<BoneId>,
    old: Option<(Option<BoneId>, BoneRest)>,
}

impl SetBoneParent {
    pub fn new(object: ObjectId, bone: BoneId, parent: Option<BoneId>) -> Self {
        Self {
            object,
            bone,
            parent,
            old: None,
        }
    }
}

impl Command for SetBoneParent {
    fn label(&self) -> String {
        match self.parent {
            Some(p) => format!("parent {} to {p}", self.bone),
            None => format!("make {} a top bone", self.bone),
        }
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(rig_mut(doc, self.object)?.set_parent(self.bone, self.parent, true)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let (parent, rest) = self.old.take().ok_or_else(|| not_applied("set parent"))?;
        let rig = rig_mut(doc, self.object)?;
        rig.set_parent(self.bone, parent, false)?;
        rig.set_rest(self.bone, rest)?;
        Ok(())
    }
}

/// Move a bone's joint in rest pose; children stay put.
#[derive(Debug)]
pub struct MoveJoint {
    object: ObjectId,
    bone: BoneId,
    joint: Vec2,
    old: Vec<(BoneId, BoneRest)>,
}

impl MoveJoint {
    pub fn new(object: ObjectId, bone: BoneId, joint: Vec2) -> Self {
        Self {
            object,
            bone,
            joint,
            old: Vec::new(),
        }
    }
}

impl Command for MoveJoint {
    fn label(&self) -> String {
        format!("move joint of {}", self.bone)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = rig_mut(doc, self.object)?.move_joint(self.bone, self.joint)?;
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let rig = rig_mut(doc, self.object)?;
        for (bone, rest) in self.old.drain(..).rev() {
            rig.set_rest(bone, rest)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetBoneRest {
    object: ObjectId,
    bone: BoneId,
    rest: BoneRest,
    old: Option<BoneRest>,
}

impl SetBoneRest {
    pub fn new(object: ObjectId, bone: BoneId, rest: BoneRest) -> Self {
        Self {
            object,
            bone,
            rest,
            old: None,
        }
    }
}

impl Command for SetBoneRest {
    fn label(&self) -> String {
        format!("edit rest of {}", self.bone)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(rig_mut(doc, self.object)?.set_rest(self.bone, self.rest)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set rest"))?;
        rig_mut(doc, self.object)?.set_rest(self.bone, old)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetBoneRange {
    object: ObjectId,
    bone: BoneId,
    range: Option<InfluenceRange>,
    old: Option<Option<InfluenceRange>>,
}

impl SetBoneRange {
    pub fn new(object: ObjectId, bone: BoneId, range: Option<InfluenceRange>) -> Self {
        Self {
            object,
            bone,
            range,
            old: None,
        }
    }
}

impl Command for SetBoneRange {
    fn label(&self) -> String {
        format!("adjust influence range of {}", self.bone)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(rig_mut(doc, self.object)?.set_range(self.bone, self.range)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set range"))?;
        rig_mut(doc, self.object)?.set_range(self.bone, old)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct RenameBone {
    object: ObjectId,
    bone: BoneId,
    name: String,
    old: Option<String>,
}

impl RenameBone {
    pub fn new(object: ObjectId, bone: BoneId, name: impl Into<String>) -> Self {
        Self {
            object,
            bone,
            name: name.into(),
            old: None,
        }
    }
}

impl Command for RenameBone {
    fn label(&self) -> String {
        format!("rename {} to '{}'", self.bone, self.name)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(rig_mut(doc, self.object)?.rename(self.bone, self.name.clone())?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("rename bone"))?;
        rig_mut(doc, self.object)?.rename(self.bone, old)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_api_core::Invalid;

    fn chain(doc: &mut Document) -> (ObjectId, BoneId, BoneId) {
        let id = doc.add_object("arm");
        let mut upper = AddBone::new(id, "upper", None, BoneRest::new(Vec2::ZERO, 0.0, 10.0));
        upper.apply(doc).unwrap();
        let upper_id = upper.bone().unwrap();
        let mut lower = AddBone::new(
            id,
            "lower",
            Some(upper_id),
            BoneRest::new(Vec2::new(10.0, 0.0), 0.0, 10.0),
        );
        lower.apply(doc).unwrap();
        (id, upper_id, lower.bone().unwrap())
    }

    #[test]
    fn first_bone_creates_rig_and_revert_drops_it() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let mut cmd = AddBone::new(id, "root", None, BoneRest::new(Vec2::ZERO, 0.0, 4.0));
        cmd.apply(&mut doc).unwrap();
        assert_eq!(doc.object(id).unwrap().bone_count(), 1);
        let after = doc.clone();

        cmd.revert(&mut doc).unwrap();
        assert!(doc.object(id).unwrap().rig.is_none());
        cmd.apply(&mut doc).unwrap();
        assert_eq!(doc, after);
    }

    #[test]
    fn cyclic_parent_is_rejected() {
        let mut doc = Document::default();
        let (id, upper, lower) = chain(&mut doc);
        let before = doc.clone();
        let err = SetBoneParent::new(id, upper, Some(lower))
            .apply(&mut doc)
            .unwrap_err();
        assert!(matches!(err.invalid(), Some(Invalid::CyclicParent { .. })));
        assert_eq!(doc, before);
    }

    #[test]
    fn reparent_and_joint_moves_revert_exactly() {
        let mut doc = Document::default();
        let (id, upper, lower) = chain(&mut doc);
        let before = doc.clone();

        let mut unparent = SetBoneParent::new(id, lower, None);
        unparent.apply(&mut doc).unwrap();
        let rig = doc.object(id).unwrap().rig.as_ref().unwrap();
        assert!(rigkit_api_core::approx_eq(
            rig.rest_segment(lower).unwrap().0,
            Vec2::new(10.0, 0.0),
            1e-5
        ));
        unparent.revert(&mut doc).unwrap();
        assert_eq!(doc, before);

        let mut joint = MoveJoint::new(id, upper, Vec2::new(0.0, 5.0));
        joint.apply(&mut doc).unwrap();
        joint.revert(&mut doc).unwrap();
        assert_eq!(doc, before);
    }
}
