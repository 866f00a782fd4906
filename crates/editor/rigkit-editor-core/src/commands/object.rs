use glam::Vec2;
use rigkit_api_core::{ObjectId, RigError};
use rigkit_posture_core::{BlendMode, BoneBinding, Document, RemovedObject};
use rigkit_rig_core::MeshTopology;

use super::not_applied;
use crate::command::Command;

#[derive(Debug)]
pub struct AddObject {
    name: String,
    mesh: Option<MeshTopology>,
    created: Option<ObjectId>,
    removed: Option<RemovedObject>,
}

impl AddObject {
    pub fn new(name: impl Into<String>, mesh: Option<MeshTopology>) -> Self {
        Self {
            name: name.into(),
            mesh,
            created: None,
            removed: None,
        }
    }

    /// Id of the new object once applied.
    pub fn object(&self) -> Option<ObjectId> {
        self.created
    }
}

impl Command for AddObject {
    fn label(&self) -> String {
        format!("add object '{}'", self.name)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        if let Some(removed) = &self.removed {
            doc.restore_object(removed)?;
            self.removed = None;
            return Ok(());
        }
        let id = match &self.mesh {
            Some(mesh) => {
                mesh.validate()?;
                doc.add_object_with_mesh(self.name.clone(), mesh.clone())
            }
            None => doc.add_object(self.name.clone()),
        };
        self.created = Some(id);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let id = self.created.ok_or_else(|| not_applied("add object"))?;
        self.removed = Some(doc.remove_object(id)?);
        Ok(())
    }
}

/// Remove an object. Bindings to it are cleared and come back on revert.
#[derive(Debug)]
pub struct RemoveObject {
    object: ObjectId,
    removed: Option<RemovedObject>,
}

impl RemoveObject {
    pub fn new(object: ObjectId) -> Self {
        Self {
            object,
            removed: None,
        }
    }
}

impl Command for RemoveObject {
    fn label(&self) -> String {
        format!("remove {}", self.object)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.removed = Some(doc.remove_object(self.object)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let removed = self.removed.take().ok_or_else(|| not_applied("remove object"))?;
        doc.restore_object(&removed)
    }
}

#[derive(Debug)]
pub struct SetPivot {
    object: ObjectId,
    pivot: Vec2,
    old: Option<Vec2>,
}

impl SetPivot {
    pub fn new(object: ObjectId, pivot: Vec2) -> Self {
        Self {
            object,
            pivot,
            old: None,
        }
    }
}

impl Command for SetPivot {
    fn label(&self) -> String {
        format!("move centroid of {}", self.object)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let object = doc.object_mut(self.object)?;
        self.old = Some(std::mem::replace(&mut object.pivot, self.pivot));
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set pivot"))?;
        doc.object_mut(self.object)?.pivot = old;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetBinding {
    object: ObjectId,
    binding: Option<BoneBinding>,
    old: Option<Option<BoneBinding>>,
}

impl SetBinding {
    pub fn new(object: ObjectId, binding: Option<BoneBinding>) -> Self {
        Self {
            object,
            binding,
            old: None,
        }
    }
}

impl Command for SetBinding {
    fn label(&self) -> String {
        match self.binding {
            Some(b) => format!("bind {} to {}/{}", self.object, b.owner, b.bone),
            None => format!("unbind {}", self.object),
        }
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(doc.set_binding(self.object, self.binding)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set binding"))?;
        doc.object_mut(self.object)?.binding = old;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SetBlendMode {
    object: ObjectId,
    mode: BlendMode,
    old: Option<BlendMode>,
}

impl SetBlendMode {
    pub fn new(object: ObjectId, mode: BlendMode) -> Self {
        Self {
            object,
            mode,
            old: None,
        }
    }
}

impl Command for SetBlendMode {
    fn label(&self) -> String {
        format!("set blend mode of {}", self.object)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let object = doc.object_mut(self.object)?;
        self.old = Some(std::mem::replace(&mut object.blend_mode, self.mode));
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set blend mode"))?;
        doc.object_mut(self.object)?.blend_mode = old;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redo_of_add_object_reuses_id_and_slot() {
        let mut doc = Document::default();
        let first = doc.add_object("first");
        let mut cmd = AddObject::new("second", None);
        cmd.apply(&mut doc).unwrap();
        let id = cmd.object().unwrap();
        doc.add_object("third");
        let after = doc.clone();

        cmd.revert(&mut doc).unwrap();
        assert!(!doc.contains(id));
        cmd.apply(&mut doc).unwrap();
        assert_eq!(doc, after);
        assert_eq!(doc.object_ids()[0], first);
        assert_eq!(doc.object_ids()[1], id);
    }

    #[test]
    fn invalid_mesh_is_refused() {
        let mut doc = Document::default();
        let bad: MeshTopology = serde_json::from_str(
            r#"{"vertices":{"0":[0.0,0.0]},"triangles":{"0":[0,0,0]},"vertex_ids":{"next":1},"triangle_ids":{"next":1}}"#,
        )
        .unwrap();
        let mut cmd = AddObject::new("bad", Some(bad));
        assert_eq!(cmd.apply(&mut doc).unwrap_err().category(), "structural");
        assert!(doc.is_empty());
        assert_eq!(cmd.object(), None);
    }
}
