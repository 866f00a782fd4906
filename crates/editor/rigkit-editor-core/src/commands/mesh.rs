//! Structural mesh edits. Each targets either the base mesh (`None`) or
//! the mesh key at a frame.

use glam::Vec2;
use rigkit_api_core::{Frame, ObjectId, RigError, TriangleId, VertexId};
use rigkit_posture_core::Document;
use rigkit_rig_core::{BoneWeight, MeshTopology, RemovedTriangle, RemovedVertex, SplitRecord};

use super::not_applied;
use crate::command::Command;

fn mesh_mut(doc: &mut Document, object: ObjectId, target: Option<Frame>) -> Result<&mut MeshTopology, RigError> {
    doc.object_mut(object)?.require_mesh_mut(target)
}

#[derive(Debug)]
pub struct AddVertex {
    object: ObjectId,
    target: Option<Frame>,
    position: Vec2,
    created: Option<VertexId>,
    removed: Option<RemovedVertex>,
}

impl AddVertex {
    pub fn new(object: ObjectId, target: Option<Frame>, position: Vec2) -> Self {
        Self {
            object,
            target,
            position,
            created: None,
            removed: None,
        }
    }

    pub fn vertex(&self) -> Option<VertexId> {
        self.created
    }
}

impl Command for AddVertex {
    fn label(&self) -> String {
        "add vertex".to_string()
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        match &self.removed {
            Some(removed) => {
                mesh_mut(doc, self.object, self.target)?.restore_vertex(removed)?;
                self.removed = None;
            }
            None => {
                let object = doc.object_mut(self.object)?;
                self.created = Some(object.add_vertex(self.target, self.position)?);
            }
        }
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let id = self.created.ok_or_else(|| not_applied("add vertex"))?;
        self.removed = Some(mesh_mut(doc, self.object, self.target)?.remove_vertex(id)?);
        Ok(())
    }
}

/// Remove a vertex and the triangles using it. Its bone weights go too once
/// no mesh of the object holds the vertex any more.
#[derive(Debug)]
pub struct RemoveVertex {
    object: ObjectId,
    target: Option<Frame>,
    vertex: VertexId,
    removed: Option<RemovedVertex>,
    weights: Vec<BoneWeight>,
}

impl RemoveVertex {
    pub fn new(object: ObjectId, target: Option<Frame>, vertex: VertexId) -> Self {
        Self {
            object,
            target,
            vertex,
            removed: None,
            weights: Vec::new(),
        }
    }
}

impl Command for RemoveVertex {
    fn label(&self) -> String {
        format!("delete {}", self.vertex)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let object = doc.object_mut(self.object)?;
        self.removed = Some(object.require_mesh_mut(self.target)?.remove_vertex(self.vertex)?);
        if !object.uses_vertex(self.vertex) {
            self.weights = object.influence.remove_vertex(self.vertex);
        }
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let removed = self.removed.take().ok_or_else(|| not_applied("delete vertex"))?;
        mesh_mut(doc, self.object, self.target)?.restore_vertex(&removed)?;
        if !self.weights.is_empty() {
            let weights = std::mem::take(&mut self.weights);
            doc.object_mut(self.object)?.influence.set_vertex(self.vertex, weights);
        }
        Ok(())
    }
}

/// Add a triangle. Repeated, missing or collinear corners and an existing
/// triangle over the same corners are rejected without change.
#[derive(Debug)]
pub struct AddTriangle {
    object: ObjectId,
    target: Option<Frame>,
    corners: [VertexId; 3],
    created: Option<TriangleId>,
    removed: Option<RemovedTriangle>,
}

impl AddTriangle {
    pub fn new(object: ObjectId, target: Option<Frame>, corners: [VertexId; 3]) -> Self {
        Self {
            object,
            target,
            corners,
            created: None,
            removed: None,
        }
    }

    pub fn triangle(&self) -> Option<TriangleId> {
        self.created
    }
}

impl Command for AddTriangle {
    fn label(&self) -> String {
        "add triangle".to_string()
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let mesh = mesh_mut(doc, self.object, self.target)?;
        match &self.removed {
            Some(removed) => {
                mesh.restore_triangle(removed)?;
                self.removed = None;
            }
            None => self.created = Some(mesh.add_triangle(self.corners)?),
        }
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let id = self.created.ok_or_else(|| not_applied("add triangle"))?;
        self.removed = Some(mesh_mut(doc, self.object, self.target)?.remove_triangle(id)?);
        Ok(())
    }
}

#[derive(Debug)]
pub struct RemoveTriangle {
    object: ObjectId,
    target: Option<Frame>,
    triangle: TriangleId,
    removed: Option<RemovedTriangle>,
}

impl RemoveTriangle {
    pub fn new(object: ObjectId, target: Option<Frame>, triangle: TriangleId) -> Self {
        Self {
            object,
            target,
            triangle,
            removed: None,
        }
    }
}

impl Command for RemoveTriangle {
    fn label(&self) -> String {
        format!("delete {}", self.triangle)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.removed = Some(mesh_mut(doc, self.object, self.target)?.remove_triangle(self.triangle)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let removed = self.removed.take().ok_or_else(|| not_applied("delete triangle"))?;
        mesh_mut(doc, self.object, self.target)?.restore_triangle(&removed)
    }
}

/// Split a triangle (and its neighbour across the edge) at `t` along `edge`.
#[derive(Debug)]
pub struct SplitTriangle {
    object: ObjectId,
    target: Option<Frame>,
    triangle: TriangleId,
    edge: u8,
    t: f32,
    record: Option<SplitRecord>,
}

impl SplitTriangle {
    pub fn new(object: ObjectId, target: Option<Frame>, triangle: TriangleId, edge: u8, t: f32) -> Self {
        Self {
            object,
            target,
            triangle,
            edge,
            t,
            record: None,
        }
    }

    /// The inserted vertex once applied.
    pub fn vertex(&self) -> Option<VertexId> {
        self.record.as_ref().map(|r| r.vertex)
    }
}

impl Command for SplitTriangle {
    fn label(&self) -> String {
        format!("split {}", self.triangle)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        match &self.record {
            Some(record) => mesh_mut(doc, self.object, self.target)?.redo_split(record),
            None => {
                let object = doc.object_mut(self.object)?;
                self.record = Some(object.split_triangle(self.target, self.triangle, self.edge, self.t)?);
                Ok(())
            }
        }
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let record = self.record.as_ref().ok_or_else(|| not_applied("split triangle"))?;
        mesh_mut(doc, self.object, self.target)?.undo_split(record)
    }
}

/// Move a vertex's rest position.
#[derive(Debug)]
pub struct MoveVertex {
    object: ObjectId,
    target: Option<Frame>,
    vertex: VertexId,
    position: Vec2,
    old: Option<Vec2>,
}

impl MoveVertex {
    pub fn new(object: ObjectId, target: Option<Frame>, vertex: VertexId, position: Vec2) -> Self {
        Self {
            object,
            target,
            vertex,
            position,
            old: None,
        }
    }
}

impl Command for MoveVertex {
    fn label(&self) -> String {
        format!("move {}", self.vertex)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        self.old = Some(mesh_mut(doc, self.object, self.target)?.move_vertex(self.vertex, self.position)?);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("move vertex"))?;
        mesh_mut(doc, self.object, self.target)?.move_vertex(self.vertex, old)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_doc() -> (Document, ObjectId) {
        let mut doc = Document::default();
        let mesh = MeshTopology::grid(Vec2::new(10.0, 10.0), 10.0).unwrap();
        let id = doc.add_object_with_mesh("sq", mesh);
        (doc, id)
    }

    #[test]
    fn repeated_corner_leaves_mesh_unchanged() {
        let (mut doc, id) = square_doc();
        let before = doc.clone();
        let err = AddTriangle::new(id, None, [VertexId(0), VertexId(1), VertexId(1)])
            .apply(&mut doc)
            .unwrap_err();
        assert_eq!(err.category(), "structural");
        assert_eq!(doc, before);
    }

    #[test]
    fn split_round_trips_through_undo_and_redo() {
        let (mut doc, id) = square_doc();
        let before = doc.clone();
        let mut split = SplitTriangle::new(id, None, TriangleId(0), 0, 0.5);
        split.apply(&mut doc).unwrap();
        let after = doc.clone();
        assert_eq!(doc.object(id).unwrap().base_mesh().triangle_count(), 3);

        split.revert(&mut doc).unwrap();
        assert_eq!(
            doc.object(id).unwrap().base_mesh().triangles().collect::<Vec<_>>(),
            before.object(id).unwrap().base_mesh().triangles().collect::<Vec<_>>()
        );
        split.apply(&mut doc).unwrap();
        assert_eq!(doc, after);
    }

    #[test]
    fn removing_vertex_drops_and_restores_weights() {
        let (mut doc, id) = square_doc();
        let mut rig = rigkit_rig_core::BoneRig::new();
        let bone = rig
            .add_bone("b", None, rigkit_rig_core::BoneRest::new(Vec2::ZERO, 0.0, 5.0))
            .unwrap();
        let object = doc.object_mut(id).unwrap();
        object.rig = Some(rig);
        object.influence.set_weight(VertexId(1), bone, 0.7).unwrap();
        let before = doc.clone();

        let mut cmd = RemoveVertex::new(id, None, VertexId(1));
        cmd.apply(&mut doc).unwrap();
        let object = doc.object(id).unwrap();
        assert_eq!(object.base_mesh().triangle_count(), 1);
        assert!(object.influence.weights(VertexId(1)).is_empty());

        cmd.revert(&mut doc).unwrap();
        assert_eq!(doc, before);
    }

    fn rigged_square_with_key() -> (Document, ObjectId, rigkit_api_core::BoneId) {
        let (mut doc, id) = square_doc();
        let mut rig = rigkit_rig_core::BoneRig::new();
        let bone = rig
            .add_bone("b", None, rigkit_rig_core::BoneRest::new(Vec2::ZERO, 0.0, 5.0))
            .unwrap();
        doc.object_mut(id).unwrap().rig = Some(rig);
        crate::commands::key_current(&doc, id, rigkit_animation_core::AttributeKind::Mesh, 10)
            .unwrap()
            .unwrap()
            .apply(&mut doc)
            .unwrap();
        (doc, id, bone)
    }

    #[test]
    fn key_vertices_never_borrow_base_weights() {
        use rigkit_animation_core::{AttrValue, Easing};
        use rigkit_posture_core::PostureSolver;
        use rigkit_rig_core::{BonePose, PoseValue};

        let (mut doc, id, bone) = rigged_square_with_key();
        let mut on_key = AddVertex::new(id, Some(10), Vec2::new(100.0, 0.0));
        on_key.apply(&mut doc).unwrap();
        let mut on_base = AddVertex::new(id, None, Vec2::new(5.0, 5.0));
        on_base.apply(&mut doc).unwrap();
        let (key_vertex, base_vertex) = (on_key.vertex().unwrap(), on_base.vertex().unwrap());
        assert_ne!(key_vertex, base_vertex);

        doc.object_mut(id)
            .unwrap()
            .influence
            .set_weight(base_vertex, bone, 1.0)
            .unwrap();
        let pose = PoseValue::new().with(bone, BonePose::rotation(std::f32::consts::FRAC_PI_2));
        doc.push_key(id, 10, AttrValue::Pose(pose), Easing::LINEAR).unwrap();

        let posture = PostureSolver::new().solve(&doc, 10);
        let key_mesh = doc.object(id).unwrap().mesh_at(Some(10)).unwrap();
        let index = key_mesh.vertex_index(key_vertex).unwrap();
        let out = posture.objects[0].vertices[index];
        assert!(rigkit_api_core::approx_eq(out, Vec2::new(100.0, 0.0), 1e-4), "{out:?}");
    }

    #[test]
    fn weights_stay_while_another_mesh_holds_the_vertex() {
        let (mut doc, id, bone) = rigged_square_with_key();
        doc.object_mut(id)
            .unwrap()
            .influence
            .set_weight(VertexId(1), bone, 0.7)
            .unwrap();

        let mut from_key = RemoveVertex::new(id, Some(10), VertexId(1));
        from_key.apply(&mut doc).unwrap();
        assert_eq!(doc.object(id).unwrap().influence.weights(VertexId(1)).len(), 1);

        let mut from_base = RemoveVertex::new(id, None, VertexId(1));
        from_base.apply(&mut doc).unwrap();
        assert!(doc.object(id).unwrap().influence.weights(VertexId(1)).is_empty());

        from_base.revert(&mut doc).unwrap();
        assert_eq!(doc.object(id).unwrap().influence.weights(VertexId(1)).len(), 1);
    }
}
