use glam::Vec2;
use rigkit_api_core::{BoneId, Invalid, ObjectId, RigError, VertexId};
use rigkit_posture_core::{AnimObject, Document};
use rigkit_rig_core::{BoneWeight, InfluenceMap};

use super::not_applied;
use crate::command::Command;
use crate::config::InfluenceBrush;

fn require_bone(object: &AnimObject, bone: BoneId) -> Result<(), RigError> {
    if object.rig.as_ref().is_some_and(|r| r.contains(bone)) {
        Ok(())
    } else {
        Err(Invalid::MissingBone(bone).into())
    }
}

/// Set one vertex/bone weight (clamped so the vertex total stays ≤ 1).
#[derive(Debug)]
pub struct SetWeight {
    object: ObjectId,
    vertex: VertexId,
    bone: BoneId,
    weight: f32,
    old: Option<Vec<BoneWeight>>,
}

impl SetWeight {
    pub fn new(object: ObjectId, vertex: VertexId, bone: BoneId, weight: f32) -> Self {
        Self {
            object,
            vertex,
            bone,
            weight,
            old: None,
        }
    }
}

impl Command for SetWeight {
    fn label(&self) -> String {
        format!("set weight of {} on {}", self.bone, self.vertex)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let object = doc.object_mut(self.object)?;
        require_bone(object, self.bone)?;
        let old = object.influence.weights(self.vertex).to_vec();
        object.influence.set_weight(self.vertex, self.bone, self.weight)?;
        self.old = Some(old);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("set weight"))?;
        doc.object_mut(self.object)?.influence.set_vertex(self.vertex, old);
        Ok(())
    }
}

/// One brush dab of influence painting (or erasing) for one bone, around
/// `center` in object space over the base mesh.
#[derive(Debug)]
pub struct PaintInfluence {
    object: ObjectId,
    bone: BoneId,
    center: Vec2,
    brush: InfluenceBrush,
    erase: bool,
    previous: Vec<(VertexId, Vec<BoneWeight>)>,
}

impl PaintInfluence {
    pub fn new(object: ObjectId, bone: BoneId, center: Vec2, brush: InfluenceBrush, erase: bool) -> Self {
        Self {
            object,
            bone,
            center,
            brush,
            erase,
            previous: Vec::new(),
        }
    }

    /// Vertices whose weights this dab changed.
    pub fn touched(&self) -> usize {
        self.previous.len()
    }
}

impl Command for PaintInfluence {
    fn label(&self) -> String {
        let verb = if self.erase { "erase" } else { "paint" };
        format!("{verb} influence of {}", self.bone)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let object = doc.object_mut(self.object)?;
        require_bone(object, self.bone)?;
        let targets: Vec<(VertexId, f32)> = object
            .base_mesh()
            .vertices()
            .map(|(v, p)| (v, self.brush.amount_at(p.distance(self.center))))
            .filter(|(_, amount)| *amount > 0.0)
            .collect();

        self.previous.clear();
        for (vertex, amount) in targets {
            let before = object.influence.weights(vertex).to_vec();
            let result = if self.erase {
                object.influence.erase(vertex, self.bone, amount)
            } else {
                object.influence.paint(vertex, self.bone, amount)
            };
            match result {
                Ok(_) if object.influence.weights(vertex) != before.as_slice() => {
                    self.previous.push((vertex, before));
                }
                Ok(_) => {}
                // a full vertex is skipped, the rest of the dab still lands
                Err(err) => log::trace!("{vertex} skipped: {err}"),
            }
        }
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let influence = &mut doc.object_mut(self.object)?.influence;
        for (vertex, weights) in self.previous.drain(..).rev() {
            influence.set_vertex(vertex, weights);
        }
        Ok(())
    }
}

/// Rebuild all weights from the bones' influence ranges.
#[derive(Debug)]
pub struct GenerateInfluence {
    object: ObjectId,
    previous: Option<InfluenceMap>,
}

impl GenerateInfluence {
    pub fn new(object: ObjectId) -> Self {
        Self {
            object,
            previous: None,
        }
    }
}

impl Command for GenerateInfluence {
    fn label(&self) -> String {
        format!("generate influence for {}", self.object)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let object = doc.object_mut(self.object)?;
        let mesh = object.base_mesh().clone();
        let rig = object
            .rig
            .as_ref()
            .ok_or_else(|| RigError::precondition("influence", format!("{} has no bones", self.object)))?;
        let mut generated = InfluenceMap::new(object.influence.max_per_vertex());
        generated.generate_from_ranges(rig, &mesh);
        self.previous = Some(std::mem::replace(&mut object.influence, generated));
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let previous = self.previous.take().ok_or_else(|| not_applied("generate influence"))?;
        doc.object_mut(self.object)?.influence = previous;
        Ok(())
    }
}

/// Rescale one vertex's weights to sum to exactly 1.
#[derive(Debug)]
pub struct NormalizeVertex {
    object: ObjectId,
    vertex: VertexId,
    old: Option<Vec<BoneWeight>>,
}

impl NormalizeVertex {
    pub fn new(object: ObjectId, vertex: VertexId) -> Self {
        Self {
            object,
            vertex,
            old: None,
        }
    }
}

impl Command for NormalizeVertex {
    fn label(&self) -> String {
        format!("normalize weights of {}", self.vertex)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let influence = &mut doc.object_mut(self.object)?.influence;
        self.old = Some(influence.weights(self.vertex).to_vec());
        influence.normalize_vertex(self.vertex);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let old = self.old.take().ok_or_else(|| not_applied("normalize vertex"))?;
        doc.object_mut(self.object)?.influence.set_vertex(self.vertex, old);
        Ok(())
    }
}

/// Move every weight of `from` onto `to`.
#[derive(Debug)]
pub struct TransferBone {
    object: ObjectId,
    from: BoneId,
    to: BoneId,
    previous: Option<InfluenceMap>,
}

impl TransferBone {
    pub fn new(object: ObjectId, from: BoneId, to: BoneId) -> Self {
        Self {
            object,
            from,
            to,
            previous: None,
        }
    }
}

impl Command for TransferBone {
    fn label(&self) -> String {
        format!("transfer influence {} -> {}", self.from, self.to)
    }

    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let object = doc.object_mut(self.object)?;
        require_bone(object, self.to)?;
        let snapshot = object.influence.clone();
        if let Err(err) = object.influence.transfer_bone(self.from, self.to) {
            object.influence = snapshot;
            return Err(err);
        }
        self.previous = Some(snapshot);
        Ok(())
    }

    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        let previous = self.previous.take().ok_or_else(|| not_applied("transfer bone"))?;
        doc.object_mut(self.object)?.influence = previous;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_rig_core::{BoneRest, BoneRig, MeshTopology};

    fn rigged_square() -> (Document, ObjectId, BoneId) {
        let mut doc = Document::default();
        let mesh = MeshTopology::grid(Vec2::new(20.0, 20.0), 10.0).unwrap();
        let id = doc.add_object_with_mesh("sq", mesh);
        let mut rig = BoneRig::new();
        let bone = rig
            .add_bone("b", None, BoneRest::new(Vec2::ZERO, 0.0, 20.0))
            .unwrap();
        doc.object_mut(id).unwrap().rig = Some(rig);
        (doc, id, bone)
    }

    #[test]
    fn paint_touches_only_vertices_under_brush() {
        let (mut doc, id, bone) = rigged_square();
        let before = doc.clone();
        let brush = InfluenceBrush {
            radius: 5.0,
            strength: 0.5,
        };
        let mut dab = PaintInfluence::new(id, bone, Vec2::ZERO, brush, false);
        dab.apply(&mut doc).unwrap();
        assert_eq!(dab.touched(), 1);
        let influence = &doc.object(id).unwrap().influence;
        assert!((influence.weight(VertexId(0), bone) - 0.5).abs() < 1e-6);
        assert_eq!(influence.weight(VertexId(1), bone), 0.0);

        dab.revert(&mut doc).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn paint_requires_existing_bone() {
        let (mut doc, id, _) = rigged_square();
        let mut dab = PaintInfluence::new(id, BoneId(7), Vec2::ZERO, InfluenceBrush::default(), false);
        assert!(dab.apply(&mut doc).is_err());
    }

    #[test]
    fn weight_capacity_is_enforced() {
        let (mut doc, id, bone) = rigged_square();
        doc.object_mut(id).unwrap().influence = InfluenceMap::new(1);
        let rig = doc.object_mut(id).unwrap().rig.as_mut().unwrap();
        let second = rig
            .add_bone("c", None, BoneRest::new(Vec2::ZERO, 1.0, 5.0))
            .unwrap();
        SetWeight::new(id, VertexId(0), bone, 0.3)
            .apply(&mut doc)
            .unwrap();
        let err = SetWeight::new(id, VertexId(0), second, 0.3)
            .apply(&mut doc)
            .unwrap_err();
        assert!(matches!(err.invalid(), Some(Invalid::InfluenceCapacity { .. })));
    }
}
