//! Animatable objects.

use glam::Vec2;
use rigkit_animation_core::ObjectTimeline;
use rigkit_api_core::{BoneId, Frame, Invalid, ObjectId, RigError, TriangleId, VertexId};
use rigkit_rig_core::{BoneRig, FfdLattice, InfluenceMap, MeshTopology, SplitRecord};
use serde::{Deserialize, Serialize};

/// How the renderer composites an object. Not geometric.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Subtract,
    Multiply,
    Screen,
}

/// Weak reference to a bone of another object. Resolved by id on every
/// solve; a dangling binding is ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoneBinding {
    pub owner: ObjectId,
    pub bone: BoneId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimObject {
    pub id: ObjectId,
    pub name: String,
    #[serde(default = "visible_default")]
    pub visible: bool,
    /// Rotation / scale centre in object space.
    #[serde(default)]
    pub pivot: Vec2,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub timeline: ObjectTimeline,
    #[serde(default)]
    pub rig: Option<BoneRig>,
    #[serde(default)]
    pub influence: InfluenceMap,
    #[serde(default)]
    pub lattice: Option<FfdLattice>,
    #[serde(default)]
    pub binding: Option<BoneBinding>,
}

fn visible_default() -> bool {
    true
}

fn missing_mesh_key(target: Option<Frame>) -> RigError {
    Invalid::KeyNotFound {
        frame: target.unwrap_or_default(),
    }
    .into()
}

impl AnimObject {
    pub fn new(id: ObjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            visible: true,
            pivot: Vec2::ZERO,
            blend_mode: BlendMode::Normal,
            timeline: ObjectTimeline::new(),
            rig: None,
            influence: InfluenceMap::default(),
            lattice: None,
            binding: None,
        }
    }

    /// Base mesh (the mesh attribute's default).
    pub fn base_mesh(&self) -> &MeshTopology {
        self.timeline.mesh.default_value()
    }

    /// The base mesh followed by every mesh key.
    pub fn meshes(&self) -> impl Iterator<Item = &MeshTopology> {
        std::iter::once(self.base_mesh()).chain(self.timeline.mesh.keys().iter().map(|k| &k.value))
    }

    /// True when the base mesh or any mesh key has at least one triangle.
    pub fn has_mesh(&self) -> bool {
        self.meshes().any(MeshTopology::has_triangles)
    }

    /// True when the base mesh or any mesh key still holds `vertex`.
    pub fn uses_vertex(&self, vertex: VertexId) -> bool {
        self.meshes().any(|m| m.position(vertex).is_some())
    }

    /// Raise every mesh's vertex allocator to the highest one, so a vertex id
    /// names the same vertex in the base mesh and in every key. The object's
    /// single influence map relies on this.
    pub fn sync_vertex_ids(&mut self) {
        let next = self.meshes().map(MeshTopology::next_vertex_id).max().unwrap_or(0);
        self.timeline
            .mesh
            .for_each_value_mut(|_, mesh| mesh.reserve_vertex_ids(next));
    }

    /// Add a vertex to the mesh at `target` under an id no mesh of this
    /// object has used.
    pub fn add_vertex(&mut self, target: Option<Frame>, position: Vec2) -> Result<VertexId, RigError> {
        self.require_mesh(target)?;
        self.sync_vertex_ids();
        let mesh = self.require_mesh_mut(target)?;
        Ok(mesh.add_vertex(position))
    }

    /// Split a triangle of the mesh at `target`. The inserted vertex gets an
    /// object-wide fresh id; nothing changes on error.
    pub fn split_triangle(
        &mut self,
        target: Option<Frame>,
        triangle: TriangleId,
        edge: u8,
        t: f32,
    ) -> Result<SplitRecord, RigError> {
        self.require_mesh(target)?.check_split(triangle, edge, t)?;
        self.sync_vertex_ids();
        self.require_mesh_mut(target)?.split_triangle(triangle, edge, t)
    }

    fn require_mesh(&self, target: Option<Frame>) -> Result<&MeshTopology, RigError> {
        self.mesh_at(target).ok_or_else(|| missing_mesh_key(target))
    }

    /// The mesh at `target`, or `KeyNotFound` when there is no mesh key there.
    pub fn require_mesh_mut(&mut self, target: Option<Frame>) -> Result<&mut MeshTopology, RigError> {
        self.mesh_at_mut(target).ok_or_else(|| missing_mesh_key(target))
    }

    pub fn bone_count(&self) -> usize {
        self.rig.as_ref().map_or(0, BoneRig::len)
    }

    /// Which mesh a structural edit at `frame` changes: the key at `frame`,
    /// or the base mesh when the object has no mesh keys at all. Editing a
    /// frame between mesh keys is refused.
    pub fn mesh_target(&self, frame: Frame) -> Result<Option<Frame>, RigError> {
        let mesh = &self.timeline.mesh;
        if mesh.has_key(frame) {
            Ok(Some(frame))
        } else if mesh.is_empty() {
            Ok(None)
        } else {
            Err(RigError::precondition(
                "mesh",
                format!("{} has mesh keys but none at frame {frame}", self.id),
            ))
        }
    }

    pub fn mesh_at(&self, target: Option<Frame>) -> Option<&MeshTopology> {
        self.timeline.mesh.target(target)
    }

    pub fn mesh_at_mut(&mut self, target: Option<Frame>) -> Option<&mut MeshTopology> {
        self.timeline.mesh.target_mut(target)
    }

    /// Mesh visible at `frame`.
    pub fn mesh_for_frame(&self, frame: Frame) -> &MeshTopology {
        self.timeline.mesh.hold_value(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_animation_core::Easing;

    fn keyed_square() -> AnimObject {
        let mut object = AnimObject::new(ObjectId(0), "sq");
        let mesh = MeshTopology::grid(Vec2::new(10.0, 10.0), 10.0).unwrap();
        object.timeline.mesh.set_default(mesh.clone());
        object.timeline.mesh.push_key(10, mesh, Easing::LINEAR);
        object
    }

    #[test]
    fn vertex_ids_are_unique_across_base_and_keys() {
        let mut object = keyed_square();
        let on_key = object.add_vertex(Some(10), Vec2::new(100.0, 0.0)).unwrap();
        let on_base = object.add_vertex(None, Vec2::new(5.0, 5.0)).unwrap();
        assert_ne!(on_key, on_base);
        assert!(object.base_mesh().position(on_key).is_none());
        assert!(object.mesh_at(Some(10)).unwrap().position(on_base).is_none());
        assert!(object.uses_vertex(on_key));
    }

    #[test]
    fn failed_split_changes_nothing() {
        let mut object = keyed_square();
        object.add_vertex(Some(10), Vec2::new(100.0, 0.0)).unwrap();
        let before = object.clone();
        let tri = object.base_mesh().triangles().next().unwrap().0;
        assert!(object.split_triangle(None, tri, 0, 1.5).is_err());
        assert!(object.add_vertex(Some(3), Vec2::ZERO).is_err());
        assert_eq!(object, before);

        let record = object.split_triangle(None, tri, 0, 0.5).unwrap();
        assert!(object.mesh_at(Some(10)).unwrap().position(record.vertex).is_none());
    }
}
