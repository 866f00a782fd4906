//! The document: an ordered registry of animatable objects plus shared
//! settings and resource availability.
//!
//! Mutations here check document-level invariants (frame range, lattice
//! signatures, binding acyclicity) and return whatever the caller needs to
//! revert them. Undo bookkeeping itself lives with the commands.

use std::collections::VecDeque;

use glam::Vec2;
use hashbrown::HashMap;
use indexmap::IndexMap;
use rigkit_animation_core::{AttrValue, AttributeKind, Easing, KeySnapshot, KeyedAttribute};
use rigkit_api_core::{BoneId, Frame, IdAllocator, Invalid, ObjectId, RigError, VertexId};
use rigkit_rig_core::{
    BasisOrder, BonePose, FfdDisplacement, FfdLattice, InfluenceMap, LatticeRemap, MeshTopology,
    RemapPolicy, RemovedBone,
};
use serde::{Deserialize, Serialize};

use crate::config::DocumentConfig;
use crate::object::{AnimObject, BoneBinding};
use crate::resource::ResourceRegistry;

/// A removed object and the bindings that pointed at it.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedObject {
    pub object: AnimObject,
    pub index: usize,
    pub cleared: Vec<(ObjectId, BoneBinding)>,
}

/// Everything a bone deletion touched, for exact restoration.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedBoneRecord {
    pub object: ObjectId,
    pub removed: RemovedBone,
    pub weights: Vec<(VertexId, f32)>,
    pub pose_entries: Vec<(Option<Frame>, BonePose)>,
    pub cleared: Vec<(ObjectId, BoneBinding)>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub config: DocumentConfig,
    objects: IndexMap<ObjectId, AnimObject>,
    #[serde(default)]
    ids: IdAllocator,
    #[serde(default)]
    pub resources: ResourceRegistry,
}

impl Document {
    pub fn new(config: DocumentConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &AnimObject> {
        self.objects.values()
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub fn object(&self, id: ObjectId) -> Result<&AnimObject, RigError> {
        self.objects
            .get(&id)
            .ok_or_else(|| Invalid::MissingObject(id).into())
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut AnimObject, RigError> {
        self.objects
            .get_mut(&id)
            .ok_or_else(|| Invalid::MissingObject(id).into())
    }

    pub fn check_frame(&self, frame: Frame) -> Result<(), RigError> {
        self.config.check_frame(frame)
    }

    // ---- objects ----

    pub fn add_object(&mut self, name: impl Into<String>) -> ObjectId {
        let id: ObjectId = self.ids.alloc();
        let mut object = AnimObject::new(id, name);
        object.influence = InfluenceMap::new(self.config.max_influences_per_vertex);
        self.objects.insert(id, object);
        id
    }

    /// Add an object whose base mesh is `mesh`, pivoted on the mesh centre.
    pub fn add_object_with_mesh(&mut self, name: impl Into<String>, mesh: MeshTopology) -> ObjectId {
        let id = self.add_object(name);
        if let Some(object) = self.objects.get_mut(&id) {
            object.pivot = mesh.centroid().unwrap_or(Vec2::ZERO);
            object.timeline.mesh.set_default(mesh);
        }
        id
    }

    pub fn insert_object(&mut self, object: AnimObject, index: usize) -> Result<(), RigError> {
        if self.objects.contains_key(&object.id) {
            return Err(Invalid::Other(format!("{} already exists", object.id)).into());
        }
        self.ids.reserve(object.id.raw());
        let index = index.min(self.objects.len());
        self.objects.shift_insert(index, object.id, object);
        Ok(())
    }

    /// Remove an object. Bindings of other objects to it are cleared.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<RemovedObject, RigError> {
        let (index, _, object) = self
            .objects
            .shift_remove_full(&id)
            .ok_or(Invalid::MissingObject(id))?;
        let cleared = self.clear_bindings(|b| b.owner == id);
        Ok(RemovedObject {
            object,
            index,
            cleared,
        })
    }

    pub fn restore_object(&mut self, removed: &RemovedObject) -> Result<(), RigError> {
        self.insert_object(removed.object.clone(), removed.index)?;
        self.restore_bindings(&removed.cleared);
        Ok(())
    }

    fn clear_bindings(&mut self, pred: impl Fn(&BoneBinding) -> bool) -> Vec<(ObjectId, BoneBinding)> {
        let mut cleared = Vec::new();
        for object in self.objects.values_mut() {
            if let Some(binding) = object.binding {
                if pred(&binding) {
                    object.binding = None;
                    cleared.push((object.id, binding));
                }
            }
        }
        if !cleared.is_empty() {
            log::debug!("cleared {} dangling bindings", cleared.len());
        }
        cleared
    }

    fn restore_bindings(&mut self, entries: &[(ObjectId, BoneBinding)]) {
        for (id, binding) in entries {
            if let Some(object) = self.objects.get_mut(id) {
                object.binding = Some(*binding);
            }
        }
    }

    // ---- bindings ----

    fn check_binding(&self, id: ObjectId, binding: &BoneBinding) -> Result<(), RigError> {
        let owner = self.object(binding.owner)?;
        let has_bone = owner
            .rig
            .as_ref()
            .is_some_and(|rig| rig.contains(binding.bone));
        if !has_bone {
            return Err(Invalid::MissingBone(binding.bone).into());
        }
        let mut cursor = Some(binding.owner);
        while let Some(current) = cursor {
            if current == id {
                return Err(Invalid::CyclicBinding {
                    object: id,
                    owner: binding.owner,
                }
                .into());
            }
            cursor = self
                .objects
                .get(&current)
                .and_then(|o| o.binding)
                .map(|b| b.owner);
        }
        Ok(())
    }

    /// Bind `id` to another object's bone, or unbind with `None`. Returns the
    /// previous binding.
    pub fn set_binding(&mut self, id: ObjectId, binding: Option<BoneBinding>) -> Result<Option<BoneBinding>, RigError> {
        self.object(id)?;
        if let Some(b) = &binding {
            self.check_binding(id, b)?;
        }
        let object = self.object_mut(id)?;
        Ok(std::mem::replace(&mut object.binding, binding))
    }

    /// Objects ordered so that binding owners come before bound objects;
    /// otherwise document order.
    pub fn solve_order(&self) -> Vec<ObjectId> {
        let mut indegree: HashMap<ObjectId, usize> = HashMap::new();
        let mut dependents: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
        for object in self.objects.values() {
            indegree.entry(object.id).or_insert(0);
            if let Some(b) = object.binding {
                if self.objects.contains_key(&b.owner) {
                    *indegree.entry(object.id).or_insert(0) += 1;
                    dependents.entry(b.owner).or_default().push(object.id);
                }
            }
        }
        let mut queue: VecDeque<ObjectId> = self
            .objects
            .keys()
            .filter(|id| indegree.get(*id).copied() == Some(0))
            .copied()
            .collect();
        let mut order = Vec::with_capacity(self.objects.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            if let Some(children) = dependents.get(&id) {
                for child in children {
                    if let Some(d) = indegree.get_mut(child) {
                        *d -= 1;
                        if *d == 0 {
                            queue.push_back(*child);
                        }
                    }
                }
            }
        }
        if order.len() < self.objects.len() {
            log::warn!("binding cycle detected; solving remaining objects in document order");
            for id in self.objects.keys() {
                if !order.contains(id) {
                    order.push(*id);
                }
            }
        }
        order
    }

    // ---- keys ----

    fn check_value(&self, id: ObjectId, value: &AttrValue) -> Result<(), RigError> {
        let object = self.object(id)?;
        match value {
            AttrValue::Mesh(mesh) => mesh.validate(),
            AttrValue::Pose(pose) => {
                let rig = object.rig.as_ref();
                match pose.bones.keys().find(|b| !rig.is_some_and(|r| r.contains(**b))) {
                    Some(bone) => Err(Invalid::MissingBone(*bone).into()),
                    None => Ok(()),
                }
            }
            AttrValue::Ffd(disp) => match &object.lattice {
                Some(lattice) => lattice.check(disp),
                None => Ok(()),
            },
            AttrValue::Opacity(o) if !(0.0..=1.0).contains(o) => {
                Err(Invalid::Other(format!("opacity {o} is outside [0, 1]")).into())
            }
            _ => Ok(()),
        }
    }

    pub fn push_key(
        &mut self,
        id: ObjectId,
        frame: Frame,
        value: AttrValue,
        easing: Easing,
    ) -> Result<Option<KeySnapshot>, RigError> {
        self.check_frame(frame)?;
        easing.validate()?;
        self.check_value(id, &value)?;
        Ok(self.object_mut(id)?.timeline.push_key(frame, value, easing))
    }

    pub fn delete_key(&mut self, id: ObjectId, kind: AttributeKind, frame: Frame) -> Result<KeySnapshot, RigError> {
        self.object_mut(id)?.timeline.delete_key(kind, frame)
    }

    pub fn move_key(
        &mut self,
        id: ObjectId,
        kind: AttributeKind,
        from: Frame,
        to: Frame,
        overwrite: bool,
    ) -> Result<Option<KeySnapshot>, RigError> {
        self.check_frame(to)?;
        self.object_mut(id)?.timeline.move_key(kind, from, to, overwrite)
    }

    pub fn set_easing(
        &mut self,
        id: ObjectId,
        kind: AttributeKind,
        frame: Frame,
        easing: Easing,
    ) -> Result<Easing, RigError> {
        self.object_mut(id)?.timeline.set_easing(kind, frame, easing)
    }

    pub fn set_default(&mut self, id: ObjectId, value: AttrValue) -> Result<AttrValue, RigError> {
        self.check_value(id, &value)?;
        Ok(self.object_mut(id)?.timeline.set_default(value))
    }

    // ---- bones ----

    /// Delete a bone: its children move to its parent, its weight column is
    /// dropped without redistribution, its pose entries are stripped and
    /// bindings to it are cleared.
    pub fn remove_bone(&mut self, id: ObjectId, bone: BoneId) -> Result<RemovedBoneRecord, RigError> {
        let object = self.object_mut(id)?;
        let rig = object
            .rig
            .as_mut()
            .ok_or(Invalid::MissingBone(bone))?;
        let removed = rig.remove_bone(bone)?;
        let weights = object.influence.remove_bone(bone);
        let pose_entries = object.timeline.strip_bone(bone);
        let cleared = self.clear_bindings(|b| b.owner == id && b.bone == bone);
        Ok(RemovedBoneRecord {
            object: id,
            removed,
            weights,
            pose_entries,
            cleared,
        })
    }

    pub fn restore_bone(&mut self, record: &RemovedBoneRecord) -> Result<(), RigError> {
        let bone = record.removed.bone.id;
        let object = self.object_mut(record.object)?;
        let rig = object.rig.get_or_insert_with(Default::default);
        rig.restore_bone(record.removed.clone())?;
        object.influence.restore_bone(bone, &record.weights);
        object.timeline.restore_bone(bone, &record.pose_entries);
        self.restore_bindings(&record.cleared);
        Ok(())
    }

    // ---- lattice ----

    /// A lattice fitted to the object's base mesh.
    pub fn fit_lattice(&self, id: ObjectId, cell_size: f32, basis: BasisOrder) -> Result<FfdLattice, RigError> {
        let object = self.object(id)?;
        let bounds = object
            .base_mesh()
            .bounds()
            .ok_or_else(|| RigError::precondition("ffd", format!("{id} has no mesh to fit")))?;
        FfdLattice::fit(bounds, cell_size, basis)
    }

    /// Swap the lattice and the whole FFD attribute. Returns the previous
    /// pair.
    pub fn replace_lattice(
        &mut self,
        id: ObjectId,
        lattice: Option<FfdLattice>,
        ffd: KeyedAttribute<FfdDisplacement>,
    ) -> Result<(Option<FfdLattice>, KeyedAttribute<FfdDisplacement>), RigError> {
        if let Some(l) = &lattice {
            for key in ffd.keys() {
                l.check(&key.value)?;
            }
        }
        let object = self.object_mut(id)?;
        let old_lattice = std::mem::replace(&mut object.lattice, lattice);
        let old_ffd = std::mem::replace(&mut object.timeline.ffd, ffd);
        Ok((old_lattice, old_ffd))
    }

    /// Compute a new lattice shape and the FFD attribute that goes with it.
    /// Nothing is changed; feed the result to `replace_lattice`.
    pub fn restructure_lattice(
        &self,
        id: ObjectId,
        cell_size: f32,
        basis: BasisOrder,
        policy: RemapPolicy,
    ) -> Result<(FfdLattice, KeyedAttribute<FfdDisplacement>, LatticeRemap), RigError> {
        let object = self.object(id)?;
        let old = object
            .lattice
            .as_ref()
            .ok_or_else(|| RigError::precondition("ffd", format!("{id} has no lattice")))?;
        let new = old.restructured(cell_size, basis)?;
        let attr = &object.timeline.ffd;
        let mut report = LatticeRemap::default();

        let remap_one = |disp: &FfdDisplacement, report: &mut LatticeRemap| {
            if disp.offsets.is_empty() {
                return FfdDisplacement::zero(&new);
            }
            let (out, orphans) = old.remap(&new, disp);
            report.orphaned_points += orphans;
            out
        };

        let default = match policy {
            RemapPolicy::Drop => FfdDisplacement::zero(&new),
            RemapPolicy::Remap => remap_one(attr.default_value(), &mut report),
        };
        let mut out = KeyedAttribute::new(default);
        match policy {
            RemapPolicy::Drop => report.dropped_keys = attr.len(),
            RemapPolicy::Remap => {
                for key in attr.keys() {
                    let disp = remap_one(&key.value, &mut report);
                    out.push_key(key.frame, disp, key.easing);
                    report.remapped_keys += 1;
                }
            }
        }
        if report.orphaned_points > 0 || report.dropped_keys > 0 {
            log::warn!(
                "lattice restructure on {id}: {} keys dropped, {} displaced points orphaned",
                report.dropped_keys,
                report.orphaned_points
            );
        }
        Ok((new, out, report))
    }

    // ---- whole document ----

    pub fn validate(&self) -> Result<(), RigError> {
        for (id, object) in &self.objects {
            if *id != object.id {
                return Err(Invalid::Other(format!("object key {id} holds {}", object.id)).into());
            }
            let timeline = &object.timeline;
            timeline.validate()?;
            timeline.mesh.default_value().validate()?;
            for key in timeline.mesh.keys() {
                key.value.validate()?;
            }
            if let Some(lattice) = &object.lattice {
                for key in timeline.ffd.keys() {
                    lattice.check(&key.value)?;
                }
            }
            object.influence.validate()?;
            if let Some(last) = timeline.last_key_frame() {
                self.check_frame(last)?;
            }
            if let Some(binding) = &object.binding {
                self.check_binding(*id, binding)?;
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, RigError> {
        serde_json::to_string(self).map_err(|e| Invalid::Other(e.to_string()).into())
    }

    pub fn to_json_pretty(&self) -> Result<String, RigError> {
        serde_json::to_string_pretty(self).map_err(|e| Invalid::Other(e.to_string()).into())
    }

    /// Parse and validate a document.
    pub fn from_json(json: &str) -> Result<Self, RigError> {
        let mut doc: Document =
            serde_json::from_str(json).map_err(|e| RigError::from(Invalid::Other(e.to_string())))?;
        if let Some(max) = doc.objects.keys().map(|id| id.raw()).max() {
            doc.ids.reserve(max);
        }
        doc.validate()?;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_rig_core::{BoneRest, BoneRig};

    fn doc_with_square() -> (Document, ObjectId) {
        let mut doc = Document::default();
        let mesh = MeshTopology::grid(Vec2::new(20.0, 20.0), 10.0).unwrap();
        let id = doc.add_object_with_mesh("square", mesh);
        (doc, id)
    }

    fn rigged(doc: &mut Document, name: &str) -> (ObjectId, BoneId) {
        let id = doc.add_object(name);
        let mut rig = BoneRig::new();
        let bone = rig
            .add_bone("root", None, BoneRest::new(Vec2::ZERO, 0.0, 5.0))
            .unwrap();
        doc.object_mut(id).unwrap().rig = Some(rig);
        (id, bone)
    }

    #[test]
    fn mesh_object_is_pivoted_on_centroid() {
        let (doc, id) = doc_with_square();
        let object = doc.object(id).unwrap();
        assert_eq!(object.pivot, object.base_mesh().centroid().unwrap());
        assert!(object.has_mesh());
    }

    #[test]
    fn owners_solve_before_bound_objects() {
        let mut doc = Document::default();
        let hand = doc.add_object("hand");
        let (arm, bone) = rigged(&mut doc, "arm");
        doc.set_binding(hand, Some(BoneBinding { owner: arm, bone }))
            .unwrap();
        assert_eq!(doc.solve_order(), vec![arm, hand]);
    }

    #[test]
    fn binding_to_missing_bone_is_rejected() {
        let mut doc = Document::default();
        let hand = doc.add_object("hand");
        let (arm, _) = rigged(&mut doc, "arm");
        let err = doc
            .set_binding(hand, Some(BoneBinding { owner: arm, bone: BoneId(9) }))
            .unwrap_err();
        assert_eq!(err.invalid(), Some(&Invalid::MissingBone(BoneId(9))));
    }

    #[test]
    fn ffd_key_must_match_lattice() {
        let (mut doc, id) = doc_with_square();
        let lattice = doc.fit_lattice(id, 10.0, BasisOrder::Quadratic).unwrap();
        let zero = FfdDisplacement::zero(&lattice);
        doc.replace_lattice(id, Some(lattice), KeyedAttribute::new(zero.clone()))
            .unwrap();
        doc.push_key(id, 3, AttrValue::Ffd(zero), Easing::LINEAR).unwrap();

        let wrong = FfdDisplacement {
            cols: 1,
            rows: 1,
            offsets: vec![Vec2::ZERO; 4],
        };
        let err = doc
            .push_key(id, 4, AttrValue::Ffd(wrong), Easing::LINEAR)
            .unwrap_err();
        assert!(matches!(err.invalid(), Some(Invalid::LatticeMismatch { .. })));
        assert_eq!(doc.object(id).unwrap().timeline.ffd.len(), 1);
    }

    #[test]
    fn opacity_outside_unit_range_is_rejected() {
        let (mut doc, id) = doc_with_square();
        assert!(doc
            .push_key(id, 0, AttrValue::Opacity(1.5), Easing::LINEAR)
            .is_err());
        assert!(doc.object(id).unwrap().timeline.opacity.is_empty());
    }

    #[test]
    fn restructure_drop_policy_clears_keys() {
        let (mut doc, id) = doc_with_square();
        let lattice = doc.fit_lattice(id, 10.0, BasisOrder::Quadratic).unwrap();
        let mut moved = FfdDisplacement::zero(&lattice);
        moved.set(0, Vec2::new(1.0, 0.0));
        let mut attr = KeyedAttribute::new(FfdDisplacement::zero(&lattice));
        attr.push_key(2, moved, Easing::LINEAR);
        doc.replace_lattice(id, Some(lattice), attr).unwrap();

        let before = doc.clone();
        let (new, ffd, report) = doc
            .restructure_lattice(id, 5.0, BasisOrder::Octic, RemapPolicy::Drop)
            .unwrap();
        assert_eq!(doc, before);
        assert_eq!(report.dropped_keys, 1);
        assert!(ffd.is_empty());
        assert_eq!(new.basis, BasisOrder::Octic);
        assert!(ffd.default_value().is_zero());
    }

    #[test]
    fn restructure_remap_keeps_coincident_points() {
        let (mut doc, id) = doc_with_square();
        let lattice = doc.fit_lattice(id, 10.0, BasisOrder::Quadratic).unwrap();
        let mut moved = FfdDisplacement::zero(&lattice);
        moved.set(0, Vec2::new(1.0, 0.0));
        let mut attr = KeyedAttribute::new(FfdDisplacement::zero(&lattice));
        attr.push_key(2, moved, Easing::LINEAR);
        doc.replace_lattice(id, Some(lattice), attr).unwrap();

        let (new, ffd, report) = doc
            .restructure_lattice(id, 5.0, BasisOrder::Quadratic, RemapPolicy::Remap)
            .unwrap();
        assert_eq!(report.remapped_keys, 1);
        assert_eq!(report.orphaned_points, 0);
        let key = ffd.key(2).unwrap();
        new.check(&key.value).unwrap();
        assert_eq!(key.value.get(0), Vec2::new(1.0, 0.0));
    }

    #[test]
    fn pose_key_for_a_bone_outside_the_rig_is_rejected() {
        let mut doc = Document::default();
        let (id, bone) = rigged(&mut doc, "arm");
        let stray = BoneId(bone.raw() + 1);
        let pose = rigkit_rig_core::PoseValue::new()
            .with(bone, BonePose::rotation(0.5))
            .with(stray, BonePose::rotation(1.0));
        let err = doc
            .push_key(id, 3, AttrValue::Pose(pose), Easing::LINEAR)
            .unwrap_err();
        assert_eq!(err.invalid(), Some(&Invalid::MissingBone(stray)));
        assert!(doc.object(id).unwrap().timeline.pose.is_empty());

        let unrigged = doc.add_object("plain");
        let pose = rigkit_rig_core::PoseValue::new().with(bone, BonePose::REST);
        assert!(doc.set_default(unrigged, AttrValue::Pose(pose)).is_err());
    }

    #[test]
    fn from_json_reserves_object_ids() {
        let (mut doc, _) = doc_with_square();
        doc.add_object("second");
        let mut back = Document::from_json(&doc.to_json().unwrap()).unwrap();
        let third = back.add_object("third");
        assert_eq!(third, ObjectId(2));
    }
}
