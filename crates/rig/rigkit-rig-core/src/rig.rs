//! Bone forest stored as an arena keyed by stable id.
//!
//! Parents are optional ids, never owning references. A parent-before-child
//! traversal order is recomputed after every structural edit and cached.

use std::collections::VecDeque;

use glam::{Affine2, Vec2};
use hashbrown::HashMap;
use indexmap::IndexMap;
use rigkit_api_core::{BoneId, IdAllocator, Invalid, RigError};
use serde::{Deserialize, Serialize};

use crate::bone::{Bone, BonePose, BoneRest, InfluenceRange, PoseValue};

/// Everything needed to put a removed bone back exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedBone {
    pub bone: Bone,
    pub index: usize,
    /// Children that were lifted to the removed bone's parent, with their
    /// rest before the lift.
    pub children: Vec<(BoneId, BoneRest)>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct RigRepr {
    bones: IndexMap<BoneId, Bone>,
    ids: IdAllocator,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RigRepr", into = "RigRepr")]
pub struct BoneRig {
    bones: IndexMap<BoneId, Bone>,
    ids: IdAllocator,
    order: Vec<BoneId>,
}

impl TryFrom<RigRepr> for BoneRig {
    type Error = RigError;

    fn try_from(repr: RigRepr) -> Result<Self, Self::Error> {
        let mut rig = BoneRig {
            bones: repr.bones,
            ids: repr.ids,
            order: Vec::new(),
        };
        for (id, bone) in &rig.bones {
            if *id != bone.id {
                return Err(Invalid::Other(format!("bone key {id} holds bone {}", bone.id)).into());
            }
            if let Some(parent) = bone.parent {
                if !rig.bones.contains_key(&parent) {
                    return Err(Invalid::MissingBone(parent).into());
                }
            }
        }
        let max = rig.bones.keys().map(|b| b.raw()).max();
        if let Some(max) = max {
            rig.ids.reserve(max);
        }
        rig.rebuild_order()?;
        Ok(rig)
    }
}

impl From<BoneRig> for RigRepr {
    fn from(rig: BoneRig) -> Self {
        RigRepr {
            bones: rig.bones,
            ids: rig.ids,
        }
    }
}

impl BoneRig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn contains(&self, id: BoneId) -> bool {
        self.bones.contains_key(&id)
    }

    pub fn get(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(&id)
    }

    fn require(&self, id: BoneId) -> Result<&Bone, RigError> {
        self.bones
            .get(&id)
            .ok_or_else(|| Invalid::MissingBone(id).into())
    }

    /// Bones in insertion order.
    pub fn bones(&self) -> impl Iterator<Item = &Bone> {
        self.bones.values()
    }

    /// Parent-before-child order.
    pub fn order(&self) -> &[BoneId] {
        &self.order
    }

    pub fn roots(&self) -> impl Iterator<Item = &Bone> {
        self.bones.values().filter(|b| b.parent.is_none())
    }

    pub fn children(&self, id: BoneId) -> Vec<BoneId> {
        self.bones
            .values()
            .filter(|b| b.parent == Some(id))
            .map(|b| b.id)
            .collect()
    }

    /// `id` itself plus every bone below it.
    pub fn subtree(&self, id: BoneId) -> Vec<BoneId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            let cur = out[i];
            out.extend(self.children(cur));
            i += 1;
        }
        out
    }

    pub fn is_ancestor(&self, ancestor: BoneId, mut bone: BoneId) -> bool {
        while let Some(parent) = self.bones.get(&bone).and_then(|b| b.parent) {
            if parent == ancestor {
                return true;
            }
            bone = parent;
        }
        false
    }

    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<BoneId>,
        rest: BoneRest,
    ) -> Result<BoneId, RigError> {
        if let Some(p) = parent {
            self.require(p)?;
        }
        let id: BoneId = self.ids.alloc();
        self.bones.insert(
            id,
            Bone {
                id,
                name: name.into(),
                parent,
                rest,
                range: None,
            },
        );
        self.rebuild_order()?;
        Ok(id)
    }

    /// Re-insert a bone under its original id at `index` (clamped).
    pub fn insert_bone(&mut self, bone: Bone, index: usize) -> Result<(), RigError> {
        if self.bones.contains_key(&bone.id) {
            return Err(Invalid::DuplicateBone(bone.id).into());
        }
        if let Some(p) = bone.parent {
            self.require(p)?;
        }
        self.ids.reserve(bone.id.raw());
        let index = index.min(self.bones.len());
        self.bones.shift_insert(index, bone.id, bone);
        self.rebuild_order()
    }

    /// Remove a bone. Its children move up to its parent and keep their rest
    /// placement in object space.
    pub fn remove_bone(&mut self, id: BoneId) -> Result<RemovedBone, RigError> {
        self.require(id)?;
        let rest_world = self.rest_world_all();
        let parent = self.bones[&id].parent;
        let parent_world = parent
            .and_then(|p| rest_world.get(&p).copied())
            .unwrap_or(Affine2::IDENTITY);

        let mut lifted = Vec::new();
        for child in self.children(id) {
            let world = rest_world[&child];
            let bone = &mut self.bones[&child];
            lifted.push((child, bone.rest));
            let angle = world.matrix2.x_axis.y.atan2(world.matrix2.x_axis.x);
            bone.rest = BoneRest::from_world(&parent_world, world.translation, angle, bone.rest.length);
            bone.parent = parent;
        }

        let (index, _, bone) = self
            .bones
            .shift_remove_full(&id)
            .ok_or(Invalid::MissingBone(id))?;
        self.rebuild_order()?;
        log::debug!("removed {id}, lifted {} children", lifted.len());
        Ok(RemovedBone {
            bone,
            index,
            children: lifted,
        })
    }

    pub fn restore_bone(&mut self, removed: RemovedBone) -> Result<(), RigError> {
        let id = removed.bone.id;
        self.insert_bone(removed.bone, removed.index)?;
        for (child, rest) in removed.children {
            if let Some(bone) = self.bones.get_mut(&child) {
                bone.parent = Some(id);
                bone.rest = rest;
            }
        }
        self.rebuild_order()
    }

    /// Change a bone's parent. With `keep_world` the rest is re-expressed so
    /// the bone stays where it is in object space.
    pub fn set_parent(
        &mut self,
        id: BoneId,
        parent: Option<BoneId>,
        keep_world: bool,
    ) -> Result<(Option<BoneId>, BoneRest), RigError> {
        let old = self.require(id)?.clone();
        if let Some(p) = parent {
            self.require(p)?;
            if p == id || self.is_ancestor(id, p) {
                return Err(Invalid::CyclicParent { bone: id, parent: p }.into());
            }
        }
        if keep_world {
            let world = self.rest_world(id)?;
            let parent_world = match parent {
                Some(p) => self.rest_world(p)?,
                None => Affine2::IDENTITY,
            };
            let angle = world.matrix2.x_axis.y.atan2(world.matrix2.x_axis.x);
            let rest = BoneRest::from_world(&parent_world, world.translation, angle, old.rest.length);
            self.bones[&id].rest = rest;
        }
        self.bones[&id].parent = parent;
        self.rebuild_order()?;
        Ok((old.parent, old.rest))
    }

    pub fn set_rest(&mut self, id: BoneId, rest: BoneRest) -> Result<BoneRest, RigError> {
        self.require(id)?;
        Ok(std::mem::replace(&mut self.bones[&id].rest, rest))
    }

    pub fn set_range(
        &mut self,
        id: BoneId,
        range: Option<InfluenceRange>,
    ) -> Result<Option<InfluenceRange>, RigError> {
        self.require(id)?;
        Ok(std::mem::replace(&mut self.bones[&id].range, range))
    }

    pub fn rename(&mut self, id: BoneId, name: impl Into<String>) -> Result<String, RigError> {
        self.require(id)?;
        Ok(std::mem::replace(&mut self.bones[&id].name, name.into()))
    }

    /// Move a bone's joint to `joint` (object space, rest pose). Children keep
    /// their object-space placement. Returns the previous rest of every bone
    /// that changed.
    pub fn move_joint(&mut self, id: BoneId, joint: Vec2) -> Result<Vec<(BoneId, BoneRest)>, RigError> {
        let bone = self.require(id)?.clone();
        let rest_world = self.rest_world_all();
        let parent_world = bone
            .parent
            .and_then(|p| rest_world.get(&p).copied())
            .unwrap_or(Affine2::IDENTITY);

        let mut changed = vec![(id, bone.rest)];
        let mut rest = bone.rest;
        rest.offset = parent_world.inverse().transform_point2(joint);
        self.bones[&id].rest = rest;
        let new_world = parent_world * rest.local();

        for child in self.children(id) {
            let world = rest_world[&child];
            let child_bone = &mut self.bones[&child];
            changed.push((child, child_bone.rest));
            let angle = world.matrix2.x_axis.y.atan2(world.matrix2.x_axis.x);
            child_bone.rest =
                BoneRest::from_world(&new_world, world.translation, angle, child_bone.rest.length);
        }
        Ok(changed)
    }

    /// Kahn's algorithm seeded in insertion order so the result is stable.
    fn rebuild_order(&mut self) -> Result<(), RigError> {
        let mut indeg: HashMap<BoneId, usize> = HashMap::with_capacity(self.bones.len());
        let mut adj: HashMap<BoneId, Vec<BoneId>> = HashMap::new();
        for bone in self.bones.values() {
            indeg.entry(bone.id).or_insert(0);
            if let Some(p) = bone.parent {
                adj.entry(p).or_default().push(bone.id);
                *indeg.entry(bone.id).or_default() += 1;
            }
        }

        let mut queue: VecDeque<BoneId> = self
            .bones
            .keys()
            .filter(|id| indeg.get(*id) == Some(&0))
            .copied()
            .collect();

        let mut order = Vec::with_capacity(self.bones.len());
        while let Some(u) = queue.pop_front() {
            order.push(u);
            if let Some(vs) = adj.get(&u) {
                for v in vs {
                    if let Some(d) = indeg.get_mut(v) {
                        *d -= 1;
                        if *d == 0 {
                            queue.push_back(*v);
                        }
                    }
                }
            }
        }

        if order.len() != self.bones.len() {
            let stuck = self
                .bones
                .values()
                .find(|b| !order.contains(&b.id))
                .map(|b| (b.id, b.parent.unwrap_or(b.id)));
            if let Some((bone, parent)) = stuck {
                return Err(Invalid::CyclicParent { bone, parent }.into());
            }
        }
        self.order = order;
        Ok(())
    }

    pub fn rest_world(&self, id: BoneId) -> Result<Affine2, RigError> {
        let mut m = self.require(id)?.rest.local();
        let mut cur = self.bones[&id].parent;
        while let Some(p) = cur {
            let parent = self.require(p)?;
            m = parent.rest.local() * m;
            cur = parent.parent;
        }
        Ok(m)
    }

    pub fn rest_world_all(&self) -> HashMap<BoneId, Affine2> {
        let mut out: HashMap<BoneId, Affine2> = HashMap::with_capacity(self.bones.len());
        for id in &self.order {
            let bone = &self.bones[id];
            let parent = bone
                .parent
                .and_then(|p| out.get(&p).copied())
                .unwrap_or(Affine2::IDENTITY);
            out.insert(*id, parent * bone.rest.local());
        }
        out
    }

    /// Joint and tip of a bone in object space at rest.
    pub fn rest_segment(&self, id: BoneId) -> Result<(Vec2, Vec2), RigError> {
        let world = self.rest_world(id)?;
        let length = self.bones[&id].rest.length;
        Ok((
            world.transform_point2(Vec2::ZERO),
            world.transform_point2(Vec2::new(length, 0.0)),
        ))
    }

    /// World (object-space) transform of every bone for one posing sample.
    ///
    /// Bones are processed parent-first: `world = parent_world * posed_local`.
    pub fn compute_pose(&self, pose: &PoseValue) -> PoseTransforms {
        let mut entries: HashMap<BoneId, BoneTransform> = HashMap::with_capacity(self.bones.len());
        for id in &self.order {
            let bone = &self.bones[id];
            let (parent_rest, parent_posed) = bone
                .parent
                .and_then(|p| entries.get(&p))
                .map(|t| (t.rest_world, t.posed_world))
                .unwrap_or((Affine2::IDENTITY, Affine2::IDENTITY));
            let rest_world = parent_rest * bone.rest.local();
            let posed_world = parent_posed * bone.rest.posed(&pose.get(*id));
            entries.insert(
                *id,
                BoneTransform {
                    rest_world,
                    posed_world,
                    skin: posed_world * rest_world.inverse(),
                    length: bone.rest.length,
                },
            );
        }
        PoseTransforms {
            order: self.order.clone(),
            entries,
        }
    }

    /// The bone whose posed segment passes closest to `point`, within `radius`.
    pub fn pick(&self, point: Vec2, radius: f32, pose: &PoseTransforms) -> Option<BoneId> {
        let mut best: Option<(BoneId, f32)> = None;
        for id in &self.order {
            let Some(t) = pose.get(*id) else { continue };
            let (a, b) = t.segment();
            let d = distance_to_segment(point, a, b);
            if d <= radius && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((*id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Rest pose lookup used when validating pose keys.
    pub fn default_pose(&self) -> PoseValue {
        let mut pose = PoseValue::new();
        for id in &self.order {
            pose.bones.insert(*id, BonePose::REST);
        }
        pose
    }
}

/// Shortest distance from `p` to the segment `a..b`.
pub fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneTransform {
    pub rest_world: Affine2,
    pub posed_world: Affine2,
    /// `posed_world * rest_world⁻¹`: maps a rest-space point to its posed place.
    pub skin: Affine2,
    pub length: f32,
}

impl BoneTransform {
    /// Posed joint and tip.
    pub fn segment(&self) -> (Vec2, Vec2) {
        (
            self.posed_world.transform_point2(Vec2::ZERO),
            self.posed_world.transform_point2(Vec2::new(self.length, 0.0)),
        )
    }
}

/// Result of `BoneRig::compute_pose`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseTransforms {
    order: Vec<BoneId>,
    entries: HashMap<BoneId, BoneTransform>,
}

impl PoseTransforms {
    pub fn get(&self, id: BoneId) -> Option<&BoneTransform> {
        self.entries.get(&id)
    }

    pub fn skin(&self, id: BoneId) -> Option<Affine2> {
        self.entries.get(&id).map(|t| t.skin)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in parent-before-child order.
    pub fn iter(&self) -> impl Iterator<Item = (BoneId, &BoneTransform)> {
        self.order
            .iter()
            .filter_map(move |id| self.entries.get(id).map(|t| (*id, t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigkit_api_core::approx_eq;
    use std::f32::consts::FRAC_PI_2;

    fn arm() -> (BoneRig, BoneId, BoneId) {
        let mut rig = BoneRig::new();
        let upper = rig
            .add_bone("upper", None, BoneRest::new(Vec2::ZERO, 0.0, 10.0))
            .unwrap();
        let lower = rig
            .add_bone("lower", Some(upper), BoneRest::new(Vec2::new(10.0, 0.0), 0.0, 10.0))
            .unwrap();
        (rig, upper, lower)
    }

    #[test]
    fn order_is_parent_first() {
        let (mut rig, upper, lower) = arm();
        let hand = rig
            .add_bone("hand", Some(lower), BoneRest::new(Vec2::new(10.0, 0.0), 0.0, 3.0))
            .unwrap();
        assert_eq!(rig.order(), &[upper, lower, hand]);
        // Reparent hand at the top; order still valid.
        rig.set_parent(hand, None, true).unwrap();
        let order = rig.order();
        let pos = |b: BoneId| order.iter().position(|x| *x == b).unwrap();
        assert!(pos(upper) < pos(lower));
        assert_eq!(rig.rest_segment(hand).unwrap().0, Vec2::new(20.0, 0.0));
    }

    #[test]
    fn cyclic_parent_is_rejected_without_mutation() {
        let (mut rig, upper, lower) = arm();
        let before = rig.clone();
        let err = rig.set_parent(upper, Some(lower), false).unwrap_err();
        assert_eq!(
            err.invalid(),
            Some(&Invalid::CyclicParent {
                bone: upper,
                parent: lower
            })
        );
        assert_eq!(rig, before);
    }

    #[test]
    fn child_rotates_about_parent_pivot() {
        let (rig, upper, lower) = arm();
        let pose = PoseValue::new().with(upper, BonePose::rotation(FRAC_PI_2));
        let t = rig.compute_pose(&pose);
        let p = t.skin(lower).unwrap().transform_point2(Vec2::new(15.0, 0.0));
        assert!(approx_eq(p, Vec2::new(0.0, 15.0), 1e-4), "{p:?}");
    }

    #[test]
    fn remove_and_restore_bone() {
        let (mut rig, upper, lower) = arm();
        let before = rig.clone();
        let removed = rig.remove_bone(upper).unwrap();
        assert_eq!(rig.get(lower).unwrap().parent, None);
        assert!(approx_eq(
            rig.rest_segment(lower).unwrap().0,
            Vec2::new(10.0, 0.0),
            1e-5
        ));
        rig.restore_bone(removed).unwrap();
        assert_eq!(rig, before);
    }

    #[test]
    fn move_joint_keeps_children_in_place() {
        let (mut rig, upper, lower) = arm();
        let child_joint = rig.rest_segment(lower).unwrap().0;
        rig.move_joint(upper, Vec2::new(-5.0, 2.0)).unwrap();
        assert!(approx_eq(rig.rest_segment(upper).unwrap().0, Vec2::new(-5.0, 2.0), 1e-5));
        assert!(approx_eq(rig.rest_segment(lower).unwrap().0, child_joint, 1e-4));
    }

    #[test]
    fn serde_rebuilds_order() {
        let (rig, _, _) = arm();
        let json = serde_json::to_string(&rig).unwrap();
        let back: BoneRig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rig);
        assert_eq!(back.order().len(), 2);
    }
}
