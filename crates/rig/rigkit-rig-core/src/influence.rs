//! Per-vertex bone weights.
//!
//! Invariants kept by every mutation:
//! - weights are non-negative and sum to at most 1 per vertex (the remainder
//!   follows the object rigidly)
//! - at most `max_per_vertex` bones influence one vertex
//! - entries are sorted by bone id and zero weights are not stored
//!
//! Playback never writes here; only paint / erase / adjust edits do.

use hashbrown::HashMap;
use rigkit_api_core::{BoneId, Invalid, RigError, VertexId};
use serde::{Deserialize, Serialize};

use crate::mesh::MeshTopology;
use crate::rig::{distance_to_segment, BoneRig};

pub const DEFAULT_MAX_INFLUENCES: usize = 4;
const WEIGHT_EPS: f32 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneWeight {
    pub bone: BoneId,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InfluenceMap {
    max_per_vertex: usize,
    weights: HashMap<VertexId, Vec<BoneWeight>>,
}

impl Default for InfluenceMap {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INFLUENCES)
    }
}

impl InfluenceMap {
    pub fn new(max_per_vertex: usize) -> Self {
        Self {
            max_per_vertex: max_per_vertex.max(1),
            weights: HashMap::new(),
        }
    }

    pub fn max_per_vertex(&self) -> usize {
        self.max_per_vertex
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weights of one vertex, sorted by bone id. Empty when unweighted.
    pub fn weights(&self, vertex: VertexId) -> &[BoneWeight] {
        self.weights.get(&vertex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn weight(&self, vertex: VertexId, bone: BoneId) -> f32 {
        self.weights(vertex)
            .iter()
            .find(|w| w.bone == bone)
            .map_or(0.0, |w| w.weight)
    }

    pub fn total(&self, vertex: VertexId) -> f32 {
        self.weights(vertex).iter().map(|w| w.weight).sum()
    }

    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.weights.keys().copied()
    }

    /// Set one weight, clamped so the vertex total stays ≤ 1. Returns the
    /// stored value.
    pub fn set_weight(&mut self, vertex: VertexId, bone: BoneId, weight: f32) -> Result<f32, RigError> {
        if !(0.0..=1.0).contains(&weight) || weight.is_nan() {
            return Err(Invalid::WeightOutOfRange(weight).into());
        }
        let max = self.max_per_vertex;
        let current = self.weights(vertex);
        let others: f32 = current
            .iter()
            .filter(|w| w.bone != bone)
            .map(|w| w.weight)
            .sum();
        let clamped = weight.min((1.0 - others).max(0.0));
        let stored = if clamped > WEIGHT_EPS { clamped } else { 0.0 };
        let present = current.iter().any(|w| w.bone == bone);
        if stored > 0.0 && !present && current.len() >= max {
            return Err(Invalid::InfluenceCapacity { vertex, max }.into());
        }

        let entry = self.weights.entry(vertex).or_default();
        match entry.binary_search_by_key(&bone, |w| w.bone) {
            Ok(i) if stored > 0.0 => entry[i].weight = stored,
            Ok(i) => {
                entry.remove(i);
            }
            Err(i) if stored > 0.0 => entry.insert(i, BoneWeight { bone, weight: stored }),
            Err(_) => {}
        }
        if entry.is_empty() {
            self.weights.remove(&vertex);
        }
        Ok(stored)
    }

    /// Add `amount` of `bone` to a vertex (paint).
    pub fn paint(&mut self, vertex: VertexId, bone: BoneId, amount: f32) -> Result<f32, RigError> {
        let next = (self.weight(vertex, bone) + amount.max(0.0)).min(1.0);
        self.set_weight(vertex, bone, next)
    }

    /// Remove `amount` of `bone` from a vertex (erase).
    pub fn erase(&mut self, vertex: VertexId, bone: BoneId, amount: f32) -> Result<f32, RigError> {
        let next = (self.weight(vertex, bone) - amount.max(0.0)).max(0.0);
        self.set_weight(vertex, bone, next)
    }

    /// Replace all weights of a vertex at once (used by undo).
    pub fn set_vertex(&mut self, vertex: VertexId, mut weights: Vec<BoneWeight>) {
        weights.retain(|w| w.weight > WEIGHT_EPS);
        weights.sort_by_key(|w| w.bone);
        if weights.is_empty() {
            self.weights.remove(&vertex);
        } else {
            self.weights.insert(vertex, weights);
        }
    }

    pub fn remove_vertex(&mut self, vertex: VertexId) -> Vec<BoneWeight> {
        self.weights.remove(&vertex).unwrap_or_default()
    }

    /// Drop a bone's whole weight column. Nothing is redistributed; affected
    /// vertices fall back to the rigid remainder for that share.
    pub fn remove_bone(&mut self, bone: BoneId) -> Vec<(VertexId, f32)> {
        let mut column = Vec::new();
        for (vertex, entry) in self.weights.iter_mut() {
            if let Ok(i) = entry.binary_search_by_key(&bone, |w| w.bone) {
                column.push((*vertex, entry.remove(i).weight));
            }
        }
        self.weights.retain(|_, e| !e.is_empty());
        column.sort_by_key(|(v, _)| *v);
        column
    }

    /// Put back a column returned by `remove_bone`.
    pub fn restore_bone(&mut self, bone: BoneId, column: &[(VertexId, f32)]) {
        for (vertex, weight) in column {
            let entry = self.weights.entry(*vertex).or_default();
            if let Err(i) = entry.binary_search_by_key(&bone, |w| w.bone) {
                entry.insert(
                    i,
                    BoneWeight {
                        bone,
                        weight: *weight,
                    },
                );
            }
        }
    }

    /// Explicit redistribution: rescale a vertex's weights so they sum to 1.
    pub fn normalize_vertex(&mut self, vertex: VertexId) {
        let total = self.total(vertex);
        if total <= WEIGHT_EPS {
            return;
        }
        if let Some(entry) = self.weights.get_mut(&vertex) {
            for w in entry.iter_mut() {
                w.weight /= total;
            }
        }
    }

    /// Explicit redistribution: move every weight of `from` onto `to`.
    pub fn transfer_bone(&mut self, from: BoneId, to: BoneId) -> Result<(), RigError> {
        if from == to {
            return Ok(());
        }
        let column = self.remove_bone(from);
        for (vertex, weight) in column {
            let current = self.weight(vertex, to);
            self.set_weight(vertex, to, (current + weight).min(1.0))?;
        }
        Ok(())
    }

    /// Regenerate every weight from the bones' influence ranges at rest.
    ///
    /// Bones without a range contribute nothing. Only the strongest
    /// `max_per_vertex` bones are kept and the total is rescaled to ≤ 1.
    pub fn generate_from_ranges(&mut self, rig: &BoneRig, mesh: &MeshTopology) {
        let segments: Vec<_> = rig
            .order()
            .iter()
            .filter_map(|id| {
                let bone = rig.get(*id)?;
                let range = bone.range?;
                let (a, b) = rig.rest_segment(*id).ok()?;
                Some((*id, range, a, b))
            })
            .collect();

        self.weights.clear();
        for (vertex, pos) in mesh.vertices() {
            let mut found: Vec<BoneWeight> = segments
                .iter()
                .filter_map(|(bone, range, a, b)| {
                    let w = range.weight_at(distance_to_segment(pos, *a, *b));
                    (w > WEIGHT_EPS).then_some(BoneWeight {
                        bone: *bone,
                        weight: w,
                    })
                })
                .collect();
            if found.is_empty() {
                continue;
            }
            found.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            found.truncate(self.max_per_vertex);
            let total: f32 = found.iter().map(|w| w.weight).sum();
            if total > 1.0 {
                for w in &mut found {
                    w.weight /= total;
                }
            }
            self.set_vertex(vertex, found);
        }
    }

    /// Check the per-vertex invariants.
    pub fn validate(&self) -> Result<(), RigError> {
        for (vertex, entry) in &self.weights {
            if entry.len() > self.max_per_vertex {
                return Err(Invalid::InfluenceCapacity {
                    vertex: *vertex,
                    max: self.max_per_vertex,
                }
                .into());
            }
            let mut total = 0.0;
            for w in entry {
                if !(0.0..=1.0).contains(&w.weight) {
                    return Err(Invalid::WeightOutOfRange(w.weight).into());
                }
                total += w.weight;
            }
            if total > 1.0 + 1e-4 {
                return Err(Invalid::WeightOutOfRange(total).into());
            }
        }
        Ok(())
    }
}
