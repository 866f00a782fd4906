//! Linear blend skinning.
//!
//! `p' = Σ wᵢ · skinᵢ · p + (1 − Σ wᵢ) · p`, where `skinᵢ = posedᵢ · restᵢ⁻¹`.
//! The unweighted remainder stays rigid in object space; the object's own SRT
//! is applied later by the solver.

use glam::Vec2;
use rigkit_api_core::VertexId;

use crate::influence::{BoneWeight, InfluenceMap};
use crate::mesh::MeshTopology;
use crate::rig::PoseTransforms;

/// Skin one rest-space point. Zero total weight returns `rest` untouched.
pub fn skin_point(rest: Vec2, weights: &[BoneWeight], pose: &PoseTransforms) -> Vec2 {
    let mut total = 0.0;
    let mut acc = Vec2::ZERO;
    for w in weights {
        let Some(skin) = pose.skin(w.bone) else {
            // unknown bone: its share stays rigid
            continue;
        };
        acc += skin.transform_point2(rest) * w.weight;
        total += w.weight;
    }
    if total <= 0.0 {
        return rest;
    }
    acc + rest * (1.0 - total).max(0.0)
}

/// Skin every vertex of `mesh`, in `mesh.vertices()` order.
pub fn skin_mesh(mesh: &MeshTopology, influence: &InfluenceMap, pose: &PoseTransforms) -> Vec<(VertexId, Vec2)> {
    mesh.vertices()
        .map(|(id, rest)| (id, skin_point(rest, influence.weights(id), pose)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bone::{BonePose, BoneRest, PoseValue};
    use crate::rig::BoneRig;
    use rigkit_api_core::BoneId;
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
    fn zero_weight_is_rigid() {
        let (rig, upper, _) = arm();
        let pose = rig.compute_pose(&PoseValue::new().with(upper, BonePose::rotation(1.0)));
        let p = Vec2::new(3.0, 4.0);
        assert_eq!(skin_point(p, &[], &pose), p);
    }

    #[test]
    fn child_weighted_vertex_turns_about_parent_pivot() {
        let (rig, upper, lower) = arm();
        let pose = rig.compute_pose(&PoseValue::new().with(upper, BonePose::rotation(FRAC_PI_2)));
        let out = skin_point(
            Vec2::new(15.0, 0.0),
            &[BoneWeight {
                bone: lower,
                weight: 1.0,
            }],
            &pose,
        );
        assert!(out.abs_diff_eq(Vec2::new(0.0, 15.0), 1e-4), "{out:?}");
    }

    #[test]
    fn partial_weight_blends_with_rest() {
        let (rig, upper, _) = arm();
        let pose = rig.compute_pose(&PoseValue::new().with(upper, BonePose::rotation(FRAC_PI_2)));
        let out = skin_point(
            Vec2::new(10.0, 0.0),
            &[BoneWeight {
                bone: upper,
                weight: 0.5,
            }],
            &pose,
        );
        assert!(out.abs_diff_eq(Vec2::new(5.0, 5.0), 1e-4), "{out:?}");
    }

    #[test]
    fn skin_mesh_follows_vertex_order() {
        let (rig, upper, _) = arm();
        let mut mesh = MeshTopology::new();
        let a = mesh.add_vertex(Vec2::new(5.0, 0.0));
        let b = mesh.add_vertex(Vec2::new(0.0, 5.0));
        let mut influence = InfluenceMap::default();
        influence.set_weight(a, upper, 1.0).unwrap();
        let pose = rig.compute_pose(&PoseValue::new().with(upper, BonePose::rotation(FRAC_PI_2)));
        let out = skin_mesh(&mesh, &influence, &pose);
        assert_eq!(out[0].0, a);
        assert!(out[0].1.abs_diff_eq(Vec2::new(0.0, 5.0), 1e-4));
        assert_eq!(out[1], (b, Vec2::new(0.0, 5.0)));
    }
}
