use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;
use rigkit_animation_core::{AttrValue, Easing, KeyedAttribute};
use rigkit_api_core::BoneId;
use rigkit_posture_core::{Document, PostureSolver};
use rigkit_rig_core::{BasisOrder, BonePose, BoneRest, BoneRig, FfdDisplacement, MeshTopology, PoseValue};

/// A 64x64 grid with a three-bone chain and a lattice, keyed over 60 frames.
fn build_doc() -> Document {
    let mut doc = Document::default();
    let mesh = MeshTopology::grid(Vec2::new(64.0, 64.0), 4.0).expect("grid");
    let id = doc.add_object_with_mesh("sheet", mesh);

    let mut rig = BoneRig::new();
    let mut parent = None;
    for i in 0..3 {
        let offset = if i == 0 { Vec2::new(0.0, 32.0) } else { Vec2::new(21.0, 0.0) };
        let bone = rig
            .add_bone(format!("b{i}"), parent, BoneRest::new(offset, 0.0, 21.0))
            .expect("bone");
        parent = Some(bone);
    }
    let object = doc.object_mut(id).expect("object");
    object.rig = Some(rig);
    let rig = object.rig.as_ref().expect("rig");
    let mesh = object.base_mesh().clone();
    object.influence.generate_from_ranges(rig, &mesh);

    let lattice = doc.fit_lattice(id, 16.0, BasisOrder::Quartic).expect("lattice");
    let mut bent = FfdDisplacement::zero(&lattice);
    for (i, o) in bent.offsets.iter_mut().enumerate() {
        *o = Vec2::new((i % 3) as f32, 0.0);
    }
    let zero = FfdDisplacement::zero(&lattice);
    let mut ffd = KeyedAttribute::new(zero.clone());
    ffd.push_key(0, zero, Easing::LINEAR);
    ffd.push_key(60, bent, Easing::LINEAR);
    doc.replace_lattice(id, Some(lattice), ffd).expect("replace");

    for (frame, angle) in [(0, 0.0), (30, 0.6), (60, -0.4)] {
        let mut pose = PoseValue::new();
        for raw in 0..3 {
            pose.set(BoneId(raw), Some(BonePose::rotation(angle)));
        }
        doc.push_key(id, frame, AttrValue::Pose(pose), Easing::LINEAR)
            .expect("pose key");
    }
    doc
}

fn bench_solve(c: &mut Criterion) {
    let doc = build_doc();
    let mut solver = PostureSolver::new();
    c.bench_function("posture_solve_sheet_frame_45", |b| {
        b.iter(|| black_box(solver.solve(black_box(&doc), 45)))
    });
    c.bench_function("posture_solve_sheet_60_frames", |b| {
        b.iter(|| {
            for frame in 0..60 {
                black_box(solver.solve(&doc, frame));
            }
        })
    });
}

criterion_group!(benches, bench_solve);
criterion_main!(benches);
