use std::f32::consts::FRAC_PI_4;

use glam::Vec2;
use rigkit_animation_core::AttributeKind;
use rigkit_api_core::{approx_eq, BoneId, Invalid, ObjectId, RigError};
use rigkit_editor_core::commands::AddObject;
use rigkit_editor_core::{
    EditorConfig, EditorSession, Feedback, InputEvent, ModeKind, PointerEvent, PoseTool, SrtTool,
};
use rigkit_posture_core::{BoneBinding, Document};
use rigkit_rig_core::MeshTopology;

fn square_session() -> (EditorSession, ObjectId) {
    let mut doc = Document::default();
    let mesh = MeshTopology::grid(Vec2::new(10.0, 10.0), 10.0).unwrap();
    let id = doc.add_object_with_mesh("square", mesh);
    let mut session = EditorSession::new(doc, EditorConfig::default());
    assert_eq!(
        session.handle(InputEvent::SelectObject(Some(id))),
        Feedback::ModeChanged(ModeKind::Cursor)
    );
    (session, id)
}

fn arm_session() -> EditorSession {
    let json = rigkit_test_fixtures::documents::json("arm-rig").unwrap();
    let doc = Document::from_json(&json).unwrap();
    let mut session = EditorSession::new(doc, EditorConfig::default());
    session.handle(InputEvent::SelectObject(Some(ObjectId(0))));
    session
}

fn drag(session: &mut EditorSession, points: &[Vec2]) -> Feedback {
    let (first, rest) = points.split_first().unwrap();
    session.handle(InputEvent::PointerDown(PointerEvent::at(*first)));
    for p in rest {
        session.handle(InputEvent::PointerMove(PointerEvent::at(*p)));
    }
    let last = rest.last().unwrap_or(first);
    session.handle(InputEvent::PointerUp(PointerEvent::at(*last)))
}

fn assert_rejected(feedback: Feedback, category: &str) {
    match feedback {
        Feedback::Rejected(err) => assert_eq!(err.category(), category, "{err}"),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn undo_and_redo_walk_the_history_exactly() {
    let (mut session, id) = square_session();
    let s0 = session.document().clone();

    assert!(matches!(
        session.handle(InputEvent::PushKey(AttributeKind::Move)),
        Feedback::Pushed(_)
    ));
    let s1 = session.document().clone();

    assert_eq!(session.handle(InputEvent::Scrub(10)), Feedback::FrameChanged(10));
    session.handle(InputEvent::SelectMode(ModeKind::Srt(SrtTool::Translate)));
    let feedback = drag(&mut session, &[Vec2::ZERO, Vec2::new(2.0, 0.0), Vec2::new(4.0, 1.0)]);
    assert_eq!(feedback, Feedback::Pushed("move object".into()));
    let s2 = session.document().clone();
    assert!(session.document().object(id).unwrap().timeline.has_key(AttributeKind::Move, 10));
    assert_eq!(session.stack().len(), 2);

    assert!(matches!(session.handle(InputEvent::Undo), Feedback::Undone(_)));
    assert_eq!(session.document(), &s1);
    assert!(matches!(session.handle(InputEvent::Undo), Feedback::Undone(_)));
    assert_eq!(session.document(), &s0);
    assert_eq!(session.handle(InputEvent::Undo), Feedback::None);

    session.handle(InputEvent::Redo);
    assert_eq!(session.document(), &s1);
    session.handle(InputEvent::Redo);
    assert_eq!(session.document(), &s2);
    assert_eq!(session.handle(InputEvent::Redo), Feedback::None);
}

#[test]
fn brush_drag_is_one_history_entry() {
    let (mut session, id) = square_session();
    let before = session.document().clone();
    session.handle(InputEvent::SelectMode(ModeKind::FfdBrush));

    let points: Vec<Vec2> = (0..8).map(|i| Vec2::new(5.0 + i as f32, 5.0)).collect();
    assert!(matches!(drag(&mut session, &points), Feedback::Pushed(_)));
    assert_eq!(session.stack().len(), 1);
    let object = session.document().object(id).unwrap();
    assert!(object.lattice.is_some());
    assert!(object.timeline.has_key(AttributeKind::Ffd, 0));

    // the lattice fit goes away with the strokes
    session.handle(InputEvent::Undo);
    assert_eq!(session.document(), &before);
    assert!(!session.is_modified());
}

#[test]
fn cancel_restores_the_document_bit_for_bit() {
    let (mut session, id) = square_session();
    let before = session.document().clone();
    session.handle(InputEvent::SelectMode(ModeKind::Centroid));
    session.handle(InputEvent::PointerDown(PointerEvent::at(Vec2::ZERO)));
    session.handle(InputEvent::PointerMove(PointerEvent::at(Vec2::new(3.0, -2.0))));
    assert_ne!(session.document().object(id).unwrap().pivot, before.object(id).unwrap().pivot);

    assert_eq!(session.handle(InputEvent::Cancel), Feedback::Cancelled);
    assert_eq!(session.document(), &before);
    assert!(session.stack().is_empty());
    // a stray release after cancel commits nothing
    session.handle(InputEvent::PointerUp(PointerEvent::at(Vec2::new(3.0, -2.0))));
    assert!(session.stack().is_empty());
}

#[test]
fn structural_errors_leave_everything_unchanged() {
    let (mut session, _) = square_session();
    session.handle(InputEvent::PushKey(AttributeKind::Opacity));
    let before = session.document().clone();

    match session.handle(InputEvent::PushKey(AttributeKind::Opacity)) {
        Feedback::Rejected(RigError::StructuralInvalid(Invalid::FrameOccupied { frame })) => assert_eq!(frame, 0),
        other => panic!("unexpected {other:?}"),
    }
    let beyond = session.document().config.max_frame + 1;
    assert_rejected(session.handle(InputEvent::Scrub(beyond)), "structural");
    assert_eq!(session.frame(), 0);
    assert_eq!(session.document(), &before);
    assert_eq!(session.stack().len(), 1);
}

#[test]
fn ffd_modes_require_a_mesh() {
    let mut doc = Document::default();
    let empty = doc.add_object("empty");
    let mut session = EditorSession::new(doc, EditorConfig::default());
    session.handle(InputEvent::SelectObject(Some(empty)));

    assert_rejected(session.handle(InputEvent::SelectMode(ModeKind::FfdDrag)), "precondition");
    assert_rejected(session.handle(InputEvent::SelectMode(ModeKind::FfdBrush)), "precondition");
    assert_eq!(session.mode(), ModeKind::Cursor);
}

#[test]
fn modes_need_a_selected_object() {
    let mut session = EditorSession::new(Document::default(), EditorConfig::default());
    assert_rejected(session.handle(InputEvent::SelectMode(ModeKind::Centroid)), "precondition");
    assert_eq!(
        session.handle(InputEvent::SelectMode(ModeKind::Cursor)),
        Feedback::ModeChanged(ModeKind::Cursor)
    );
}

#[test]
fn splitting_hands_over_to_mesh_create() {
    let (mut session, id) = square_session();
    assert_eq!(
        session.handle(InputEvent::SelectMode(ModeKind::MeshSplit)),
        Feedback::ModeChanged(ModeKind::MeshSplit)
    );
    let feedback = session.handle(InputEvent::PointerDown(PointerEvent::at(Vec2::new(6.0, 4.0))));
    assert!(matches!(feedback, Feedback::Pushed(_)));
    assert_eq!(session.mode(), ModeKind::MeshCreate);
    assert_eq!(session.document().object(id).unwrap().base_mesh().triangle_count(), 4);

    session.handle(InputEvent::Undo);
    assert_eq!(session.document().object(id).unwrap().base_mesh().triangle_count(), 2);
}

#[test]
fn undoing_creation_drops_the_selection() {
    let (mut session, _) = square_session();
    assert!(matches!(
        session.execute(Box::new(AddObject::new("extra", None))),
        Feedback::Pushed(_)
    ));
    let extra = *session.document().object_ids().last().unwrap();
    session.handle(InputEvent::SelectObject(Some(extra)));
    session.handle(InputEvent::SelectMode(ModeKind::BoneCreate));
    assert_eq!(session.object(), Some(extra));

    session.handle(InputEvent::Undo);
    assert!(!session.document().contains(extra));
    assert_eq!(session.object(), None);
    assert_eq!(session.mode(), ModeKind::Cursor);
}

#[test]
fn key_stepping_follows_the_fixture_keys() {
    let mut session = arm_session();
    assert_eq!(session.handle(InputEvent::NextKey), Feedback::FrameChanged(10));
    assert_eq!(session.handle(InputEvent::NextKey), Feedback::None);
    assert_eq!(session.handle(InputEvent::PrevKey), Feedback::FrameChanged(0));

    let posture = session.posture().get(ObjectId(0)).unwrap();
    assert_eq!(posture.bones.len(), 2);
    assert!(session.diagnostics().is_empty());
}

#[test]
fn rotating_a_bone_writes_the_pose_key() {
    let mut session = arm_session();
    session.handle(InputEvent::SelectMode(ModeKind::PoseTransform(PoseTool::Rotate)));
    session.handle(InputEvent::PointerDown(PointerEvent::at(Vec2::new(3.0, 0.0))));
    assert_eq!(session.bone(), Some(BoneId(0)));
    session.handle(InputEvent::PointerMove(PointerEvent::at(Vec2::new(3.0, 3.0))));
    assert!(matches!(
        session.handle(InputEvent::PointerUp(PointerEvent::at(Vec2::new(3.0, 3.0)))),
        Feedback::Pushed(_)
    ));

    let object = session.document().object(ObjectId(0)).unwrap();
    let key = object.timeline.pose.key(0).unwrap();
    assert!((key.value.get(BoneId(0)).rotate - FRAC_PI_4).abs() < 1e-5);
    assert_eq!(session.stack().len(), 1);
    assert!(session.is_modified());
    session.mark_saved();
    assert!(!session.is_modified());
}

#[test]
fn translating_a_bound_object_follows_the_pointer() {
    let json = rigkit_test_fixtures::documents::json("arm-rig").unwrap();
    let mut doc = Document::from_json(&json).unwrap();
    let hand = doc.add_object("hand");
    let binding = BoneBinding {
        owner: ObjectId(0),
        bone: BoneId(0),
    };
    doc.set_binding(hand, Some(binding)).unwrap();
    let mut session = EditorSession::new(doc, EditorConfig::default());
    session.handle(InputEvent::SelectObject(Some(hand)));
    // the upper bone is turned a quarter at frame 10
    session.handle(InputEvent::Scrub(10));
    session.handle(InputEvent::SelectMode(ModeKind::Srt(SrtTool::Translate)));

    let feedback = drag(&mut session, &[Vec2::ZERO, Vec2::new(0.0, 2.0), Vec2::new(0.0, 4.0)]);
    assert_eq!(feedback, Feedback::Pushed("move object".into()));
    let key = session.document().object(hand).unwrap().timeline.movement.key(10).unwrap();
    assert!(approx_eq(key.value, Vec2::new(4.0, 0.0), 1e-4), "{:?}", key.value);
    let origin = session.posture().get(hand).unwrap().transform.translation;
    assert!(approx_eq(origin, Vec2::new(0.0, 4.0), 1e-4), "{origin:?}");
}
