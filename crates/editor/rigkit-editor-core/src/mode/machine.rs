use rigkit_api_core::{Frame, ObjectId, RigError};
use rigkit_posture_core::Document;

use super::{EditorMode, ModeContext, ModeHandler, ModeKind, ModeOutcome, PointerEvent};

fn require(ok: bool, mode: &str, reason: &str) -> Result<(), RigError> {
    if ok {
        Ok(())
    } else {
        Err(RigError::precondition(mode, reason))
    }
}

/// Can `kind` be entered on `object` at `frame`? Failing checks return a
/// `PreconditionUnmet` naming the mode.
pub fn check_entry(kind: ModeKind, doc: &Document, object: ObjectId, frame: Frame) -> Result<(), RigError> {
    if kind == ModeKind::Cursor {
        return Ok(());
    }
    let mode = kind.name();
    let obj = doc
        .object(object)
        .map_err(|_| RigError::precondition(mode, format!("{object} does not exist")))?;
    let in_mode = |err: RigError| match err {
        RigError::PreconditionUnmet(d) => RigError::precondition(mode, d.reason),
        other => other,
    };
    match kind {
        ModeKind::Cursor | ModeKind::Srt(_) | ModeKind::Centroid | ModeKind::BoneCreate => Ok(()),
        ModeKind::BoneMoveJoint | ModeKind::PoseTransform(_) | ModeKind::PoseDrawBone | ModeKind::PoseErase => {
            require(obj.bone_count() > 0, mode, "object has no bones")
        }
        ModeKind::BoneBind => require(
            doc.objects().any(|o| o.id != object && o.bone_count() > 0),
            mode,
            "no other object has bones to bind to",
        ),
        ModeKind::BoneInfluence(_) => {
            require(obj.bone_count() > 0, mode, "object has no bones")?;
            require(!obj.base_mesh().is_empty(), mode, "object has no mesh to weight")
        }
        ModeKind::MeshCreate => obj.mesh_target(frame).map(|_| ()).map_err(in_mode),
        ModeKind::MeshDelete | ModeKind::MeshSplit => {
            obj.mesh_target(frame).map_err(in_mode)?;
            require(obj.mesh_for_frame(frame).has_triangles(), mode, "mesh has no triangles")
        }
        ModeKind::FfdDrag | ModeKind::FfdBrush => require(obj.has_mesh(), mode, "object has no mesh to deform"),
    }
}

/// Holds the active mode and routes pointer input to it.
#[derive(Debug, Default)]
pub struct EditorModeMachine {
    mode: EditorMode,
}

impl EditorModeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> ModeKind {
        self.mode.kind()
    }

    pub fn mode(&self) -> &EditorMode {
        &self.mode
    }

    /// Switch to `kind`. On a failed precondition the current mode stays
    /// active and untouched; otherwise any live gesture of the old mode is
    /// cancelled first.
    pub fn enter(&mut self, kind: ModeKind, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        if let Err(err) = check_entry(kind, cx.doc, cx.object, cx.frame) {
            log::warn!("cannot enter {kind} on {}: {err}", cx.object);
            return Err(err);
        }
        let outcome = self.mode.on_cancel(cx)?;
        log::debug!("mode {} -> {kind}", self.kind());
        self.mode = EditorMode::new(kind);
        Ok(outcome)
    }

    /// Drop back to cursor without touching the document. For use when the
    /// active object is gone and nothing is in progress.
    pub fn reset(&mut self) {
        if self.kind() != ModeKind::Cursor {
            log::debug!("mode {} reset to cursor", self.kind());
        }
        self.mode = EditorMode::Cursor;
    }

    pub fn pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let outcome = self.mode.on_pointer_down(cx, ev)?;
        Ok(self.follow(outcome, cx))
    }

    pub fn pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let outcome = self.mode.on_pointer_move(cx, ev)?;
        Ok(self.follow(outcome, cx))
    }

    pub fn pointer_up(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let outcome = self.mode.on_pointer_up(cx, ev)?;
        Ok(self.follow(outcome, cx))
    }

    pub fn cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        self.mode.on_cancel(cx)
    }

    /// Apply a transition requested by a completed gesture.
    fn follow(&mut self, mut outcome: ModeOutcome, cx: &mut ModeContext) -> ModeOutcome {
        if let Some(next) = outcome.next {
            if let Err(err) = self.enter(next, cx) {
                log::warn!("transition to {next} refused: {err}");
                outcome.next = None;
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::mode::SrtTool;
    use crate::stack::CommandStack;
    use glam::Vec2;
    use rigkit_animation_core::Easing;
    use rigkit_posture_core::{Posture, PostureSolver};
    use rigkit_rig_core::MeshTopology;

    struct Fixture {
        doc: Document,
        stack: CommandStack,
        config: EditorConfig,
        posture: Posture,
        object: ObjectId,
    }

    impl Fixture {
        fn new(mesh: Option<MeshTopology>) -> Self {
            let mut doc = Document::default();
            let object = match mesh {
                Some(mesh) => doc.add_object_with_mesh("obj", mesh),
                None => doc.add_object("obj"),
            };
            let posture = PostureSolver::new().solve(&doc, 0);
            Self {
                doc,
                stack: CommandStack::default(),
                config: EditorConfig::default(),
                posture,
                object,
            }
        }

        fn cx(&mut self, frame: Frame) -> ModeContext<'_> {
            ModeContext {
                doc: &mut self.doc,
                stack: &mut self.stack,
                config: &self.config,
                posture: &self.posture,
                object: self.object,
                frame,
                bone: None,
            }
        }
    }

    fn square() -> MeshTopology {
        MeshTopology::grid(Vec2::new(10.0, 10.0), 10.0).unwrap()
    }

    #[test]
    fn ffd_needs_a_mesh() {
        let mut fx = Fixture::new(None);
        let mut machine = EditorModeMachine::new();
        let err = machine.enter(ModeKind::FfdDrag, &mut fx.cx(0)).unwrap_err();
        assert_eq!(err.category(), "precondition");
        assert_eq!(machine.kind(), ModeKind::Cursor);
    }

    #[test]
    fn pose_modes_need_bones() {
        let mut fx = Fixture::new(Some(square()));
        let mut machine = EditorModeMachine::new();
        assert!(machine.enter(ModeKind::PoseDrawBone, &mut fx.cx(0)).is_err());
        assert!(machine.enter(ModeKind::BoneCreate, &mut fx.cx(0)).is_ok());
        assert_eq!(machine.kind(), ModeKind::BoneCreate);
    }

    #[test]
    fn mesh_edit_between_mesh_keys_is_refused() {
        let mut fx = Fixture::new(Some(square()));
        let keyed = fx.doc.object(fx.object).unwrap().base_mesh().clone();
        fx.doc
            .push_key(fx.object, 10, rigkit_animation_core::AttrValue::Mesh(keyed), Easing::LINEAR)
            .unwrap();
        let mut machine = EditorModeMachine::new();
        let err = machine.enter(ModeKind::MeshCreate, &mut fx.cx(5)).unwrap_err();
        assert!(matches!(err, RigError::PreconditionUnmet(ref d) if d.mode == "mesh-create"));
        assert!(machine.enter(ModeKind::MeshCreate, &mut fx.cx(10)).is_ok());
    }

    #[test]
    fn switching_modes_cancels_live_gesture() {
        let mut fx = Fixture::new(Some(square()));
        let before = fx.doc.clone();
        let mut machine = EditorModeMachine::new();
        machine.enter(ModeKind::Centroid, &mut fx.cx(0)).unwrap();
        machine
            .pointer_down(&mut fx.cx(0), PointerEvent::at(Vec2::ZERO))
            .unwrap();
        machine
            .pointer_move(&mut fx.cx(0), PointerEvent::at(Vec2::new(2.0, 3.0)))
            .unwrap();
        assert_eq!(fx.doc.object(fx.object).unwrap().pivot, Vec2::new(7.0, 8.0));

        machine
            .enter(ModeKind::Srt(SrtTool::Translate), &mut fx.cx(0))
            .unwrap();
        assert_eq!(fx.doc, before);
        assert!(fx.stack.is_empty());
    }

    #[test]
    fn split_hands_back_to_mesh_create() {
        let mut fx = Fixture::new(Some(square()));
        let mut machine = EditorModeMachine::new();
        machine.enter(ModeKind::MeshSplit, &mut fx.cx(0)).unwrap();
        let outcome = machine
            .pointer_down(&mut fx.cx(0), PointerEvent::at(Vec2::new(8.0, 2.0)))
            .unwrap();
        assert_eq!(outcome.next, Some(ModeKind::MeshCreate));
        assert_eq!(machine.kind(), ModeKind::MeshCreate);
        assert_eq!(fx.stack.len(), 1);
        assert!(fx.doc.object(fx.object).unwrap().base_mesh().triangle_count() > 2);
    }
}
