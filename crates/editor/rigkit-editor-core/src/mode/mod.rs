//! Editing modes.
//!
//! `EditorMode` is a tagged variant: each state carries its own payload and
//! handles pointer input through `ModeHandler`. `EditorModeMachine` owns the
//! active mode, checks entry preconditions and performs transitions.
//!
//! Pointer positions arrive in world space; handlers map them into the
//! active object's space with `ModeContext::local`.

mod bone;
mod ffd;
mod machine;
mod mesh;
mod pose;
mod srt;

use std::fmt;

use glam::Vec2;
use rigkit_api_core::{BoneId, Frame, ObjectId, RigError};
use rigkit_posture_core::{Document, Posture};
use serde::{Deserialize, Serialize};

use crate::config::EditorConfig;
use crate::gesture::Gesture;
use crate::stack::CommandStack;

pub use bone::{BindMode, BoneCreateMode, InfluenceMode, MoveJointMode};
pub use ffd::{FfdBrushMode, FfdDragMode};
pub use machine::EditorModeMachine;
pub use mesh::{MeshCreateMode, MeshDeleteMode, MeshSplitMode};
pub use pose::{DrawBoneMode, PoseEraseMode, PoseTransformMode};
pub use srt::{CentroidMode, SrtMode};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SrtTool {
    #[default]
    Translate,
    Rotate,
    Scale,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfluenceTool {
    /// Drag the selected bone's influence range, then regenerate weights.
    #[default]
    Adjust,
    Paint,
    Erase,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoseTool {
    /// Rotate relative to where the drag started.
    #[default]
    Rotate,
    /// Translate the bone's joint.
    Pull,
}

/// Which mode is active, without its payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeKind {
    #[default]
    Cursor,
    Srt(SrtTool),
    Centroid,
    BoneCreate,
    BoneMoveJoint,
    BoneBind,
    BoneInfluence(InfluenceTool),
    MeshCreate,
    MeshDelete,
    MeshSplit,
    FfdDrag,
    FfdBrush,
    PoseTransform(PoseTool),
    PoseDrawBone,
    PoseErase,
}

impl ModeKind {
    pub fn name(self) -> &'static str {
        match self {
            ModeKind::Cursor => "cursor",
            ModeKind::Srt(SrtTool::Translate) => "translate",
            ModeKind::Srt(SrtTool::Rotate) => "rotate",
            ModeKind::Srt(SrtTool::Scale) => "scale",
            ModeKind::Centroid => "centroid",
            ModeKind::BoneCreate => "bone-create",
            ModeKind::BoneMoveJoint => "bone-move-joint",
            ModeKind::BoneBind => "bone-bind",
            ModeKind::BoneInfluence(InfluenceTool::Adjust) => "influence-adjust",
            ModeKind::BoneInfluence(InfluenceTool::Paint) => "influence-paint",
            ModeKind::BoneInfluence(InfluenceTool::Erase) => "influence-erase",
            ModeKind::MeshCreate => "mesh-create",
            ModeKind::MeshDelete => "mesh-delete",
            ModeKind::MeshSplit => "mesh-split",
            ModeKind::FfdDrag => "ffd-drag",
            ModeKind::FfdBrush => "ffd-brush",
            ModeKind::PoseTransform(PoseTool::Rotate) => "pose-rotate",
            ModeKind::PoseTransform(PoseTool::Pull) => "pose-pull",
            ModeKind::PoseDrawBone => "pose-draw-bone",
            ModeKind::PoseErase => "pose-erase",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// World space.
    pub position: Vec2,
    /// 0..=1; devices without pressure report 1.
    #[serde(default = "full_pressure")]
    pub pressure: f32,
}

fn full_pressure() -> f32 {
    1.0
}

impl PointerEvent {
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            pressure: 1.0,
        }
    }
}

/// Everything a handler may read or change while processing one event.
pub struct ModeContext<'a> {
    pub doc: &'a mut Document,
    pub stack: &'a mut CommandStack,
    pub config: &'a EditorConfig,
    /// Posture of the current frame, solved before the event.
    pub posture: &'a Posture,
    pub object: ObjectId,
    pub frame: Frame,
    pub bone: Option<BoneId>,
}

impl ModeContext<'_> {
    /// World point in the active object's space.
    pub fn local(&self, world: Vec2) -> Vec2 {
        self.posture
            .get(self.object)
            .map_or(world, |o| o.transform.inverse().transform_point2(world))
    }
}

/// What a handled event did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModeOutcome {
    /// The document changed (live gesture step or committed edit).
    pub changed: bool,
    /// Label of the history entry recorded by this event.
    pub committed: Option<String>,
    /// Transition requested on completion of a multi-step gesture.
    pub next: Option<ModeKind>,
    pub select_bone: Option<BoneId>,
}

impl ModeOutcome {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn changed() -> Self {
        Self {
            changed: true,
            ..Self::default()
        }
    }

    pub fn committed(label: Option<String>) -> Self {
        Self {
            changed: label.is_some(),
            committed: label,
            ..Self::default()
        }
    }

    pub fn with_bone(mut self, bone: BoneId) -> Self {
        self.select_bone = Some(bone);
        self
    }
}

pub trait ModeHandler {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError>;
    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError>;
    fn on_pointer_up(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError>;
    /// Abandon whatever is in progress. Live edits are reverted.
    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError>;
}

/// A live gesture plus the pointer state it started from.
#[derive(Debug)]
pub(crate) struct Drag<S> {
    pub gesture: Gesture,
    /// Local position at pointer down.
    pub origin: Vec2,
    pub state: S,
}

impl<S> Drag<S> {
    pub fn new(label: impl Into<String>, origin: Vec2, state: S) -> Self {
        Self {
            gesture: Gesture::new(label),
            origin,
            state,
        }
    }
}

pub(crate) fn commit_drag<S>(drag: Option<Drag<S>>, stack: &mut CommandStack) -> ModeOutcome {
    match drag {
        Some(drag) => ModeOutcome::committed(drag.gesture.commit(stack)),
        None => ModeOutcome::idle(),
    }
}

pub(crate) fn cancel_drag<S>(drag: Option<Drag<S>>, doc: &mut Document) -> Result<ModeOutcome, RigError> {
    match drag {
        Some(drag) => {
            let changed = !drag.gesture.is_empty();
            drag.gesture.cancel(doc)?;
            Ok(ModeOutcome {
                changed,
                ..ModeOutcome::default()
            })
        }
        None => Ok(ModeOutcome::idle()),
    }
}

/// Signed angle from `a` to `b`, radians.
pub(crate) fn signed_angle(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b).atan2(a.dot(b))
}

/// The active mode with its per-mode state.
#[derive(Debug, Default)]
pub enum EditorMode {
    #[default]
    Cursor,
    Srt(SrtMode),
    Centroid(CentroidMode),
    BoneCreate(BoneCreateMode),
    BoneMoveJoint(MoveJointMode),
    BoneBind(BindMode),
    BoneInfluence(InfluenceMode),
    MeshCreate(MeshCreateMode),
    MeshDelete(MeshDeleteMode),
    MeshSplit(MeshSplitMode),
    FfdDrag(FfdDragMode),
    FfdBrush(FfdBrushMode),
    PoseTransform(PoseTransformMode),
    PoseDrawBone(DrawBoneMode),
    PoseErase(PoseEraseMode),
}

impl EditorMode {
    pub fn new(kind: ModeKind) -> Self {
        match kind {
            ModeKind::Cursor => EditorMode::Cursor,
            ModeKind::Srt(tool) => EditorMode::Srt(SrtMode::new(tool)),
            ModeKind::Centroid => EditorMode::Centroid(CentroidMode::default()),
            ModeKind::BoneCreate => EditorMode::BoneCreate(BoneCreateMode::default()),
            ModeKind::BoneMoveJoint => EditorMode::BoneMoveJoint(MoveJointMode::default()),
            ModeKind::BoneBind => EditorMode::BoneBind(BindMode::default()),
            ModeKind::BoneInfluence(tool) => EditorMode::BoneInfluence(InfluenceMode::new(tool)),
            ModeKind::MeshCreate => EditorMode::MeshCreate(MeshCreateMode::default()),
            ModeKind::MeshDelete => EditorMode::MeshDelete(MeshDeleteMode),
            ModeKind::MeshSplit => EditorMode::MeshSplit(MeshSplitMode),
            ModeKind::FfdDrag => EditorMode::FfdDrag(FfdDragMode::default()),
            ModeKind::FfdBrush => EditorMode::FfdBrush(FfdBrushMode::default()),
            ModeKind::PoseTransform(tool) => EditorMode::PoseTransform(PoseTransformMode::new(tool)),
            ModeKind::PoseDrawBone => EditorMode::PoseDrawBone(DrawBoneMode::default()),
            ModeKind::PoseErase => EditorMode::PoseErase(PoseEraseMode::default()),
        }
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            EditorMode::Cursor => ModeKind::Cursor,
            EditorMode::Srt(m) => ModeKind::Srt(m.tool()),
            EditorMode::Centroid(_) => ModeKind::Centroid,
            EditorMode::BoneCreate(_) => ModeKind::BoneCreate,
            EditorMode::BoneMoveJoint(_) => ModeKind::BoneMoveJoint,
            EditorMode::BoneBind(_) => ModeKind::BoneBind,
            EditorMode::BoneInfluence(m) => ModeKind::BoneInfluence(m.tool()),
            EditorMode::MeshCreate(_) => ModeKind::MeshCreate,
            EditorMode::MeshDelete(_) => ModeKind::MeshDelete,
            EditorMode::MeshSplit(_) => ModeKind::MeshSplit,
            EditorMode::FfdDrag(_) => ModeKind::FfdDrag,
            EditorMode::FfdBrush(_) => ModeKind::FfdBrush,
            EditorMode::PoseTransform(m) => ModeKind::PoseTransform(m.tool()),
            EditorMode::PoseDrawBone(_) => ModeKind::PoseDrawBone,
            EditorMode::PoseErase(_) => ModeKind::PoseErase,
        }
    }

    fn handler(&mut self) -> Option<&mut dyn ModeHandler> {
        let handler: &mut dyn ModeHandler = match self {
            EditorMode::Cursor => return None,
            EditorMode::Srt(m) => m,
            EditorMode::Centroid(m) => m,
            EditorMode::BoneCreate(m) => m,
            EditorMode::BoneMoveJoint(m) => m,
            EditorMode::BoneBind(m) => m,
            EditorMode::BoneInfluence(m) => m,
            EditorMode::MeshCreate(m) => m,
            EditorMode::MeshDelete(m) => m,
            EditorMode::MeshSplit(m) => m,
            EditorMode::FfdDrag(m) => m,
            EditorMode::FfdBrush(m) => m,
            EditorMode::PoseTransform(m) => m,
            EditorMode::PoseDrawBone(m) => m,
            EditorMode::PoseErase(m) => m,
        };
        Some(handler)
    }
}

impl ModeHandler for EditorMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        match self.handler() {
            Some(h) => h.on_pointer_down(cx, ev),
            None => Ok(ModeOutcome::idle()),
        }
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        match self.handler() {
            Some(h) => h.on_pointer_move(cx, ev),
            None => Ok(ModeOutcome::idle()),
        }
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        match self.handler() {
            Some(h) => h.on_pointer_up(cx, ev),
            None => Ok(ModeOutcome::idle()),
        }
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        match self.handler() {
            Some(h) => h.on_cancel(cx),
            None => Ok(ModeOutcome::idle()),
        }
    }
}
