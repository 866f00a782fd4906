//! Posing modes. Every edit writes the pose key at the current frame,
//! keying it first from the sampled pose when the frame has none.

use std::collections::BTreeSet;

use glam::{Affine2, Vec2};
use rigkit_animation_core::AttributeKind;
use rigkit_api_core::{BoneId, RigError};
use rigkit_rig_core::{BonePose, PoseTransforms};

use super::{
    cancel_drag, commit_drag, signed_angle, Drag, ModeContext, ModeHandler, ModeOutcome, PointerEvent, PoseTool,
};
use crate::commands::{key_current, SetBonePose};

/// Posed bone under `local`, with the transforms it was picked from.
fn pick_posed(cx: &ModeContext, local: Vec2) -> Result<Option<(BoneId, PoseTransforms)>, RigError> {
    let object = cx.doc.object(cx.object)?;
    let Some(rig) = object.rig.as_ref() else {
        return Ok(None);
    };
    let pose = object.timeline.pose.sample(cx.frame);
    let transforms = rig.compute_pose(&pose);
    Ok(rig
        .pick(local, cx.config.pick_radius, &transforms)
        .map(|bone| (bone, transforms)))
}

fn current_pose(cx: &ModeContext, bone: BoneId) -> Result<BonePose, RigError> {
    Ok(cx.doc.object(cx.object)?.timeline.pose.sample(cx.frame).get(bone))
}

#[derive(Debug)]
struct Grab {
    bone: BoneId,
    start: BonePose,
    /// Posed joint, object space.
    joint: Vec2,
    /// Inverse of the parent's posed transform, for pulls.
    parent_inv: Affine2,
    /// World direction of the bone at pointer down.
    angle: f32,
}

/// Open a posing gesture on the bone under the pointer.
fn grab(cx: &mut ModeContext, label: &str, local: Vec2) -> Result<Option<Drag<Grab>>, RigError> {
    let Some((bone, transforms)) = pick_posed(cx, local)? else {
        return Ok(None);
    };
    let Some(t) = transforms.get(bone) else {
        return Ok(None);
    };
    let parent = cx
        .doc
        .object(cx.object)?
        .rig
        .as_ref()
        .and_then(|r| r.get(bone))
        .and_then(|b| b.parent);
    let parent_inv = parent
        .and_then(|p| transforms.get(p))
        .map_or(Affine2::IDENTITY, |p| p.posed_world.inverse());
    let (joint, tip) = t.segment();
    let dir = tip - joint;
    let state = Grab {
        bone,
        start: current_pose(cx, bone)?,
        joint,
        parent_inv,
        angle: dir.y.atan2(dir.x),
    };
    let mut drag = Drag::new(format!("{label} {bone}"), local, state);
    if let Some(key) = key_current(cx.doc, cx.object, AttributeKind::Pose, cx.frame)? {
        drag.gesture.step(cx.doc, Box::new(key))?;
    }
    Ok(Some(drag))
}

fn set_pose(cx: &mut ModeContext, drag: &mut Drag<Grab>, pose: BonePose) -> Result<ModeOutcome, RigError> {
    let step = SetBonePose::new(cx.object, Some(cx.frame), drag.state.bone, Some(pose));
    drag.gesture.step(cx.doc, Box::new(step))?;
    Ok(ModeOutcome::changed())
}

/// Rotate or pull a bone relative to where the drag started.
#[derive(Debug)]
pub struct PoseTransformMode {
    tool: PoseTool,
    drag: Option<Drag<Grab>>,
}

impl PoseTransformMode {
    pub fn new(tool: PoseTool) -> Self {
        Self { tool, drag: None }
    }

    pub fn tool(&self) -> PoseTool {
        self.tool
    }
}

impl ModeHandler for PoseTransformMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let label = match self.tool {
            PoseTool::Rotate => "rotate",
            PoseTool::Pull => "pull",
        };
        let local = cx.local(ev.position);
        let Some(drag) = grab(cx, label, local)? else {
            return Ok(ModeOutcome::idle());
        };
        let bone = drag.state.bone;
        let changed = !drag.gesture.is_empty();
        self.drag = Some(drag);
        let outcome = if changed { ModeOutcome::changed() } else { ModeOutcome::idle() };
        Ok(outcome.with_bone(bone))
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        let g = &drag.state;
        let pose = match self.tool {
            PoseTool::Rotate => BonePose {
                rotate: g.start.rotate + signed_angle(drag.origin - g.joint, local - g.joint),
                translate: g.start.translate,
            },
            PoseTool::Pull => BonePose {
                rotate: g.start.rotate,
                translate: g.start.translate + g.parent_inv.transform_vector2(local - drag.origin),
            },
        };
        set_pose(cx, drag, pose)
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}

/// Aim a bone at the pointer: its posed direction follows the drag.
#[derive(Debug, Default)]
pub struct DrawBoneMode {
    drag: Option<Drag<Grab>>,
}

impl ModeHandler for DrawBoneMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let Some(drag) = grab(cx, "aim", local)? else {
            return Ok(ModeOutcome::idle());
        };
        let bone = drag.state.bone;
        let changed = !drag.gesture.is_empty();
        self.drag = Some(drag);
        let outcome = if changed { ModeOutcome::changed() } else { ModeOutcome::idle() };
        Ok(outcome.with_bone(bone))
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        let g = &drag.state;
        let to = local - g.joint;
        if to.length_squared() <= f32::EPSILON {
            return Ok(ModeOutcome::idle());
        }
        let pose = BonePose {
            rotate: g.start.rotate + to.y.atan2(to.x) - g.angle,
            translate: g.start.translate,
        };
        set_pose(cx, drag, pose)
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}

/// Sweep over bones to drop their entries from the pose key at this frame.
#[derive(Debug, Default)]
pub struct PoseEraseMode {
    drag: Option<Drag<BTreeSet<BoneId>>>,
}

impl PoseEraseMode {
    fn erase_under(&mut self, cx: &mut ModeContext, local: Vec2) -> Result<ModeOutcome, RigError> {
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        let Some((bone, _)) = pick_posed(cx, local)? else {
            return Ok(ModeOutcome::idle());
        };
        let keyed = cx
            .doc
            .object(cx.object)?
            .timeline
            .pose
            .key(cx.frame)
            .is_some_and(|k| k.value.bones.contains_key(&bone));
        if !keyed || !drag.state.insert(bone) {
            return Ok(ModeOutcome::idle());
        }
        let step = SetBonePose::new(cx.object, Some(cx.frame), bone, None);
        drag.gesture.step(cx.doc, Box::new(step))?;
        Ok(ModeOutcome::changed())
    }
}

impl ModeHandler for PoseEraseMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        self.drag = Some(Drag::new("erase pose", local, BTreeSet::new()));
        self.erase_under(cx, local)
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        self.erase_under(cx, local)
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}
