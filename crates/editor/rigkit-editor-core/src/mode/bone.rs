//! Skeleton authoring modes: creating bones, moving joints, binding the
//! object to another object's bone, and influence editing.

use glam::{Affine2, Vec2};
use rigkit_api_core::{BoneId, ObjectId, RigError};
use rigkit_posture_core::BoneBinding;
use rigkit_rig_core::rig::distance_to_segment;
use rigkit_rig_core::{BoneRest, BoneRig, InfluenceRange, PoseValue};

use super::{cancel_drag, commit_drag, Drag, InfluenceTool, ModeContext, ModeHandler, ModeOutcome, PointerEvent};
use crate::command::Command;
use crate::commands::{AddBone, GenerateInfluence, MoveJoint, PaintInfluence, SetBinding, SetBoneRange};

/// Shortest bone a drag may create, in object units.
const MIN_BONE_LENGTH: f32 = 1e-3;

fn require_rig<'a>(cx: &'a ModeContext, mode: &str) -> Result<&'a BoneRig, RigError> {
    cx.doc
        .object(cx.object)?
        .rig
        .as_ref()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| RigError::precondition(mode, format!("{} has no bones", cx.object)))
}

/// Press at the joint, release at the tip. The new bone hangs off the
/// selected bone and becomes the selection.
#[derive(Debug, Default)]
pub struct BoneCreateMode {
    joint: Option<Vec2>,
}

impl ModeHandler for BoneCreateMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let mut joint = cx.local(ev.position);
        let object = cx.doc.object(cx.object)?;
        if let (Some(rig), Some(parent)) = (&object.rig, cx.bone) {
            // snap to the parent's tip
            if let Ok((_, tip)) = rig.rest_segment(parent) {
                if tip.distance(joint) <= cx.config.pick_radius {
                    joint = tip;
                }
            }
        }
        self.joint = Some(joint);
        Ok(ModeOutcome::idle())
    }

    fn on_pointer_move(&mut self, _cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let Some(joint) = self.joint.take() else {
            return Ok(ModeOutcome::idle());
        };
        let tip = cx.local(ev.position);
        let length = joint.distance(tip);
        if length < MIN_BONE_LENGTH {
            return Ok(ModeOutcome::idle());
        }
        let object = cx.doc.object(cx.object)?;
        let parent = cx
            .bone
            .filter(|b| object.rig.as_ref().is_some_and(|r| r.contains(*b)));
        let parent_world = match (parent, &object.rig) {
            (Some(p), Some(rig)) => rig.rest_world(p)?,
            _ => Affine2::IDENTITY,
        };
        let dir = tip - joint;
        let angle = dir.y.atan2(dir.x);
        let rest = BoneRest::from_world(&parent_world, joint, angle, length);
        let name = format!("bone {}", object.bone_count() + 1);

        let mut add = AddBone::new(cx.object, name, parent, rest);
        add.apply(cx.doc)?;
        let created = add.bone();
        let label = cx.stack.push_applied(Box::new(add));
        let outcome = ModeOutcome::committed(Some(label));
        Ok(match created {
            Some(bone) => outcome.with_bone(bone),
            None => outcome,
        })
    }

    fn on_cancel(&mut self, _cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        self.joint = None;
        Ok(ModeOutcome::idle())
    }
}

/// Drag a bone's rest joint. Children keep their world placement.
#[derive(Debug, Default)]
pub struct MoveJointMode {
    drag: Option<Drag<BoneId>>,
}

impl ModeHandler for MoveJointMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let rig = require_rig(cx, "bone-move-joint")?;
        let rest = rig.compute_pose(&PoseValue::new());
        let picked = rest
            .iter()
            .map(|(id, t)| (id, t.segment().0.distance(local)))
            .filter(|(_, d)| *d <= cx.config.pick_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id);
        let Some(bone) = picked else {
            return Ok(ModeOutcome::idle());
        };
        self.drag = Some(Drag::new(format!("move joint of {bone}"), local, bone));
        Ok(ModeOutcome::idle().with_bone(bone))
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        drag.gesture
            .step(cx.doc, Box::new(MoveJoint::new(cx.object, drag.state, local)))?;
        Ok(ModeOutcome::changed())
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}

/// Click another object's bone to bind to it; click empty space to unbind.
#[derive(Debug, Default)]
pub struct BindMode {
    pending: Option<Option<(ObjectId, BoneId)>>,
}

impl BindMode {
    /// Nearest posed bone of any other visible object, in world space.
    fn pick(cx: &ModeContext, world: Vec2) -> Option<(ObjectId, BoneId)> {
        cx.posture
            .objects
            .iter()
            .filter(|o| o.object != cx.object && o.visible)
            .flat_map(|o| o.bones.iter().map(move |(b, a, t)| (o.object, *b, *a, *t)))
            .map(|(owner, bone, a, b)| (owner, bone, distance_to_segment(world, a, b)))
            .filter(|(_, _, d)| *d <= cx.config.pick_radius)
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(owner, bone, _)| (owner, bone))
    }
}

impl ModeHandler for BindMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        self.pending = Some(Self::pick(cx, ev.position));
        Ok(ModeOutcome::idle())
    }

    fn on_pointer_move(&mut self, _cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let Some(target) = self.pending.take() else {
            return Ok(ModeOutcome::idle());
        };
        let current = cx.doc.object(cx.object)?.binding;
        let binding = target.map(|(owner, bone)| BoneBinding { owner, bone });
        if binding == current {
            return Ok(ModeOutcome::idle());
        }
        let label = cx
            .stack
            .push(cx.doc, Box::new(SetBinding::new(cx.object, binding)))?;
        Ok(ModeOutcome::committed(Some(label)))
    }

    fn on_cancel(&mut self, _cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        self.pending = None;
        Ok(ModeOutcome::idle())
    }
}

/// Influence editing for the selected bone.
#[derive(Debug)]
pub struct InfluenceMode {
    tool: InfluenceTool,
    drag: Option<Drag<BoneId>>,
}

impl InfluenceMode {
    pub fn new(tool: InfluenceTool) -> Self {
        Self { tool, drag: None }
    }

    pub fn tool(&self) -> InfluenceTool {
        self.tool
    }

    fn dab(&mut self, cx: &mut ModeContext, local: Vec2) -> Result<ModeOutcome, RigError> {
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        let bone = drag.state;
        let step: Box<dyn Command> = match self.tool {
            InfluenceTool::Adjust => {
                let (a, b) = require_rig(cx, "bone-influence")?.rest_segment(bone)?;
                let outer = distance_to_segment(local, a, b).max(1.0);
                let range = InfluenceRange::new(outer * 0.5, outer);
                Box::new(SetBoneRange::new(cx.object, bone, Some(range)))
            }
            InfluenceTool::Paint | InfluenceTool::Erase => Box::new(PaintInfluence::new(
                cx.object,
                bone,
                local,
                cx.config.influence_brush,
                self.tool == InfluenceTool::Erase,
            )),
        };
        drag.gesture.step(cx.doc, step)?;
        Ok(ModeOutcome::changed())
    }
}

impl ModeHandler for InfluenceMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let rig = require_rig(cx, "bone-influence")?;
        let bone = cx
            .bone
            .filter(|b| rig.contains(*b))
            .ok_or_else(|| RigError::precondition("bone-influence", "no bone is selected"))?;
        let local = cx.local(ev.position);
        let label = match self.tool {
            InfluenceTool::Adjust => format!("adjust influence of {bone}"),
            InfluenceTool::Paint => format!("paint influence of {bone}"),
            InfluenceTool::Erase => format!("erase influence of {bone}"),
        };
        self.drag = Some(Drag::new(label, local, bone));
        match self.tool {
            InfluenceTool::Adjust => Ok(ModeOutcome::idle()),
            InfluenceTool::Paint | InfluenceTool::Erase => self.dab(cx, local),
        }
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        self.dab(cx, local)
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        if self.tool == InfluenceTool::Adjust {
            if let Some(drag) = self.drag.as_mut().filter(|d| !d.gesture.is_empty()) {
                drag.gesture
                    .step(cx.doc, Box::new(GenerateInfluence::new(cx.object)))?;
            }
        }
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}
