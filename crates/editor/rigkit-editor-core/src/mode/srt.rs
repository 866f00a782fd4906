//! Whole-object transform modes.

use glam::{Affine2, Mat2, Vec2};
use rigkit_animation_core::{AttrValue, AttributeKind, Easing};
use rigkit_api_core::{RigError, Srt};

use super::{cancel_drag, commit_drag, signed_angle, Drag, ModeContext, ModeHandler, ModeOutcome, PointerEvent, SrtTool};
use crate::commands::{key_current, PushKey, SetPivot};

#[derive(Debug)]
struct SrtStart {
    value: AttrValue,
    easing: Easing,
    /// World positions.
    down: Vec2,
    pivot: Vec2,
    /// World vectors into the space the `Move` attribute lives in (the
    /// owner bone's for bound objects).
    to_parent: Mat2,
}

fn invert(m: Mat2) -> Option<Mat2> {
    (m.determinant().abs() > f32::EPSILON).then(|| m.inverse())
}

/// Translate, rotate or scale the object by keying its SRT attributes at the
/// current frame.
#[derive(Debug)]
pub struct SrtMode {
    tool: SrtTool,
    drag: Option<Drag<SrtStart>>,
}

impl SrtMode {
    pub fn new(tool: SrtTool) -> Self {
        Self { tool, drag: None }
    }

    pub fn tool(&self) -> SrtTool {
        self.tool
    }

    fn kind(&self) -> AttributeKind {
        match self.tool {
            SrtTool::Translate => AttributeKind::Move,
            SrtTool::Rotate => AttributeKind::Rotate,
            SrtTool::Scale => AttributeKind::Scale,
        }
    }
}

impl ModeHandler for SrtMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let kind = self.kind();
        let object = cx.doc.object(cx.object)?;
        let solved = cx.posture.get(cx.object);
        let pivot = solved.map_or(object.pivot, |o| o.transform.transform_point2(object.pivot));
        let sample = object.timeline.sample_all(cx.frame);
        let own = Srt::new(sample.movement, sample.rotation, sample.scaling).to_affine(object.pivot);
        // world = parent * own, and Move sits outside own's linear part
        let to_parent = solved
            .zip(invert(own.matrix2))
            .and_then(|(o, own_inv)| invert(o.transform.matrix2 * own_inv))
            .unwrap_or(Mat2::IDENTITY);
        let start = SrtStart {
            value: object.timeline.sample(kind, cx.frame),
            easing: object
                .timeline
                .key(kind, cx.frame)
                .map_or(Easing::LINEAR, |k| k.easing),
            down: ev.position,
            pivot,
            to_parent,
        };
        let mut drag = Drag::new(format!("{kind} object"), cx.local(ev.position), start);
        if let Some(key) = key_current(cx.doc, cx.object, kind, cx.frame)? {
            drag.gesture.step(cx.doc, Box::new(key))?;
        }
        let changed = !drag.gesture.is_empty();
        self.drag = Some(drag);
        Ok(if changed { ModeOutcome::changed() } else { ModeOutcome::idle() })
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        let s = &drag.state;
        let value = match (&s.value, self.tool) {
            (AttrValue::Move(t), SrtTool::Translate) => AttrValue::Move(*t + s.to_parent * (ev.position - s.down)),
            (AttrValue::Rotate(r), SrtTool::Rotate) => {
                AttrValue::Rotate(r + signed_angle(s.down - s.pivot, ev.position - s.pivot))
            }
            (AttrValue::Scale(k), SrtTool::Scale) => {
                let reach = s.down.distance(s.pivot);
                if reach <= f32::EPSILON {
                    return Ok(ModeOutcome::idle());
                }
                AttrValue::Scale(*k * (ev.position.distance(s.pivot) / reach))
            }
            _ => return Ok(ModeOutcome::idle()),
        };
        let easing = s.easing;
        drag.gesture
            .step(cx.doc, Box::new(PushKey::new(cx.object, cx.frame, value, easing)))?;
        Ok(ModeOutcome::changed())
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}

#[derive(Debug)]
struct PivotStart {
    pivot: Vec2,
    /// World-to-object transform at pointer down; moving the pivot changes
    /// the live one.
    to_local: Affine2,
}

/// Drag the object's pivot (rotation / scale centre).
#[derive(Debug, Default)]
pub struct CentroidMode {
    drag: Option<Drag<PivotStart>>,
}

impl ModeHandler for CentroidMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let pivot = cx.doc.object(cx.object)?.pivot;
        let to_local = cx
            .posture
            .get(cx.object)
            .map_or(Affine2::IDENTITY, |o| o.transform.inverse());
        let origin = to_local.transform_point2(ev.position);
        self.drag = Some(Drag::new("move pivot", origin, PivotStart { pivot, to_local }));
        Ok(ModeOutcome::idle())
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        let local = drag.state.to_local.transform_point2(ev.position);
        let pivot = drag.state.pivot + (local - drag.origin);
        drag.gesture.step(cx.doc, Box::new(SetPivot::new(cx.object, pivot)))?;
        Ok(ModeOutcome::changed())
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}
