//! Lattice modes. The first press on an object without a lattice fits one
//! to its mesh; every gesture keys the FFD attribute at the current frame
//! before touching it.

use glam::Vec2;
use rigkit_animation_core::AttributeKind;
use rigkit_api_core::RigError;
use rigkit_rig_core::BasisOrder;

use super::{cancel_drag, commit_drag, Drag, ModeContext, ModeHandler, ModeOutcome, PointerEvent};
use crate::commands::{key_current, FfdStroke, ReplaceLattice, SetFfdOffset};

/// Open a gesture with the lattice fitted and the frame keyed.
fn begin<S>(cx: &mut ModeContext, label: &str, origin: Vec2, state: S) -> Result<Drag<S>, RigError> {
    let mut drag = Drag::new(label, origin, state);
    if let Err(err) = prepare(cx, &mut drag) {
        drag.gesture.cancel(cx.doc)?;
        return Err(err);
    }
    Ok(drag)
}

fn prepare<S>(cx: &mut ModeContext, drag: &mut Drag<S>) -> Result<(), RigError> {
    if cx.doc.object(cx.object)?.lattice.is_none() {
        let fit = ReplaceLattice::fit(cx.doc, cx.object, cx.config.lattice_cell, BasisOrder::default())?;
        drag.gesture.step(cx.doc, Box::new(fit))?;
    }
    if let Some(key) = key_current(cx.doc, cx.object, AttributeKind::Ffd, cx.frame)? {
        drag.gesture.step(cx.doc, Box::new(key))?;
    }
    Ok(())
}

#[derive(Debug)]
struct Handle {
    index: usize,
    start: Vec2,
}

/// Drag single control points.
#[derive(Debug, Default)]
pub struct FfdDragMode {
    drag: Option<Drag<Option<Handle>>>,
}

impl ModeHandler for FfdDragMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let mut drag = begin(cx, "drag lattice", local, None)?;
        let object = cx.doc.object(cx.object)?;
        let picked = match (&object.lattice, object.timeline.ffd.key(cx.frame)) {
            (Some(lattice), Some(key)) => lattice
                .pick(local, cx.config.pick_radius, &key.value)
                .map(|index| Handle {
                    index,
                    start: key.value.get(index),
                }),
            _ => None,
        };
        match picked {
            Some(handle) => {
                drag.state = Some(handle);
                let changed = !drag.gesture.is_empty();
                self.drag = Some(drag);
                Ok(if changed { ModeOutcome::changed() } else { ModeOutcome::idle() })
            }
            // nothing under the pointer: undo the fit and auto-key
            None => cancel_drag(Some(drag), cx.doc),
        }
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        let Some(handle) = &drag.state else {
            return Ok(ModeOutcome::idle());
        };
        let offset = handle.start + (local - drag.origin);
        let step = SetFfdOffset::new(cx.object, Some(cx.frame), handle.index, offset);
        drag.gesture.step(cx.doc, Box::new(step))?;
        Ok(ModeOutcome::changed())
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}

/// Push or relax many control points with the configured brush.
#[derive(Debug, Default)]
pub struct FfdBrushMode {
    /// State is the last local pointer position.
    drag: Option<Drag<Vec2>>,
}

impl FfdBrushMode {
    fn dab(drag: &mut Drag<Vec2>, cx: &mut ModeContext, local: Vec2, pressure: f32) -> Result<(), RigError> {
        let velocity = local - drag.state;
        drag.state = local;
        let stroke = FfdStroke::new(cx.object, Some(cx.frame), cx.config.brush, local, velocity, pressure);
        drag.gesture.step(cx.doc, Box::new(stroke))
    }
}

impl ModeHandler for FfdBrushMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let mut drag = begin(cx, "lattice brush", local, local)?;
        if let Err(err) = Self::dab(&mut drag, cx, local, ev.pressure) {
            drag.gesture.cancel(cx.doc)?;
            return Err(err);
        }
        self.drag = Some(drag);
        Ok(ModeOutcome::changed())
    }

    fn on_pointer_move(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let Some(drag) = self.drag.as_mut() else {
            return Ok(ModeOutcome::idle());
        };
        Self::dab(drag, cx, local, ev.pressure)?;
        Ok(ModeOutcome::changed())
    }

    fn on_pointer_up(&mut self, cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(commit_drag(self.drag.take(), cx.stack))
    }

    fn on_cancel(&mut self, cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        cancel_drag(self.drag.take(), cx.doc)
    }
}
