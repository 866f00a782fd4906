//! Mesh authoring modes. Each click is its own history entry; edits go to
//! the mesh key at the current frame, or the base mesh when the object has
//! no mesh keys.

use rigkit_api_core::{Frame, RigError, VertexId};
use rigkit_rig_core::MeshTopology;

use super::{ModeContext, ModeHandler, ModeKind, ModeOutcome, PointerEvent};
use crate::command::Command;
use crate::commands::{AddTriangle, AddVertex, RemoveTriangle, RemoveVertex, SplitTriangle};

fn edit_target<'a>(cx: &'a ModeContext) -> Result<(Option<Frame>, &'a MeshTopology), RigError> {
    let object = cx.doc.object(cx.object)?;
    let target = object.mesh_target(cx.frame)?;
    let mesh = object
        .mesh_at(target)
        .ok_or_else(|| RigError::precondition("mesh", format!("no mesh at frame {}", cx.frame)))?;
    Ok((target, mesh))
}

/// Click to place or pick vertices; every third one closes a triangle.
#[derive(Debug, Default)]
pub struct MeshCreateMode {
    target: Option<Frame>,
    pending: Vec<VertexId>,
}

impl MeshCreateMode {
    /// Vertices picked toward the next triangle.
    pub fn pending(&self) -> &[VertexId] {
        &self.pending
    }
}

impl ModeHandler for MeshCreateMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let (target, mesh) = edit_target(cx)?;
        let picked = mesh.pick_vertex(local, cx.config.pick_radius);
        if target != self.target {
            self.pending.clear();
            self.target = target;
        }

        let mut outcome = ModeOutcome::idle();
        let vertex = match picked {
            Some(v) => v,
            None => {
                let mut add = AddVertex::new(cx.object, target, local);
                add.apply(cx.doc)?;
                let Some(v) = add.vertex() else {
                    return Ok(outcome);
                };
                outcome = ModeOutcome::committed(Some(cx.stack.push_applied(Box::new(add))));
                v
            }
        };
        if self.pending.contains(&vertex) {
            return Ok(outcome);
        }
        self.pending.push(vertex);
        if let [a, b, c] = self.pending[..] {
            self.pending.clear();
            let label = cx
                .stack
                .push(cx.doc, Box::new(AddTriangle::new(cx.object, target, [a, b, c])))?;
            outcome = ModeOutcome::committed(Some(label));
        }
        Ok(outcome)
    }

    fn on_pointer_move(&mut self, _cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }

    fn on_pointer_up(&mut self, _cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }

    fn on_cancel(&mut self, _cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        self.pending.clear();
        Ok(ModeOutcome::idle())
    }
}

/// Click a vertex to delete it with its triangles, or inside a triangle to
/// delete just that triangle.
#[derive(Debug, Default)]
pub struct MeshDeleteMode;

impl ModeHandler for MeshDeleteMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let (target, mesh) = edit_target(cx)?;
        let command: Box<dyn Command> = if let Some(v) = mesh.pick_vertex(local, cx.config.pick_radius) {
            Box::new(RemoveVertex::new(cx.object, target, v))
        } else if let Some((t, _, _)) = mesh.pick_edge(local) {
            Box::new(RemoveTriangle::new(cx.object, target, t))
        } else {
            return Ok(ModeOutcome::idle());
        };
        let label = cx.stack.push(cx.doc, command)?;
        Ok(ModeOutcome::committed(Some(label)))
    }

    fn on_pointer_move(&mut self, _cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }

    fn on_pointer_up(&mut self, _cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }

    fn on_cancel(&mut self, _cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }
}

/// Click inside a triangle to split it at the nearest edge. A successful
/// split hands back to mesh-create.
#[derive(Debug, Default)]
pub struct MeshSplitMode;

impl ModeHandler for MeshSplitMode {
    fn on_pointer_down(&mut self, cx: &mut ModeContext, ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        let local = cx.local(ev.position);
        let (target, mesh) = edit_target(cx)?;
        let Some((triangle, edge, t)) = mesh.pick_edge(local) else {
            return Ok(ModeOutcome::idle());
        };
        let label = cx.stack.push(
            cx.doc,
            Box::new(SplitTriangle::new(cx.object, target, triangle, edge, t)),
        )?;
        Ok(ModeOutcome {
            next: Some(ModeKind::MeshCreate),
            ..ModeOutcome::committed(Some(label))
        })
    }

    fn on_pointer_move(&mut self, _cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }

    fn on_pointer_up(&mut self, _cx: &mut ModeContext, _ev: PointerEvent) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }

    fn on_cancel(&mut self, _cx: &mut ModeContext) -> Result<ModeOutcome, RigError> {
        Ok(ModeOutcome::idle())
    }
}
