//! One editable document with its history, modes and solver behind a single
//! input entry point.

use std::fmt;

use rigkit_animation_core::AttributeKind;
use rigkit_api_core::{BoneId, Frame, Invalid, ObjectId, ResourceId, RigError};
use rigkit_posture_core::{Document, Posture, PostureSolver, SolveDiagnostic};
use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::commands::key_current;
use crate::config::EditorConfig;
use crate::mode::{EditorModeMachine, ModeContext, ModeKind, ModeOutcome, PointerEvent};
use crate::stack::CommandStack;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    SelectMode(ModeKind),
    SelectObject(Option<ObjectId>),
    SelectBone(Option<BoneId>),
    PointerDown(PointerEvent),
    PointerMove(PointerEvent),
    PointerUp(PointerEvent),
    /// Abandon the gesture in progress.
    Cancel,
    /// Key `kind` of the active object at the current frame with its
    /// current value.
    PushKey(AttributeKind),
    NextKey,
    PrevKey,
    Scrub(Frame),
    Undo,
    Redo,
}

/// What the UI should report after an event.
#[derive(Clone, Debug, PartialEq)]
pub enum Feedback {
    None,
    /// The document changed without a new history entry (live drag step).
    Changed,
    Pushed(String),
    Undone(String),
    Redone(String),
    ModeChanged(ModeKind),
    FrameChanged(Frame),
    Cancelled,
    Rejected(RigError),
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::None => Ok(()),
            Feedback::Changed => f.write_str("Changed"),
            Feedback::Pushed(label) => write!(f, "Done: {label}"),
            Feedback::Undone(label) => write!(f, "Undone: {label}"),
            Feedback::Redone(label) => write!(f, "Redone: {label}"),
            Feedback::ModeChanged(kind) => write!(f, "Mode: {kind}"),
            Feedback::FrameChanged(frame) => write!(f, "Frame {frame}"),
            Feedback::Cancelled => f.write_str("Cancelled"),
            Feedback::Rejected(err) => write!(f, "Rejected: {err}"),
        }
    }
}

#[derive(Debug)]
pub struct EditorSession {
    doc: Document,
    stack: CommandStack,
    modes: EditorModeMachine,
    solver: PostureSolver,
    config: EditorConfig,
    frame: Frame,
    object: Option<ObjectId>,
    bone: Option<BoneId>,
    posture: Posture,
}

impl EditorSession {
    pub fn new(doc: Document, config: EditorConfig) -> Self {
        let mut solver = PostureSolver::new();
        let posture = solver.solve(&doc, 0);
        Self {
            doc,
            stack: CommandStack::new(config.undo_limit),
            modes: EditorModeMachine::new(),
            solver,
            config,
            frame: 0,
            object: None,
            bone: None,
            posture,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn stack(&self) -> &CommandStack {
        &self.stack
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    pub fn bone(&self) -> Option<BoneId> {
        self.bone
    }

    pub fn mode(&self) -> ModeKind {
        self.modes.kind()
    }

    /// Posture of the current frame after the last event.
    pub fn posture(&self) -> &Posture {
        &self.posture
    }

    pub fn diagnostics(&self) -> &[SolveDiagnostic] {
        self.solver.diagnostics()
    }

    pub fn is_modified(&self) -> bool {
        self.stack.is_modified()
    }

    pub fn mark_saved(&mut self) {
        self.stack.mark_saved();
    }

    /// Resource availability changed outside the core (reload, delete).
    pub fn notify_resource_changed(&mut self, resource: &ResourceId, available: bool) {
        self.doc.resources.notify_resource_changed(resource, available);
        self.solver.on_resource_changed(resource);
        self.refresh();
    }

    /// Process one input event. Errors never escape: they come back as
    /// `Feedback::Rejected` with the document unchanged.
    pub fn handle(&mut self, event: InputEvent) -> Feedback {
        match self.dispatch(event) {
            Ok(feedback) => feedback,
            Err(err) => {
                log::debug!("input rejected: {err}");
                Feedback::Rejected(err)
            }
        }
    }

    /// Run a command from outside the pointer path (menus, panels) as its
    /// own history entry.
    pub fn execute(&mut self, command: Box<dyn Command>) -> Feedback {
        let result = self.cancel_gesture().and_then(|_| self.stack.push(&mut self.doc, command));
        match result {
            Ok(label) => {
                self.after_history();
                Feedback::Pushed(label)
            }
            Err(err) => {
                log::debug!("command rejected: {err}");
                Feedback::Rejected(err)
            }
        }
    }

    fn dispatch(&mut self, event: InputEvent) -> Result<Feedback, RigError> {
        match event {
            InputEvent::SelectMode(kind) => self.select_mode(kind),
            InputEvent::SelectObject(object) => self.select_object(object),
            InputEvent::SelectBone(bone) => {
                self.bone = bone;
                Ok(Feedback::None)
            }
            InputEvent::PointerDown(ev) => self.pointer(|m, cx| m.pointer_down(cx, ev)),
            InputEvent::PointerMove(ev) => self.pointer(|m, cx| m.pointer_move(cx, ev)),
            InputEvent::PointerUp(ev) => self.pointer(|m, cx| m.pointer_up(cx, ev)),
            InputEvent::Cancel => {
                let outcome = self.cancel_gesture()?;
                Ok(if outcome.changed { Feedback::Cancelled } else { Feedback::None })
            }
            InputEvent::PushKey(kind) => self.push_key(kind),
            InputEvent::NextKey => self.step_key(true),
            InputEvent::PrevKey => self.step_key(false),
            InputEvent::Scrub(frame) => self.scrub(frame),
            InputEvent::Undo => {
                self.cancel_gesture()?;
                let label = self.stack.undo(&mut self.doc)?;
                self.after_history();
                Ok(label.map_or(Feedback::None, Feedback::Undone))
            }
            InputEvent::Redo => {
                self.cancel_gesture()?;
                let label = self.stack.redo(&mut self.doc)?;
                self.after_history();
                Ok(label.map_or(Feedback::None, Feedback::Redone))
            }
        }
    }

    /// Run `f` against the mode machine with a context for the active
    /// object. `None` when no object is active.
    fn with_mode<R>(
        &mut self,
        f: impl FnOnce(&mut EditorModeMachine, &mut ModeContext<'_>) -> Result<R, RigError>,
    ) -> Option<Result<R, RigError>> {
        let object = self.object?;
        let mut cx = ModeContext {
            doc: &mut self.doc,
            stack: &mut self.stack,
            config: &self.config,
            posture: &self.posture,
            object,
            frame: self.frame,
            bone: self.bone,
        };
        Some(f(&mut self.modes, &mut cx))
    }

    fn cancel_gesture(&mut self) -> Result<ModeOutcome, RigError> {
        let outcome = self
            .with_mode(|m, cx| m.cancel(cx))
            .unwrap_or_else(|| Ok(ModeOutcome::idle()))?;
        if outcome.changed {
            self.refresh();
        }
        Ok(outcome)
    }

    fn select_mode(&mut self, kind: ModeKind) -> Result<Feedback, RigError> {
        let result = match self.with_mode(|m, cx| m.enter(kind, cx)) {
            Some(result) => result,
            None if kind == ModeKind::Cursor => {
                self.modes.reset();
                Ok(ModeOutcome::idle())
            }
            None => Err(RigError::precondition(kind.name(), "no object is selected")),
        };
        if result?.changed {
            self.refresh();
        }
        Ok(Feedback::ModeChanged(kind))
    }

    fn select_object(&mut self, object: Option<ObjectId>) -> Result<Feedback, RigError> {
        if let Some(id) = object {
            self.doc.object(id)?;
        }
        if object == self.object {
            return Ok(Feedback::None);
        }
        self.cancel_gesture()?;
        let kind = self.modes.kind();
        self.object = object;
        self.bone = None;
        // the same mode on the new object, if it qualifies
        let reentered = self.with_mode(|m, cx| {
            m.reset();
            m.enter(kind, cx)
        });
        if let Some(Err(err)) = reentered {
            log::debug!("{kind} not available on the new selection: {err}");
            self.modes.reset();
        } else if reentered.is_none() {
            self.modes.reset();
        }
        Ok(Feedback::ModeChanged(self.modes.kind()))
    }

    fn pointer(
        &mut self,
        f: impl FnOnce(&mut EditorModeMachine, &mut ModeContext<'_>) -> Result<ModeOutcome, RigError>,
    ) -> Result<Feedback, RigError> {
        let before = self.modes.kind();
        let Some(result) = self.with_mode(f) else {
            return Ok(Feedback::None);
        };
        let outcome = result?;
        if let Some(bone) = outcome.select_bone {
            self.bone = Some(bone);
        }
        if outcome.changed {
            self.refresh();
        }
        Ok(match outcome.committed {
            Some(label) => Feedback::Pushed(label),
            None if self.modes.kind() != before => Feedback::ModeChanged(self.modes.kind()),
            None if outcome.changed => Feedback::Changed,
            None => Feedback::None,
        })
    }

    fn push_key(&mut self, kind: AttributeKind) -> Result<Feedback, RigError> {
        let object = self
            .object
            .ok_or_else(|| RigError::precondition("key", "no object is selected"))?;
        let command = key_current(&self.doc, object, kind, self.frame)?
            .ok_or(Invalid::FrameOccupied { frame: self.frame })?;
        let label = self.stack.push(&mut self.doc, Box::new(command))?;
        self.refresh();
        Ok(Feedback::Pushed(label))
    }

    fn step_key(&mut self, forward: bool) -> Result<Feedback, RigError> {
        let Some(object) = self.object else {
            return Ok(Feedback::None);
        };
        let timeline = &self.doc.object(object)?.timeline;
        let target = if forward {
            timeline.next_key_frame(&AttributeKind::ALL, self.frame)
        } else {
            timeline.prev_key_frame(&AttributeKind::ALL, self.frame)
        };
        match target {
            Some(frame) => self.scrub(frame),
            None => Ok(Feedback::None),
        }
    }

    fn scrub(&mut self, frame: Frame) -> Result<Feedback, RigError> {
        self.doc.check_frame(frame)?;
        if frame == self.frame {
            return Ok(Feedback::None);
        }
        self.cancel_gesture()?;
        self.frame = frame;
        self.refresh();
        Ok(Feedback::FrameChanged(frame))
    }

    /// History moves and commands may have removed the active object or bone.
    fn after_history(&mut self) {
        if let Some(id) = self.object {
            if !self.doc.contains(id) {
                self.object = None;
                self.bone = None;
                self.modes.reset();
            } else if let Some(bone) = self.bone {
                let exists = self
                    .doc
                    .object(id)
                    .is_ok_and(|o| o.rig.as_ref().is_some_and(|r| r.contains(bone)));
                if !exists {
                    self.bone = None;
                }
            }
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        self.posture = self.solver.solve(&self.doc, self.frame);
    }
}
