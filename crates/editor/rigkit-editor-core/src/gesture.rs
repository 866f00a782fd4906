//! A drag in progress. Each pointer move applies a small command right away
//! so the document stays live; release commits them as one history entry,
//! cancel reverts them all.

use rigkit_api_core::RigError;
use rigkit_posture_core::Document;

use crate::command::{Command, CommandGroup};
use crate::stack::CommandStack;

#[derive(Debug)]
pub struct Gesture {
    label: String,
    steps: Vec<Box<dyn Command>>,
}

impl Gesture {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Apply `command` and keep it. A failing step changes nothing and is
    /// not kept; earlier steps stay applied.
    pub fn step(&mut self, doc: &mut Document, mut command: Box<dyn Command>) -> Result<(), RigError> {
        command.apply(doc)?;
        self.steps.push(command);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Record the applied steps as one undoable entry. A gesture that did
    /// nothing leaves no entry.
    pub fn commit(self, stack: &mut CommandStack) -> Option<String> {
        if self.steps.is_empty() {
            log::trace!("gesture '{}' ended without edits", self.label);
            return None;
        }
        let group = CommandGroup::from_applied(self.label, self.steps);
        Some(stack.push_applied(Box::new(group)))
    }

    /// Revert every step, newest first. The document ends exactly as it was
    /// before the gesture began.
    pub fn cancel(mut self, doc: &mut Document) -> Result<(), RigError> {
        let count = self.steps.len();
        while let Some(mut step) = self.steps.pop() {
            step.revert(doc)?;
        }
        log::debug!("gesture '{}' cancelled, {count} steps reverted", self.label);
        Ok(())
    }
}
