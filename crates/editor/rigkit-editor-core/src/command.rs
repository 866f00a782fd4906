//! The reversible-edit contract.

use std::fmt;

use rigkit_api_core::RigError;
use rigkit_posture_core::Document;

/// One reversible mutation of a `Document`.
///
/// `apply` runs on first execution and on redo; `revert` undoes the most
/// recent `apply`. A command validates before it mutates, so an `Err` from
/// `apply` leaves the document untouched. Commands record whatever `revert`
/// needs while applying.
pub trait Command: fmt::Debug {
    fn label(&self) -> String;
    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError>;
    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError>;
}

/// Several commands that undo and redo as one.
#[derive(Debug)]
pub struct CommandGroup {
    label: String,
    commands: Vec<Box<dyn Command>>,
}

impl CommandGroup {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    /// Build a group from commands that have already been applied.
    pub fn from_applied(label: impl Into<String>, commands: Vec<Box<dyn Command>>) -> Self {
        Self {
            label: label.into(),
            commands,
        }
    }

    /// Add an already-applied command.
    pub fn push_applied(&mut self, command: Box<dyn Command>) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for CommandGroup {
    fn label(&self) -> String {
        self.label.clone()
    }

    /// All or nothing: if a member fails, the ones already applied are
    /// reverted before the error is returned.
    fn apply(&mut self, doc: &mut Document) -> Result<(), RigError> {
        for i in 0..self.commands.len() {
            if let Err(err) = self.commands[i].apply(doc) {
                for done in self.commands[..i].iter_mut().rev() {
                    if let Err(undo_err) = done.revert(doc) {
                        log::warn!("rollback of '{}' failed: {undo_err}", done.label());
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// All or nothing as well: if a member fails to revert, the ones already
    /// reverted are applied again so the group stays fully applied.
    fn revert(&mut self, doc: &mut Document) -> Result<(), RigError> {
        for i in (0..self.commands.len()).rev() {
            if let Err(err) = self.commands[i].revert(doc) {
                for undone in &mut self.commands[i + 1..] {
                    if let Err(redo_err) = undone.apply(doc) {
                        log::warn!("re-apply of '{}' failed: {redo_err}", undone.label());
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{DeleteKey, SetDefault};
    use rigkit_animation_core::{AttrValue, AttributeKind};

    #[test]
    fn failing_member_rolls_back_group() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let before = doc.clone();

        let mut group = CommandGroup::new("both");
        group
            .commands
            .push(Box::new(SetDefault::new(id, AttrValue::Depth(3.0))));
        group
            .commands
            .push(Box::new(DeleteKey::new(id, AttributeKind::Depth, 9)));

        assert!(group.apply(&mut doc).is_err());
        assert_eq!(doc, before);
    }

    /// Applies cleanly but can never be reverted.
    #[derive(Debug)]
    struct Irreversible;

    impl Command for Irreversible {
        fn label(&self) -> String {
            "irreversible".to_string()
        }

        fn apply(&mut self, _doc: &mut Document) -> Result<(), RigError> {
            Ok(())
        }

        fn revert(&mut self, _doc: &mut Document) -> Result<(), RigError> {
            Err(RigError::precondition("history", "cannot revert"))
        }
    }

    #[test]
    fn failing_revert_leaves_group_applied() {
        let mut doc = Document::default();
        let id = doc.add_object("a");

        let mut group = CommandGroup::new("three");
        group
            .commands
            .push(Box::new(SetDefault::new(id, AttrValue::Depth(3.0))));
        group.commands.push(Box::new(Irreversible));
        group
            .commands
            .push(Box::new(SetDefault::new(id, AttrValue::Opacity(0.5))));
        group.apply(&mut doc).unwrap();
        let applied = doc.clone();

        let err = group.revert(&mut doc).unwrap_err();
        assert_eq!(err.category(), "precondition");
        assert_eq!(doc, applied);
    }
}
