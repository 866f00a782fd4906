//! Linear undo/redo history.

use std::collections::VecDeque;

use rigkit_api_core::RigError;
use rigkit_posture_core::Document;

use crate::command::{Command, CommandGroup};

pub const DEFAULT_UNDO_LIMIT: usize = 32;

/// Done / undone sequences. Recording a new command drops the undone
/// sequence; past `limit` the oldest done entries are dropped.
#[derive(Debug)]
pub struct CommandStack {
    done: VecDeque<Box<dyn Command>>,
    undone: Vec<Box<dyn Command>>,
    limit: usize,
    group: Option<CommandGroup>,
    /// Net number of forward steps since creation; compared with `saved`
    /// for the edit status.
    position: i64,
    saved: Option<i64>,
}

impl Default for CommandStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl CommandStack {
    pub fn new(limit: usize) -> Self {
        Self {
            done: VecDeque::new(),
            undone: Vec::new(),
            limit: limit.max(1),
            group: None,
            position: 0,
            saved: Some(0),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn undo_label(&self) -> Option<String> {
        self.done.back().map(|c| c.label())
    }

    pub fn redo_label(&self) -> Option<String> {
        self.undone.last().map(|c| c.label())
    }

    /// Labels of the done sequence, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.done.iter().map(|c| c.label()).collect()
    }

    /// Apply `command` and record it (into the open group, if any). Nothing is
    /// recorded when `apply` fails.
    pub fn push(&mut self, doc: &mut Document, mut command: Box<dyn Command>) -> Result<String, RigError> {
        command.apply(doc)?;
        Ok(self.push_applied(command))
    }

    /// Record a command whose effect is already in the document.
    pub fn push_applied(&mut self, command: Box<dyn Command>) -> String {
        let label = command.label();
        match &mut self.group {
            Some(group) => group.push_applied(command),
            None => self.record(command),
        }
        label
    }

    fn record(&mut self, command: Box<dyn Command>) {
        if !self.undone.is_empty() {
            self.undone.clear();
            if self.saved.is_some_and(|s| s > self.position) {
                self.saved = None;
            }
        }
        log::debug!("push: {}", command.label());
        self.done.push_back(command);
        self.position += 1;
        while self.done.len() > self.limit {
            if let Some(dropped) = self.done.pop_front() {
                log::trace!("history limit reached, dropped '{}'", dropped.label());
            }
        }
    }

    fn check_not_grouping(&self, action: &str) -> Result<(), RigError> {
        match &self.group {
            Some(group) => Err(RigError::precondition(
                "history",
                format!("cannot {action} while '{}' is open", group.label()),
            )),
            None => Ok(()),
        }
    }

    /// Revert the newest done command. `Ok(None)` when there is nothing to
    /// undo.
    pub fn undo(&mut self, doc: &mut Document) -> Result<Option<String>, RigError> {
        self.check_not_grouping("undo")?;
        let Some(mut command) = self.done.pop_back() else {
            return Ok(None);
        };
        if let Err(err) = command.revert(doc) {
            self.done.push_back(command);
            return Err(err);
        }
        let label = command.label();
        log::debug!("undo: {label}");
        self.undone.push(command);
        self.position -= 1;
        Ok(Some(label))
    }

    /// Re-apply the newest undone command. `Ok(None)` when there is nothing
    /// to redo.
    pub fn redo(&mut self, doc: &mut Document) -> Result<Option<String>, RigError> {
        self.check_not_grouping("redo")?;
        let Some(mut command) = self.undone.pop() else {
            return Ok(None);
        };
        if let Err(err) = command.apply(doc) {
            self.undone.push(command);
            return Err(err);
        }
        let label = command.label();
        log::debug!("redo: {label}");
        self.done.push_back(command);
        self.position += 1;
        Ok(Some(label))
    }

    /// Start collecting pushed commands into one entry.
    pub fn begin_group(&mut self, label: impl Into<String>) -> Result<(), RigError> {
        self.check_not_grouping("begin a group")?;
        self.group = Some(CommandGroup::new(label));
        Ok(())
    }

    pub fn is_grouping(&self) -> bool {
        self.group.is_some()
    }

    /// Close the open group and record it. An empty group records nothing.
    pub fn end_group(&mut self) -> Option<String> {
        let group = self.group.take()?;
        if group.is_empty() {
            return None;
        }
        let label = group.label();
        self.record(Box::new(group));
        Some(label)
    }

    /// Close the open group, reverting what it collected.
    pub fn abort_group(&mut self, doc: &mut Document) -> Result<(), RigError> {
        match self.group.take() {
            Some(mut group) => group.revert(doc),
            None => Ok(()),
        }
    }

    /// True when the document differs from the last `mark_saved` point.
    pub fn is_modified(&self) -> bool {
        self.saved != Some(self.position)
    }

    pub fn mark_saved(&mut self) {
        self.saved = Some(self.position);
    }

    /// Forget all history; the current state counts as saved.
    pub fn clear(&mut self) {
        self.done.clear();
        self.undone.clear();
        self.group = None;
        self.position = 0;
        self.saved = Some(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{PushKey, SetDefault};
    use rigkit_animation_core::{AttrValue, Easing};

    fn depth_key(id: rigkit_api_core::ObjectId, frame: u32, depth: f32) -> Box<dyn Command> {
        Box::new(PushKey::new(id, frame, AttrValue::Depth(depth), Easing::LINEAR))
    }

    #[test]
    fn undo_and_redo_walk_history() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let start = doc.clone();
        let mut stack = CommandStack::default();

        stack.push(&mut doc, depth_key(id, 0, 1.0)).unwrap();
        stack.push(&mut doc, depth_key(id, 5, 2.0)).unwrap();
        let end = doc.clone();

        assert!(stack.undo(&mut doc).unwrap().is_some());
        assert!(stack.undo(&mut doc).unwrap().is_some());
        assert_eq!(stack.undo(&mut doc).unwrap(), None);
        assert_eq!(doc, start);

        stack.redo(&mut doc).unwrap();
        stack.redo(&mut doc).unwrap();
        assert_eq!(stack.redo(&mut doc).unwrap(), None);
        assert_eq!(doc, end);
    }

    #[test]
    fn new_push_discards_redo() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let mut stack = CommandStack::default();
        stack.push(&mut doc, depth_key(id, 0, 1.0)).unwrap();
        stack.undo(&mut doc).unwrap();
        assert!(stack.can_redo());
        stack.push(&mut doc, depth_key(id, 3, 1.0)).unwrap();
        assert!(!stack.can_redo());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn failed_push_records_nothing() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let mut stack = CommandStack::default();
        let err = stack.push(&mut doc, depth_key(id, 100_000, 1.0)).unwrap_err();
        assert_eq!(err.category(), "structural");
        assert!(stack.is_empty());
        assert!(!stack.is_modified());
    }

    #[test]
    fn limit_drops_oldest() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let mut stack = CommandStack::new(2);
        for frame in 0..4 {
            stack.push(&mut doc, depth_key(id, frame, 1.0)).unwrap();
        }
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.history(), vec!["push depth key at 2", "push depth key at 3"]);
    }

    #[test]
    fn group_undoes_as_one() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let start = doc.clone();
        let mut stack = CommandStack::default();

        stack.begin_group("setup").unwrap();
        stack.push(&mut doc, depth_key(id, 0, 1.0)).unwrap();
        stack
            .push(&mut doc, Box::new(SetDefault::new(id, AttrValue::Opacity(0.5))))
            .unwrap();
        assert!(stack.undo(&mut doc).is_err());
        assert_eq!(stack.end_group(), Some("setup".to_string()));

        assert_eq!(stack.len(), 1);
        assert_eq!(stack.undo(&mut doc).unwrap(), Some("setup".to_string()));
        assert_eq!(doc, start);
    }

    #[test]
    fn edit_status_follows_save_point() {
        let mut doc = Document::default();
        let id = doc.add_object("a");
        let mut stack = CommandStack::default();
        assert!(!stack.is_modified());

        stack.push(&mut doc, depth_key(id, 0, 1.0)).unwrap();
        assert!(stack.is_modified());
        stack.mark_saved();
        assert!(!stack.is_modified());

        stack.undo(&mut doc).unwrap();
        assert!(stack.is_modified());
        stack.redo(&mut doc).unwrap();
        assert!(!stack.is_modified());

        // saved state lives in the discarded redo branch
        stack.undo(&mut doc).unwrap();
        stack.push(&mut doc, depth_key(id, 1, 1.0)).unwrap();
        stack.undo(&mut doc).unwrap();
        assert!(stack.is_modified());
    }
}
