//! Availability of external resources referenced by image keys.
//!
//! Loading happens elsewhere; the resource layer reports through
//! `notify_resource_changed` and the solver reads availability here.

use hashbrown::HashMap;
use rigkit_api_core::ResourceId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub available: bool,
    /// Bumped on every change notification.
    pub revision: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRegistry {
    entries: HashMap<ResourceId, ResourceState>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<ResourceId>) {
        self.entries.entry(id.into()).or_insert(ResourceState {
            available: true,
            revision: 0,
        });
    }

    /// Record a change reported by the resource layer. Returns the new
    /// revision.
    pub fn notify_resource_changed(&mut self, id: &ResourceId, available: bool) -> u64 {
        let state = self.entries.entry(id.clone()).or_default();
        state.available = available;
        state.revision += 1;
        log::debug!("resource {id} changed (available: {available}, rev {})", state.revision);
        state.revision
    }

    /// Unknown ids are unavailable.
    pub fn is_available(&self, id: &ResourceId) -> bool {
        self.entries.get(id).is_some_and(|s| s.available)
    }

    pub fn state(&self, id: &ResourceId) -> Option<ResourceState> {
        self.entries.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_notifications_bump_revision() {
        let mut reg = ResourceRegistry::new();
        let id = ResourceId::new("arm.png");
        assert!(!reg.is_available(&id));
        reg.register("arm.png");
        assert!(reg.is_available(&id));
        assert_eq!(reg.notify_resource_changed(&id, false), 1);
        assert!(!reg.is_available(&id));
        assert_eq!(reg.notify_resource_changed(&id, true), 2);
    }
}
