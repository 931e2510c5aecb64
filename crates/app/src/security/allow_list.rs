//! Allow-list of permitted action strings. Anything absent is denied.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct AllowList {
    actions: Mutex<HashSet<String>>,
}

impl AllowList {
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: Mutex::new(actions.into_iter().map(Into::into).collect()),
        }
    }

    #[must_use]
    pub fn is_allowed(&self, action: &str) -> bool {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(action)
    }

    /// Permit `action`. Returns `false` if it was already permitted.
    pub fn allow(&self, action: impl Into<String>) -> bool {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(action.into())
    }

    /// Revoke `action`. Returns `false` if it was not permitted.
    pub fn deny(&self, action: &str) -> bool {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(action)
    }

    /// Snapshot of the permitted actions, sorted.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = self
            .actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        actions.sort();
        actions
    }
}
