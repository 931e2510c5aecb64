//! Bounded in-memory audit trail.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use hearth_domain::audit::AuditEntry;

/// Ring buffer of the most recent execution attempts.
///
/// Appending never fails: a poisoned lock is recovered and the oldest entry
/// is evicted once `capacity` is reached.
#[derive(Debug)]
pub struct AuditLog {
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
}

impl AuditLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn append(&self, entry: AuditEntry) {
        if entry.success {
            tracing::info!(
                target: "hearth::audit",
                execution_id = %entry.execution_id,
                action = %entry.action,
                device = %entry.device,
                "command executed"
            );
        } else {
            tracing::warn!(
                target: "hearth::audit",
                execution_id = %entry.execution_id,
                action = %entry.action,
                device = %entry.device,
                error = entry.error.as_deref().unwrap_or_default(),
                "command failed"
            );
        }

        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The newest `limit` entries, oldest first. `0` returns everything.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let limit = if limit == 0 {
            entries.len()
        } else {
            limit.min(entries.len())
        };
        entries.iter().skip(entries.len() - limit).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
