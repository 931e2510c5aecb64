//! Audit entries — one per command execution attempt.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::id::{DeviceId, ExecutionId};

/// UTC timestamp used for audit entries.
pub type Timestamp = DateTime<Utc>;

/// Immutable record of a single execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub execution_id: ExecutionId,
    pub timestamp: Timestamp,
    pub action: String,
    pub device: DeviceId,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEntry {
    /// Record an attempt that happened now.
    #[must_use]
    pub fn now(
        execution_id: ExecutionId,
        action: impl Into<String>,
        device: DeviceId,
        error: Option<String>,
    ) -> Self {
        Self {
            execution_id,
            timestamp: Utc::now(),
            action: action.into(),
            device,
            success: error.is_none(),
            error,
        }
    }
}
