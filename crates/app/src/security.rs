//! Security gate — every command passes here before it is routed.
//!
//! The rate limiter, the allow-list and the audit log each guard their own
//! state with a separate lock; none of them is held while another is taken.

mod allow_list;
mod audit_log;
mod config;
mod rate_limiter;

pub use allow_list::AllowList;
pub use audit_log::AuditLog;
pub use config::{DEFAULT_ALLOWED_ACTIONS, SecurityConfig};
pub use rate_limiter::RateLimiter;

use hearth_domain::audit::AuditEntry;
use hearth_domain::command::{Command, CommandValue};
use hearth_domain::error::{HubError, ParameterError};
use hearth_domain::id::ExecutionId;

/// Allow-list, rate limiting, coarse bound checks and auditing.
#[derive(Debug)]
pub struct SecurityGate {
    limiter: RateLimiter,
    allow_list: AllowList,
    audit: AuditLog,
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::new(&SecurityConfig::default())
    }
}

impl SecurityGate {
    #[must_use]
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.max_requests, config.window()),
            allow_list: AllowList::new(config.allowed_actions.iter().cloned()),
            audit: AuditLog::new(config.audit_capacity),
        }
    }

    /// Admit a command: rate limit, then allow-list, then bounds.
    ///
    /// A request consumes rate-limit capacity even if a later check rejects it.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::RateLimitExceeded`], [`HubError::CommandNotAllowed`]
    /// or [`HubError::InvalidParameter`].
    pub fn validate(&self, command: &Command) -> Result<(), HubError> {
        if !self.limiter.check() {
            return Err(HubError::RateLimitExceeded);
        }
        if !self.allow_list.is_allowed(command.action()) {
            return Err(HubError::CommandNotAllowed(command.action().to_string()));
        }
        check_bounds(command)?;
        Ok(())
    }

    /// Record an execution attempt. Never fails.
    pub fn log(&self, execution_id: ExecutionId, command: &Command, outcome: Result<(), &HubError>) {
        let error = outcome.err().map(HubError::chain);
        self.audit.append(AuditEntry::now(
            execution_id,
            command.action(),
            command.device().clone(),
            error,
        ));
    }

    #[must_use]
    pub fn is_allowed(&self, action: &str) -> bool {
        self.allow_list.is_allowed(action)
    }

    /// Permit an action at runtime.
    pub fn allow(&self, action: impl Into<String>) -> bool {
        self.allow_list.allow(action)
    }

    /// Revoke an action at runtime.
    pub fn deny(&self, action: &str) -> bool {
        self.allow_list.deny(action)
    }

    /// The newest `limit` audit entries, oldest first. `0` returns all.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.audit.recent(limit)
    }
}

/// Shared bounds applied before routing, independent of vendor limits.
/// Only numeric values are checked; other shapes are left to the router.
#[allow(clippy::cast_possible_truncation)]
fn check_bounds(command: &Command) -> Result<(), ParameterError> {
    let (field, min, max) = match command.action() {
        "light.brightness" => ("brightness", 0, 100),
        "ac.set_temp" => ("temperature", 16, 30),
        _ => return Ok(()),
    };
    if let CommandValue::Number(n) = command.value() {
        if *n < f64::from(min) || *n > f64::from(max) {
            return Err(ParameterError::OutOfRange {
                field,
                min: i64::from(min),
                max: i64::from(max),
                value: *n as i64,
            });
        }
    }
    Ok(())
}
