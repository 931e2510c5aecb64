//! Command service — validate, execute, audit.

use hearth_domain::audit::AuditEntry;
use hearth_domain::command::Command;
use hearth_domain::error::HubError;
use hearth_domain::id::ExecutionId;

use crate::ports::DeviceConnector;
use crate::router::CommandRouter;
use crate::security::SecurityGate;

/// Entry point for command producers.
///
/// Every attempt is audited, including those the gate rejects.
pub struct CommandService<C: DeviceConnector> {
    gate: SecurityGate,
    router: CommandRouter<C>,
}

impl<C: DeviceConnector> CommandService<C> {
    #[must_use]
    pub fn new(gate: SecurityGate, router: CommandRouter<C>) -> Self {
        Self { gate, router }
    }

    #[must_use]
    pub fn gate(&self) -> &SecurityGate {
        &self.gate
    }

    #[must_use]
    pub fn router(&self) -> &CommandRouter<C> {
        &self.router
    }

    /// Run a command through the gate and the router, then audit the outcome.
    ///
    /// # Errors
    ///
    /// Returns the gate's rejection or the router's failure, unchanged.
    #[tracing::instrument(skip(self, command), fields(execution_id = tracing::field::Empty))]
    pub async fn submit(&self, command: &Command) -> Result<ExecutionId, HubError> {
        let execution_id = ExecutionId::new();
        tracing::Span::current().record("execution_id", tracing::field::display(execution_id));

        let result = match self.gate.validate(command) {
            Ok(()) => self.router.execute(command).await,
            Err(err) => Err(err),
        };

        self.gate.log(execution_id, command, result.as_ref().copied());
        result.map(|()| execution_id)
    }

    /// Newest audit entries, oldest first.
    #[must_use]
    pub fn audit_trail(&self, limit: usize) -> Vec<AuditEntry> {
        self.gate.recent(limit)
    }
}
