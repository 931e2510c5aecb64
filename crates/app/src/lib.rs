//! # hearth-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that vendor adapters must implement:
//!   - capability traits (`Switchable`, `Dimmable`, `IrControllable`,
//!     `VacuumControllable`, `PurifierControllable`)
//!   - `DeviceConnector` — materializes a client from a device record
//! - Hold configured devices and their lazily built clients (`DeviceRegistry`)
//! - Route a command to the right capability call (`CommandRouter`)
//! - Gate every command with rate limiting, an allow-list and bound checks,
//!   and keep the audit trail (`SecurityGate`)
//! - Tie validation, execution and auditing together (`CommandService`)
//!
//! ## Dependency rule
//! Depends on `hearth-domain` only.
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod registry;
pub mod router;
pub mod security;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
