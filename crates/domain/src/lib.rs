//! # hearth-domain
//!
//! Pure domain model for the hearth command gateway.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, timestamps
//! - Define **Commands** (`<domain>.<verb>` actions with a typed value)
//! - Define **Device records** (configured physical devices and their vendor)
//! - Define **Audit entries** (the record of every execution attempt)
//! - Contain all invariant enforcement that needs no IO
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod audit;
pub mod command;
pub mod device;
