//! # hearth-connector
//!
//! Turns configured [`DeviceRecord`](hearth_domain::device::DeviceRecord)s
//! into live protocol clients.
//!
//! ## Responsibilities
//! - The closed set of vendor clients ([`VendorClient`]) behind the
//!   capability ports of `hearth-app`
//! - Building the right client for each vendor ([`VendorConnector`]),
//!   without network IO; sessions are opened on first use
//!
//! ## Dependency rule
//! Depends on `hearth-app`, `hearth-domain` and every protocol adapter. Only
//! the binary depends on this crate.

mod client;
mod connector;

pub use client::{Protocol, VendorClient};
pub use connector::VendorConnector;
