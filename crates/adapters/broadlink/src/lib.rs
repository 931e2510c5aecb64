//! # hearth-adapter-broadlink
//!
//! Broadlink adapter — talks to RM-series IR blasters over their UDP protocol.
//!
//! ## Responsibilities
//! - Frame, checksum and encrypt control packets ([`packet`])
//! - Discover devices by broadcast or unicast hello
//! - Authenticate lazily and keep the session key and packet counter per device
//! - Send raw IR codes and capture new ones in learning mode
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hearth-app` and `hearth-domain`.

pub mod client;
pub mod error;
pub mod packet;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{BroadlinkClient, DEFAULT_PORT};
pub use error::BroadlinkError;
pub use packet::DeviceInfo;
