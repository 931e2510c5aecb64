//! # hearth-adapter-miio
//!
//! Xiaomi miio adapter — the encrypted UDP protocol on port 54321 spoken by
//! Roborock vacuums, Yeelight-style lights and Mi air purifiers.
//!
//! ## Responsibilities
//! - Hello exchange to learn device id and stamp ([`MiioClient::discover`])
//! - Token-derived AES encryption and MD5 checksums ([`packet`], [`MiioCipher`])
//! - JSON-RPC style `{id, method, params}` calls ([`MiioClient::send_command`])
//! - Verb to method mappings with local range checks ([`MiioDevice`])
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hearth-app` and `hearth-domain`.

pub mod cipher;
pub mod client;
pub mod device;
pub mod error;
pub mod packet;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cipher::MiioCipher;
pub use client::{DEFAULT_PORT, MiioClient};
pub use device::{MiioDevice, MiioKind};
pub use error::MiioError;
