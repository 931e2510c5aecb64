//! # hearth-adapter-tapo
//!
//! Tapo adapter — drives Tapo plugs (P100/P110) and bulbs (L510/L530) over
//! their local HTTP API.
//!
//! ## Responsibilities
//! - Session setup: RSA handshake, then `login_device` ([`TapoClient`])
//! - Encrypt every call with the token-derived AES key and wrap it in a
//!   `securePassthrough` envelope ([`TapoCipher`])
//! - Range-check brightness, color and color temperature before any request
//! - Drop the session on auth failures so the next call starts over
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hearth-app` and `hearth-domain`.

pub mod cipher;
pub mod client;
pub mod config;
pub mod error;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use cipher::TapoCipher;
pub use client::TapoClient;
pub use config::TapoCredentials;
pub use error::TapoError;
