//! # hearth-adapter-mqtt
//!
//! MQTT adapter — drives switches and lights that sit behind an MQTT broker.
//!
//! ## Responsibilities
//! - Connect to the broker and keep the `rumqttc` event loop running
//!   ([`MqttBridge`])
//! - Translate switch/dimmer calls into the topic and payload conventions of
//!   each bridged firmware ([`MqttDevice`], [`Flavor`])
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hearth-app` and `hearth-domain`.

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;

pub use bridge::{MqttBridge, Publisher};
pub use config::MqttConfig;
pub use device::{Flavor, MqttDevice};
pub use error::MqttError;
