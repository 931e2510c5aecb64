//! # hearth-adapter-http
//!
//! Generic HTTP devices: anything with a small REST surface (ESP8266
//! firmwares, home-made relays, vendor bridges).
//!
//! ## Responsibilities
//! - Raw passthrough requests with the configured headers
//!   ([`HttpDevice::send`])
//! - Map router verbs (`on`, `off`, `toggle`, `brightness`, `color`,
//!   `color_temp`) onto configured `{method, path, body}` templates
//!
//! ## Dependency rule
//! Same as other adapters: depends on `hearth-app` and `hearth-domain`.

pub mod device;
pub mod error;

pub use device::HttpDevice;
pub use error::HttpDeviceError;
