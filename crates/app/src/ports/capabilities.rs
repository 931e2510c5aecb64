//! Capability ports — one trait per kind of thing a device can do.
//!
//! A vendor client implements every trait; operations its hardware cannot
//! perform return [`HubError::Unsupported`]. The router asks
//! [`DeviceClient::supports`] before dispatching so that unsupported calls
//! never touch the network.

use std::future::Future;
use std::time::Duration;

use hearth_domain::command::Color;
use hearth_domain::error::HubError;

/// Power control.
pub trait Switchable {
    fn turn_on(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    fn turn_off(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Invert the current power state.
    fn toggle(&self) -> impl Future<Output = Result<(), HubError>> + Send;
}

/// Brightness and color control for lights.
pub trait Dimmable {
    /// Brightness in percent. Range limits are enforced by the vendor codec.
    fn set_brightness(&self, level: i64) -> impl Future<Output = Result<(), HubError>> + Send;

    fn set_color(&self, color: Color) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Color temperature in kelvin.
    fn set_color_temp(&self, kelvin: i64) -> impl Future<Output = Result<(), HubError>> + Send;
}

/// Infrared blaster.
pub trait IrControllable {
    /// Replay a hex-encoded IR payload.
    fn send_ir(&self, hex: &str) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Enter learning mode and return the captured payload hex-encoded.
    ///
    /// Blocks for up to `timeout`.
    fn learn_ir(&self, timeout: Duration)
    -> impl Future<Output = Result<String, HubError>> + Send;
}

/// Robot vacuum control.
pub trait VacuumControllable {
    fn start(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    fn pause(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Return to the dock.
    fn home(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    fn spot(&self) -> impl Future<Output = Result<(), HubError>> + Send;

    /// Suction power in percent.
    fn set_fan_speed(&self, speed: i64) -> impl Future<Output = Result<(), HubError>> + Send;

    fn find_me(&self) -> impl Future<Output = Result<(), HubError>> + Send;
}

/// Air purifier control. Power goes through [`Switchable`].
pub trait PurifierControllable {
    fn set_mode(&self, mode: &str) -> impl Future<Output = Result<(), HubError>> + Send;

    fn set_favorite_level(&self, level: i64)
    -> impl Future<Output = Result<(), HubError>> + Send;
}

/// A capability a client may or may not offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Switch,
    Dimmer,
    Ir,
    Vacuum,
    Purifier,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Switch => "switch",
            Self::Dimmer => "dimmer",
            Self::Ir => "ir",
            Self::Vacuum => "vacuum",
            Self::Purifier => "purifier",
        })
    }
}

/// A session-backed client bound to one device.
pub trait DeviceClient:
    Switchable + Dimmable + IrControllable + VacuumControllable + PurifierControllable + Send + Sync
{
    /// Whether calls of this capability can succeed on this device.
    fn supports(&self, capability: Capability) -> bool;
}
