//! Verb to miio method mappings for vacuums, lights and air purifiers.

use std::fmt;

use hearth_app::ports::{
    Capability, Dimmable, PurifierControllable, Switchable, VacuumControllable,
};
use hearth_domain::command::Color;
use hearth_domain::device::DeviceClass;
use hearth_domain::error::{HubError, ParameterError};
use serde_json::{Value, json};

use crate::client::MiioClient;
use crate::error::MiioError;

/// Transition used for light changes, in milliseconds.
const SMOOTH_MS: i64 = 500;
const PURIFIER_MODES: [&str; 3] = ["auto", "silent", "favorite"];

/// Which method table a miio device uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiioKind {
    Vacuum,
    Light,
    Purifier,
}

impl MiioKind {
    #[must_use]
    pub fn from_class(class: DeviceClass) -> Option<Self> {
        match class {
            DeviceClass::Vacuum => Some(Self::Vacuum),
            DeviceClass::Light => Some(Self::Light),
            DeviceClass::Purifier => Some(Self::Purifier),
            DeviceClass::Switch | DeviceClass::Ir => None,
        }
    }
}

impl fmt::Display for MiioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vacuum => "vacuum",
            Self::Light => "light",
            Self::Purifier => "purifier",
        })
    }
}

/// A miio client plus the method table of its device kind.
#[derive(Debug)]
pub struct MiioDevice {
    client: MiioClient,
    kind: MiioKind,
}

impl MiioDevice {
    #[must_use]
    pub fn new(client: MiioClient, kind: MiioKind) -> Self {
        Self { client, kind }
    }

    #[must_use]
    pub fn kind(&self) -> MiioKind {
        self.kind
    }

    #[must_use]
    pub fn client(&self) -> &MiioClient {
        &self.client
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        matches!(
            (self.kind, capability),
            (MiioKind::Vacuum, Capability::Vacuum)
                | (MiioKind::Light, Capability::Switch | Capability::Dimmer)
                | (MiioKind::Purifier, Capability::Switch | Capability::Purifier)
        )
    }

    fn require_kind(&self, kind: MiioKind, operation: &'static str) -> Result<(), MiioError> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(MiioError::Unsupported {
                kind: self.kind,
                operation,
            })
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<(), HubError> {
        self.client.send_command(method, params).await?;
        Ok(())
    }

    async fn vacuum(&self, method: &'static str) -> Result<(), HubError> {
        self.require_kind(MiioKind::Vacuum, method)?;
        self.call(method, Value::Null).await
    }

    async fn power(&self, on: bool) -> Result<(), HubError> {
        if self.kind == MiioKind::Vacuum {
            return Err(MiioError::Unsupported {
                kind: self.kind,
                operation: "set_power",
            }
            .into());
        }
        let state = if on { "on" } else { "off" };
        self.call("set_power", json!([state])).await
    }
}

impl Switchable for MiioDevice {
    async fn turn_on(&self) -> Result<(), HubError> {
        self.power(true).await
    }

    async fn turn_off(&self) -> Result<(), HubError> {
        self.power(false).await
    }

    async fn toggle(&self) -> Result<(), HubError> {
        self.require_kind(MiioKind::Light, "toggle")?;
        self.call("toggle", Value::Null).await
    }
}

impl Dimmable for MiioDevice {
    async fn set_brightness(&self, level: i64) -> Result<(), HubError> {
        self.require_kind(MiioKind::Light, "set_bright")?;
        let level = ParameterError::check_range("brightness", level, 1, 100)?;
        self.call("set_bright", json!([level, "smooth", SMOOTH_MS]))
            .await
    }

    async fn set_color(&self, color: Color) -> Result<(), HubError> {
        match color {
            Color::Hsv { hue, saturation } => {
                self.require_kind(MiioKind::Light, "set_hsv")?;
                let hue = ParameterError::check_range("hue", hue, 0, 359)?;
                let saturation = ParameterError::check_range("saturation", saturation, 0, 100)?;
                self.call("set_hsv", json!([hue, saturation, "smooth", SMOOTH_MS]))
                    .await
            }
            Color::Rgb { r, g, b } => {
                self.require_kind(MiioKind::Light, "set_rgb")?;
                let r = ParameterError::check_range("red", r, 0, 255)?;
                let g = ParameterError::check_range("green", g, 0, 255)?;
                let b = ParameterError::check_range("blue", b, 0, 255)?;
                let rgb = (r << 16) | (g << 8) | b;
                self.call("set_rgb", json!([rgb, "smooth", SMOOTH_MS]))
                    .await
            }
        }
    }

    async fn set_color_temp(&self, kelvin: i64) -> Result<(), HubError> {
        self.require_kind(MiioKind::Light, "set_ct_abx")?;
        let kelvin = ParameterError::check_range("color_temp", kelvin, 1700, 6500)?;
        self.call("set_ct_abx", json!([kelvin, "smooth", SMOOTH_MS]))
            .await
    }
}

impl VacuumControllable for MiioDevice {
    async fn start(&self) -> Result<(), HubError> {
        self.vacuum("app_start").await
    }

    async fn stop(&self) -> Result<(), HubError> {
        self.vacuum("app_stop").await
    }

    async fn pause(&self) -> Result<(), HubError> {
        self.vacuum("app_pause").await
    }

    async fn home(&self) -> Result<(), HubError> {
        self.vacuum("app_charge").await
    }

    async fn spot(&self) -> Result<(), HubError> {
        self.vacuum("app_spot").await
    }

    async fn set_fan_speed(&self, speed: i64) -> Result<(), HubError> {
        self.require_kind(MiioKind::Vacuum, "set_custom_mode")?;
        let speed = ParameterError::check_range("fan_speed", speed, 0, 100)?;
        self.call("set_custom_mode", json!([speed])).await
    }

    async fn find_me(&self) -> Result<(), HubError> {
        self.vacuum("find_me").await
    }
}

impl PurifierControllable for MiioDevice {
    async fn set_mode(&self, mode: &str) -> Result<(), HubError> {
        self.require_kind(MiioKind::Purifier, "set_mode")?;
        if !PURIFIER_MODES.contains(&mode) {
            return Err(ParameterError::Invalid {
                field: "mode",
                reason: format!("expected one of {}, got {mode:?}", PURIFIER_MODES.join("|")),
            }
            .into());
        }
        self.call("set_mode", json!([mode])).await
    }

    async fn set_favorite_level(&self, level: i64) -> Result<(), HubError> {
        self.require_kind(MiioKind::Purifier, "set_level_favorite")?;
        let level = ParameterError::check_range("favorite_level", level, 0, 14)?;
        self.call("set_level_favorite", json!([level])).await
    }
}
