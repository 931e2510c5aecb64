//! Device records — one per configured physical device.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HubError, ValidationError};
use crate::id::DeviceId;

/// Protocol family used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Tapo,
    Broadlink,
    Mqtt,
    Xiaomi,
    Http,
}

impl Vendor {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tapo => "tapo",
            Self::Broadlink => "broadlink",
            Self::Mqtt => "mqtt",
            Self::Xiaomi => "xiaomi",
            Self::Http => "http",
        }
    }

    /// Device classes this vendor can serve.
    #[must_use]
    pub fn supports(self, class: DeviceClass) -> bool {
        use DeviceClass as C;
        match self {
            Self::Tapo | Self::Mqtt | Self::Http => matches!(class, C::Light | C::Switch),
            Self::Broadlink => class == C::Ir,
            Self::Xiaomi => matches!(class, C::Light | C::Vacuum | C::Purifier),
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which domain dispatchers may reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Light,
    Switch,
    Ir,
    Vacuum,
    Purifier,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Ir => "ir",
            Self::Vacuum => "vacuum",
            Self::Purifier => "purifier",
        })
    }
}

/// A request template for a generic HTTP device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpAction {
    #[serde(default = "HttpAction::default_method")]
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl HttpAction {
    fn default_method() -> String {
        "POST".to_string()
    }

    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Headers sent on every request plus the verb-to-request table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub headers: BTreeMap<String, String>,
    pub actions: BTreeMap<String, HttpAction>,
}

/// A configured device. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub name: String,
    pub class: DeviceClass,
    pub vendor: Vendor,
    pub address: Option<String>,
    pub model: Option<String>,
    pub topic: Option<String>,
    pub token: Option<String>,
    /// IR command table: key (verb or `temp_<N>`) to hex payload.
    pub commands: BTreeMap<String, String>,
    pub http: Option<HttpSettings>,
}

impl DeviceRecord {
    /// Create a builder for constructing a [`DeviceRecord`].
    #[must_use]
    pub fn builder() -> DeviceRecordBuilder {
        DeviceRecordBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the id or name is empty, the
    /// vendor cannot serve the class, or a vendor-specific field is missing
    /// or malformed.
    pub fn validate(&self) -> Result<(), HubError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId.into());
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if !self.vendor.supports(self.class) {
            return Err(ValidationError::UnsupportedClass {
                vendor: self.vendor,
                class: self.class,
            }
            .into());
        }
        if self.vendor != Vendor::Mqtt && is_blank(self.address.as_deref()) {
            return Err(ValidationError::MissingAddress {
                vendor: self.vendor,
            }
            .into());
        }
        match self.vendor {
            Vendor::Mqtt if is_blank(self.topic.as_deref()) => {
                Err(ValidationError::MissingTopic.into())
            }
            Vendor::Xiaomi => match self.token.as_deref() {
                None | Some("") => Err(ValidationError::MissingToken.into()),
                Some(token) if !is_token(token) => Err(ValidationError::InvalidToken.into()),
                Some(_) => Ok(()),
            },
            Vendor::Http if self.http.is_none() => Err(ValidationError::MissingHttpSettings.into()),
            _ => Ok(()),
        }
    }

    /// Look up an IR payload in the command table.
    #[must_use]
    pub fn ir_code(&self, key: &str) -> Option<&str> {
        self.commands.get(key).map(String::as_str)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn is_token(token: &str) -> bool {
    token.len() == 32 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Step-by-step builder for [`DeviceRecord`].
#[derive(Debug, Default)]
pub struct DeviceRecordBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    class: Option<DeviceClass>,
    vendor: Option<Vendor>,
    address: Option<String>,
    model: Option<String>,
    topic: Option<String>,
    token: Option<String>,
    commands: BTreeMap<String, String>,
    http: Option<HttpSettings>,
}

impl DeviceRecordBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn class(mut self, class: DeviceClass) -> Self {
        self.class = Some(class);
        self
    }

    #[must_use]
    pub fn vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = Some(vendor);
        self
    }

    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn command(mut self, key: impl Into<String>, hex: impl Into<String>) -> Self {
        self.commands.insert(key.into(), hex.into());
        self
    }

    #[must_use]
    pub fn commands(mut self, commands: BTreeMap<String, String>) -> Self {
        self.commands.extend(commands);
        self
    }

    #[must_use]
    pub fn http(mut self, http: HttpSettings) -> Self {
        self.http = Some(http);
        self
    }

    /// Consume the builder, validate, and return a [`DeviceRecord`].
    ///
    /// Missing `class` defaults to the first class the vendor supports and
    /// a missing `name` falls back to the id.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] if no vendor was set or the resulting
    /// record is invalid.
    pub fn build(self) -> Result<DeviceRecord, HubError> {
        let id = self.id.unwrap_or_else(|| DeviceId::new(""));
        let vendor = self.vendor.ok_or(ValidationError::MissingVendor)?;
        let class = self.class.unwrap_or(match vendor {
            Vendor::Broadlink => DeviceClass::Ir,
            Vendor::Tapo | Vendor::Mqtt | Vendor::Http => DeviceClass::Light,
            Vendor::Xiaomi => DeviceClass::Vacuum,
        });
        let record = DeviceRecord {
            name: self.name.unwrap_or_else(|| id.to_string()),
            id,
            class,
            vendor,
            address: self.address,
            model: self.model,
            topic: self.topic,
            token: self.token,
            commands: self.commands,
            http: self.http,
        };
        record.validate()?;
        Ok(record)
    }
}
