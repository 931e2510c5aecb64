//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `hearth.toml` in the working directory, or the file named by
//! `HEARTH_CONFIG`. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::BTreeMap;

use hearth_adapter_mqtt::MqttConfig;
use hearth_adapter_tapo::TapoCredentials;
use hearth_app::security::SecurityConfig;
use hearth_domain::device::{DeviceClass, DeviceRecord, HttpSettings, Vendor};
use hearth_domain::error::HubError;
use serde::Deserialize;

const DEFAULT_PATH: &str = "hearth.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Rate limit, allow-list and audit settings.
    pub security: SecurityConfig,
    /// Account shared by all Tapo devices.
    pub tapo: TapoCredentials,
    /// Broker connection for MQTT devices.
    pub mqtt: MqttConfig,
    /// Device table keyed by device id.
    pub devices: BTreeMap<String, DeviceConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// One `[devices.<id>]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub vendor: Vendor,
    /// Defaults to the device id.
    pub name: Option<String>,
    /// Defaults per vendor (`ir` for Broadlink, `vacuum` for Xiaomi, `light`
    /// otherwise).
    pub class: Option<DeviceClass>,
    pub address: Option<String>,
    pub model: Option<String>,
    pub topic: Option<String>,
    pub token: Option<String>,
    /// IR command table.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,
    pub http: Option<HttpSettings>,
}

impl Config {
    /// Load configuration from `HEARTH_CONFIG` or `hearth.toml` (if
    /// present) then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HEARTH_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HEARTH_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("HEARTH_TAPO_EMAIL") {
            self.tapo.email = val;
        }
        if let Some(val) = var("HEARTH_TAPO_PASSWORD") {
            self.tapo.password = val;
        }
        if let Some(val) = var("HEARTH_MQTT_HOST") {
            self.mqtt.broker_host = val;
            self.mqtt.enabled = true;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.security.max_requests == 0 {
            return Err(ConfigError::Validation(
                "security.max_requests must be non-zero".to_string(),
            ));
        }
        if self.security.window_secs == 0 {
            return Err(ConfigError::Validation(
                "security.window_secs must be non-zero".to_string(),
            ));
        }
        if self.security.audit_capacity == 0 {
            return Err(ConfigError::Validation(
                "security.audit_capacity must be non-zero".to_string(),
            ));
        }
        self.device_records()?;
        Ok(())
    }

    /// Build a validated record for every configured device.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Device`] naming the first invalid device.
    pub fn device_records(&self) -> Result<Vec<DeviceRecord>, ConfigError> {
        self.devices
            .iter()
            .map(|(id, device)| {
                device
                    .to_record(id)
                    .map_err(|source| ConfigError::Device {
                        id: id.clone(),
                        source,
                    })
            })
            .collect()
    }
}

impl DeviceConfig {
    fn to_record(&self, id: &str) -> Result<DeviceRecord, HubError> {
        let mut builder = DeviceRecord::builder()
            .id(id)
            .vendor(self.vendor)
            .commands(self.commands.clone());
        if let Some(name) = &self.name {
            builder = builder.name(name.as_str());
        }
        if let Some(class) = self.class {
            builder = builder.class(class);
        }
        if let Some(address) = &self.address {
            builder = builder.address(address.as_str());
        }
        if let Some(model) = &self.model {
            builder = builder.model(model.as_str());
        }
        if let Some(topic) = &self.topic {
            builder = builder.topic(topic.as_str());
        }
        if let Some(token) = &self.token {
            builder = builder.token(token.as_str());
        }
        if let Some(http) = &self.http {
            builder = builder.http(http.clone());
        }
        builder.build()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hearthd=info,hearth=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// A device table that does not describe a usable device.
    #[error("invalid device {id:?}")]
    Device {
        id: String,
        #[source]
        source: HubError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.security.max_requests, 10);
        assert_eq!(config.security.window_secs, 60);
        assert_eq!(config.security.audit_capacity, 1000);
        assert_eq!(config.security.allowed_actions.len(), 18);
        assert!(!config.mqtt.enabled);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.security.max_requests, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = r#"
            [logging]
            filter = 'debug'

            [security]
            max_requests = 20
            window_secs = 30
            allowed_actions = ['light.on', 'light.off']

            [tapo]
            email = 'me@example.com'
            password = 'hunter2'

            [mqtt]
            enabled = true
            broker_host = 'broker.lan'

            [devices.lamp1]
            vendor = 'tapo'
            name = 'Desk lamp'
            address = '192.168.1.20'

            [devices.ac1]
            vendor = 'broadlink'
            address = '192.168.1.30'

            [devices.ac1.commands]
            on = '26001200'
            temp_25 = '26002500'

            [devices.plug1]
            vendor = 'mqtt'
            class = 'switch'
            topic = 'shellies/plug1'

            [devices.vacuum1]
            vendor = 'xiaomi'
            address = '192.168.1.40'
            token = '00112233445566778899aabbccddeeff'

            [devices.relay1]
            vendor = 'http'
            class = 'switch'
            address = '192.168.1.50'

            [devices.relay1.http.headers]
            Authorization = 'Bearer abc'

            [devices.relay1.http.actions.on]
            method = 'POST'
            path = '/relay/on'
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.security.max_requests, 20);
        assert_eq!(config.security.allowed_actions, vec!["light.on", "light.off"]);
        assert_eq!(config.tapo.email, "me@example.com");
        assert!(config.mqtt.enabled);

        let records = config.device_records().unwrap();
        assert_eq!(records.len(), 5);
        let ac = records.iter().find(|r| r.id.as_str() == "ac1").unwrap();
        assert_eq!(ac.class, DeviceClass::Ir);
        assert_eq!(ac.ir_code("temp_25"), Some("26002500"));
        let lamp = records.iter().find(|r| r.id.as_str() == "lamp1").unwrap();
        assert_eq!(lamp.name, "Desk lamp");
        let relay = records.iter().find(|r| r.id.as_str() == "relay1").unwrap();
        assert!(relay.http.as_ref().unwrap().actions.contains_key("on"));
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.security.max_requests, 10);
    }

    #[test]
    fn should_reject_zero_rate_limit_capacity() {
        let mut config = Config::default();
        config.security.max_requests = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_window() {
        let mut config = Config::default();
        config.security.window_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_name_device_when_record_invalid() {
        let toml = "
            [devices.vacuum1]
            vendor = 'xiaomi'
            address = '192.168.1.40'
            token = 'short'
        ";
        let config: Config = toml::from_str(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Device { ref id, .. } if id == "vacuum1"));
    }

    #[test]
    fn should_reject_unknown_device_field() {
        let toml = "
            [devices.lamp1]
            vendor = 'tapo'
            adress = '192.168.1.20'
        ";
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn should_apply_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[
            ("HEARTH_LOG", "hearth=trace"),
            ("HEARTH_TAPO_EMAIL", "ops@example.com"),
            ("HEARTH_TAPO_PASSWORD", "s3cret"),
            ("HEARTH_MQTT_HOST", "10.0.0.2"),
        ]));
        assert_eq!(config.logging.filter, "hearth=trace");
        assert_eq!(config.tapo.email, "ops@example.com");
        assert_eq!(config.tapo.password, "s3cret");
        assert_eq!(config.mqtt.broker_host, "10.0.0.2");
        assert!(config.mqtt.enabled);
    }

    #[test]
    fn should_prefer_rust_log_over_hearth_log() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[("HEARTH_LOG", "info"), ("RUST_LOG", "debug")]));
        assert_eq!(config.logging.filter, "debug");
    }
}
