//! Per-device topic conventions.

use std::fmt;

use hearth_app::ports::{Dimmable, Switchable};
use hearth_domain::command::Color;
use hearth_domain::device::DeviceClass;
use hearth_domain::error::{HubError, ParameterError};
use serde_json::json;

use crate::bridge::Publisher;
use crate::error::MqttError;

/// Firmware family, which decides topics and payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// `<topic>/set` with `ON`/`OFF`/`TOGGLE` or a JSON state object.
    Zigbee2Mqtt,
    /// `<topic>/relay/0` with `on`/`off`; toggle on `<topic>/relay/0/command`.
    Shelly,
    /// `<topic>/cmnd/POWER` and `<topic>/cmnd/Dimmer`. Also used by Sonoff.
    Tasmota,
    /// `<topic>/<command>` with a plain value.
    Esp32,
}

impl Flavor {
    /// Pick the convention from the configured model, or from the device
    /// class when no model is set.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::UnknownModel`] for an unrecognised model.
    pub fn detect(model: Option<&str>, class: DeviceClass) -> Result<Self, MqttError> {
        let Some(model) = model.map(str::trim).filter(|m| !m.is_empty()) else {
            return Ok(match class {
                DeviceClass::Switch => Self::Shelly,
                _ => Self::Zigbee2Mqtt,
            });
        };
        match model.to_ascii_lowercase().as_str() {
            "zigbee2mqtt" | "z2m" => Ok(Self::Zigbee2Mqtt),
            "shelly" => Ok(Self::Shelly),
            "tasmota" | "sonoff" => Ok(Self::Tasmota),
            "esp32" => Ok(Self::Esp32),
            _ => Err(MqttError::UnknownModel(model.to_string())),
        }
    }

    #[must_use]
    pub fn dimmable(self) -> bool {
        !matches!(self, Self::Shelly)
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zigbee2Mqtt => "zigbee2mqtt",
            Self::Shelly => "shelly",
            Self::Tasmota => "tasmota",
            Self::Esp32 => "esp32",
        })
    }
}

#[derive(Clone, Copy)]
enum Power {
    On,
    Off,
    Toggle,
}

/// A switch or light reached through the broker.
pub struct MqttDevice<P> {
    topic: String,
    flavor: Flavor,
    publisher: P,
}

impl<P> fmt::Debug for MqttDevice<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttDevice")
            .field("topic", &self.topic)
            .field("flavor", &self.flavor)
            .finish_non_exhaustive()
    }
}

impl<P: Publisher> MqttDevice<P> {
    pub fn new(topic: impl Into<String>, flavor: Flavor, publisher: P) -> Self {
        Self {
            topic: topic.into().trim_end_matches('/').to_string(),
            flavor,
            publisher,
        }
    }

    #[must_use]
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    async fn send(&self, suffix: &str, payload: String) -> Result<(), MqttError> {
        let topic = format!("{}/{suffix}", self.topic);
        self.publisher.publish(topic, payload).await
    }

    async fn power(&self, power: Power) -> Result<(), MqttError> {
        match (self.flavor, power) {
            (Flavor::Zigbee2Mqtt, Power::On) => self.send("set", "ON".into()).await,
            (Flavor::Zigbee2Mqtt, Power::Off) => self.send("set", "OFF".into()).await,
            (Flavor::Zigbee2Mqtt, Power::Toggle) => self.send("set", "TOGGLE".into()).await,
            (Flavor::Shelly, Power::On) => self.send("relay/0", "on".into()).await,
            (Flavor::Shelly, Power::Off) => self.send("relay/0", "off".into()).await,
            (Flavor::Shelly, Power::Toggle) => {
                self.send("relay/0/command", "toggle".into()).await
            }
            (Flavor::Tasmota, Power::On) => self.send("cmnd/POWER", "ON".into()).await,
            (Flavor::Tasmota, Power::Off) => self.send("cmnd/POWER", "OFF".into()).await,
            (Flavor::Tasmota, Power::Toggle) => self.send("cmnd/POWER", "TOGGLE".into()).await,
            (Flavor::Esp32, Power::On) => self.send("power", "on".into()).await,
            (Flavor::Esp32, Power::Off) => self.send("power", "off".into()).await,
            (Flavor::Esp32, Power::Toggle) => self.send("power", "toggle".into()).await,
        }
    }

    fn unsupported(&self, operation: &'static str) -> MqttError {
        MqttError::Unsupported {
            flavor: self.flavor,
            operation,
        }
    }

    async fn brightness(&self, level: i64) -> Result<(), MqttError> {
        let level = ParameterError::check_range("brightness", level, 0, 100)?;
        match self.flavor {
            Flavor::Zigbee2Mqtt => {
                self.send_json("set", &json!({"state": "ON", "brightness": level}))
                    .await
            }
            Flavor::Tasmota => self.send("cmnd/Dimmer", level.to_string()).await,
            Flavor::Esp32 => self.send("brightness", level.to_string()).await,
            Flavor::Shelly => Err(self.unsupported("brightness")),
        }
    }

    async fn color(&self, color: Color) -> Result<(), MqttError> {
        let color = match color {
            Color::Hsv { hue, saturation } => json!({
                "hue": ParameterError::check_range("hue", hue, 0, 360)?,
                "saturation": ParameterError::check_range("saturation", saturation, 0, 100)?,
            }),
            Color::Rgb { r, g, b } => json!({
                "r": ParameterError::check_range("r", r, 0, 255)?,
                "g": ParameterError::check_range("g", g, 0, 255)?,
                "b": ParameterError::check_range("b", b, 0, 255)?,
            }),
        };
        match self.flavor {
            Flavor::Zigbee2Mqtt => {
                self.send_json("set", &json!({"state": "ON", "color": color}))
                    .await
            }
            Flavor::Esp32 => self.send_json("color", &color).await,
            Flavor::Shelly | Flavor::Tasmota => Err(self.unsupported("color")),
        }
    }

    async fn color_temp(&self, kelvin: i64) -> Result<(), MqttError> {
        let kelvin = ParameterError::check_range("color_temp", kelvin, 1000, 10_000)?;
        match self.flavor {
            Flavor::Zigbee2Mqtt => {
                let mireds = 1_000_000 / kelvin;
                self.send_json("set", &json!({"state": "ON", "color_temp": mireds}))
                    .await
            }
            Flavor::Esp32 => self.send("color_temp", kelvin.to_string()).await,
            Flavor::Shelly | Flavor::Tasmota => Err(self.unsupported("color_temp")),
        }
    }

    async fn send_json(&self, suffix: &str, payload: &serde_json::Value) -> Result<(), MqttError> {
        let payload = serde_json::to_string(payload).map_err(MqttError::Payload)?;
        self.send(suffix, payload).await
    }
}

impl<P: Publisher> Switchable for MqttDevice<P> {
    async fn turn_on(&self) -> Result<(), HubError> {
        Ok(self.power(Power::On).await?)
    }

    async fn turn_off(&self) -> Result<(), HubError> {
        Ok(self.power(Power::Off).await?)
    }

    async fn toggle(&self) -> Result<(), HubError> {
        Ok(self.power(Power::Toggle).await?)
    }
}

impl<P: Publisher> Dimmable for MqttDevice<P> {
    async fn set_brightness(&self, level: i64) -> Result<(), HubError> {
        Ok(self.brightness(level).await?)
    }

    async fn set_color(&self, color: Color) -> Result<(), HubError> {
        Ok(self.color(color).await?)
    }

    async fn set_color_temp(&self, kelvin: i64) -> Result<(), HubError> {
        Ok(self.color_temp(kelvin).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl Publisher for RecordingPublisher {
        async fn publish(&self, topic: String, payload: String) -> Result<(), MqttError> {
            self.sent.lock().unwrap().push((topic, payload));
            Ok(())
        }
    }

    fn device(flavor: Flavor) -> (MqttDevice<Arc<RecordingPublisher>>, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        (
            MqttDevice::new("home/dev/", flavor, Arc::clone(&publisher)),
            publisher,
        )
    }

    fn sent(publisher: &RecordingPublisher) -> Vec<(String, String)> {
        publisher.sent.lock().unwrap().clone()
    }

    fn pair(topic: &str, payload: &str) -> (String, String) {
        (topic.to_string(), payload.to_string())
    }

    fn json_of(payload: &str) -> serde_json::Value {
        serde_json::from_str(payload).unwrap()
    }

    #[test]
    fn should_default_flavor_by_class_when_model_missing() {
        assert_eq!(
            Flavor::detect(None, DeviceClass::Light).unwrap(),
            Flavor::Zigbee2Mqtt
        );
        assert_eq!(
            Flavor::detect(Some(""), DeviceClass::Switch).unwrap(),
            Flavor::Shelly
        );
    }

    #[test]
    fn should_detect_flavor_from_model() {
        assert_eq!(
            Flavor::detect(Some("Sonoff"), DeviceClass::Switch).unwrap(),
            Flavor::Tasmota
        );
        assert_eq!(
            Flavor::detect(Some("esp32"), DeviceClass::Light).unwrap(),
            Flavor::Esp32
        );
        assert!(matches!(
            Flavor::detect(Some("hue"), DeviceClass::Light),
            Err(MqttError::UnknownModel(m)) if m == "hue"
        ));
    }

    #[tokio::test]
    async fn should_publish_zigbee2mqtt_power_and_state() {
        let (dev, publisher) = device(Flavor::Zigbee2Mqtt);
        dev.turn_on().await.unwrap();
        dev.toggle().await.unwrap();
        dev.set_brightness(80).await.unwrap();
        let sent = sent(&publisher);
        assert_eq!(sent[..2], [pair("home/dev/set", "ON"), pair("home/dev/set", "TOGGLE")]);
        assert_eq!(sent[2].0, "home/dev/set");
        assert_eq!(json_of(&sent[2].1), json!({"state": "ON", "brightness": 80}));
    }

    #[tokio::test]
    async fn should_publish_color_temperature_in_mireds() {
        let (dev, publisher) = device(Flavor::Zigbee2Mqtt);
        dev.set_color_temp(4000).await.unwrap();
        let sent = sent(&publisher);
        assert_eq!(sent[0].0, "home/dev/set");
        assert_eq!(json_of(&sent[0].1), json!({"state": "ON", "color_temp": 250}));
    }

    #[tokio::test]
    async fn should_publish_rgb_color() {
        let (dev, publisher) = device(Flavor::Zigbee2Mqtt);
        dev.set_color(Color::Rgb { r: 255, g: 10, b: 0 })
            .await
            .unwrap();
        let sent = sent(&publisher);
        assert_eq!(
            json_of(&sent[0].1),
            json!({"state": "ON", "color": {"r": 255, "g": 10, "b": 0}})
        );
    }

    #[tokio::test]
    async fn should_publish_shelly_relay_topics() {
        let (dev, publisher) = device(Flavor::Shelly);
        dev.turn_on().await.unwrap();
        dev.turn_off().await.unwrap();
        dev.toggle().await.unwrap();
        assert_eq!(
            sent(&publisher),
            vec![
                pair("home/dev/relay/0", "on"),
                pair("home/dev/relay/0", "off"),
                pair("home/dev/relay/0/command", "toggle"),
            ]
        );
    }

    #[tokio::test]
    async fn should_reject_brightness_on_shelly_without_publishing() {
        let (dev, publisher) = device(Flavor::Shelly);
        let result = dev.set_brightness(50).await;
        assert!(matches!(result, Err(HubError::Unsupported(_))));
        assert!(sent(&publisher).is_empty());
    }

    #[tokio::test]
    async fn should_publish_tasmota_commands() {
        let (dev, publisher) = device(Flavor::Tasmota);
        dev.turn_on().await.unwrap();
        dev.set_brightness(30).await.unwrap();
        assert_eq!(
            sent(&publisher),
            vec![
                pair("home/dev/cmnd/POWER", "ON"),
                pair("home/dev/cmnd/Dimmer", "30"),
            ]
        );
    }

    #[tokio::test]
    async fn should_publish_esp32_commands() {
        let (dev, publisher) = device(Flavor::Esp32);
        dev.turn_off().await.unwrap();
        dev.set_brightness(5).await.unwrap();
        assert_eq!(
            sent(&publisher),
            vec![pair("home/dev/power", "off"), pair("home/dev/brightness", "5")]
        );
    }

    #[tokio::test]
    async fn should_reject_out_of_range_brightness_without_publishing() {
        let (dev, publisher) = device(Flavor::Zigbee2Mqtt);
        let result = dev.set_brightness(101).await;
        assert!(matches!(
            result,
            Err(HubError::InvalidParameter(ParameterError::OutOfRange { .. }))
        ));
        assert!(sent(&publisher).is_empty());
    }
}
