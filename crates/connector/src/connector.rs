//! Vendor dispatch for device records.

use std::sync::Arc;

use hearth_adapter_broadlink::BroadlinkClient;
use hearth_adapter_http::HttpDevice;
use hearth_adapter_miio::{MiioClient, MiioDevice, MiioKind};
use hearth_adapter_mqtt::{Flavor, MqttDevice, MqttError, Publisher};
use hearth_adapter_tapo::{TapoClient, TapoCredentials};
use hearth_app::ports::DeviceConnector;
use hearth_domain::device::{DeviceRecord, Vendor};
use hearth_domain::error::{HubError, ValidationError};

use crate::client::{Protocol, VendorClient};

/// Builds a [`VendorClient`] for any configured vendor.
///
/// Tapo devices share one account; MQTT devices share the broker
/// connection handed to [`VendorConnector::with_publisher`].
pub struct VendorConnector<P> {
    tapo: TapoCredentials,
    publisher: Option<Arc<P>>,
}

impl<P> std::fmt::Debug for VendorConnector<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConnector")
            .field("tapo", &self.tapo)
            .field("mqtt", &self.publisher.is_some())
            .finish()
    }
}

impl<P: Publisher> VendorConnector<P> {
    #[must_use]
    pub fn new(tapo: TapoCredentials) -> Self {
        Self {
            tapo,
            publisher: None,
        }
    }

    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<P>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    fn protocol(&self, record: &DeviceRecord) -> Result<Protocol<P>, HubError> {
        let address = record.address.as_deref().unwrap_or_default();
        match record.vendor {
            Vendor::Tapo => {
                if self.tapo.is_empty() {
                    tracing::warn!(device = %record.id, "no Tapo credentials configured");
                }
                Ok(Protocol::Tapo(TapoClient::new(address, self.tapo.clone())?))
            }
            Vendor::Broadlink => Ok(Protocol::Broadlink(BroadlinkClient::new(address)?)),
            Vendor::Xiaomi => {
                let kind = MiioKind::from_class(record.class).ok_or(
                    ValidationError::UnsupportedClass {
                        vendor: record.vendor,
                        class: record.class,
                    },
                )?;
                let token = record.token.as_deref().ok_or(ValidationError::MissingToken)?;
                let client = MiioClient::new(address, token)?;
                Ok(Protocol::Miio(MiioDevice::new(client, kind)))
            }
            Vendor::Mqtt => {
                let publisher = self.publisher.clone().ok_or(MqttError::NotConnected)?;
                let flavor = Flavor::detect(record.model.as_deref(), record.class)?;
                let topic = record.topic.as_deref().ok_or(ValidationError::MissingTopic)?;
                Ok(Protocol::Mqtt(MqttDevice::new(topic, flavor, publisher)))
            }
            Vendor::Http => {
                let settings = record
                    .http
                    .as_ref()
                    .ok_or(ValidationError::MissingHttpSettings)?;
                Ok(Protocol::Http(HttpDevice::new(address, settings)?))
            }
        }
    }
}

impl<P: Publisher> DeviceConnector for VendorConnector<P> {
    type Client = VendorClient<P>;

    #[tracing::instrument(skip(self, record), fields(device = %record.id, vendor = %record.vendor))]
    fn connect(&self, record: &DeviceRecord) -> Result<VendorClient<P>, HubError> {
        record.validate()?;
        let protocol = self.protocol(record)?;
        tracing::debug!(class = %record.class, "client ready");
        Ok(VendorClient::new(record.class, protocol))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use hearth_adapter_miio::testing::{FakeMiio, TOKEN_HEX};
    use hearth_adapter_tapo::testing::FakeTapoDevice;
    use hearth_app::ports::{
        Capability, DeviceClient, Dimmable, IrControllable, Switchable, VacuumControllable,
    };
    use hearth_domain::device::{DeviceClass, HttpAction, HttpSettings};
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<(String, String)>>,
    }

    impl Publisher for RecordingPublisher {
        async fn publish(&self, topic: String, payload: String) -> Result<(), MqttError> {
            self.published.lock().unwrap().push((topic, payload));
            Ok(())
        }
    }

    fn connector() -> VendorConnector<RecordingPublisher> {
        VendorConnector::new(TapoCredentials::new("user@example.com", "hunter2"))
    }

    fn record(vendor: Vendor, class: DeviceClass) -> hearth_domain::device::DeviceRecordBuilder {
        DeviceRecord::builder()
            .id("dev1")
            .vendor(vendor)
            .class(class)
    }

    #[test]
    fn should_build_client_per_vendor() {
        let publisher = Arc::new(RecordingPublisher::default());
        let connector = connector().with_publisher(publisher);

        let tapo = record(Vendor::Tapo, DeviceClass::Light)
            .address("192.168.1.20")
            .build()
            .unwrap();
        let broadlink = record(Vendor::Broadlink, DeviceClass::Ir)
            .address("192.168.1.30")
            .build()
            .unwrap();
        let vacuum = record(Vendor::Xiaomi, DeviceClass::Vacuum)
            .address("192.168.1.40")
            .token(TOKEN_HEX)
            .build()
            .unwrap();
        let mqtt = record(Vendor::Mqtt, DeviceClass::Switch)
            .topic("shellies/plug1")
            .build()
            .unwrap();

        assert!(matches!(
            connector.connect(&tapo).unwrap().protocol(),
            Protocol::Tapo(_)
        ));
        assert!(matches!(
            connector.connect(&broadlink).unwrap().protocol(),
            Protocol::Broadlink(_)
        ));
        assert!(matches!(
            connector.connect(&vacuum).unwrap().protocol(),
            Protocol::Miio(device) if device.kind() == MiioKind::Vacuum
        ));
        assert!(matches!(
            connector.connect(&mqtt).unwrap().protocol(),
            Protocol::Mqtt(device) if device.flavor() == Flavor::Shelly
        ));
    }

    #[test]
    fn should_report_capabilities_by_vendor_and_class() {
        let connector = connector().with_publisher(Arc::new(RecordingPublisher::default()));

        let plug = connector
            .connect(
                &record(Vendor::Tapo, DeviceClass::Switch)
                    .address("192.168.1.21")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert!(plug.supports(Capability::Switch));
        assert!(!plug.supports(Capability::Dimmer));

        let blaster = connector
            .connect(
                &record(Vendor::Broadlink, DeviceClass::Ir)
                    .address("192.168.1.30")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert!(blaster.supports(Capability::Ir));
        assert!(!blaster.supports(Capability::Switch));

        let shelly_light = connector
            .connect(
                &record(Vendor::Mqtt, DeviceClass::Light)
                    .topic("shellies/dimmer")
                    .model("shelly")
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert!(shelly_light.supports(Capability::Switch));
        assert!(!shelly_light.supports(Capability::Dimmer));

        let purifier = connector
            .connect(
                &record(Vendor::Xiaomi, DeviceClass::Purifier)
                    .address("192.168.1.41")
                    .token(TOKEN_HEX)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert!(purifier.supports(Capability::Purifier));
        assert!(!purifier.supports(Capability::Vacuum));
    }

    #[test]
    fn should_fail_mqtt_device_without_broker() {
        let mqtt = record(Vendor::Mqtt, DeviceClass::Switch)
            .topic("shellies/plug1")
            .build()
            .unwrap();

        assert!(matches!(
            connector().connect(&mqtt),
            Err(HubError::ProtocolTransport(_))
        ));
    }

    #[test]
    fn should_reject_unknown_mqtt_model() {
        let connector = connector().with_publisher(Arc::new(RecordingPublisher::default()));
        let mqtt = record(Vendor::Mqtt, DeviceClass::Switch)
            .topic("plugs/1")
            .model("homematic")
            .build()
            .unwrap();

        assert!(connector.connect(&mqtt).is_err());
    }

    #[test]
    fn should_reject_invalid_record_before_building_client() {
        let mut vacuum = record(Vendor::Xiaomi, DeviceClass::Vacuum)
            .address("192.168.1.40")
            .token(TOKEN_HEX)
            .build()
            .unwrap();
        vacuum.token = Some("not-a-token".to_string());

        assert!(matches!(
            connector().connect(&vacuum),
            Err(HubError::Validation(ValidationError::InvalidToken))
        ));
    }

    #[tokio::test]
    async fn should_refuse_operations_outside_capabilities_locally() {
        let blaster = connector()
            .connect(
                &record(Vendor::Broadlink, DeviceClass::Ir)
                    .address("192.168.1.30")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let err = blaster.turn_on().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported operation: broadlink ir devices do not support turn_on"
        );
        assert!(matches!(blaster.start().await, Err(HubError::Unsupported(_))));
    }

    #[tokio::test]
    async fn should_publish_through_shared_broker() {
        let publisher = Arc::new(RecordingPublisher::default());
        let connector = connector().with_publisher(Arc::clone(&publisher));
        let light = connector
            .connect(
                &record(Vendor::Mqtt, DeviceClass::Light)
                    .topic("zigbee2mqtt/desk")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        light.set_brightness(50).await.unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "zigbee2mqtt/desk/set");
    }

    #[tokio::test]
    async fn should_drive_tapo_light_through_vendor_client() {
        let (server, device) = FakeTapoDevice::start().await;
        let light = connector()
            .connect(
                &record(Vendor::Tapo, DeviceClass::Light)
                    .address(server.uri())
                    .build()
                    .unwrap(),
            )
            .unwrap();

        light.turn_on().await.unwrap();
        light.set_brightness(30).await.unwrap();

        assert!(device.is_on());
        assert_eq!(device.handshakes(), 1);
    }

    #[tokio::test]
    async fn should_drive_miio_vacuum_through_vendor_client() {
        let fake = FakeMiio::start().await;
        let vacuum = connector()
            .connect(
                &record(Vendor::Xiaomi, DeviceClass::Vacuum)
                    .address(fake.address())
                    .token(TOKEN_HEX)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        vacuum.start().await.unwrap();
        assert!(matches!(
            vacuum.send_ir("2600").await,
            Err(HubError::Unsupported(_))
        ));

        assert_eq!(fake.calls(), vec![("app_start".to_string(), json!([]))]);
    }

    #[test]
    fn should_build_http_device_from_settings() {
        let settings = HttpSettings {
            actions: [
                ("on".to_string(), HttpAction::new("POST", "/relay/on")),
                ("off".to_string(), HttpAction::new("POST", "/relay/off")),
            ]
            .into(),
            ..HttpSettings::default()
        };
        let record = record(Vendor::Http, DeviceClass::Switch)
            .address("192.168.1.50")
            .http(settings)
            .build()
            .unwrap();

        let client = connector().connect(&record).unwrap();
        assert!(matches!(client.protocol(), Protocol::Http(_)));
        assert!(client.supports(Capability::Switch));
    }
}
