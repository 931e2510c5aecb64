//! The closed set of vendor clients.

use std::sync::Arc;
use std::time::Duration;

use hearth_adapter_broadlink::BroadlinkClient;
use hearth_adapter_http::HttpDevice;
use hearth_adapter_miio::MiioDevice;
use hearth_adapter_mqtt::{MqttDevice, Publisher};
use hearth_adapter_tapo::TapoClient;
use hearth_app::ports::{
    Capability, DeviceClient, Dimmable, IrControllable, PurifierControllable, Switchable,
    VacuumControllable,
};
use hearth_domain::command::Color;
use hearth_domain::device::{DeviceClass, Vendor};
use hearth_domain::error::HubError;

/// One protocol client per vendor.
#[derive(Debug)]
pub enum Protocol<P> {
    Tapo(TapoClient),
    Broadlink(BroadlinkClient),
    Miio(MiioDevice),
    Mqtt(MqttDevice<Arc<P>>),
    Http(HttpDevice),
}

/// A protocol client together with the class of device it drives.
#[derive(Debug)]
pub struct VendorClient<P> {
    class: DeviceClass,
    protocol: Protocol<P>,
}

impl<P: Publisher> VendorClient<P> {
    #[must_use]
    pub fn new(class: DeviceClass, protocol: Protocol<P>) -> Self {
        Self { class, protocol }
    }

    #[must_use]
    pub fn protocol(&self) -> &Protocol<P> {
        &self.protocol
    }

    #[must_use]
    pub fn vendor(&self) -> Vendor {
        match self.protocol {
            Protocol::Tapo(_) => Vendor::Tapo,
            Protocol::Broadlink(_) => Vendor::Broadlink,
            Protocol::Miio(_) => Vendor::Xiaomi,
            Protocol::Mqtt(_) => Vendor::Mqtt,
            Protocol::Http(_) => Vendor::Http,
        }
    }

    fn unsupported(&self, operation: &str) -> HubError {
        HubError::Unsupported(format!(
            "{} {} devices do not support {operation}",
            self.vendor(),
            self.class
        ))
    }
}

impl<P: Publisher> DeviceClient for VendorClient<P> {
    fn supports(&self, capability: Capability) -> bool {
        let light = self.class == DeviceClass::Light;
        match (&self.protocol, capability) {
            (Protocol::Miio(device), capability) => device.supports(capability),
            (Protocol::Broadlink(_), Capability::Ir)
            | (Protocol::Tapo(_) | Protocol::Mqtt(_) | Protocol::Http(_), Capability::Switch) => {
                true
            }
            (Protocol::Tapo(_) | Protocol::Http(_), Capability::Dimmer) => light,
            (Protocol::Mqtt(device), Capability::Dimmer) => light && device.flavor().dimmable(),
            _ => false,
        }
    }
}

impl<P: Publisher> Switchable for VendorClient<P> {
    async fn turn_on(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Tapo(client) => client.turn_on().await,
            Protocol::Miio(device) => device.turn_on().await,
            Protocol::Mqtt(device) => device.turn_on().await,
            Protocol::Http(device) => device.turn_on().await,
            Protocol::Broadlink(_) => Err(self.unsupported("turn_on")),
        }
    }

    async fn turn_off(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Tapo(client) => client.turn_off().await,
            Protocol::Miio(device) => device.turn_off().await,
            Protocol::Mqtt(device) => device.turn_off().await,
            Protocol::Http(device) => device.turn_off().await,
            Protocol::Broadlink(_) => Err(self.unsupported("turn_off")),
        }
    }

    async fn toggle(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Tapo(client) => client.toggle().await,
            Protocol::Miio(device) => device.toggle().await,
            Protocol::Mqtt(device) => device.toggle().await,
            Protocol::Http(device) => device.toggle().await,
            Protocol::Broadlink(_) => Err(self.unsupported("toggle")),
        }
    }
}

impl<P: Publisher> Dimmable for VendorClient<P> {
    async fn set_brightness(&self, level: i64) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Tapo(client) => client.set_brightness(level).await,
            Protocol::Miio(device) => device.set_brightness(level).await,
            Protocol::Mqtt(device) => device.set_brightness(level).await,
            Protocol::Http(device) => device.set_brightness(level).await,
            Protocol::Broadlink(_) => Err(self.unsupported("brightness")),
        }
    }

    async fn set_color(&self, color: Color) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Tapo(client) => client.set_color(color).await,
            Protocol::Miio(device) => device.set_color(color).await,
            Protocol::Mqtt(device) => device.set_color(color).await,
            Protocol::Http(device) => device.set_color(color).await,
            Protocol::Broadlink(_) => Err(self.unsupported("color")),
        }
    }

    async fn set_color_temp(&self, kelvin: i64) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Tapo(client) => client.set_color_temp(kelvin).await,
            Protocol::Miio(device) => device.set_color_temp(kelvin).await,
            Protocol::Mqtt(device) => device.set_color_temp(kelvin).await,
            Protocol::Http(device) => device.set_color_temp(kelvin).await,
            Protocol::Broadlink(_) => Err(self.unsupported("color_temp")),
        }
    }
}

impl<P: Publisher> IrControllable for VendorClient<P> {
    async fn send_ir(&self, code: &str) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Broadlink(client) => IrControllable::send_ir(client, code).await,
            _ => Err(self.unsupported("IR send")),
        }
    }

    async fn learn_ir(&self, timeout: Duration) -> Result<String, HubError> {
        match &self.protocol {
            Protocol::Broadlink(client) => IrControllable::learn_ir(client, timeout).await,
            _ => Err(self.unsupported("IR learning")),
        }
    }
}

impl<P: Publisher> VacuumControllable for VendorClient<P> {
    async fn start(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.start().await,
            _ => Err(self.unsupported("start")),
        }
    }

    async fn stop(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.stop().await,
            _ => Err(self.unsupported("stop")),
        }
    }

    async fn pause(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.pause().await,
            _ => Err(self.unsupported("pause")),
        }
    }

    async fn home(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.home().await,
            _ => Err(self.unsupported("home")),
        }
    }

    async fn spot(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.spot().await,
            _ => Err(self.unsupported("spot")),
        }
    }

    async fn set_fan_speed(&self, speed: i64) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.set_fan_speed(speed).await,
            _ => Err(self.unsupported("fan_speed")),
        }
    }

    async fn find_me(&self) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.find_me().await,
            _ => Err(self.unsupported("find_me")),
        }
    }
}

impl<P: Publisher> PurifierControllable for VendorClient<P> {
    async fn set_mode(&self, mode: &str) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.set_mode(mode).await,
            _ => Err(self.unsupported("mode")),
        }
    }

    async fn set_favorite_level(&self, level: i64) -> Result<(), HubError> {
        match &self.protocol {
            Protocol::Miio(device) => device.set_favorite_level(level).await,
            _ => Err(self.unsupported("favorite_level")),
        }
    }
}
