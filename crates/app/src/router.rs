//! Command router — maps `<domain>.<verb>` onto a capability call.
//!
//! Every local decision (action shape, device lookup, value type, IR table
//! lookup) is made before any client method is invoked, so a rejected
//! command never reaches the network.

use std::time::Duration;

use hearth_domain::command::{Action, Command, CommandValue, Domain};
use hearth_domain::device::DeviceClass;
use hearth_domain::error::HubError;
use hearth_domain::id::DeviceId;

use crate::ports::{Capability, DeviceClient, DeviceConnector, IrControllable};
use crate::registry::{DeviceRegistry, ResolvedDevice};

/// Dispatches commands to the devices held by a [`DeviceRegistry`].
pub struct CommandRouter<C: DeviceConnector> {
    registry: DeviceRegistry<C>,
}

impl<C: DeviceConnector> CommandRouter<C> {
    #[must_use]
    pub fn new(registry: DeviceRegistry<C>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry<C> {
        &self.registry
    }

    /// Execute a command against its target device.
    ///
    /// # Errors
    ///
    /// - [`HubError::InvalidAction`] / [`HubError::UnknownDeviceType`] for a
    ///   malformed action
    /// - [`HubError::DeviceNotFound`] when no device of the domain's class has
    ///   this id
    /// - [`HubError::UnknownAction`], [`HubError::InvalidParameter`],
    ///   [`HubError::IrCodeNotFound`] or [`HubError::Unsupported`] for local
    ///   rejections
    /// - any protocol error raised by the device client
    #[tracing::instrument(skip(self, command), fields(action = command.action(), device = %command.device()))]
    pub async fn execute(&self, command: &Command) -> Result<(), HubError> {
        let action = Action::parse(command.action())?;
        let device = self.lookup(command.device(), action.domain.device_class())?;
        let verb = action.verb.as_str();
        let value = command.value();

        match action.domain {
            Domain::Light => light(&device, verb, value).await,
            Domain::Switch => switch(&device, verb).await,
            Domain::Ac => ac(&device, verb, value).await,
            Domain::Tv => tv(&device, verb).await,
            Domain::Vacuum => vacuum(&device, verb, value).await,
            Domain::Purifier => purifier(&device, verb, value).await,
        }
    }

    /// Put an IR device into learning mode and return the captured code.
    ///
    /// Administrative path: not subject to the security gate.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::DeviceNotFound`] when no IR device has this id, or
    /// the client's protocol error (a timeout is a transport error).
    #[tracing::instrument(skip(self))]
    pub async fn learn_ir(&self, id: &DeviceId, timeout: Duration) -> Result<String, HubError> {
        let device = self.lookup(id, DeviceClass::Ir)?;
        require(&device, Capability::Ir)?;
        device.client.learn_ir(timeout).await
    }

    fn lookup(
        &self,
        id: &DeviceId,
        class: DeviceClass,
    ) -> Result<ResolvedDevice<'_, C::Client>, HubError> {
        match self.registry.record(id) {
            Some(record) if record.class == class => {}
            _ => return Err(HubError::DeviceNotFound(id.clone())),
        }
        self.registry
            .resolve(id)?
            .ok_or_else(|| HubError::DeviceNotFound(id.clone()))
    }
}

fn require<T: DeviceClient>(
    device: &ResolvedDevice<'_, T>,
    capability: Capability,
) -> Result<(), HubError> {
    if device.client.supports(capability) {
        Ok(())
    } else {
        Err(HubError::Unsupported(format!(
            "{} ({}) has no {capability} capability",
            device.record.id, device.record.vendor
        )))
    }
}

fn unknown(domain: Domain, verb: &str) -> HubError {
    HubError::UnknownAction {
        domain,
        verb: verb.to_string(),
    }
}

async fn light<T: DeviceClient>(
    device: &ResolvedDevice<'_, T>,
    verb: &str,
    value: &CommandValue,
) -> Result<(), HubError> {
    let client = &device.client;
    match verb {
        "on" => {
            require(device, Capability::Switch)?;
            client.turn_on().await
        }
        "off" => {
            require(device, Capability::Switch)?;
            client.turn_off().await
        }
        "brightness" => {
            let level = value.as_integer("brightness")?;
            require(device, Capability::Dimmer)?;
            client.set_brightness(level).await
        }
        "color" => {
            let color = value.as_color("color")?;
            require(device, Capability::Dimmer)?;
            client.set_color(color).await
        }
        "color_temp" => {
            let kelvin = value.as_integer("color_temp")?;
            require(device, Capability::Dimmer)?;
            client.set_color_temp(kelvin).await
        }
        other => Err(unknown(Domain::Light, other)),
    }
}

async fn switch<T: DeviceClient>(device: &ResolvedDevice<'_, T>, verb: &str) -> Result<(), HubError> {
    let client = &device.client;
    match verb {
        "on" | "off" | "toggle" => require(device, Capability::Switch)?,
        other => return Err(unknown(Domain::Switch, other)),
    }
    match verb {
        "on" => client.turn_on().await,
        "off" => client.turn_off().await,
        _ => client.toggle().await,
    }
}

async fn ac<T: DeviceClient>(
    device: &ResolvedDevice<'_, T>,
    verb: &str,
    value: &CommandValue,
) -> Result<(), HubError> {
    let key = if verb == "set_temp" {
        format!("temp_{}", value.as_integer("temperature")?)
    } else {
        verb.to_string()
    };
    send_ir_key(device, &key).await
}

async fn tv<T: DeviceClient>(device: &ResolvedDevice<'_, T>, verb: &str) -> Result<(), HubError> {
    send_ir_key(device, verb).await
}

async fn send_ir_key<T: DeviceClient>(
    device: &ResolvedDevice<'_, T>,
    key: &str,
) -> Result<(), HubError> {
    let code = device
        .record
        .ir_code(key)
        .ok_or_else(|| HubError::IrCodeNotFound {
            device: device.record.id.clone(),
            key: key.to_string(),
        })?;
    require(device, Capability::Ir)?;
    device.client.send_ir(code).await
}

async fn vacuum<T: DeviceClient>(
    device: &ResolvedDevice<'_, T>,
    verb: &str,
    value: &CommandValue,
) -> Result<(), HubError> {
    let client = &device.client;
    let speed = match verb {
        "fan_speed" => Some(value.as_integer("fan_speed")?),
        "start" | "stop" | "pause" | "home" | "spot" | "find_me" => None,
        other => return Err(unknown(Domain::Vacuum, other)),
    };
    require(device, Capability::Vacuum)?;
    match (verb, speed) {
        ("start", _) => client.start().await,
        ("stop", _) => client.stop().await,
        ("pause", _) => client.pause().await,
        ("home", _) => client.home().await,
        ("spot", _) => client.spot().await,
        ("find_me", _) => client.find_me().await,
        (_, Some(speed)) => client.set_fan_speed(speed).await,
        (other, None) => Err(unknown(Domain::Vacuum, other)),
    }
}

async fn purifier<T: DeviceClient>(
    device: &ResolvedDevice<'_, T>,
    verb: &str,
    value: &CommandValue,
) -> Result<(), HubError> {
    let client = &device.client;
    match verb {
        "on" => {
            require(device, Capability::Switch)?;
            client.turn_on().await
        }
        "off" => {
            require(device, Capability::Switch)?;
            client.turn_off().await
        }
        "mode" => {
            let mode = value.as_text("mode")?;
            require(device, Capability::Purifier)?;
            client.set_mode(mode).await
        }
        "favorite_level" => {
            let level = value.as_integer("favorite_level")?;
            require(device, Capability::Purifier)?;
            client.set_favorite_level(level).await
        }
        other => Err(unknown(Domain::Purifier, other)),
    }
}
