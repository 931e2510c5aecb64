//! In-memory fakes shared by the unit tests of this crate.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hearth_domain::command::Color;
use hearth_domain::device::{DeviceClass, DeviceRecord, Vendor};
use hearth_domain::error::{HubError, ValidationError};
use hearth_domain::id::DeviceId;

use crate::ports::{
    Capability, DeviceClient, DeviceConnector, Dimmable, IrControllable, PurifierControllable,
    Switchable, VacuumControllable,
};

pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
pub(crate) struct FakeConnector {
    pub connects: Arc<Mutex<usize>>,
    pub calls: CallLog,
    pub fail_for: HashSet<DeviceId>,
    pub offline: HashSet<DeviceId>,
}

impl FakeConnector {
    pub fn failing_for(id: &str) -> Self {
        Self {
            fail_for: HashSet::from([DeviceId::new(id)]),
            ..Self::default()
        }
    }

    pub fn offline(id: &str) -> Self {
        Self {
            offline: HashSet::from([DeviceId::new(id)]),
            ..Self::default()
        }
    }
}

impl DeviceConnector for FakeConnector {
    type Client = FakeClient;

    fn connect(&self, record: &DeviceRecord) -> Result<FakeClient, HubError> {
        *self.connects.lock().unwrap() += 1;
        if self.fail_for.contains(&record.id) {
            return Err(ValidationError::InvalidToken.into());
        }
        let capabilities = match record.class {
            DeviceClass::Light => vec![Capability::Switch, Capability::Dimmer],
            DeviceClass::Switch => vec![Capability::Switch],
            DeviceClass::Ir => vec![Capability::Ir],
            DeviceClass::Vacuum => vec![Capability::Vacuum],
            DeviceClass::Purifier => vec![Capability::Switch, Capability::Purifier],
        };
        Ok(FakeClient {
            device: record.id.clone(),
            capabilities,
            calls: Arc::clone(&self.calls),
            offline: self.offline.contains(&record.id),
        })
    }
}

pub(crate) struct FakeClient {
    device: DeviceId,
    capabilities: Vec<Capability>,
    calls: CallLog,
    offline: bool,
}

impl FakeClient {
    fn record(&self, call: String) -> impl Future<Output = Result<(), HubError>> + Send + use<> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{call}", self.device));
        let offline = self.offline;
        async move {
            if offline {
                Err(HubError::ProtocolTransport("device unreachable".into()))
            } else {
                Ok(())
            }
        }
    }
}

impl Switchable for FakeClient {
    fn turn_on(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("on".to_string())
    }

    fn turn_off(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("off".to_string())
    }

    fn toggle(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("toggle".to_string())
    }
}

impl Dimmable for FakeClient {
    fn set_brightness(&self, level: i64) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record(format!("brightness={level}"))
    }

    fn set_color(&self, color: Color) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record(format!("color={color:?}"))
    }

    fn set_color_temp(&self, kelvin: i64) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record(format!("color_temp={kelvin}"))
    }
}

impl IrControllable for FakeClient {
    fn send_ir(&self, hex: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record(format!("ir={hex}"))
    }

    fn learn_ir(
        &self,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, HubError>> + Send {
        let sent = self.record(format!("learn={}", timeout.as_secs()));
        async move { sent.await.map(|()| "26001200".to_string()) }
    }
}

impl VacuumControllable for FakeClient {
    fn start(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("start".to_string())
    }

    fn stop(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("stop".to_string())
    }

    fn pause(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("pause".to_string())
    }

    fn home(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("home".to_string())
    }

    fn spot(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("spot".to_string())
    }

    fn set_fan_speed(&self, speed: i64) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record(format!("fan_speed={speed}"))
    }

    fn find_me(&self) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record("find_me".to_string())
    }
}

impl PurifierControllable for FakeClient {
    fn set_mode(&self, mode: &str) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record(format!("mode={mode}"))
    }

    fn set_favorite_level(&self, level: i64) -> impl Future<Output = Result<(), HubError>> + Send {
        self.record(format!("favorite_level={level}"))
    }
}

impl DeviceClient for FakeClient {
    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

pub(crate) fn light_record(id: &str) -> DeviceRecord {
    DeviceRecord::builder()
        .id(id)
        .vendor(Vendor::Tapo)
        .class(DeviceClass::Light)
        .address("192.168.1.20")
        .build()
        .unwrap()
}

pub(crate) fn switch_record(id: &str) -> DeviceRecord {
    DeviceRecord::builder()
        .id(id)
        .vendor(Vendor::Mqtt)
        .class(DeviceClass::Switch)
        .topic(format!("shellies/{id}"))
        .build()
        .unwrap()
}

pub(crate) fn ir_record(id: &str, commands: &[(&str, &str)]) -> DeviceRecord {
    commands
        .iter()
        .fold(
            DeviceRecord::builder()
                .id(id)
                .vendor(Vendor::Broadlink)
                .address("192.168.1.30"),
            |builder, (key, hex)| builder.command(*key, *hex),
        )
        .build()
        .unwrap()
}

pub(crate) fn vacuum_record(id: &str) -> DeviceRecord {
    DeviceRecord::builder()
        .id(id)
        .vendor(Vendor::Xiaomi)
        .class(DeviceClass::Vacuum)
        .address("192.168.1.40")
        .token("00112233445566778899aabbccddeeff")
        .build()
        .unwrap()
}

pub(crate) fn purifier_record(id: &str) -> DeviceRecord {
    DeviceRecord::builder()
        .id(id)
        .vendor(Vendor::Xiaomi)
        .class(DeviceClass::Purifier)
        .address("192.168.1.41")
        .token("00112233445566778899aabbccddeeff")
        .build()
        .unwrap()
}
