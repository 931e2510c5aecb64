//! # hearthd — hearth daemon
//!
//! Composition root that wires the vendor connector, the security gate and
//! the MQTT bridge together, then executes commands read from stdin.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Install the tracing subscriber
//! - Start the MQTT bridge when enabled
//! - Construct the registry, router, gate and command service
//! - Read one command per line from stdin and report each outcome as JSON
//! - Handle graceful shutdown (end of input or Ctrl-C)
//!
//! ## Input
//! Each line is a command object such as
//! `{"action":"light.on","device":"lamp1"}`, possibly wrapped in prose.
//! Two administrative lines bypass the gate: `learn <device> [seconds]`
//! captures an IR code and `audit [limit]` prints recent audit entries.
//! Learning runs on its own task so commands keep flowing meanwhile; its
//! reply is printed when the capture ends.
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use hearth_adapter_mqtt::MqttBridge;
use hearth_app::registry::DeviceRegistry;
use hearth_app::router::CommandRouter;
use hearth_app::security::SecurityGate;
use hearth_app::services::CommandService;
use hearth_connector::VendorConnector;
use hearth_domain::command::Command;
use hearth_domain::id::DeviceId;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

type Service = CommandService<VendorConnector<MqttBridge>>;

const DEFAULT_LEARN_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .with_writer(std::io::stderr)
        .init();

    // MQTT
    let mut connector = VendorConnector::new(config.tapo.clone());
    let bridge = if config.mqtt.enabled {
        let (bridge, _task) = MqttBridge::spawn(&config.mqtt);
        let bridge = Arc::new(bridge);
        connector = connector.with_publisher(Arc::clone(&bridge));
        Some(bridge)
    } else {
        None
    };

    // Services
    let records = config.device_records()?;
    let registry = DeviceRegistry::new(connector, records);
    tracing::info!(devices = registry.len(), "device registry loaded");
    let service = Arc::new(CommandService::new(
        SecurityGate::new(&config.security),
        CommandRouter::new(registry),
    ));

    // Producer loop
    tracing::info!("hearthd ready, reading commands from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut learning = JoinSet::new();
    let interrupted = loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => handle_line(&service, &mut learning, line.trim()).await,
                None => break false,
            },
            Some(_) = learning.join_next(), if !learning.is_empty() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break true;
            }
        }
    };

    if interrupted {
        learning.abort_all();
    } else if !learning.is_empty() {
        tracing::info!(pending = learning.len(), "waiting for IR learning to finish");
    }
    while learning.join_next().await.is_some() {}

    if let Some(bridge) = bridge {
        if let Err(err) = bridge.disconnect().await {
            tracing::warn!(error = %err, "failed to disconnect from MQTT broker");
        }
    }
    tracing::info!("hearthd stopped");
    Ok(())
}

async fn handle_line(service: &Arc<Service>, learning: &mut JoinSet<()>, line: &str) {
    if line.is_empty() {
        return;
    }
    let mut words = line.split_whitespace();
    let reply = match words.next() {
        Some("learn") => {
            let device = words.next().map(str::to_string);
            let secs = words.next().map(str::to_string);
            let service = Arc::clone(service);
            learning.spawn(async move {
                let reply = learn(&service, device.as_deref(), secs.as_deref()).await;
                println!("{reply}");
            });
            return;
        }
        Some("audit") => {
            let limit = words.next().and_then(|n| n.parse().ok()).unwrap_or(0);
            json!({ "audit": service.audit_trail(limit) })
        }
        _ => submit(service, line).await,
    };
    println!("{reply}");
}

async fn submit(service: &Service, line: &str) -> serde_json::Value {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(err) => {
            tracing::warn!(error = %err, "discarding producer output");
            return json!({ "ok": false, "error": err.to_string() });
        }
    };
    match service.submit(&command).await {
        Ok(execution_id) => {
            json!({ "ok": true, "execution_id": execution_id.to_string() })
        }
        Err(err) => json!({ "ok": false, "error": err.chain() }),
    }
}

async fn learn(service: &Service, device: Option<&str>, secs: Option<&str>) -> serde_json::Value {
    let Some(device) = device else {
        return json!({ "ok": false, "error": "usage: learn <device> [seconds]" });
    };
    let secs = secs
        .and_then(|secs| secs.parse().ok())
        .unwrap_or(DEFAULT_LEARN_SECS);
    match service
        .router()
        .learn_ir(&DeviceId::new(device), Duration::from_secs(secs))
        .await
    {
        Ok(code) => json!({ "ok": true, "code": code }),
        Err(err) => json!({ "ok": false, "error": err.chain() }),
    }
}

#[cfg(test)]
mod tests {
    use hearth_adapter_broadlink::testing::FakeBroadlink;
    use hearth_adapter_tapo::TapoCredentials;
    use hearth_app::security::SecurityConfig;
    use hearth_domain::device::{DeviceRecord, Vendor};

    use super::*;

    fn service(address: String) -> Arc<Service> {
        let record = DeviceRecord::builder()
            .id("ac1")
            .vendor(Vendor::Broadlink)
            .address(address)
            .command("on", "26001a00")
            .build()
            .unwrap();
        let registry = DeviceRegistry::new(
            VendorConnector::new(TapoCredentials::default()),
            vec![record],
        );
        Arc::new(CommandService::new(
            SecurityGate::new(&SecurityConfig::default()),
            CommandRouter::new(registry),
        ))
    }

    #[tokio::test]
    async fn should_keep_executing_commands_while_learning() {
        let blaster = FakeBroadlink::start().await;
        let service = service(blaster.address());
        let mut learning = JoinSet::new();

        tokio::time::timeout(Duration::from_secs(3), async {
            handle_line(&service, &mut learning, "learn ac1 10").await;
            handle_line(&service, &mut learning, r#"{"action":"ac.on","device":"ac1"}"#).await;
        })
        .await
        .unwrap();

        assert_eq!(learning.len(), 1);
        assert_eq!(blaster.sent_codes(), vec!["26001a"]);
        assert!(service.audit_trail(0)[0].success);
        learning.abort_all();
    }
}
