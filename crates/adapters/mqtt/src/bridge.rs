//! Broker connection.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;

use crate::config::MqttConfig;
use crate::error::MqttError;

/// Where device payloads go. Implemented by [`MqttBridge`] and by test
/// doubles.
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        topic: String,
        payload: String,
    ) -> impl Future<Output = Result<(), MqttError>> + Send;
}

impl<T: Publisher> Publisher for std::sync::Arc<T> {
    fn publish(
        &self,
        topic: String,
        payload: String,
    ) -> impl Future<Output = Result<(), MqttError>> + Send {
        (**self).publish(topic, payload)
    }
}

/// A broker client. The event loop runs on its own task and tracks whether
/// the broker has accepted the connection.
#[derive(Clone)]
pub struct MqttBridge {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    publish_timeout: Duration,
}

impl MqttBridge {
    /// Create the client and spawn the task that drives its event loop.
    ///
    /// Connection happens in the background. Until the broker acknowledges
    /// the connection, and whenever it drops, [`publish`](Publisher::publish)
    /// fails with [`MqttError::NotConnected`] instead of queueing. The loop
    /// keeps reconnecting until [`disconnect`](Self::disconnect) is called.
    #[must_use]
    pub fn spawn(config: &MqttConfig) -> (Self, JoinHandle<()>) {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(config.keep_alive());
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let broker = format!("{}:{}", config.broker_host, config.broker_port);
        let connected = Arc::new(AtomicBool::new(false));

        let state = Arc::clone(&connected);
        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        state.store(true, Ordering::Release);
                        tracing::info!(%broker, "connected to MQTT broker");
                    }
                    Ok(Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                        state.store(false, Ordering::Release);
                        tracing::info!(%broker, "disconnected from MQTT broker");
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        state.store(false, Ordering::Release);
                        tracing::warn!(%broker, error = %err, "MQTT connection error, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        let bridge = Self {
            client,
            connected,
            publish_timeout: config.publish_timeout(),
        };
        (bridge, handle)
    }

    /// Ask the event loop to close the connection and stop.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Client`] if the request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        self.client.disconnect().await.map_err(MqttError::Client)
    }

    /// Whether the broker currently holds an accepted connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Publisher for MqttBridge {
    async fn publish(&self, topic: String, payload: String) -> Result<(), MqttError> {
        if !self.is_connected() {
            return Err(MqttError::NotConnected);
        }
        tracing::debug!(%topic, %payload, "publishing");
        tokio::time::timeout(
            self.publish_timeout,
            self.client.publish(topic, QoS::AtLeastOnce, false, payload),
        )
        .await
        .map_err(|_| MqttError::Timeout(self.publish_timeout))?
        .map_err(MqttError::Client)
    }
}
