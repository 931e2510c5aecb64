//! MQTT adapter error types.

use std::time::Duration;

use hearth_domain::error::{HubError, ParameterError};

use crate::device::Flavor;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// No bridge is running, or the broker connection is down.
    #[error("not connected to MQTT broker")]
    NotConnected,

    /// The outgoing queue stayed full past the publish deadline.
    #[error("MQTT publish timed out after {0:?}")]
    Timeout(Duration),

    /// The rumqttc client refused the request.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to serialize an outgoing JSON payload.
    #[error("failed to encode MQTT payload")]
    Payload(#[source] serde_json::Error),

    /// The device `model` names no known firmware convention.
    #[error("unknown MQTT device model {0:?}")]
    UnknownModel(String),

    /// The firmware convention has no topic for this operation.
    #[error("{flavor} devices do not support {operation}")]
    Unsupported {
        flavor: Flavor,
        operation: &'static str,
    },

    /// A value was rejected before publishing.
    #[error("invalid parameter")]
    Parameter(#[from] ParameterError),
}

impl MqttError {
    /// Convert into the matching [`HubError`] category.
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Parameter(err) => HubError::InvalidParameter(err),
            Self::Unsupported { .. } | Self::UnknownModel(_) => {
                HubError::Unsupported(self.to_string())
            }
            other => HubError::ProtocolTransport(Box::new(other)),
        }
    }
}

impl From<MqttError> for HubError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
