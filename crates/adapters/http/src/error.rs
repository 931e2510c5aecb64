//! HTTP device error types.

use hearth_domain::device::Vendor;
use hearth_domain::error::{DeviceFault, HubError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum HttpDeviceError {
    /// The request could not be sent or the response not read.
    #[error("HTTP request failed")]
    Request(#[source] reqwest::Error),

    /// The device answered with a non-2xx status.
    #[error("HTTP status {status}")]
    Status { status: u16, body: String },

    /// No request template is configured for the verb.
    #[error("no HTTP action configured for {0:?}")]
    Unmapped(String),

    #[error("invalid base URL {0:?}")]
    InvalidUrl(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidMethod(String),

    #[error("failed to encode request body")]
    Body(#[source] serde_json::Error),
}

impl HttpDeviceError {
    /// Convert into the matching [`HubError`] category.
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Status { status, body } => HubError::ProtocolDevice(DeviceFault::new(
                Vendor::Http,
                Some(i64::from(status)),
                body,
            )),
            Self::Unmapped(_) => HubError::Unsupported(self.to_string()),
            Self::InvalidUrl(url) => ValidationError::InvalidAddress(url).into(),
            Self::InvalidMethod(method) => ValidationError::InvalidHttpMethod(method).into(),
            other => HubError::ProtocolTransport(Box::new(other)),
        }
    }
}

impl From<HttpDeviceError> for HubError {
    fn from(err: HttpDeviceError) -> Self {
        err.into_domain()
    }
}
