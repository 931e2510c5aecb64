//! Tapo adapter error types.

use hearth_domain::device::Vendor;
use hearth_domain::error::{DeviceFault, HubError, ParameterError};

/// The device expired or rejected the session.
const SESSION_EXPIRED: i64 = 9999;
/// Request made with a token the device no longer recognizes.
const SESSION_INVALID: i64 = -1501;

/// Errors specific to the Tapo adapter.
#[derive(Debug, thiserror::Error)]
pub enum TapoError {
    #[error("HTTP request failed")]
    Http(#[source] reqwest::Error),

    #[error("malformed Tapo reply")]
    Json(#[source] serde_json::Error),

    #[error("Tapo reply is missing {0:?}")]
    MissingField(&'static str),

    #[error("cipher error: {0}")]
    Cipher(&'static str),

    #[error("failed to generate handshake key pair")]
    KeyGeneration(#[source] rsa::Error),

    #[error("failed to encode handshake key")]
    KeyEncoding(#[source] rsa::pkcs8::spki::Error),

    #[error("handshake failed")]
    Handshake(#[source] Box<TapoError>),

    #[error("login failed")]
    Login(#[source] Box<TapoError>),

    #[error("no session, handshake first")]
    NoSession,

    #[error("{method} returned error code {code}")]
    ErrorCode { method: String, code: i64 },

    #[error("invalid parameter")]
    Parameter(#[from] ParameterError),
}

impl TapoError {
    /// Whether the cached session must be dropped after this failure.
    #[must_use]
    pub fn invalidates_session(&self) -> bool {
        match self {
            Self::ErrorCode { code, .. } => matches!(*code, SESSION_EXPIRED | SESSION_INVALID),
            Self::Handshake(_) | Self::Login(_) | Self::NoSession => true,
            _ => false,
        }
    }

    /// Whether the request never got a well-formed answer, including during
    /// the handshake or login.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http(_) | Self::Json(_) => true,
            Self::Handshake(inner) | Self::Login(inner) => inner.is_transport(),
            _ => false,
        }
    }

    /// Convert into the matching [`HubError`] category.
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Parameter(err) => HubError::InvalidParameter(err),
            err if err.is_transport() => HubError::ProtocolTransport(Box::new(err)),
            err if err.invalidates_session() => HubError::ProtocolAuth(Box::new(err)),
            Self::KeyGeneration(_) | Self::KeyEncoding(_) => HubError::ProtocolAuth(Box::new(self)),
            Self::ErrorCode { method, code } => HubError::ProtocolDevice(DeviceFault::new(
                Vendor::Tapo,
                Some(code),
                method,
            )),
            other => HubError::ProtocolTransport(Box::new(other)),
        }
    }
}

impl From<TapoError> for HubError {
    fn from(err: TapoError) -> Self {
        err.into_domain()
    }
}
