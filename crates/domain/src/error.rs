//! Common error types used across the workspace.
//!
//! [`HubError`] is the single error surfaced to command producers. Each layer
//! defines its own typed errors and converts into it via `#[from]` or an
//! explicit `into_domain()` on the adapter error.

use std::fmt;

use crate::command::Domain;
use crate::device::{DeviceClass, Vendor};
use crate::id::DeviceId;

/// Boxed source error carried by protocol failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error for validating, routing and executing a command.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The action does not decompose into exactly `<domain>.<verb>`.
    #[error("invalid action format: {0:?}")]
    InvalidAction(String),

    /// The first action token names no known domain dispatcher.
    #[error("unknown device type: {0}")]
    UnknownDeviceType(String),

    /// The verb is not known within its domain.
    #[error("unknown {domain} action: {verb}")]
    UnknownAction { domain: Domain, verb: String },

    /// No device with this id is configured for the dispatching domain.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// The command value is missing, mistyped, or out of range.
    #[error("invalid parameter")]
    InvalidParameter(#[from] ParameterError),

    /// The IR command table of the device has no entry for the key.
    #[error("IR code not found for {key:?} on {device}")]
    IrCodeNotFound { device: DeviceId, key: String },

    /// The sliding-window rate limiter denied admission.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// The action is absent from the allow-list.
    #[error("command not allowed: {0}")]
    CommandNotAllowed(String),

    /// The device lacks the requested capability or operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A device record failed validation.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// Handshake, login, or authentication with the device failed.
    #[error("protocol authentication failed")]
    ProtocolAuth(#[source] BoxError),

    /// Timeout, unreachable host, or malformed/undersized reply.
    #[error("protocol transport failed")]
    ProtocolTransport(#[source] BoxError),

    /// The device answered with a vendor error.
    #[error("device error")]
    ProtocolDevice(#[source] DeviceFault),
}

impl HubError {
    /// Whether this failure was decided locally, without any network call.
    #[must_use]
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            Self::ProtocolAuth(_) | Self::ProtocolTransport(_) | Self::ProtocolDevice(_)
        )
    }

    /// Render the error together with its full source chain.
    #[must_use]
    pub fn chain(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            text.push_str(": ");
            text.push_str(&err.to_string());
            source = err.source();
        }
        text
    }
}

/// Why a command value was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("{field} expects {expected}, got {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{field} must be a whole number, got {value}")]
    NotAnInteger { field: &'static str, value: f64 },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ParameterError {
    /// Check that `value` lies in `min..=max`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::OutOfRange`] otherwise.
    pub fn check_range(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64, Self> {
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(Self::OutOfRange {
                field,
                min,
                max,
                value,
            })
        }
    }
}

/// Device record validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device id must not be empty")]
    EmptyId,

    #[error("name must not be empty")]
    EmptyName,

    #[error("device vendor must be set")]
    MissingVendor,

    #[error("{vendor} devices need an address")]
    MissingAddress { vendor: Vendor },

    #[error("MQTT devices need a topic")]
    MissingTopic,

    #[error("Xiaomi devices need a token")]
    MissingToken,

    #[error("HTTP devices need http settings")]
    MissingHttpSettings,

    #[error("token must be 32 hex characters")]
    InvalidToken,

    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("invalid HTTP method {0:?}")]
    InvalidHttpMethod(String),

    #[error("{vendor} does not support {class} devices")]
    UnsupportedClass { vendor: Vendor, class: DeviceClass },
}

/// A vendor-reported failure: nonzero error code or non-null `error` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFault {
    pub vendor: Vendor,
    pub code: Option<i64>,
    pub message: String,
}

impl DeviceFault {
    #[must_use]
    pub fn new(vendor: Vendor, code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            vendor,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} error code {code}: {}", self.vendor, self.message),
            None => write!(f, "{} error: {}", self.vendor, self.message),
        }
    }
}

impl std::error::Error for DeviceFault {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_accept_value_inside_range() {
        assert_eq!(ParameterError::check_range("brightness", 50, 1, 100), Ok(50));
        assert_eq!(ParameterError::check_range("brightness", 1, 1, 100), Ok(1));
        assert_eq!(ParameterError::check_range("brightness", 100, 1, 100), Ok(100));
    }

    #[test]
    fn should_reject_value_outside_range() {
        let err = ParameterError::check_range("brightness", 0, 1, 100).unwrap_err();
        assert_eq!(err.to_string(), "brightness must be between 1 and 100, got 0");
    }

    #[test]
    fn should_render_source_chain() {
        let err = HubError::ProtocolDevice(DeviceFault::new(Vendor::Tapo, Some(-1008), "rejected"));
        assert_eq!(
            err.chain(),
            "device error: tapo error code -1008: rejected"
        );
    }

    #[test]
    fn should_render_chain_for_parameter_errors() {
        let err: HubError = ParameterError::OutOfRange {
            field: "temperature",
            min: 16,
            max: 30,
            value: 40,
        }
        .into();
        assert_eq!(
            err.chain(),
            "invalid parameter: temperature must be between 16 and 30, got 40"
        );
    }

    #[test]
    fn should_classify_protocol_errors_as_remote() {
        assert!(HubError::RateLimitExceeded.is_local());
        assert!(HubError::InvalidAction("x".to_string()).is_local());
        assert!(!HubError::ProtocolTransport("timeout".into()).is_local());
    }

    #[test]
    fn should_display_fault_without_code() {
        let fault = DeviceFault::new(Vendor::Xiaomi, None, "unknown method");
        assert_eq!(fault.to_string(), "xiaomi error: unknown method");
    }
}
