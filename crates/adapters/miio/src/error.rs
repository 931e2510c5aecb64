//! Miio adapter error types.

use hearth_domain::device::Vendor;
use hearth_domain::error::{DeviceFault, HubError, ParameterError, ValidationError};

use crate::device::MiioKind;

/// Errors specific to the miio adapter.
#[derive(Debug, thiserror::Error)]
pub enum MiioError {
    #[error("token must be 32 hex characters")]
    InvalidToken,

    #[error("invalid device address {0:?}")]
    InvalidAddress(String),

    #[error("UDP socket error")]
    Io(#[from] std::io::Error),

    #[error("no reply within {0:?}")]
    Timeout(std::time::Duration),

    #[error("reply of {0} bytes is not a miio packet")]
    Malformed(usize),

    #[error("reply checksum does not match the token")]
    Checksum,

    #[error("reply does not decrypt under the token")]
    Cipher,

    #[error("reply is not valid JSON")]
    Json(#[source] serde_json::Error),

    #[error("reply answers request {got}, expected {expected}")]
    UnexpectedId { expected: u32, got: u64 },

    #[error("{method} failed: {message}")]
    Device {
        method: String,
        code: Option<i64>,
        message: String,
    },

    #[error("{kind} devices do not support {operation}")]
    Unsupported {
        kind: MiioKind,
        operation: &'static str,
    },

    #[error("invalid parameter")]
    Parameter(#[from] ParameterError),
}

impl MiioError {
    /// Convert into the matching [`HubError`] category.
    pub fn into_domain(self) -> HubError {
        match self {
            Self::InvalidToken => ValidationError::InvalidToken.into(),
            Self::InvalidAddress(address) => ValidationError::InvalidAddress(address).into(),
            Self::Parameter(err) => HubError::InvalidParameter(err),
            Self::Unsupported { .. } => HubError::Unsupported(self.to_string()),
            Self::Device {
                method,
                code,
                message,
            } => HubError::ProtocolDevice(DeviceFault::new(
                Vendor::Xiaomi,
                code,
                format!("{method}: {message}"),
            )),
            other => HubError::ProtocolTransport(Box::new(other)),
        }
    }
}

impl From<MiioError> for HubError {
    fn from(err: MiioError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_device_error_with_code() {
        let err: HubError = MiioError::Device {
            method: "app_start".into(),
            code: Some(-5001),
            message: "invalid arg".into(),
        }
        .into();
        assert_eq!(
            err.chain(),
            "device error: xiaomi error code -5001: app_start: invalid arg"
        );
    }

    #[test]
    fn should_map_checksum_mismatch_to_transport() {
        let err: HubError = MiioError::Checksum.into();
        assert!(matches!(err, HubError::ProtocolTransport(_)));
    }

    #[test]
    fn should_map_bad_token_to_validation() {
        let err: HubError = MiioError::InvalidToken.into();
        assert!(matches!(
            err,
            HubError::Validation(ValidationError::InvalidToken)
        ));
    }

    #[test]
    fn should_map_kind_mismatch_to_unsupported() {
        let err: HubError = MiioError::Unsupported {
            kind: MiioKind::Vacuum,
            operation: "set_bright",
        }
        .into();
        assert!(matches!(&err, HubError::Unsupported(text) if text == "vacuum devices do not support set_bright"));
    }
}
