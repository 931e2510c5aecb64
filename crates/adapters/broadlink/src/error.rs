//! Broadlink adapter error types.

use hearth_domain::device::Vendor;
use hearth_domain::error::{DeviceFault, HubError, ParameterError, ValidationError};

/// Errors specific to the Broadlink adapter.
#[derive(Debug, thiserror::Error)]
pub enum BroadlinkError {
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),

    #[error("UDP socket error")]
    Io(#[from] std::io::Error),

    #[error("no reply within {0:?}")]
    Timeout(std::time::Duration),

    #[error("reply of {len} bytes is shorter than {min}")]
    ShortReply { len: usize, min: usize },

    #[error("encrypted payload of {0} bytes is not block aligned")]
    Misaligned(usize),

    #[error("command {command:#04x} failed with error code {code}")]
    Device { command: u16, code: i16 },

    #[error("authentication failed")]
    Auth(#[source] Box<BroadlinkError>),

    #[error("no IR code captured within {0:?}")]
    LearnTimeout(std::time::Duration),

    #[error("IR code is not valid hex")]
    InvalidCode(#[source] hex::FromHexError),
}

impl BroadlinkError {
    /// Convert into the matching [`HubError`] category.
    pub fn into_domain(self) -> HubError {
        match self {
            Self::InvalidAddress(address) => ValidationError::InvalidAddress(address).into(),
            Self::InvalidCode(err) => HubError::InvalidParameter(ParameterError::Invalid {
                field: "ir code",
                reason: err.to_string(),
            }),
            Self::Auth(_) => HubError::ProtocolAuth(Box::new(self)),
            Self::Device { command, code } => HubError::ProtocolDevice(DeviceFault::new(
                Vendor::Broadlink,
                Some(i64::from(code)),
                format!("command {command:#04x}"),
            )),
            other => HubError::ProtocolTransport(Box::new(other)),
        }
    }
}

impl From<BroadlinkError> for HubError {
    fn from(err: BroadlinkError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn should_map_timeout_to_transport_error() {
        let err: HubError = BroadlinkError::Timeout(Duration::from_secs(5)).into();
        assert!(matches!(err, HubError::ProtocolTransport(_)));
        assert_eq!(err.chain(), "protocol transport failed: no reply within 5s");
    }

    #[test]
    fn should_map_device_code_to_device_fault() {
        let err: HubError = BroadlinkError::Device {
            command: 0x6a,
            code: -7,
        }
        .into();
        assert!(matches!(&err, HubError::ProtocolDevice(fault) if fault.code == Some(-7)));
        assert_eq!(err.chain(), "device error: broadlink error code -7: command 0x6a");
    }

    #[test]
    fn should_map_auth_failure_to_auth_error() {
        let err: HubError = BroadlinkError::Auth(Box::new(BroadlinkError::Device {
            command: 0x65,
            code: -1,
        }))
        .into();
        assert!(matches!(err, HubError::ProtocolAuth(_)));
    }

    #[test]
    fn should_map_bad_hex_to_invalid_parameter() {
        let err: HubError = BroadlinkError::InvalidCode(hex::FromHexError::OddLength).into();
        assert!(matches!(
            err,
            HubError::InvalidParameter(ParameterError::Invalid { field: "ir code", .. })
        ));
    }
}
