//! Connector port — turns a configured device record into a live client.

use hearth_domain::device::DeviceRecord;
use hearth_domain::error::HubError;

use super::DeviceClient;

/// Builds protocol clients for device records.
///
/// Implemented once per deployment (see the `hearth-connector` crate); the
/// registry calls it at most once per device id and caches the result.
pub trait DeviceConnector: Send + Sync {
    type Client: DeviceClient;

    /// Construct a client without performing any network IO.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the record cannot back a client
    /// (bad token, unparsable address, missing transport).
    fn connect(&self, record: &DeviceRecord) -> Result<Self::Client, HubError>;
}
