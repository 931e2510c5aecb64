//! Device registry — configured records plus lazily built clients.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use hearth_domain::device::DeviceRecord;
use hearth_domain::error::HubError;
use hearth_domain::id::DeviceId;

use crate::ports::DeviceConnector;

/// A record together with its cached, session-backed client.
#[derive(Debug)]
pub struct ResolvedDevice<'a, T> {
    pub record: &'a DeviceRecord,
    pub client: Arc<T>,
}

/// Owns the device records loaded at startup and memoizes one client per id.
///
/// Records are read-only after construction. Clients are built on first
/// [`resolve`](Self::resolve) and reused afterwards, so sessions (tokens,
/// packet counters) survive across commands.
pub struct DeviceRegistry<C: DeviceConnector> {
    connector: C,
    records: HashMap<DeviceId, DeviceRecord>,
    clients: Mutex<HashMap<DeviceId, Arc<C::Client>>>,
}

impl<C: DeviceConnector> DeviceRegistry<C> {
    /// Create a registry over the given records. No client is built yet.
    pub fn new(connector: C, records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();
        Self {
            connector,
            records,
            clients: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn record(&self, id: &DeviceId) -> Option<&DeviceRecord> {
        self.records.get(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a device and its client, building the client on first use.
    ///
    /// Returns `Ok(None)` when no record has this id.
    ///
    /// # Errors
    ///
    /// Propagates the connector's construction error. A failed construction
    /// is not cached; the next call tries again.
    pub fn resolve(
        &self,
        id: &DeviceId,
    ) -> Result<Option<ResolvedDevice<'_, C::Client>>, HubError> {
        let Some(record) = self.records.get(id) else {
            return Ok(None);
        };

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(id) {
            return Ok(Some(ResolvedDevice {
                record,
                client: Arc::clone(client),
            }));
        }

        let client = Arc::new(self.connector.connect(record)?);
        tracing::debug!(device = %id, vendor = %record.vendor, "device client created");
        clients.insert(id.clone(), Arc::clone(&client));
        Ok(Some(ResolvedDevice { record, client }))
    }
}
