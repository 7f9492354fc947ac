// MIT License - Copyright (c) 2026 Peter Wright
// Gateway hub bridge

use std::sync::Arc;

use dashmap::DashMap;

use crate::devices::Device;
use crate::status::StatusSnapshot;

/// Latest status report per gateway, keyed by `device_no`.
///
/// Safe to share across tasks. Each `store` replaces the previous snapshot
/// for that gateway outright: reports are not ordered by timestamp, so a
/// late delivery of an older report wins over a newer one.
#[derive(Debug)]
pub struct StatusCache {
    entries: DashMap<String, Arc<StatusSnapshot>>,
    device_no: String,
    panel_address: String,
}

impl StatusCache {
    /// Create an empty cache for the gateway `device_no` whose local panel
    /// sits at `panel_address`.
    pub fn new(device_no: impl Into<String>, panel_address: impl Into<String>) -> Self {
        Self {
            entries: DashMap::new(),
            device_no: device_no.into(),
            panel_address: panel_address.into(),
        }
    }

    /// Insert or replace the snapshot for `device_no`.
    pub fn store(&self, device_no: impl Into<String>, snapshot: StatusSnapshot) {
        self.entries.insert(device_no.into(), Arc::new(snapshot));
    }

    /// Latest snapshot for `device_no`, if any report has arrived.
    pub fn load(&self, device_no: &str) -> Option<Arc<StatusSnapshot>> {
        self.entries.get(device_no).map(|entry| Arc::clone(entry.value()))
    }

    /// Last reported state of the local-panel device on `channel`.
    pub fn device_status(&self, channel: &str) -> Option<Device> {
        let snapshot = self.load(&self.device_no)?;
        snapshot.device(&self.panel_address, channel).cloned()
    }

    /// Gateways with a stored snapshot.
    pub fn device_ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
