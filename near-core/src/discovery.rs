//! Discovery result bookkeeping.
//!
//! [`DiscoveryAccumulator`] merges sightings from both discovery sub-scans
//! into one list. Entries are deduplicated on `address|name`: a device that
//! reports two names under one address shows up twice, so a name resolved
//! late is never lost.

use std::collections::HashSet;

use nearlink_types::{BtAddress, DeviceRecord, DeviceStatus};

use crate::advert::is_fallback_name;

/// Dedup set plus ordered results for one discovery session.
#[derive(Debug, Default)]
pub struct DiscoveryAccumulator {
    seen: HashSet<String>,
    records: Vec<DeviceRecord>,
}

impl DiscoveryAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting.
    ///
    /// Returns the new record on first sight of its `address|name` key and
    /// `None` for duplicates (first writer wins).
    pub fn observe(&mut self, address: BtAddress, name: String) -> Option<DeviceRecord> {
        let record = DeviceRecord::new(name, address);
        if !self.seen.insert(record.dedup_key()) {
            return None;
        }
        self.records.push(record.clone());
        Some(record)
    }

    /// Number of distinct entries so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the accumulator, yielding the merged list.
    pub fn finish(self) -> DeviceList {
        DeviceList(self.records)
    }
}

/// The merged result of a discovery session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceList(Vec<DeviceRecord>);

impl DeviceList {
    /// Wrap a list of records.
    pub fn new(records: Vec<DeviceRecord>) -> Self {
        Self(records)
    }

    /// All records, in discovery order.
    pub fn records(&self) -> &[DeviceRecord] {
        &self.0
    }

    /// Records whose name was actually reported, hiding synthesized
    /// `Unknown Device (..)` entries.
    pub fn named(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.0.iter().filter(|r| !is_fallback_name(&r.name))
    }

    /// Update the pairing status of every entry for `address`.
    ///
    /// Returns the number of entries touched.
    pub fn set_status(&mut self, address: &BtAddress, status: DeviceStatus) -> usize {
        let mut touched = 0;
        for record in self.0.iter_mut().filter(|r| &r.address == address) {
            record.status = status;
            touched += 1;
        }
        touched
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying records.
    pub fn into_vec(self) -> Vec<DeviceRecord> {
        self.0
    }
}

impl IntoIterator for DeviceList {
    type Item = DeviceRecord;
    type IntoIter = std::vec::IntoIter<DeviceRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
