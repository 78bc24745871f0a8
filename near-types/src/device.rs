//! Discovered devices, local identity and roles.

use crate::{BtAddress, StableId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pairing status of a discovered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Seen, no pairing attempted.
    #[default]
    Idle,
    /// Bonding ceremony in progress.
    Pairing,
    /// Bonded.
    Paired,
    /// Last bonding attempt failed.
    Failed,
}

/// A device observed by one of the discovery sub-scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Display name, possibly synthesized as `Unknown Device (<suffix>)`.
    pub name: String,
    /// Transport-level address.
    pub address: BtAddress,
    /// Pairing status.
    pub status: DeviceStatus,
}

impl DeviceRecord {
    /// Create an idle record.
    pub fn new(name: impl Into<String>, address: BtAddress) -> Self {
        Self {
            name: name.into(),
            address,
            status: DeviceStatus::Idle,
        }
    }

    /// The discovery dedup key, `address|name`.
    pub fn dedup_key(&self) -> String {
        format!("{}|{}", self.address, self.name)
    }
}

/// The local installation's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Radio-visible local name.
    pub local_name: String,
    /// Stable per-installation id.
    pub stable_id: StableId,
}

/// The role a device plays in a handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Not resolved yet.
    #[default]
    Unassigned,
    /// Initiator: renames itself for discovery and scans for peers.
    Broadcaster,
    /// Responder: listens only.
    Receiver,
    /// Unknown id: both scans and is discoverable.
    Neutral,
}

impl Role {
    /// Whether a device in this role runs discovery.
    pub fn scans(&self) -> bool {
        matches!(self, Role::Broadcaster | Role::Neutral)
    }

    /// Whether a device in this role runs the listener.
    pub fn listens(&self) -> bool {
        !matches!(self, Role::Unassigned)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Unassigned => "unassigned",
            Role::Broadcaster => "broadcaster",
            Role::Receiver => "receiver",
            Role::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_idle() {
        let record = DeviceRecord::new("Phone", BtAddress::new("AA:BB:CC:DD:EE:FF"));
        assert_eq!(record.status, DeviceStatus::Idle);
        assert_eq!(record.dedup_key(), "AA:BB:CC:DD:EE:FF|Phone");
    }

    #[test]
    fn role_hints() {
        assert!(Role::Broadcaster.scans());
        assert!(Role::Neutral.scans());
        assert!(!Role::Receiver.scans());
        assert!(!Role::Unassigned.scans());

        assert!(Role::Receiver.listens());
        assert!(Role::Broadcaster.listens());
        assert!(!Role::Unassigned.listens());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Broadcaster).unwrap();
        assert_eq!(json, "\"broadcaster\"");
        assert_eq!(Role::default(), Role::Unassigned);
    }
}
