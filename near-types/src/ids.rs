//! Addressing and identity types for nearlink.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Serial Port Profile UUID, the well-known service both peers bind and dial.
pub const SERIAL_PORT_SERVICE_UUID: uuid::Uuid =
    uuid::Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Default RFCOMM channel used alongside [`SERIAL_PORT_SERVICE_UUID`].
const DEFAULT_CHANNEL: u8 = 1;

/// A transport-level device address.
///
/// Platforms report these as `XX:XX:XX:XX:XX:XX` strings. [`BtAddress::new`]
/// keeps whatever the platform reported so discovery dedup sees the raw
/// value; [`BtAddress::parse`] validates and upper-cases user input.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BtAddress(String);

impl BtAddress {
    /// Wrap a platform-reported address without validation.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Parse a `XX:XX:XX:XX:XX:XX` hardware address.
    pub fn parse(input: &str) -> Result<Self, TypesError> {
        let trimmed = input.trim();
        let octets: Vec<&str> = trimmed.split(':').collect();
        let well_formed = octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
        if !well_formed {
            return Err(TypesError::InvalidAddress(input.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// The address as reported.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last `n` characters of the address (the whole address if shorter).
    pub fn suffix(&self, n: usize) -> &str {
        let count = self.0.chars().count();
        if count <= n {
            return &self.0;
        }
        let start = self
            .0
            .char_indices()
            .nth(count - n)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl FromStr for BtAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BtAddress({})", self.0)
    }
}

/// A stable per-installation identifier.
///
/// Opaque string, compared by equality only (16 lowercase hex chars on
/// the platforms nearlink derives it on).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StableId({})", self.0)
    }
}

/// The well-known endpoint both peers use for connection-oriented sockets.
///
/// The UUID names the service; the channel is the RFCOMM channel it is
/// served on. Sender and listener must agree on both.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId {
    /// Service class UUID.
    pub uuid: uuid::Uuid,
    /// RFCOMM channel (1-30).
    pub channel: u8,
}

impl ServiceId {
    /// Create a service id, rejecting channels outside the RFCOMM range.
    pub fn new(uuid: uuid::Uuid, channel: u8) -> Result<Self, TypesError> {
        if !(1..=30).contains(&channel) {
            return Err(TypesError::InvalidService(format!(
                "rfcomm channel {channel} out of range 1-30"
            )));
        }
        Ok(Self { uuid, channel })
    }

    /// Parse a service UUID string and pair it with `channel`.
    pub fn parse(uuid: &str, channel: u8) -> Result<Self, TypesError> {
        let uuid = uuid::Uuid::parse_str(uuid)
            .map_err(|e| TypesError::InvalidService(e.to_string()))?;
        Self::new(uuid, channel)
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self {
            uuid: SERIAL_PORT_SERVICE_UUID,
            channel: DEFAULT_CHANNEL,
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.uuid, self.channel)
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parse_uppercases() {
        let addr = BtAddress::parse(" aa:bb:cc:dd:ee:0f ").unwrap();
        assert_eq!(addr.as_str(), "AA:BB:CC:DD:EE:0F");
    }

    #[test]
    fn address_parse_rejects_garbage() {
        assert!(BtAddress::parse("AA:BB:CC").is_err());
        assert!(BtAddress::parse("AA:BB:CC:DD:EE:GG").is_err());
        assert!(BtAddress::parse("").is_err());
        assert!("AABBCCDDEEFF".parse::<BtAddress>().is_err());
    }

    #[test]
    fn address_new_keeps_raw_value() {
        let addr = BtAddress::new("aa:bb:cc:dd:ee:ff");
        assert_eq!(addr.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn address_suffix_takes_last_chars() {
        let addr = BtAddress::new("AA:BB:CC:DD:EE:FF");
        assert_eq!(addr.suffix(5), "EE:FF");
        assert_eq!(BtAddress::new("abc").suffix(5), "abc");
    }

    #[test]
    fn stable_id_compares_by_value() {
        assert_eq!(StableId::new("8ddeebd2bcb19a1e"), StableId::new("8ddeebd2bcb19a1e"));
        assert_ne!(StableId::new("a"), StableId::new("b"));
    }

    #[test]
    fn default_service_is_serial_port_channel_one() {
        let service = ServiceId::default();
        assert_eq!(
            service.uuid.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(service.channel, 1);
    }

    #[test]
    fn service_rejects_bad_channel() {
        assert!(ServiceId::new(SERIAL_PORT_SERVICE_UUID, 0).is_err());
        assert!(ServiceId::new(SERIAL_PORT_SERVICE_UUID, 31).is_err());
        assert!(ServiceId::parse("not-a-uuid", 1).is_err());
        assert!(ServiceId::parse("00001101-0000-1000-8000-00805F9B34FB", 3).is_ok());
    }
}
