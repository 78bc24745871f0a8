//! Events surfaced to the application.

use crate::BtAddress;
use serde::{Deserialize, Serialize};

/// One completed inbound message.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceived {
    /// Raw bytes of the single read.
    pub payload: Vec<u8>,
    /// Address of the peer that sent them.
    pub sender: BtAddress,
}

impl MessageReceived {
    /// The payload as UTF-8, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

// Payloads carry payment data; keep them out of logs.
impl std::fmt::Debug for MessageReceived {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageReceived")
            .field(
                "payload",
                &format!("[{} bytes REDACTED]", self.payload.len()),
            )
            .field("sender", &self.sender)
            .finish()
    }
}

/// Terminal outcome of a bonding attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondResult {
    /// Device that was bonded (or not).
    pub address: BtAddress,
    /// Whether the device ended up bonded.
    pub success: bool,
}

/// Confirmation that a message was written to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Peer the message was written to.
    pub address: BtAddress,
    /// Number of payload bytes written.
    pub bytes_written: usize,
    /// Connect attempts used, 1-based.
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_debug_redacts_payload() {
        let msg = MessageReceived {
            payload: b"{\"amount\":1200}".to_vec(),
            sender: BtAddress::new("AA:BB:CC:DD:EE:FF"),
        };
        let debug = format!("{:?}", msg);
        assert!(debug.contains("[15 bytes REDACTED]"), "got: {}", debug);
        assert!(!debug.contains("amount"));
    }

    #[test]
    fn payload_str_handles_invalid_utf8() {
        let msg = MessageReceived {
            payload: vec![0xff, 0xfe],
            sender: BtAddress::new("AA:BB:CC:DD:EE:FF"),
        };
        assert!(msg.payload_str().is_none());

        let ping = MessageReceived {
            payload: b"PING".to_vec(),
            sender: BtAddress::new("AA:BB:CC:DD:EE:FF"),
        };
        assert_eq!(ping.payload_str(), Some("PING"));
    }
}
