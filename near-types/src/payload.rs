//! Payment payload helper.
//!
//! The transport treats every message as opaque bytes. Applications that
//! exchange payment-like records encode them as a small JSON object:
//!
//! ```json
//! {"amount": 1200, "id": "212121", "status": "true"}
//! ```

use crate::TypesError;
use serde::{Deserialize, Serialize};

/// A payment-like record exchanged between two devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Amount in the smallest currency unit the application uses.
    pub amount: f64,
    /// Application-level record id.
    pub id: String,
    /// Application-level status string.
    pub status: String,
}

impl PaymentPayload {
    /// Create a payload.
    pub fn new(amount: f64, id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            amount,
            id: id.into(),
            status: status.into(),
        }
    }

    /// Encode as JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        serde_json::to_vec(self).map_err(TypesError::Serialization)
    }

    /// Decode from JSON bytes. Fails if any field is missing or mistyped.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        serde_json::from_slice(bytes).map_err(TypesError::Deserialization)
    }
}
