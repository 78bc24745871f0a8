//! Error types for nearlink value types.

use thiserror::Error;

/// Errors that can occur when building or decoding nearlink value types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Address is not a `XX:XX:XX:XX:XX:XX` hardware address
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Service identifier could not be parsed
    #[error("invalid service id: {0}")]
    InvalidService(String),

    /// Payload JSON encoding failed
    #[error("payload serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// Payload JSON decoding failed or fields are missing
    #[error("payload deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypesError::InvalidAddress("nope".into());
        assert_eq!(err.to_string(), "invalid address: nope");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypesError>();
    }
}
