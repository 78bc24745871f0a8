//! Error types for the listener.

/// Server start errors.
///
/// Once a server is listening nothing here is returned: accept errors and
/// per-connection failures are logged, counted in
/// [`ServerMetrics`](crate::ServerMetrics) and the loop keeps going.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// A server on this instance is already starting or listening.
    #[error("listener already running")]
    AlreadyRunning,

    /// Adapter missing or powered off.
    #[error("radio unavailable")]
    RadioUnavailable,

    /// The listening socket could not be created.
    #[error("bind failed: {0}")]
    BindFailed(String),
}

/// Result type for listener operations.
pub type Result<T> = std::result::Result<T, ListenerError>;
