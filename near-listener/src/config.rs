//! Listener configuration.

use nearlink_types::ServiceId;
use std::time::Duration;

/// Default bound on a single accept attempt.
pub const DEFAULT_ACCEPT_WAIT: Duration = Duration::from_secs(10);

/// Default size of the single read performed per connection.
pub const DEFAULT_READ_BUFFER: usize = 1024;

/// Default pause after an accept error before accepting again.
pub const DEFAULT_ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(250);

/// Server settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Service to listen on. Must match the senders' service.
    pub service: ServiceId,
    /// Bound on one accept attempt. A timed-out accept is retried while the
    /// server runs.
    pub accept_wait: Duration,
    /// Bytes read from each connection (one read, no framing).
    pub read_buffer: usize,
    /// Pause after an accept error.
    pub accept_error_pause: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            service: ServiceId::default(),
            accept_wait: DEFAULT_ACCEPT_WAIT,
            read_buffer: DEFAULT_READ_BUFFER,
            accept_error_pause: DEFAULT_ACCEPT_ERROR_PAUSE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ListenerConfig::default();
        assert_eq!(config.accept_wait, Duration::from_secs(10));
        assert_eq!(config.read_buffer, 1024);
        assert_eq!(config.accept_error_pause, Duration::from_millis(250));
        assert_eq!(config.service, ServiceId::default());
    }
}
