//! One-shot message delivery.
//!
//! [`Sender::send`] quiets discovery, connects to the peer's service with a
//! bounded retry-with-timeout loop, writes the message, gives the receiver
//! a moment to read it, and closes the link on every path.

use crate::adapter::Adapter;
use crate::radio::{Link, Radio, RadioError};
use nearlink_core::RetryPolicy;
use nearlink_types::{BtAddress, DeliveryReceipt, ServiceId};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default pause after writing, before closing the link.
pub const DEFAULT_POST_WRITE_SETTLE: Duration = Duration::from_millis(500);

/// Send errors.
#[derive(Debug, Error)]
pub enum SendError {
    /// Adapter missing or powered off; no connection was attempted.
    #[error("radio unavailable")]
    RadioUnavailable,

    /// Every connect attempt failed or timed out.
    #[error("connect to {address} failed after {attempts} attempts: {last_error}")]
    ConnectFailed {
        /// Target device.
        address: BtAddress,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        last_error: String,
    },

    /// I/O failed after connecting. The link was still closed.
    #[error("send failed: {0}")]
    SendFailed(#[source] RadioError),
}

/// Sender configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderConfig {
    /// Connect retry policy.
    pub retry: RetryPolicy,
    /// Pause after writing, before closing the link.
    pub settle_delay: Duration,
    /// Service to connect to on the peer.
    pub service: ServiceId,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            settle_delay: DEFAULT_POST_WRITE_SETTLE,
            service: ServiceId::default(),
        }
    }
}

/// Delivers single messages to peers.
pub struct Sender<R: Radio> {
    adapter: Adapter<R>,
    config: SenderConfig,
}

impl<R: Radio> Sender<R> {
    /// Create a sender.
    pub fn new(adapter: Adapter<R>, config: SenderConfig) -> Self {
        Self { adapter, config }
    }

    /// Send `message` to `address`.
    ///
    /// Cancels any discovery in progress before connecting.
    pub async fn send(
        &self,
        address: &BtAddress,
        message: &[u8],
    ) -> Result<DeliveryReceipt, SendError> {
        if !self.adapter.is_enabled().await {
            return Err(SendError::RadioUnavailable);
        }
        if let Err(e) = self.adapter.cancel_discovery().await {
            warn!("Cancel discovery before send failed: {}", e);
        }

        let policy = self.config.retry;
        let radio = self.adapter.radio();
        let mut last_error = String::new();

        for attempt in 1..=policy.attempts() {
            debug!(
                "Connecting to {} (attempt {}/{})",
                address,
                attempt,
                policy.attempts()
            );
            match tokio::time::timeout(
                policy.connect_timeout,
                radio.connect(address, self.config.service),
            )
            .await
            {
                Ok(Ok(link)) => return self.deliver(link, message, attempt).await,
                Ok(Err(e)) => {
                    warn!("Connect attempt {} to {} failed: {}", attempt, address, e);
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        "Connect attempt {} to {} timed out after {:?}",
                        attempt, address, policy.connect_timeout
                    );
                    last_error = format!("timed out after {:?}", policy.connect_timeout);
                }
            }
            if let Some(delay) = policy.delay_after(attempt) {
                tokio::time::sleep(delay).await;
            }
        }

        Err(SendError::ConnectFailed {
            address: address.clone(),
            attempts: policy.attempts(),
            last_error,
        })
    }

    async fn deliver(
        &self,
        mut link: Box<dyn Link>,
        message: &[u8],
        attempts: u32,
    ) -> Result<DeliveryReceipt, SendError> {
        let written = write_and_flush(link.as_mut(), message).await;
        if written.is_ok() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
        if let Err(e) = link.close().await {
            debug!("Closing link to {} failed: {}", link.peer(), e);
        }
        written.map_err(SendError::SendFailed)?;

        info!("Sent {} bytes to {}", message.len(), link.peer());
        Ok(DeliveryReceipt {
            address: link.peer().clone(),
            bytes_written: message.len(),
            attempts,
        })
    }
}

async fn write_and_flush(link: &mut dyn Link, message: &[u8]) -> Result<(), RadioError> {
    link.write_all(message).await?;
    link.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::{MockAir, MockRadio};
    use tokio::time::Instant;

    fn pair() -> (Sender<MockRadio>, MockRadio, MockRadio) {
        let air = MockAir::new();
        let a = MockRadio::new(air.clone(), "AA:AA:AA:AA:AA:01");
        let b = MockRadio::new(air, "AA:AA:AA:AA:AA:02");
        let sender = Sender::new(Adapter::new(a.clone()), SenderConfig::default());
        (sender, a, b)
    }

    // ===========================================
    // Delivery
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn delivers_to_listening_peer() {
        let (sender, _a, b) = pair();
        let mut acceptor = b.listen(ServiceId::default()).await.unwrap();

        let receipt = sender.send(b.address(), b"PING").await.unwrap();

        assert_eq!(receipt.address, *b.address());
        assert_eq!(receipt.bytes_written, 4);
        assert_eq!(receipt.attempts, 1);

        let mut link = acceptor.accept().await.unwrap();
        let mut buf = [0u8; 16];
        let n = link.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"PING");
        // Sender closed its end.
        assert_eq!(link.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_send_closes_link_once() {
        let (sender, a, b) = pair();
        let _acceptor = b.listen(ServiceId::default()).await.unwrap();

        sender.send(b.address(), b"PING").await.unwrap();

        assert_eq!(a.links_closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_cancels_discovery() {
        let (sender, a, b) = pair();
        let _acceptor = b.listen(ServiceId::default()).await.unwrap();

        sender.send(b.address(), b"x").await.unwrap();

        assert_eq!(a.discovery_cancels(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_settle_delay_after_write() {
        let (sender, _a, b) = pair();
        let _acceptor = b.listen(ServiceId::default()).await.unwrap();
        let started = Instant::now();

        sender.send(b.address(), b"x").await.unwrap();

        assert!(started.elapsed() >= DEFAULT_POST_WRITE_SETTLE);
    }

    // ===========================================
    // Failures
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn disabled_radio_fails_before_connecting() {
        let (sender, a, b) = pair();
        a.set_enabled(false);

        let result = sender.send(b.address(), b"PING").await;

        assert!(matches!(result, Err(SendError::RadioUnavailable)));
        assert!(a.connect_attempts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_peer_gets_three_attempts_two_delays() {
        let (sender, a, b) = pair();
        let started = Instant::now();

        let result = sender.send(b.address(), b"PING").await;

        assert!(matches!(
            result,
            Err(SendError::ConnectFailed { attempts: 3, .. })
        ));
        assert_eq!(a.connect_attempts().len(), 3);
        // Refused connects fail instantly, so only the two backoffs elapse.
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_connects_are_bounded_by_timeout() {
        let (sender, a, b) = pair();
        a.set_unresponsive(b.address());
        let started = Instant::now();

        let result = sender.send(b.address(), b"PING").await;

        assert!(matches!(result, Err(SendError::ConnectFailed { .. })));
        assert_eq!(a.connect_attempts().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(32));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_once_peer_listens() {
        let (sender, _a, b) = pair();
        let late = b.clone();
        let listener = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let mut acceptor = late.listen(ServiceId::default()).await.unwrap();
            let _link = acceptor.accept().await.unwrap();
        });

        let receipt = sender.send(b.address(), b"PING").await.unwrap();

        assert_eq!(receipt.attempts, 2);
        listener.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_is_send_failed() {
        let (sender, a, b) = pair();
        let mut acceptor = b.listen(ServiceId::default()).await.unwrap();
        // Accept and hang up without reading.
        tokio::spawn(async move {
            let link = acceptor.accept().await.unwrap();
            drop(link);
        });

        // Larger than the in-memory pipe, so the write cannot complete.
        let big = vec![0u8; 64 * 1024];
        let result = sender.send(b.address(), &big).await;

        assert!(matches!(result, Err(SendError::SendFailed(_))));
        // The link is closed on the failure path too.
        assert_eq!(a.links_closed(), 1);
    }
}
