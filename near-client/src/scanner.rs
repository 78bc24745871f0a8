//! Dual-mode discovery.
//!
//! A scan runs the low-energy advertisement scan and the classic inquiry
//! side by side for a fixed time, merging both into one deduplicated
//! [`DeviceList`]. The session lives in its own task; the caller gets a
//! [`DiscoveryHandle`] that streams each new device and resolves with the
//! full list once the session ends.

use crate::adapter::Adapter;
use crate::radio::{AdvertisementReport, InquiryEvent, Radio, RadioError};
use nearlink_core::{resolve_name, DeviceList, DiscoveryAccumulator};
use nearlink_types::DeviceRecord;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default discovery window.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Extra time after the window for late name resolution.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Scan errors.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Adapter missing or powered off.
    #[error("radio unavailable")]
    RadioUnavailable,

    /// Neither sub-scan could be started.
    #[error("scan failed: {0}")]
    Radio(#[from] RadioError),

    /// A newer scan, a send or a listener start stopped this session.
    #[error("scan superseded")]
    Superseded,

    /// The session task ended without reporting.
    #[error("scan session aborted")]
    Aborted,
}

/// Scanner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Discovery window used by [`Scanner::scan_default`].
    pub timeout: Duration,
    /// Extra time after the window before the session stops.
    pub settle_delay: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SCAN_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// A running discovery session.
#[derive(Debug)]
pub struct DiscoveryHandle {
    found: mpsc::UnboundedReceiver<DeviceRecord>,
    result: oneshot::Receiver<Result<DeviceList, ScanError>>,
}

impl DiscoveryHandle {
    /// Next newly discovered device, or `None` once the session has ended.
    pub async fn next_device(&mut self) -> Option<DeviceRecord> {
        self.found.recv().await
    }

    /// Wait for the session to end and return everything it found.
    pub async fn finish(self) -> Result<DeviceList, ScanError> {
        self.result.await.map_err(|_| ScanError::Aborted)?
    }
}

/// Runs bounded discovery sessions on an adapter.
pub struct Scanner<R: Radio> {
    adapter: Adapter<R>,
    config: ScanConfig,
}

impl<R: Radio> Scanner<R> {
    /// Create a scanner.
    pub fn new(adapter: Adapter<R>, config: ScanConfig) -> Self {
        Self { adapter, config }
    }

    /// Scan for the configured default window.
    pub async fn scan_default(&self) -> Result<DeviceList, ScanError> {
        self.scan(self.config.timeout).await
    }

    /// Scan for `timeout` (plus the settle delay) and return the merged list.
    pub async fn scan(&self, timeout: Duration) -> Result<DeviceList, ScanError> {
        self.start(timeout).await?.finish().await
    }

    /// Start a session and return immediately.
    ///
    /// Any session already running on the adapter is stopped first.
    pub async fn start(&self, timeout: Duration) -> Result<DiscoveryHandle, ScanError> {
        if !self.adapter.is_enabled().await {
            return Err(ScanError::RadioUnavailable);
        }

        let slot = self.adapter.begin_discovery().await;
        let radio = self.adapter.radio();

        let le = match radio.start_le_scan().await {
            Ok(rx) => Some(rx),
            Err(e) => {
                warn!("LE scan failed to start: {}", e);
                None
            }
        };
        let inquiry = match radio.start_inquiry().await {
            Ok(rx) => Some(rx),
            Err(e) => {
                warn!("Inquiry failed to start: {}", e);
                if le.is_none() {
                    return Err(match e {
                        RadioError::Unavailable => ScanError::RadioUnavailable,
                        other => ScanError::Radio(other),
                    });
                }
                None
            }
        };

        let deadline = Instant::now() + timeout + self.config.settle_delay;
        let (found_tx, found) = mpsc::unbounded_channel();
        let (result_tx, result) = oneshot::channel();
        let adapter = self.adapter.clone();

        slot.install(move |generation, cancelled| {
            info!(
                "Discovery session {} started ({:?} window)",
                generation, timeout
            );
            tokio::spawn(run_session(Session {
                adapter,
                generation,
                le,
                inquiry,
                deadline,
                cancelled,
                found: found_tx,
                done: result_tx,
            }))
        })
        .await;

        Ok(DiscoveryHandle { found, result })
    }
}

struct Session<R: Radio> {
    adapter: Adapter<R>,
    generation: u64,
    le: Option<mpsc::UnboundedReceiver<AdvertisementReport>>,
    inquiry: Option<mpsc::UnboundedReceiver<InquiryEvent>>,
    deadline: Instant,
    cancelled: oneshot::Receiver<()>,
    found: mpsc::UnboundedSender<DeviceRecord>,
    done: oneshot::Sender<Result<DeviceList, ScanError>>,
}

async fn run_session<R: Radio>(session: Session<R>) {
    let Session {
        adapter,
        generation,
        le,
        inquiry,
        deadline,
        mut cancelled,
        found,
        done,
    } = session;

    let le_started = le.is_some();
    let inquiry_started = inquiry.is_some();
    let mut le_open = le_started;
    let mut inquiry_open = inquiry_started;
    let mut le_rx = le.unwrap_or_else(closed_receiver);
    let mut inquiry_rx = inquiry.unwrap_or_else(closed_receiver);

    let mut acc = DiscoveryAccumulator::new();
    let window = tokio::time::sleep_until(deadline);
    tokio::pin!(window);

    let superseded = loop {
        tokio::select! {
            _ = &mut cancelled => break true,
            _ = &mut window => break false,
            report = le_rx.recv(), if le_open => match report {
                Some(report) => {
                    let name = resolve_name(
                        report.name.as_deref(),
                        report.data.as_deref(),
                        &report.address,
                    );
                    if let Some(record) = acc.observe(report.address, name) {
                        debug!("LE device found: {} [{}]", record.name, record.address);
                        let _ = found.send(record);
                    }
                }
                None => le_open = false,
            },
            event = inquiry_rx.recv(), if inquiry_open => match event {
                Some(InquiryEvent::Found { address, name }) => {
                    let name = resolve_name(name.as_deref(), None, &address);
                    if let Some(record) = acc.observe(address, name) {
                        debug!("Classic device found: {} [{}]", record.name, record.address);
                        let _ = found.send(record);
                    }
                }
                Some(InquiryEvent::Finished) => debug!("Classic inquiry finished"),
                None => inquiry_open = false,
            },
        }
    };

    let radio = adapter.radio();
    if le_started {
        if let Err(e) = radio.stop_le_scan().await {
            warn!("Error stopping LE scan: {}", e);
        }
    }
    if inquiry_started {
        if let Err(e) = radio.stop_inquiry().await {
            warn!("Error stopping inquiry: {}", e);
        }
    }
    drop(le_rx);
    drop(inquiry_rx);
    drop(found);
    adapter.finish_discovery(generation).await;

    let result = if superseded {
        info!("Discovery session {} superseded", generation);
        Err(ScanError::Superseded)
    } else {
        info!(
            "Discovery session {} complete, found {} devices",
            generation,
            acc.len()
        );
        Ok(acc.finish())
    };
    // Caller may have dropped the handle.
    let _ = done.send(result);
}

fn closed_receiver<T>() -> mpsc::UnboundedReceiver<T> {
    let (_, rx) = mpsc::unbounded_channel();
    rx
}
