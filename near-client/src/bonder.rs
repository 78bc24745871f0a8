//! Bonding with a remote device.
//!
//! [`Bonder::bond`] drives one [`BondState`] machine per attempt, executing
//! its actions against the radio: subscribe to bond-state-changed signals,
//! request bonding, wait for the terminal signal for the target address.

use crate::adapter::Adapter;
use crate::radio::{BondStateChanged, Radio, RadioError};
use nearlink_core::{BondAction, BondEvent, BondFailure, BondState, PlatformBondState};
use nearlink_types::{BondResult, BtAddress};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default bound on waiting for a terminal bond signal.
pub const DEFAULT_BOND_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the bond result broadcast.
const RESULT_CAPACITY: usize = 16;

/// Bond errors.
#[derive(Debug, Error)]
pub enum BondError {
    /// Adapter missing or powered off.
    #[error("radio unavailable")]
    RadioUnavailable,

    /// Platform reported the device as not bonded after the ceremony.
    #[error("bonding with {0} failed")]
    Failed(BtAddress),

    /// Platform refused the bonding request.
    #[error("bond request failed: {0}")]
    Request(String),

    /// No terminal signal arrived within the configured wait.
    #[error("bonding with {0} timed out")]
    Timeout(BtAddress),

    /// An attempt for this address is already in flight.
    #[error("bonding with {0} already pending")]
    AlreadyPending(BtAddress),

    /// Bond signals stopped arriving (radio shut down).
    #[error("bond signals closed")]
    SignalsClosed,

    /// Radio query failed.
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),
}

/// Successful bond outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondOutcome {
    /// The device was already bonded; no ceremony ran.
    AlreadyBonded,
    /// A ceremony ran and completed.
    Bonded,
}

/// Bonder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondConfig {
    /// Bound on waiting for a terminal signal. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_BOND_TIMEOUT),
        }
    }
}

/// Bonds with remote devices, one attempt per address at a time.
pub struct Bonder<R: Radio> {
    adapter: Adapter<R>,
    config: BondConfig,
    pending: Arc<Mutex<HashSet<BtAddress>>>,
    results: broadcast::Sender<BondResult>,
}

/// Removes an address from the pending set when the attempt ends.
struct PendingGuard {
    pending: Arc<Mutex<HashSet<BtAddress>>>,
    address: BtAddress,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.address);
    }
}

impl<R: Radio> Bonder<R> {
    /// Create a bonder.
    pub fn new(adapter: Adapter<R>, config: BondConfig) -> Self {
        let (results, _) = broadcast::channel(RESULT_CAPACITY);
        Self {
            adapter,
            config,
            pending: Arc::new(Mutex::new(HashSet::new())),
            results,
        }
    }

    /// Subscribe to the outcome of every settled attempt.
    pub fn subscribe(&self) -> broadcast::Receiver<BondResult> {
        self.results.subscribe()
    }

    /// Bond with `address`.
    ///
    /// Returns immediately if the device is already bonded.
    pub async fn bond(&self, address: &BtAddress) -> Result<BondOutcome, BondError> {
        if !self.adapter.is_enabled().await {
            return Err(BondError::RadioUnavailable);
        }
        let _pending = self.reserve(address)?;
        let radio = self.adapter.radio();

        let current = radio.bond_state(address).await?;
        debug!("Bond request for {} (current: {:?})", address, current);

        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let (mut state, actions) = BondState::new().on_event(BondEvent::Requested {
            target: address.clone(),
            current,
        });
        let mut queue: VecDeque<BondAction> = actions.into();
        let mut signals: Option<broadcast::Receiver<BondStateChanged>> = None;

        loop {
            while let Some(action) = queue.pop_front() {
                match action {
                    BondAction::Subscribe => signals = Some(radio.subscribe_bond_events()),
                    BondAction::Unsubscribe => signals = None,
                    BondAction::RequestBond { address } => {
                        if let Err(e) = radio.create_bond(&address).await {
                            warn!("Bond request for {} refused: {}", address, e);
                            let (next, more) = state.on_event(BondEvent::RequestRejected {
                                error: e.to_string(),
                            });
                            state = next;
                            queue.extend(more);
                        }
                    }
                    BondAction::Succeed {
                        address,
                        already_bonded,
                    } => {
                        info!("Bonded with {}", address);
                        self.publish(&address, true);
                        return Ok(if already_bonded {
                            BondOutcome::AlreadyBonded
                        } else {
                            BondOutcome::Bonded
                        });
                    }
                    BondAction::Fail { address, failure } => {
                        warn!("Bonding with {} failed: {:?}", address, failure);
                        self.publish(&address, false);
                        return Err(match failure {
                            BondFailure::Rejected => BondError::Failed(address),
                            BondFailure::Request(e) => BondError::Request(e),
                            BondFailure::Timeout => BondError::Timeout(address),
                        });
                    }
                }
            }

            let Some(rx) = signals.as_mut() else {
                return Err(BondError::SignalsClosed);
            };
            let event = match next_signal(rx, deadline).await {
                Signal::Changed(changed) => BondEvent::StateChanged {
                    address: changed.address,
                    state: changed.state,
                },
                Signal::Lagged(missed) => {
                    // A missed success is recoverable from the current state.
                    // A missed failure is left to the deadline: mid-ceremony
                    // the platform reports `None` as well.
                    warn!("Missed {} bond signals, re-querying {}", missed, address);
                    match radio.bond_state(address).await? {
                        PlatformBondState::Bonded => BondEvent::StateChanged {
                            address: address.clone(),
                            state: PlatformBondState::Bonded,
                        },
                        _ => continue,
                    }
                }
                Signal::TimedOut => BondEvent::TimedOut,
                Signal::Closed => return Err(BondError::SignalsClosed),
            };
            let (next, more) = state.on_event(event);
            state = next;
            queue.extend(more);
        }
    }

    fn reserve(&self, address: &BtAddress) -> Result<PendingGuard, BondError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(address.clone()) {
            return Err(BondError::AlreadyPending(address.clone()));
        }
        Ok(PendingGuard {
            pending: Arc::clone(&self.pending),
            address: address.clone(),
        })
    }

    fn publish(&self, address: &BtAddress, success: bool) {
        // No subscribers is fine.
        let _ = self.results.send(BondResult {
            address: address.clone(),
            success,
        });
    }
}

enum Signal {
    Changed(BondStateChanged),
    Lagged(u64),
    TimedOut,
    Closed,
}

async fn next_signal(
    rx: &mut broadcast::Receiver<BondStateChanged>,
    deadline: Option<Instant>,
) -> Signal {
    let received = match deadline {
        Some(deadline) => match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(received) => received,
            Err(_) => return Signal::TimedOut,
        },
        None => rx.recv().await,
    };
    match received {
        Ok(changed) => Signal::Changed(changed),
        Err(broadcast::error::RecvError::Lagged(n)) => Signal::Lagged(n),
        Err(broadcast::error::RecvError::Closed) => Signal::Closed,
    }
}
