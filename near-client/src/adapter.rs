//! Adapter gate.
//!
//! Every component reaches the radio through an [`Adapter`]. Besides the
//! enabled check it owns the discovery slot: at most one discovery session
//! is active per adapter, and anything that needs the radio quiet (a new
//! scan, a send, a listener start) stops that session completely before
//! going on.

use crate::radio::{Radio, RadioError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct ActiveDiscovery {
    generation: u64,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Shared handle to the platform radio.
///
/// Clones share the radio and the discovery slot.
pub struct Adapter<R: Radio> {
    radio: Arc<R>,
    start_lock: Arc<Mutex<()>>,
    slot: Arc<Mutex<Option<ActiveDiscovery>>>,
    generation: Arc<AtomicU64>,
}

impl<R: Radio> Clone for Adapter<R> {
    fn clone(&self) -> Self {
        Self {
            radio: Arc::clone(&self.radio),
            start_lock: Arc::clone(&self.start_lock),
            slot: Arc::clone(&self.slot),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<R: Radio> Adapter<R> {
    /// Wrap a radio.
    pub fn new(radio: R) -> Self {
        Self::from_arc(Arc::new(radio))
    }

    /// Wrap a radio that is already shared.
    pub fn from_arc(radio: Arc<R>) -> Self {
        Self {
            radio,
            start_lock: Arc::new(Mutex::new(())),
            slot: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The underlying radio.
    pub fn radio(&self) -> &Arc<R> {
        &self.radio
    }

    /// Whether the radio is present and enabled.
    ///
    /// A platform error while asking counts as disabled.
    pub async fn is_enabled(&self) -> bool {
        match self.radio.is_enabled().await {
            Ok(enabled) => enabled,
            Err(e) => {
                debug!("Adapter state query failed: {}", e);
                false
            }
        }
    }

    /// Fail with [`RadioError::Unavailable`] unless the radio is enabled.
    pub async fn ensure_enabled(&self) -> Result<(), RadioError> {
        if self.is_enabled().await {
            Ok(())
        } else {
            Err(RadioError::Unavailable)
        }
    }

    /// Whether one of our discovery sessions is active.
    pub async fn is_discovering(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Stop our active discovery session (if any), then ask the platform to
    /// cancel whatever discovery it still runs.
    pub async fn cancel_discovery(&self) -> Result<(), RadioError> {
        let _start = self.start_lock.lock().await;
        self.stop_active().await;
        self.radio.cancel_discovery().await
    }

    /// Reserve the discovery slot for a new session.
    ///
    /// The previous session is fully stopped before this returns. The slot
    /// stays reserved until the returned guard is installed or dropped.
    pub(crate) async fn begin_discovery(&self) -> DiscoverySlot<'_, R> {
        let guard = self.start_lock.lock().await;
        self.stop_active().await;
        DiscoverySlot {
            adapter: self,
            _start: guard,
        }
    }

    /// Release the slot held by `generation`, if it still holds it.
    pub(crate) async fn finish_discovery(&self, generation: u64) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|a| a.generation == generation) {
            *slot = None;
        }
    }

    async fn stop_active(&self) {
        let active = self.slot.lock().await.take();
        if let Some(active) = active {
            debug!("Stopping discovery session {}", active.generation);
            // Session may have just finished on its own.
            let _ = active.cancel.send(());
            if let Err(e) = active.task.await {
                warn!("Discovery session {} ended abnormally: {}", active.generation, e);
            }
        }
    }
}

/// Exclusive right to install the next discovery session.
pub(crate) struct DiscoverySlot<'a, R: Radio> {
    adapter: &'a Adapter<R>,
    _start: MutexGuard<'a, ()>,
}

impl<R: Radio> DiscoverySlot<'_, R> {
    /// Spawn the session via `spawn` and record it as the active one.
    ///
    /// `spawn` receives the session generation and its cancel signal.
    pub(crate) async fn install<F>(self, spawn: F)
    where
        F: FnOnce(u64, oneshot::Receiver<()>) -> JoinHandle<()>,
    {
        let generation = self.adapter.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (cancel, cancelled) = oneshot::channel();
        // Hold the slot while spawning so the session's own cleanup always
        // finds its entry.
        let mut slot = self.adapter.slot.lock().await;
        let task = spawn(generation, cancelled);
        *slot = Some(ActiveDiscovery {
            generation,
            cancel,
            task,
        });
    }
}
