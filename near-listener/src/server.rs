//! Server lifecycle and accept loop.
//!
//! [`Server::start`] drives the [`ListenerState`] machine: it quiets
//! discovery, binds the listening socket and spawns the accept loop. The
//! loop hands each connection to its own task, so a stuck peer never holds
//! up the next accept. The listening socket is closed in the loop's own
//! cleanup however the loop ends.

use crate::config::ListenerConfig;
use crate::connection::handle_connection;
use crate::error::{ListenerError, Result};
use dashmap::DashMap;
use nearlink_client::{Acceptor, Adapter, Link, Radio, RadioError};
use nearlink_core::{ListenerAction, ListenerEvent, ListenerState};
use nearlink_types::{BtAddress, MessageReceived};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Operational counters for one server.
///
/// Monotonically increasing for the life of the [`Server`], across restarts.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Connections accepted.
    pub connections_accepted: AtomicU64,
    /// Non-empty reads surfaced as messages.
    pub messages_received: AtomicU64,
    /// Connections closed by the peer before sending anything.
    pub empty_reads: AtomicU64,
    /// Per-connection read failures.
    pub handler_errors: AtomicU64,
    /// Failed accept attempts (timeouts are not counted).
    pub accept_errors: AtomicU64,
}

struct Lifecycle {
    state: ListenerState,
    /// Bumped on every accepted start so a finished run cannot move a
    /// newer one.
    generation: u64,
}

struct Shared {
    lifecycle: Mutex<Lifecycle>,
    metrics: ServerMetrics,
    /// Live connections by id.
    connections: DashMap<u64, BtAddress>,
    next_connection: AtomicU64,
}

impl Shared {
    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> ListenerState {
        self.lifecycle().state
    }

    /// Apply `event` only while run `generation` is the current one.
    fn transition(&self, generation: u64, event: ListenerEvent) -> Vec<ListenerAction> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.generation != generation {
            return vec![];
        }
        let (state, actions) = lifecycle.state.on_event(event);
        lifecycle.state = state;
        actions
    }

    /// Actions `event` would produce for run `generation`, without applying
    /// it.
    fn plan(&self, generation: u64, event: ListenerEvent) -> Vec<ListenerAction> {
        let lifecycle = self.lifecycle();
        if lifecycle.generation != generation {
            return vec![];
        }
        lifecycle.state.on_event(event).1
    }

    /// Request a start. Returns the new run's generation and its actions.
    fn request_start(&self) -> (u64, Vec<ListenerAction>) {
        let mut lifecycle = self.lifecycle();
        let (state, actions) = lifecycle.state.on_event(ListenerEvent::StartRequested);
        if !actions.contains(&ListenerAction::RejectAlreadyRunning) {
            lifecycle.generation += 1;
        }
        lifecycle.state = state;
        (lifecycle.generation, actions)
    }
}

/// Listener/Server bound to one radio.
///
/// At most one run is active at a time. A stopped server can be started
/// again.
pub struct Server<R: Radio> {
    adapter: Adapter<R>,
    config: ListenerConfig,
    shared: Arc<Shared>,
}

impl<R: Radio> std::fmt::Debug for Server<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("state", &self.shared.state())
            .field("metrics", &self.shared.metrics)
            .field("connections_count", &self.shared.connections.len())
            .finish_non_exhaustive()
    }
}

impl<R: Radio> Server<R> {
    /// Create a stopped server.
    pub fn new(adapter: Adapter<R>, config: ListenerConfig) -> Self {
        Self {
            adapter,
            config,
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    state: ListenerState::new(),
                    generation: 0,
                }),
                metrics: ServerMetrics::default(),
                connections: DashMap::new(),
                next_connection: AtomicU64::new(0),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        self.shared.state()
    }

    /// Server counters.
    pub fn metrics(&self) -> &ServerMetrics {
        &self.shared.metrics
    }

    /// Start listening.
    ///
    /// Fails with [`ListenerError::AlreadyRunning`] while another run is
    /// starting or listening; that run is left untouched.
    pub async fn start(&self) -> Result<ServerHandle> {
        let (generation, actions) = self.shared.request_start();
        let mut acceptor = None;

        for action in actions {
            match action {
                ListenerAction::RejectAlreadyRunning => {
                    warn!("Listener start refused: already running");
                    return Err(ListenerError::AlreadyRunning);
                }
                ListenerAction::CancelDiscovery => {
                    if let Err(e) = self.adapter.cancel_discovery().await {
                        warn!("Cancel discovery before listen failed: {}", e);
                    }
                }
                ListenerAction::Bind => match self.bind().await {
                    Ok(bound) => acceptor = Some(bound),
                    Err(e) => {
                        self.shared.transition(generation, ListenerEvent::BindFailed);
                        return Err(e);
                    }
                },
                _ => {}
            }
        }

        let Some(acceptor) = acceptor else {
            return Err(ListenerError::AlreadyRunning);
        };
        let actions = self.shared.transition(generation, ListenerEvent::Bound);
        if !actions.contains(&ListenerAction::SpawnAcceptLoop) {
            // Cannot happen while the generation is ours; drop the socket.
            return Err(ListenerError::AlreadyRunning);
        }

        let running = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = oneshot::channel();
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(accept_loop(AcceptLoop {
            acceptor,
            config: self.config,
            shared: Arc::clone(&self.shared),
            running: Arc::clone(&running),
            stop: stop_rx,
            messages: messages_tx,
            generation,
        }));

        info!("Listening on {}", self.config.service);
        Ok(ServerHandle {
            shared: Arc::clone(&self.shared),
            running,
            messages: messages_rx,
            stop: Some(stop_tx),
            task: Some(task),
            generation,
        })
    }

    async fn bind(&self) -> Result<Box<dyn Acceptor>> {
        if self.adapter.ensure_enabled().await.is_err() {
            return Err(ListenerError::RadioUnavailable);
        }
        match self.adapter.radio().listen(self.config.service).await {
            Ok(acceptor) => Ok(acceptor),
            Err(RadioError::Unavailable) => Err(ListenerError::RadioUnavailable),
            Err(e) => {
                warn!("Bind on {} failed: {}", self.config.service, e);
                Err(ListenerError::BindFailed(e.to_string()))
            }
        }
    }
}

/// A running server.
///
/// Dropping the handle stops the accept loop.
pub struct ServerHandle {
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    messages: mpsc::UnboundedReceiver<MessageReceived>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

impl ServerHandle {
    /// Received messages, one per non-empty inbound connection.
    pub fn messages(&mut self) -> &mut mpsc::UnboundedReceiver<MessageReceived> {
        &mut self.messages
    }

    /// Wait for the next received message.
    pub async fn next_message(&mut self) -> Option<MessageReceived> {
        self.messages.recv().await
    }

    /// Lifecycle state of the server this handle belongs to.
    pub fn state(&self) -> ListenerState {
        self.shared.state()
    }

    /// Whether this run's accept loop is still meant to run.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Server counters.
    pub fn metrics(&self) -> &ServerMetrics {
        &self.shared.metrics
    }

    /// Peers with a connection currently being serviced.
    pub fn active_connections(&self) -> Vec<BtAddress> {
        self.shared
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Stop the accept loop and wait for it to close the listening socket.
    ///
    /// The server reads `Stopped` only once the socket is released, so a
    /// start racing this call either is refused or binds cleanly.
    /// Connections already handed off finish on their own. Idempotent.
    pub async fn stop(&mut self) {
        let actions = self
            .shared
            .plan(self.generation, ListenerEvent::StopRequested);
        for action in actions {
            match action {
                ListenerAction::ClearRunFlag => self.running.store(false, Ordering::Release),
                ListenerAction::InterruptAcceptLoop => {
                    if let Some(stop) = self.stop.take() {
                        let _ = stop.send(());
                    }
                }
                _ => {}
            }
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Accept loop ended abnormally: {}", e);
            }
        }
        // Normally the loop's exit already moved this run to `Stopped`.
        self.shared
            .transition(self.generation, ListenerEvent::StopRequested);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("generation", &self.generation)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

struct AcceptLoop {
    acceptor: Box<dyn Acceptor>,
    config: ListenerConfig,
    shared: Arc<Shared>,
    running: Arc<AtomicBool>,
    stop: oneshot::Receiver<()>,
    messages: mpsc::UnboundedSender<MessageReceived>,
    generation: u64,
}

async fn accept_loop(mut run: AcceptLoop) {
    let wait = run.config.accept_wait;

    while run.running.load(Ordering::Acquire) {
        tokio::select! {
            _ = &mut run.stop => {
                debug!("Accept loop interrupted");
                break;
            }
            accepted = tokio::time::timeout(wait, run.acceptor.accept()) => match accepted {
                Err(_) => debug!("No connection within {:?}", wait),
                Ok(Ok(link)) => spawn_connection(link, &run),
                Ok(Err(RadioError::ConnectionClosed)) => {
                    warn!("Listening socket closed");
                    break;
                }
                Ok(Err(e)) => {
                    run.shared.metrics.accept_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Accept failed: {}", e);
                    tokio::select! {
                        _ = &mut run.stop => break,
                        _ = tokio::time::sleep(run.config.accept_error_pause) => {}
                    }
                }
            }
        }
    }

    if let Err(e) = run.acceptor.close().await {
        warn!("Closing listening socket failed: {}", e);
    }
    run.running.store(false, Ordering::Release);
    run.shared
        .transition(run.generation, ListenerEvent::AcceptLoopExited);
    info!("Listener on {} stopped", run.config.service);
}

fn spawn_connection(link: Box<dyn Link>, run: &AcceptLoop) {
    let id = run.shared.next_connection.fetch_add(1, Ordering::Relaxed);
    let peer = link.peer().clone();
    run.shared
        .metrics
        .connections_accepted
        .fetch_add(1, Ordering::Relaxed);
    run.shared.connections.insert(id, peer.clone());
    debug!("Accepted connection {} from {}", id, peer);

    let guard = ConnectionGuard {
        shared: Arc::clone(&run.shared),
        id,
    };
    let messages = run.messages.clone();
    let read_buffer = run.config.read_buffer;
    tokio::spawn(async move {
        handle_connection(link, read_buffer, &messages, &guard.shared.metrics).await;
        drop(guard);
    });
}

/// Removes a connection from the live table when its task ends.
struct ConnectionGuard {
    shared: Arc<Shared>,
    id: u64,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.shared.connections.remove(&self.id);
    }
}
