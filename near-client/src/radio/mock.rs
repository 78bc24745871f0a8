//! Mock radio for testing.
//!
//! [`MockAir`] is the shared medium: every [`MockRadio`] created on the same
//! air can connect to listeners bound by the others. Scripted discovery
//! results, bond signals and forced failures let tests drive each component
//! without hardware.

use super::{
    Acceptor, AdvertisementReport, BondStateChanged, InquiryEvent, Link, Radio, RadioError,
    StreamLink,
};
use async_trait::async_trait;
use nearlink_core::{fallback_name, PlatformBondState};
use nearlink_types::{BtAddress, DeviceRecord, DeviceStatus, ServiceId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::DuplexStream;
use tokio::sync::{broadcast, mpsc};

/// In-memory pipe capacity per link direction.
const LINK_CAPACITY: usize = 4096;

/// Capacity of the bond-state-changed broadcast.
const BOND_EVENT_CAPACITY: usize = 32;

type Incoming = (BtAddress, DuplexStream);

/// Shared medium connecting mock radios.
#[derive(Debug, Default, Clone)]
pub struct MockAir {
    listeners: Arc<Mutex<HashMap<(BtAddress, ServiceId), mpsc::UnboundedSender<Incoming>>>>,
}

impl MockAir {
    /// Create an empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a listener is bound for `service` on `address`.
    pub fn is_listening(&self, address: &BtAddress, service: ServiceId) -> bool {
        self.lock().contains_key(&(address.clone(), service))
    }

    fn lock(
        &self,
    ) -> MutexGuard<'_, HashMap<(BtAddress, ServiceId), mpsc::UnboundedSender<Incoming>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bind(
        &self,
        address: &BtAddress,
        service: ServiceId,
    ) -> Result<(mpsc::UnboundedSender<Incoming>, mpsc::UnboundedReceiver<Incoming>), RadioError>
    {
        let mut listeners = self.lock();
        let key = (address.clone(), service);
        if listeners.get(&key).is_some_and(|tx| !tx.is_closed()) {
            return Err(RadioError::BindFailed(format!("{service} already bound")));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        listeners.insert(key, tx.clone());
        Ok((tx, rx))
    }

    fn unbind(
        &self,
        address: &BtAddress,
        service: ServiceId,
        ours: &mpsc::UnboundedSender<Incoming>,
    ) {
        let mut listeners = self.lock();
        let key = (address.clone(), service);
        if listeners.get(&key).is_some_and(|tx| tx.same_channel(ours)) {
            listeners.remove(&key);
        }
    }

    fn dial(
        &self,
        address: &BtAddress,
        service: ServiceId,
    ) -> Option<mpsc::UnboundedSender<Incoming>> {
        self.lock().get(&(address.clone(), service)).cloned()
    }
}

/// Mock radio for testing.
///
/// Clones share state, so a test can keep a handle for inspection while a
/// component owns another.
#[derive(Debug)]
pub struct MockRadio {
    address: BtAddress,
    air: MockAir,
    inner: Arc<Mutex<MockRadioInner>>,
    bond_events: broadcast::Sender<BondStateChanged>,
}

#[derive(Debug)]
struct MockRadioInner {
    enabled: bool,
    local_name: String,

    /// Names learned from scripted discovery, for the bonded list.
    names: HashMap<BtAddress, String>,
    advertisements: Vec<AdvertisementReport>,
    inquiry_results: Vec<InquiryEvent>,
    le_tx: Option<mpsc::UnboundedSender<AdvertisementReport>>,
    inquiry_tx: Option<mpsc::UnboundedSender<InquiryEvent>>,
    le_scans_started: u32,
    le_scans_stopped: u32,
    inquiries_started: u32,
    inquiries_stopped: u32,
    discovery_cancels: u32,
    fail_next_le_scan: Option<String>,
    fail_next_inquiry: Option<String>,

    bond_states: HashMap<BtAddress, PlatformBondState>,
    bond_scripts: HashMap<BtAddress, Vec<PlatformBondState>>,
    bond_requests: Vec<BtAddress>,
    fail_next_bond_request: Option<String>,

    connect_attempts: Vec<BtAddress>,
    unresponsive: HashSet<BtAddress>,
    fail_next_listen: Option<String>,
    next_accept_error: Option<RadioError>,
    links_closed: u32,
}

impl MockRadio {
    /// Create an enabled radio with `address` on `air`.
    pub fn new(air: MockAir, address: impl Into<String>) -> Self {
        let address = BtAddress::new(address);
        let (bond_events, _) = broadcast::channel(BOND_EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(MockRadioInner {
                enabled: true,
                local_name: format!("mock-{}", address.suffix(5)),
                names: HashMap::new(),
                advertisements: Vec::new(),
                inquiry_results: Vec::new(),
                le_tx: None,
                inquiry_tx: None,
                le_scans_started: 0,
                le_scans_stopped: 0,
                inquiries_started: 0,
                inquiries_stopped: 0,
                discovery_cancels: 0,
                fail_next_le_scan: None,
                fail_next_inquiry: None,
                bond_states: HashMap::new(),
                bond_scripts: HashMap::new(),
                bond_requests: Vec::new(),
                fail_next_bond_request: None,
                connect_attempts: Vec::new(),
                unresponsive: HashSet::new(),
                fail_next_listen: None,
                next_accept_error: None,
                links_closed: 0,
            })),
            address,
            air,
            bond_events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockRadioInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// This radio's own address.
    pub fn address(&self) -> &BtAddress {
        &self.address
    }

    /// Power the adapter on or off.
    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    // ===========================================
    // Discovery scripting
    // ===========================================

    /// Advertisement replayed every time the LE scan starts.
    pub fn add_advertisement(&self, report: AdvertisementReport) {
        let mut inner = self.lock();
        if let Some(name) = &report.name {
            inner.names.insert(report.address.clone(), name.clone());
        }
        inner.advertisements.push(report);
    }

    /// Inquiry event replayed every time inquiry starts.
    pub fn add_inquiry_event(&self, event: InquiryEvent) {
        let mut inner = self.lock();
        if let InquiryEvent::Found {
            address,
            name: Some(name),
        } = &event
        {
            inner.names.insert(address.clone(), name.clone());
        }
        inner.inquiry_results.push(event);
    }

    /// Deliver an advertisement to a running LE scan. Returns false if none runs.
    pub fn emit_advertisement(&self, report: AdvertisementReport) -> bool {
        let inner = self.lock();
        inner
            .le_tx
            .as_ref()
            .is_some_and(|tx| tx.send(report).is_ok())
    }

    /// Deliver an inquiry event to a running inquiry. Returns false if none runs.
    pub fn emit_inquiry_event(&self, event: InquiryEvent) -> bool {
        let inner = self.lock();
        inner
            .inquiry_tx
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Cause the next LE scan start to fail.
    pub fn fail_next_le_scan(&self, error: &str) {
        self.lock().fail_next_le_scan = Some(error.to_string());
    }

    /// Cause the next inquiry start to fail.
    pub fn fail_next_inquiry(&self, error: &str) {
        self.lock().fail_next_inquiry = Some(error.to_string());
    }

    /// Whether either sub-scan is currently running.
    pub fn is_scanning(&self) -> bool {
        let inner = self.lock();
        inner.le_tx.is_some() || inner.inquiry_tx.is_some()
    }

    /// `(started, stopped)` counts for the LE scan.
    pub fn le_scan_counts(&self) -> (u32, u32) {
        let inner = self.lock();
        (inner.le_scans_started, inner.le_scans_stopped)
    }

    /// `(started, stopped)` counts for inquiry.
    pub fn inquiry_counts(&self) -> (u32, u32) {
        let inner = self.lock();
        (inner.inquiries_started, inner.inquiries_stopped)
    }

    /// Number of platform-level discovery cancels.
    pub fn discovery_cancels(&self) -> u32 {
        self.lock().discovery_cancels
    }

    // ===========================================
    // Bond scripting
    // ===========================================

    /// Set the current bond state of `address`.
    pub fn set_bond_state(&self, address: &BtAddress, state: PlatformBondState) {
        self.lock().bond_states.insert(address.clone(), state);
    }

    /// Signals emitted when bonding with `address` is requested.
    ///
    /// Without a script a request emits `Bonding` then `Bonded`. An empty
    /// script emits nothing, so the attempt never settles.
    pub fn script_bond(&self, address: &BtAddress, states: Vec<PlatformBondState>) {
        self.lock().bond_scripts.insert(address.clone(), states);
    }

    /// Emit a bond-state-changed signal now.
    pub fn emit_bond_state(&self, address: &BtAddress, state: PlatformBondState) {
        self.lock().bond_states.insert(address.clone(), state);
        // No subscribers is fine.
        let _ = self.bond_events.send(BondStateChanged {
            address: address.clone(),
            state,
        });
    }

    /// Cause the next bond request to be refused.
    pub fn fail_next_bond_request(&self, error: &str) {
        self.lock().fail_next_bond_request = Some(error.to_string());
    }

    /// Addresses bonding was requested for, in order.
    pub fn bond_requests(&self) -> Vec<BtAddress> {
        self.lock().bond_requests.clone()
    }

    // ===========================================
    // Socket scripting
    // ===========================================

    /// Make connects to `address` hang until the caller gives up.
    pub fn set_unresponsive(&self, address: &BtAddress) {
        self.lock().unresponsive.insert(address.clone());
    }

    /// Addresses connects were attempted to, in order.
    pub fn connect_attempts(&self) -> Vec<BtAddress> {
        self.lock().connect_attempts.clone()
    }

    /// Cause the next listen to fail.
    pub fn fail_next_listen(&self, error: &str) {
        self.lock().fail_next_listen = Some(error.to_string());
    }

    /// Cause the next accept to fail.
    pub fn fail_next_accept(&self, error: &str) {
        self.lock().next_accept_error = Some(RadioError::AcceptFailed(error.to_string()));
    }

    /// Make the next accept report the listening socket as closed, as when
    /// the platform tears it down.
    pub fn close_next_accept(&self) {
        self.lock().next_accept_error = Some(RadioError::ConnectionClosed);
    }

    /// Outbound links this radio opened and then closed.
    pub fn links_closed(&self) -> u32 {
        self.lock().links_closed
    }
}

impl Clone for MockRadio {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            air: self.air.clone(),
            inner: Arc::clone(&self.inner),
            bond_events: self.bond_events.clone(),
        }
    }
}

#[async_trait]
impl Radio for MockRadio {
    async fn is_enabled(&self) -> Result<bool, RadioError> {
        Ok(self.lock().enabled)
    }

    async fn cancel_discovery(&self) -> Result<(), RadioError> {
        let mut inner = self.lock();
        inner.discovery_cancels += 1;
        // Platform cancel ends classic inquiry only.
        if inner.inquiry_tx.take().is_some() {
            inner.inquiries_stopped += 1;
        }
        Ok(())
    }

    async fn local_name(&self) -> Result<String, RadioError> {
        Ok(self.lock().local_name.clone())
    }

    async fn set_local_name(&self, name: &str) -> Result<(), RadioError> {
        self.lock().local_name = name.to_string();
        Ok(())
    }

    async fn start_le_scan(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<AdvertisementReport>, RadioError> {
        let mut inner = self.lock();
        if !inner.enabled {
            return Err(RadioError::Unavailable);
        }
        if let Some(error) = inner.fail_next_le_scan.take() {
            return Err(RadioError::Scan(error));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        for report in &inner.advertisements {
            let _ = tx.send(report.clone());
        }
        inner.le_tx = Some(tx);
        inner.le_scans_started += 1;
        Ok(rx)
    }

    async fn stop_le_scan(&self) -> Result<(), RadioError> {
        let mut inner = self.lock();
        if inner.le_tx.take().is_some() {
            inner.le_scans_stopped += 1;
        }
        Ok(())
    }

    async fn start_inquiry(&self) -> Result<mpsc::UnboundedReceiver<InquiryEvent>, RadioError> {
        let mut inner = self.lock();
        if !inner.enabled {
            return Err(RadioError::Unavailable);
        }
        if let Some(error) = inner.fail_next_inquiry.take() {
            return Err(RadioError::Scan(error));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        for event in &inner.inquiry_results {
            let _ = tx.send(event.clone());
        }
        inner.inquiry_tx = Some(tx);
        inner.inquiries_started += 1;
        Ok(rx)
    }

    async fn stop_inquiry(&self) -> Result<(), RadioError> {
        let mut inner = self.lock();
        if inner.inquiry_tx.take().is_some() {
            inner.inquiries_stopped += 1;
        }
        Ok(())
    }

    async fn bond_state(&self, address: &BtAddress) -> Result<PlatformBondState, RadioError> {
        Ok(self
            .lock()
            .bond_states
            .get(address)
            .copied()
            .unwrap_or(PlatformBondState::None))
    }

    async fn bonded_devices(&self) -> Result<Vec<DeviceRecord>, RadioError> {
        let inner = self.lock();
        if !inner.enabled {
            return Err(RadioError::Unavailable);
        }
        let mut records: Vec<DeviceRecord> = inner
            .bond_states
            .iter()
            .filter(|(_, state)| **state == PlatformBondState::Bonded)
            .map(|(address, _)| {
                let name = inner
                    .names
                    .get(address)
                    .cloned()
                    .unwrap_or_else(|| fallback_name(address));
                DeviceRecord {
                    name,
                    address: address.clone(),
                    status: DeviceStatus::Paired,
                }
            })
            .collect();
        records.sort_by(|a, b| a.address.as_str().cmp(b.address.as_str()));
        Ok(records)
    }

    fn subscribe_bond_events(&self) -> broadcast::Receiver<BondStateChanged> {
        self.bond_events.subscribe()
    }

    async fn create_bond(&self, address: &BtAddress) -> Result<(), RadioError> {
        let script = {
            let mut inner = self.lock();
            if !inner.enabled {
                return Err(RadioError::Unavailable);
            }
            inner.bond_requests.push(address.clone());
            if let Some(error) = inner.fail_next_bond_request.take() {
                return Err(RadioError::Bond(error));
            }
            inner
                .bond_scripts
                .remove(address)
                .unwrap_or_else(|| vec![PlatformBondState::Bonding, PlatformBondState::Bonded])
        };
        for state in script {
            self.emit_bond_state(address, state);
        }
        Ok(())
    }

    async fn connect(
        &self,
        address: &BtAddress,
        service: ServiceId,
    ) -> Result<Box<dyn Link>, RadioError> {
        let hang = {
            let mut inner = self.lock();
            inner.connect_attempts.push(address.clone());
            if !inner.enabled {
                return Err(RadioError::Unavailable);
            }
            inner.unresponsive.contains(address)
        };
        if hang {
            std::future::pending::<()>().await;
        }

        let listener = self
            .air
            .dial(address, service)
            .ok_or_else(|| RadioError::ConnectionFailed(format!("no listener on {address}")))?;
        let (local, remote) = tokio::io::duplex(LINK_CAPACITY);
        listener
            .send((self.address.clone(), remote))
            .map_err(|_| RadioError::ConnectionFailed(format!("{address} stopped listening")))?;
        Ok(Box::new(MockLink {
            link: StreamLink::new(address.clone(), local),
            radio: Arc::clone(&self.inner),
            closed: false,
        }))
    }

    async fn listen(&self, service: ServiceId) -> Result<Box<dyn Acceptor>, RadioError> {
        {
            let mut inner = self.lock();
            if !inner.enabled {
                return Err(RadioError::Unavailable);
            }
            if let Some(error) = inner.fail_next_listen.take() {
                return Err(RadioError::BindFailed(error));
            }
        }
        let (tx, rx) = self.air.bind(&self.address, service)?;
        Ok(Box::new(MockAcceptor {
            address: self.address.clone(),
            service,
            air: self.air.clone(),
            radio: Arc::clone(&self.inner),
            tx,
            rx,
            closed: false,
        }))
    }
}

/// Outbound link that records its close on the owning radio.
struct MockLink {
    link: StreamLink<DuplexStream>,
    radio: Arc<Mutex<MockRadioInner>>,
    closed: bool,
}

#[async_trait]
impl Link for MockLink {
    fn peer(&self) -> &BtAddress {
        self.link.peer()
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        self.link.read(buf).await
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.link.write_all(data).await
    }

    async fn flush(&mut self) -> Result<(), RadioError> {
        self.link.flush().await
    }

    async fn close(&mut self) -> Result<(), RadioError> {
        if !self.closed {
            self.closed = true;
            self.radio
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .links_closed += 1;
        }
        self.link.close().await
    }
}

struct MockAcceptor {
    address: BtAddress,
    service: ServiceId,
    air: MockAir,
    radio: Arc<Mutex<MockRadioInner>>,
    tx: mpsc::UnboundedSender<Incoming>,
    rx: mpsc::UnboundedReceiver<Incoming>,
    closed: bool,
}

#[async_trait]
impl Acceptor for MockAcceptor {
    async fn accept(&mut self) -> Result<Box<dyn Link>, RadioError> {
        if self.closed {
            return Err(RadioError::ConnectionClosed);
        }
        let forced = self
            .radio
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_accept_error
            .take();
        if let Some(error) = forced {
            return Err(error);
        }
        match self.rx.recv().await {
            Some((peer, stream)) => Ok(Box::new(StreamLink::new(peer, stream))),
            None => Err(RadioError::ConnectionClosed),
        }
    }

    async fn close(&mut self) -> Result<(), RadioError> {
        if !self.closed {
            self.closed = true;
            self.air.unbind(&self.address, self.service, &self.tx);
            self.rx.close();
        }
        Ok(())
    }
}

impl Drop for MockAcceptor {
    fn drop(&mut self) {
        self.air.unbind(&self.address, self.service, &self.tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (MockRadio, MockRadio) {
        let air = MockAir::new();
        (
            MockRadio::new(air.clone(), "AA:AA:AA:AA:AA:01"),
            MockRadio::new(air, "AA:AA:AA:AA:AA:02"),
        )
    }

    // ===========================================
    // Discovery
    // ===========================================

    #[tokio::test]
    async fn scripted_advertisements_replay_on_start() {
        let (radio, _) = pair();
        radio.add_advertisement(AdvertisementReport {
            address: BtAddress::new("11:11:11:11:11:11"),
            name: Some("Watch".into()),
            data: None,
        });

        let mut rx = radio.start_le_scan().await.unwrap();
        let report = rx.recv().await.unwrap();
        assert_eq!(report.name.as_deref(), Some("Watch"));
        assert!(radio.is_scanning());

        radio.stop_le_scan().await.unwrap();
        assert!(rx.recv().await.is_none());
        assert_eq!(radio.le_scan_counts(), (1, 1));
    }

    #[tokio::test]
    async fn emit_reaches_running_scan_only() {
        let (radio, _) = pair();
        assert!(!radio.emit_inquiry_event(InquiryEvent::Finished));

        let mut rx = radio.start_inquiry().await.unwrap();
        assert!(radio.emit_inquiry_event(InquiryEvent::Finished));
        assert_eq!(rx.recv().await, Some(InquiryEvent::Finished));
    }

    #[tokio::test]
    async fn disabled_radio_refuses_scans() {
        let (radio, _) = pair();
        radio.set_enabled(false);
        assert!(matches!(
            radio.start_le_scan().await,
            Err(RadioError::Unavailable)
        ));
        assert!(!radio.is_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn platform_cancel_stops_inquiry() {
        let (radio, _) = pair();
        let _rx = radio.start_inquiry().await.unwrap();
        radio.cancel_discovery().await.unwrap();
        assert_eq!(radio.inquiry_counts(), (1, 1));
        assert_eq!(radio.discovery_cancels(), 1);
    }

    // ===========================================
    // Bonding
    // ===========================================

    #[tokio::test]
    async fn create_bond_emits_default_script() {
        let (radio, _) = pair();
        let peer = BtAddress::new("11:11:11:11:11:11");
        let mut events = radio.subscribe_bond_events();

        radio.create_bond(&peer).await.unwrap();

        assert_eq!(events.recv().await.unwrap().state, PlatformBondState::Bonding);
        assert_eq!(events.recv().await.unwrap().state, PlatformBondState::Bonded);
        assert_eq!(
            radio.bond_state(&peer).await.unwrap(),
            PlatformBondState::Bonded
        );
        assert_eq!(radio.bond_requests(), vec![peer]);
    }

    #[tokio::test]
    async fn bonded_devices_lists_bonded_only() {
        let (radio, _) = pair();
        let watch = BtAddress::new("11:11:11:11:11:11");
        let buds = BtAddress::new("22:22:22:22:22:22");
        radio.add_advertisement(AdvertisementReport {
            address: watch.clone(),
            name: Some("Watch".into()),
            data: None,
        });
        radio.set_bond_state(&watch, PlatformBondState::Bonded);
        radio.set_bond_state(&buds, PlatformBondState::Bonded);
        radio.set_bond_state(&BtAddress::new("33:33:33:33:33:33"), PlatformBondState::Bonding);

        let bonded = radio.bonded_devices().await.unwrap();

        assert_eq!(bonded.len(), 2);
        assert_eq!(bonded[0].name, "Watch");
        assert_eq!(bonded[1].name, "Unknown Device (22:22)");
        assert!(bonded.iter().all(|d| d.status == DeviceStatus::Paired));
    }

    #[tokio::test]
    async fn forced_bond_failure() {
        let (radio, _) = pair();
        radio.fail_next_bond_request("busy");
        let result = radio.create_bond(&BtAddress::new("11")).await;
        assert!(matches!(result, Err(RadioError::Bond(e)) if e == "busy"));
    }

    // ===========================================
    // Sockets
    // ===========================================

    #[tokio::test]
    async fn connect_reaches_listener_on_same_air() {
        let (a, b) = pair();
        let mut acceptor = b.listen(ServiceId::default()).await.unwrap();

        let mut outbound = a
            .connect(b.address(), ServiceId::default())
            .await
            .unwrap();
        outbound.write_all(b"PING").await.unwrap();

        let mut inbound = acceptor.accept().await.unwrap();
        assert_eq!(inbound.peer(), a.address());
        let mut buf = [0u8; 16];
        let n = inbound.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"PING");
    }

    #[tokio::test]
    async fn connect_without_listener_fails() {
        let (a, b) = pair();
        let result = a.connect(b.address(), ServiceId::default()).await;
        assert!(matches!(result, Err(RadioError::ConnectionFailed(_))));
        assert_eq!(a.connect_attempts(), vec![b.address().clone()]);
    }

    #[tokio::test]
    async fn double_bind_fails_until_closed() {
        let (_, b) = pair();
        let mut first = b.listen(ServiceId::default()).await.unwrap();
        assert!(matches!(
            b.listen(ServiceId::default()).await,
            Err(RadioError::BindFailed(_))
        ));

        first.close().await.unwrap();
        assert!(b.listen(ServiceId::default()).await.is_ok());
    }

    #[tokio::test]
    async fn dropping_acceptor_unbinds() {
        let (a, b) = pair();
        let acceptor = b.listen(ServiceId::default()).await.unwrap();
        drop(acceptor);
        assert!(!a.air.is_listening(b.address(), ServiceId::default()));
    }

    #[tokio::test]
    async fn closing_outbound_link_is_recorded_once() {
        let (a, b) = pair();
        let _acceptor = b.listen(ServiceId::default()).await.unwrap();
        let mut link = a.connect(b.address(), ServiceId::default()).await.unwrap();

        link.close().await.unwrap();
        link.close().await.unwrap();

        assert_eq!(a.links_closed(), 1);
    }

    #[tokio::test]
    async fn closed_next_accept_reports_connection_closed() {
        let (_, b) = pair();
        let mut acceptor = b.listen(ServiceId::default()).await.unwrap();
        b.close_next_accept();
        assert!(matches!(
            acceptor.accept().await,
            Err(RadioError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn forced_accept_failure() {
        let (_, b) = pair();
        let mut acceptor = b.listen(ServiceId::default()).await.unwrap();
        b.fail_next_accept("reset");
        assert!(matches!(
            acceptor.accept().await,
            Err(RadioError::AcceptFailed(_))
        ));
    }
}
