//! BlueZ radio (Linux).
//!
//! Talks to `bluetoothd` over D-Bus through `bluer`. BlueZ runs one
//! discovery session per adapter covering both transports, so the two
//! sub-scans share a single background discovery task and devices are
//! routed by address type: BR/EDR devices become inquiry results, LE
//! devices become advertisement reports.
//!
//! Bond-state signals come from a watcher on every known device's `Paired`
//! property, so pairings started by the remote side or by another process
//! are reported as well as our own.

use super::{
    Acceptor, AdvertisementReport, BondStateChanged, InquiryEvent, Link, Radio, RadioError,
    StreamLink,
};
use async_trait::async_trait;
use bluer::rfcomm::{Listener, SocketAddr, Stream};
use bluer::{AdapterEvent, AddressType, DeviceEvent, DeviceProperty};
use futures::stream::{BoxStream, SelectAll};
use futures::StreamExt;
use nearlink_core::{fallback_name, PlatformBondState};
use nearlink_types::{BtAddress, DeviceRecord, DeviceStatus, ServiceId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const BOND_EVENT_CAPACITY: usize = 32;

#[derive(Default)]
struct Discovery {
    task: Option<JoinHandle<()>>,
    le_tx: Option<mpsc::UnboundedSender<AdvertisementReport>>,
    inquiry_tx: Option<mpsc::UnboundedSender<InquiryEvent>>,
}

/// Radio backed by the default BlueZ adapter.
pub struct BluezRadio {
    adapter: bluer::Adapter,
    _session: bluer::Session,
    discovery: Arc<Mutex<Discovery>>,
    bond_events: broadcast::Sender<BondStateChanged>,
    bond_watch: JoinHandle<()>,
}

impl BluezRadio {
    /// Connect to `bluetoothd` and use its default adapter.
    pub async fn new() -> Result<Self, RadioError> {
        let session = bluer::Session::new().await.map_err(platform)?;
        let adapter = session.default_adapter().await.map_err(platform)?;
        info!("Using Bluetooth adapter {}", adapter.name());
        let (bond_events, _) = broadcast::channel(BOND_EVENT_CAPACITY);
        let bond_watch = tokio::spawn(watch_bonds(adapter.clone(), bond_events.clone()));
        Ok(Self {
            adapter,
            _session: session,
            discovery: Arc::new(Mutex::new(Discovery::default())),
            bond_events,
            bond_watch,
        })
    }

    fn discovery(&self) -> MutexGuard<'_, Discovery> {
        self.discovery.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_discovery_task(&self, discovery: &mut Discovery) {
        if discovery.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        let adapter = self.adapter.clone();
        let shared = Arc::clone(&self.discovery);
        discovery.task = Some(tokio::spawn(run_discovery(adapter, shared)));
    }

    fn stop_discovery_if_idle(discovery: &mut Discovery) {
        if discovery.le_tx.is_none() && discovery.inquiry_tx.is_none() {
            if let Some(task) = discovery.task.take() {
                // Dropping the event stream ends the BlueZ discovery session.
                task.abort();
            }
        }
    }

    fn device(&self, address: &BtAddress) -> Result<bluer::Device, RadioError> {
        self.adapter.device(parse_address(address)?).map_err(platform)
    }
}

impl Drop for BluezRadio {
    fn drop(&mut self) {
        self.bond_watch.abort();
    }
}

type DeviceEvents = BoxStream<'static, (bluer::Address, DeviceEvent)>;

/// Forward `Paired` property changes of every device as bond signals.
async fn watch_bonds(adapter: bluer::Adapter, events: broadcast::Sender<BondStateChanged>) {
    let adapter_events = match adapter.events().await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("BlueZ adapter events unavailable, bond signals limited: {}", e);
            return;
        }
    };
    futures::pin_mut!(adapter_events);
    let mut devices: SelectAll<DeviceEvents> = SelectAll::new();
    let mut watched = HashSet::new();

    match adapter.device_addresses().await {
        Ok(known) => {
            for addr in known {
                watch_device(&adapter, addr, &mut devices, &mut watched).await;
            }
        }
        Err(e) => warn!("Listing BlueZ devices failed: {}", e),
    }

    loop {
        tokio::select! {
            Some(event) = adapter_events.next() => match event {
                AdapterEvent::DeviceAdded(addr) => {
                    watch_device(&adapter, addr, &mut devices, &mut watched).await;
                }
                AdapterEvent::DeviceRemoved(addr) => {
                    watched.remove(&addr);
                }
                _ => {}
            },
            Some((addr, event)) = devices.next() => {
                if let DeviceEvent::PropertyChanged(DeviceProperty::Paired(paired)) = event {
                    let state = paired_state(paired);
                    debug!("Bond state of {} is now {:?}", addr, state);
                    let _ = events.send(BondStateChanged {
                        address: BtAddress::new(addr.to_string()),
                        state,
                    });
                }
            }
            else => break,
        }
    }
}

/// BlueZ exposes only the `Paired` flag; a ceremony in flight reads `false`.
fn paired_state(paired: bool) -> PlatformBondState {
    if paired {
        PlatformBondState::Bonded
    } else {
        PlatformBondState::None
    }
}

async fn watch_device(
    adapter: &bluer::Adapter,
    addr: bluer::Address,
    devices: &mut SelectAll<DeviceEvents>,
    watched: &mut HashSet<bluer::Address>,
) {
    if !watched.insert(addr) {
        return;
    }
    let stream = match adapter.device(addr) {
        Ok(device) => device.events().await,
        Err(e) => Err(e),
    };
    match stream {
        Ok(stream) => devices.push(stream.map(move |event| (addr, event)).boxed()),
        Err(e) => {
            watched.remove(&addr);
            debug!("Cannot watch {}: {}", addr, e);
        }
    }
}

async fn run_discovery(adapter: bluer::Adapter, shared: Arc<Mutex<Discovery>>) {
    let events = match adapter.discover_devices().await {
        Ok(events) => events,
        Err(e) => {
            warn!("BlueZ discovery failed to start: {}", e);
            return;
        }
    };
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        let AdapterEvent::DeviceAdded(addr) = event else {
            continue;
        };
        let Ok(device) = adapter.device(addr) else {
            continue;
        };
        let address = BtAddress::new(addr.to_string());
        let name = device.name().await.ok().flatten();
        let classic = matches!(device.address_type().await, Ok(AddressType::BrEdr));

        let wants_advertisement = {
            let channels = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if classic {
                if let Some(tx) = &channels.inquiry_tx {
                    let _ = tx.send(InquiryEvent::Found {
                        address: address.clone(),
                        name: name.clone(),
                    });
                }
                false
            } else {
                channels.le_tx.is_some()
            }
        };
        if wants_advertisement {
            let data = device
                .advertising_data()
                .await
                .ok()
                .flatten()
                .map(encode_advertising_data);
            let channels = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx) = &channels.le_tx {
                let _ = tx.send(AdvertisementReport {
                    address,
                    name,
                    data,
                });
            }
        }
    }

    let channels = shared.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(tx) = &channels.inquiry_tx {
        let _ = tx.send(InquiryEvent::Finished);
    }
}

/// Rebuild length-prefixed AD structures from BlueZ's type-keyed map.
fn encode_advertising_data(fields: HashMap<u8, Vec<u8>>) -> Vec<u8> {
    let mut types: Vec<_> = fields.keys().copied().collect();
    types.sort_unstable();
    let mut out = Vec::new();
    for ad_type in types {
        let data = &fields[&ad_type];
        if data.len() > 254 {
            continue;
        }
        out.push(data.len() as u8 + 1);
        out.push(ad_type);
        out.extend_from_slice(data);
    }
    out
}

fn parse_address(address: &BtAddress) -> Result<bluer::Address, RadioError> {
    address
        .as_str()
        .parse()
        .map_err(|_| RadioError::Platform(format!("invalid address {address}")))
}

fn platform(e: bluer::Error) -> RadioError {
    RadioError::Platform(e.to_string())
}

#[async_trait]
impl Radio for BluezRadio {
    async fn is_enabled(&self) -> Result<bool, RadioError> {
        self.adapter.is_powered().await.map_err(platform)
    }

    async fn cancel_discovery(&self) -> Result<(), RadioError> {
        // BlueZ keeps one discovery session per D-Bus client; ours is the
        // only one we can end.
        let mut discovery = self.discovery();
        discovery.le_tx = None;
        discovery.inquiry_tx = None;
        Self::stop_discovery_if_idle(&mut discovery);
        Ok(())
    }

    async fn local_name(&self) -> Result<String, RadioError> {
        self.adapter.alias().await.map_err(platform)
    }

    async fn set_local_name(&self, name: &str) -> Result<(), RadioError> {
        self.adapter
            .set_alias(name.to_string())
            .await
            .map_err(platform)
    }

    async fn start_le_scan(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<AdvertisementReport>, RadioError> {
        if !self.is_enabled().await? {
            return Err(RadioError::Unavailable);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut discovery = self.discovery();
        discovery.le_tx = Some(tx);
        self.ensure_discovery_task(&mut discovery);
        debug!("LE scan started");
        Ok(rx)
    }

    async fn stop_le_scan(&self) -> Result<(), RadioError> {
        let mut discovery = self.discovery();
        discovery.le_tx = None;
        Self::stop_discovery_if_idle(&mut discovery);
        Ok(())
    }

    async fn start_inquiry(&self) -> Result<mpsc::UnboundedReceiver<InquiryEvent>, RadioError> {
        if !self.is_enabled().await? {
            return Err(RadioError::Unavailable);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut discovery = self.discovery();
        discovery.inquiry_tx = Some(tx);
        self.ensure_discovery_task(&mut discovery);
        debug!("Inquiry started");
        Ok(rx)
    }

    async fn stop_inquiry(&self) -> Result<(), RadioError> {
        let mut discovery = self.discovery();
        discovery.inquiry_tx = None;
        Self::stop_discovery_if_idle(&mut discovery);
        Ok(())
    }

    async fn bond_state(&self, address: &BtAddress) -> Result<PlatformBondState, RadioError> {
        let paired = self.device(address)?.is_paired().await.map_err(platform)?;
        Ok(paired_state(paired))
    }

    async fn bonded_devices(&self) -> Result<Vec<DeviceRecord>, RadioError> {
        if !self.is_enabled().await? {
            return Err(RadioError::Unavailable);
        }
        let mut records = Vec::new();
        for addr in self.adapter.device_addresses().await.map_err(platform)? {
            let device = self.adapter.device(addr).map_err(platform)?;
            if !device.is_paired().await.map_err(platform)? {
                continue;
            }
            let address = BtAddress::new(addr.to_string());
            let name = device
                .name()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| fallback_name(&address));
            records.push(DeviceRecord {
                name,
                address,
                status: DeviceStatus::Paired,
            });
        }
        Ok(records)
    }

    fn subscribe_bond_events(&self) -> broadcast::Receiver<BondStateChanged> {
        self.bond_events.subscribe()
    }

    async fn create_bond(&self, address: &BtAddress) -> Result<(), RadioError> {
        let device = self
            .device(address)
            .map_err(|e| RadioError::Bond(e.to_string()))?;
        let events = self.bond_events.clone();
        let address = address.clone();

        let _ = events.send(BondStateChanged {
            address: address.clone(),
            state: PlatformBondState::Bonding,
        });
        // The `Paired` watcher also reports a success. A failed ceremony
        // leaves the property untouched and is only reported here.
        tokio::spawn(async move {
            let state = match device.pair().await {
                Ok(()) => PlatformBondState::Bonded,
                Err(e) => {
                    warn!("Pairing with {} failed: {}", address, e);
                    PlatformBondState::None
                }
            };
            let _ = events.send(BondStateChanged { address, state });
        });
        Ok(())
    }

    async fn connect(
        &self,
        address: &BtAddress,
        service: ServiceId,
    ) -> Result<Box<dyn Link>, RadioError> {
        let target = SocketAddr::new(parse_address(address)?, service.channel);
        let stream = Stream::connect(target)
            .await
            .map_err(|e| RadioError::ConnectionFailed(e.to_string()))?;
        Ok(Box::new(StreamLink::new(address.clone(), stream)))
    }

    async fn listen(&self, service: ServiceId) -> Result<Box<dyn Acceptor>, RadioError> {
        let local = SocketAddr::new(bluer::Address::any(), service.channel);
        let listener = Listener::bind(local)
            .await
            .map_err(|e| RadioError::BindFailed(e.to_string()))?;
        info!("RFCOMM listening on channel {}", service.channel);
        Ok(Box::new(BluezAcceptor {
            listener: Some(listener),
        }))
    }
}

struct BluezAcceptor {
    listener: Option<Listener>,
}

#[async_trait]
impl Acceptor for BluezAcceptor {
    async fn accept(&mut self) -> Result<Box<dyn Link>, RadioError> {
        let listener = self.listener.as_ref().ok_or(RadioError::ConnectionClosed)?;
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| RadioError::AcceptFailed(e.to_string()))?;
        let peer = BtAddress::new(peer.addr.to_string());
        Ok(Box::new(StreamLink::new(peer, stream)))
    }

    async fn close(&mut self) -> Result<(), RadioError> {
        self.listener = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertising_data_reencodes_as_ad_structures() {
        let mut fields = HashMap::new();
        fields.insert(0x09, b"Buds".to_vec());
        fields.insert(0x01, vec![0x06]);

        let bytes = encode_advertising_data(fields);

        assert_eq!(bytes, vec![0x02, 0x01, 0x06, 0x05, 0x09, b'B', b'u', b'd', b's']);
        assert_eq!(
            nearlink_core::parse_advertised_name(&bytes).as_deref(),
            Some("Buds")
        );
    }

    #[test]
    fn paired_flag_maps_to_terminal_states() {
        assert_eq!(paired_state(true), PlatformBondState::Bonded);
        assert_eq!(paired_state(false), PlatformBondState::None);
    }

    #[test]
    fn address_parse_rejects_garbage() {
        assert!(parse_address(&BtAddress::new("nope")).is_err());
        assert!(parse_address(&BtAddress::new("AA:BB:CC:DD:EE:FF")).is_ok());
    }
}
