//! Radio abstraction for nearlink.
//!
//! This module provides a pluggable radio layer that abstracts the platform
//! Bluetooth stack (BlueZ, in-memory mock for testing).
//!
//! # Design
//!
//! [`Radio`] covers everything nearlink asks of the platform:
//! - adapter queries (`is_enabled`, `cancel_discovery`, local name)
//! - the two discovery sub-scans, each handed back as a channel receiver
//! - bond state, the bonded-device list, bond-state-changed signals and
//!   bond requests
//! - connection-oriented sockets: `connect()` yields a [`Link`],
//!   `listen()` yields an [`Acceptor`]
//!
//! # Example
//!
//! ```ignore
//! let radio = MockRadio::new(MockAir::new(), "AA:BB:CC:DD:EE:01");
//! let mut link = radio.connect(&peer, ServiceId::default()).await?;
//! link.write_all(b"PING").await?;
//! link.close().await?;
//! ```

mod mock;

#[cfg(feature = "bluez")]
mod bluez;

pub use mock::{MockAir, MockRadio};

#[cfg(feature = "bluez")]
pub use bluez::BluezRadio;

use async_trait::async_trait;
use nearlink_core::PlatformBondState;
use nearlink_types::{BtAddress, DeviceRecord, ServiceId};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};

/// Radio errors.
#[derive(Debug, Error)]
pub enum RadioError {
    /// Adapter missing or powered off.
    #[error("radio unavailable")]
    Unavailable,

    /// Platform refused or failed a scan operation.
    #[error("scan failed: {0}")]
    Scan(String),

    /// Platform refused a bond request.
    #[error("bond request failed: {0}")]
    Bond(String),

    /// Connection attempt failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Listening socket could not be created.
    #[error("bind failed: {0}")]
    BindFailed(String),

    /// Accepting an inbound connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(String),

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// I/O error on an open link.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Other platform error.
    #[error("platform error: {0}")]
    Platform(String),
}

/// One advertisement seen by the low-energy scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementReport {
    /// Advertiser address.
    pub address: BtAddress,
    /// Name the platform already resolved, if any.
    pub name: Option<String>,
    /// Raw advertisement payload, if the platform exposes it.
    pub data: Option<Vec<u8>>,
}

/// Classic inquiry events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InquiryEvent {
    /// A device answered the inquiry.
    Found {
        /// Device address.
        address: BtAddress,
        /// Name the platform resolved, if any.
        name: Option<String>,
    },
    /// The platform's inquiry cycle ended (informational).
    Finished,
}

/// Platform bond-state-changed signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondStateChanged {
    /// Device the signal is about.
    pub address: BtAddress,
    /// New bond state.
    pub state: PlatformBondState,
}

/// A connected, bidirectional byte stream to one peer.
#[async_trait]
pub trait Link: Send {
    /// Address of the remote end.
    fn peer(&self) -> &BtAddress;

    /// Read up to `buf.len()` bytes. Returns 0 when the peer has closed.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError>;

    /// Write all of `data`.
    async fn write_all(&mut self, data: &[u8]) -> Result<(), RadioError>;

    /// Flush buffered writes.
    async fn flush(&mut self) -> Result<(), RadioError>;

    /// Close the link. Idempotent.
    async fn close(&mut self) -> Result<(), RadioError>;
}

/// A bound listening socket.
#[async_trait]
pub trait Acceptor: Send {
    /// Wait for the next inbound connection.
    async fn accept(&mut self) -> Result<Box<dyn Link>, RadioError>;

    /// Close the listening socket. Idempotent.
    async fn close(&mut self) -> Result<(), RadioError>;
}

/// Platform radio.
///
/// Implementations are shared across components behind an `Arc`.
#[async_trait]
pub trait Radio: Send + Sync + 'static {
    /// Whether the adapter is present and powered.
    async fn is_enabled(&self) -> Result<bool, RadioError>;

    /// Ask the platform to cancel discovery in progress.
    ///
    /// Where the platform runs one discovery per client (BlueZ), only this
    /// radio's own session can be stopped.
    async fn cancel_discovery(&self) -> Result<(), RadioError>;

    /// The adapter's radio-visible name.
    async fn local_name(&self) -> Result<String, RadioError>;

    /// Rename the adapter.
    async fn set_local_name(&self, name: &str) -> Result<(), RadioError>;

    /// Start the low-energy advertisement scan.
    async fn start_le_scan(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<AdvertisementReport>, RadioError>;

    /// Stop the low-energy advertisement scan.
    async fn stop_le_scan(&self) -> Result<(), RadioError>;

    /// Start the classic inquiry scan.
    async fn start_inquiry(&self) -> Result<mpsc::UnboundedReceiver<InquiryEvent>, RadioError>;

    /// Stop the classic inquiry scan.
    async fn stop_inquiry(&self) -> Result<(), RadioError>;

    /// Current bond state of `address`.
    async fn bond_state(&self, address: &BtAddress) -> Result<PlatformBondState, RadioError>;

    /// Devices the platform currently holds a bond with, as
    /// [`Paired`](nearlink_types::DeviceStatus::Paired) records.
    async fn bonded_devices(&self) -> Result<Vec<DeviceRecord>, RadioError>;

    /// Subscribe to bond-state-changed signals for every device.
    fn subscribe_bond_events(&self) -> broadcast::Receiver<BondStateChanged>;

    /// Ask the platform to start bonding with `address`.
    ///
    /// Returns once the request is accepted; the outcome arrives as
    /// [`BondStateChanged`] signals.
    async fn create_bond(&self, address: &BtAddress) -> Result<(), RadioError>;

    /// Open a connection-oriented socket to `service` on `address`.
    async fn connect(
        &self,
        address: &BtAddress,
        service: ServiceId,
    ) -> Result<Box<dyn Link>, RadioError>;

    /// Bind a listening socket for `service`.
    async fn listen(&self, service: ServiceId) -> Result<Box<dyn Acceptor>, RadioError>;
}

/// [`Link`] over any tokio byte stream.
pub struct StreamLink<S> {
    peer: BtAddress,
    stream: Option<S>,
}

impl<S> StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap `stream` connected to `peer`.
    pub fn new(peer: BtAddress, stream: S) -> Self {
        Self {
            peer,
            stream: Some(stream),
        }
    }

    fn stream(&mut self) -> Result<&mut S, RadioError> {
        self.stream.as_mut().ok_or(RadioError::ConnectionClosed)
    }
}

#[async_trait]
impl<S> Link for StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn peer(&self) -> &BtAddress {
        &self.peer
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        Ok(self.stream()?.read(buf).await?)
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), RadioError> {
        Ok(self.stream()?.write_all(data).await?)
    }

    async fn flush(&mut self) -> Result<(), RadioError> {
        Ok(self.stream()?.flush().await?)
    }

    async fn close(&mut self) -> Result<(), RadioError> {
        match self.stream.take() {
            Some(mut stream) => {
                // Peer may already be gone; the stream is dropped either way.
                let _ = stream.shutdown().await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}
