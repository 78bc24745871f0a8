//! In-memory demo world for `--mock`.
//!
//! The local radio shares a mock air with one live peer, `ARES_Pixel`,
//! which listens on the service and can greet the local device. A few more
//! devices only advertise; one of them, `Car Kit`, is already bonded.

use anyhow::{Context, Result};
use nearlink_client::{
    Adapter, AdvertisementReport, InquiryEvent, MockAir, MockRadio, Radio, Sender, SenderConfig,
};
use nearlink_core::PlatformBondState;
use nearlink_listener::{ListenerConfig, Server, ServerHandle};
use nearlink_types::{BtAddress, PaymentPayload, ServiceId};
use std::time::Duration;
use tracing::{debug, info};

/// Address of the live demo peer.
pub const PEER_ADDRESS: &str = "BB:BB:BB:BB:BB:02";

const PEER_NAME: &str = "ARES_Pixel";

const CAR_KIT_ADDRESS: &str = "EE:EE:EE:EE:EE:05";

/// A mock radio plus the demo peer keeping it company.
pub struct Demo {
    radio: MockRadio,
    peer: MockRadio,
    service: ServiceId,
    _peer_task: tokio::task::JoinHandle<()>,
}

impl Demo {
    /// Build the demo world around a local radio at `local_address`.
    pub async fn start(local_address: &str, service: ServiceId) -> Result<Self> {
        let local_address = BtAddress::parse(local_address).context("Invalid mock address")?;
        let air = MockAir::new();
        let radio = MockRadio::new(air.clone(), local_address.as_str());
        let peer = MockRadio::new(air, PEER_ADDRESS);
        peer.set_local_name(PEER_NAME).await?;

        seed(&radio);

        let server = Server::new(
            Adapter::new(peer.clone()),
            ListenerConfig {
                service,
                ..ListenerConfig::default()
            },
        );
        let handle = server
            .start()
            .await
            .context("Failed to start demo peer")?;
        let peer_task = tokio::spawn(log_peer_messages(handle));

        Ok(Self {
            radio,
            peer,
            service,
            _peer_task: peer_task,
        })
    }

    /// The local mock radio.
    pub fn radio(&self) -> MockRadio {
        self.radio.clone()
    }

    /// Have the peer send a payment to the local radio shortly.
    pub fn greet_later(&self) {
        let sender = Sender::new(
            Adapter::new(self.peer.clone()),
            SenderConfig {
                service: self.service,
                ..SenderConfig::default()
            },
        );
        let target = self.radio.address().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let payload = PaymentPayload::new(1200.0, "212121", "true");
            let bytes = match payload.to_bytes() {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("Demo payload encoding failed: {}", e);
                    return;
                }
            };
            if let Err(e) = sender.send(&target, &bytes).await {
                debug!("Demo peer could not reach {}: {}", target, e);
            }
        });
    }
}

fn seed(radio: &MockRadio) {
    radio.add_advertisement(AdvertisementReport {
        address: BtAddress::new(PEER_ADDRESS),
        name: Some(PEER_NAME.to_string()),
        data: None,
    });
    // Name only in the advertisement payload.
    radio.add_advertisement(AdvertisementReport {
        address: BtAddress::new("CC:CC:CC:CC:CC:03"),
        name: None,
        data: Some(vec![0x02, 0x01, 0x06, 0x05, 0x09, b'B', b'u', b'd', b's']),
    });
    radio.add_advertisement(AdvertisementReport {
        address: BtAddress::new("DD:DD:DD:DD:DD:04"),
        name: None,
        data: None,
    });
    radio.add_inquiry_event(InquiryEvent::Found {
        address: BtAddress::new(CAR_KIT_ADDRESS),
        name: Some("Car Kit".to_string()),
    });
    radio.add_inquiry_event(InquiryEvent::Finished);
    radio.set_bond_state(&BtAddress::new(CAR_KIT_ADDRESS), PlatformBondState::Bonded);
}

async fn log_peer_messages(mut handle: ServerHandle) {
    while let Some(message) = handle.next_message().await {
        info!(
            "Demo peer received {} bytes from {}",
            message.payload.len(),
            message.sender
        );
    }
}
