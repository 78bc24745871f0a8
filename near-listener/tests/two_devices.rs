//! Two devices on one in-memory air: role assignment, discovery, delivery.

use nearlink_client::{
    AdvertisementReport, ClientConfig, MockAir, MockRadio, NearClient, Radio, StaticIdentity,
};
use nearlink_core::BROADCASTER_ID;
use nearlink_listener::{ListenerConfig, Server};
use nearlink_types::{PaymentPayload, Role, StableId};
use std::time::Duration;

const A: &str = "AA:AA:AA:AA:AA:01";
const B: &str = "BB:BB:BB:BB:BB:02";

#[tokio::test(start_paused = true)]
async fn broadcaster_receives_ping_exactly_once() {
    let air = MockAir::new();
    let radio_a = MockRadio::new(air.clone(), A);
    let radio_b = MockRadio::new(air, B);
    let client_a = NearClient::new(radio_a.clone(), ClientConfig::default());
    let client_b = NearClient::new(radio_b.clone(), ClientConfig::default());

    let role_a = client_a
        .prepare_role(&StaticIdentity::new("Laptop", StableId::new("0123456789abcdef")))
        .await
        .unwrap()
        .role;
    let role_b = client_b
        .prepare_role(&StaticIdentity::new("Pixel", StableId::new(BROADCASTER_ID)))
        .await
        .unwrap()
        .role;
    assert_eq!(role_a, Role::Neutral);
    assert_eq!(role_b, Role::Broadcaster);
    assert!(role_b.listens());

    let server = Server::new(client_b.adapter().clone(), ListenerConfig::default());
    let mut handle = server.start().await.unwrap();

    // A sees B advertising under its broadcaster name.
    radio_a.add_advertisement(AdvertisementReport {
        address: radio_b.address().clone(),
        name: Some(radio_b.local_name().await.unwrap()),
        data: None,
    });
    let devices = client_a
        .scanner()
        .scan(Duration::from_millis(500))
        .await
        .unwrap();
    let target = devices
        .records()
        .iter()
        .find(|d| d.name.starts_with("ARES_"))
        .unwrap()
        .address
        .clone();

    let receipt = client_a.sender().send(&target, b"PING").await.unwrap();
    assert_eq!(receipt.bytes_written, 4);

    let message = handle.next_message().await.unwrap();
    assert_eq!(message.payload, b"PING");
    assert_eq!(message.sender, *radio_a.address());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(handle.messages().try_recv().is_err());

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn payment_payload_survives_delivery() {
    let air = MockAir::new();
    let radio_a = MockRadio::new(air.clone(), A);
    let radio_b = MockRadio::new(air, B);
    let client_a = NearClient::new(radio_a, ClientConfig::default());
    let server = Server::new(
        nearlink_client::Adapter::new(radio_b.clone()),
        ListenerConfig::default(),
    );
    let mut handle = server.start().await.unwrap();

    let payload = PaymentPayload::new(12.5, "tx-42", "pending");
    client_a
        .sender()
        .send(radio_b.address(), &payload.to_bytes().unwrap())
        .await
        .unwrap();

    let message = handle.next_message().await.unwrap();
    assert_eq!(PaymentPayload::from_bytes(&message.payload).unwrap(), payload);
}
