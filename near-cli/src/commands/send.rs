//! Send one message to a device.

use anyhow::{Context, Result};
use nearlink_client::{NearClient, Radio};
use nearlink_types::{BtAddress, PaymentPayload};

/// What to send.
#[derive(Debug, Clone)]
pub enum Outgoing {
    /// Raw text.
    Text(String),
    /// A payment payload, sent as JSON.
    Payment(PaymentPayload),
}

impl Outgoing {
    fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Text(text) => Ok(text.into_bytes()),
            Self::Payment(payload) => payload.to_bytes().context("Failed to encode payload"),
        }
    }
}

/// Run the send command.
pub async fn run<R: Radio>(
    client: &NearClient<R>,
    address: &str,
    outgoing: Outgoing,
) -> Result<()> {
    let address = BtAddress::parse(address).context("Invalid device address")?;
    let bytes = outgoing.into_bytes()?;

    println!("Sending {} bytes to {}...", bytes.len(), address);
    let receipt = client
        .sender()
        .send(&address, &bytes)
        .await
        .with_context(|| format!("Sending to {} failed", address))?;

    println!(
        "  Delivered {} bytes to {} (attempt {})",
        receipt.bytes_written, receipt.address, receipt.attempts
    );
    Ok(())
}
