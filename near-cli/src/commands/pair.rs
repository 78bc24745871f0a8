//! Bond with a device.

use anyhow::{Context, Result};
use nearlink_client::{BondOutcome, NearClient, Radio};
use nearlink_types::BtAddress;

/// Run the pair command.
pub async fn run<R: Radio>(client: &NearClient<R>, address: &str) -> Result<()> {
    let address = BtAddress::parse(address).context("Invalid device address")?;

    println!("Pairing with {}...", address);
    let outcome = client
        .bonder()
        .bond(&address)
        .await
        .with_context(|| format!("Pairing with {} failed", address))?;

    match outcome {
        BondOutcome::AlreadyBonded => println!("  {} is already paired", address),
        BondOutcome::Bonded => println!("  Paired with {}", address),
    }
    Ok(())
}
