//! Discover nearby devices.

use anyhow::{Context, Result};
use nearlink_client::{NearClient, Radio};
use nearlink_core::is_fallback_name;
use nearlink_types::DeviceRecord;
use std::time::Duration;

/// Run the scan command.
///
/// Devices are printed as they are found unless `json` is set, in which
/// case the final list is printed once as JSON.
pub async fn run<R: Radio>(
    client: &NearClient<R>,
    timeout: Duration,
    named_only: bool,
    json: bool,
) -> Result<Vec<DeviceRecord>> {
    let mut handle = client
        .scanner()
        .start(timeout)
        .await
        .context("Failed to start discovery")?;

    if !json {
        println!("Scanning for {} ms...", timeout.as_millis());
    }
    while let Some(device) = handle.next_device().await {
        if !json && !(named_only && is_fallback_name(&device.name)) {
            println!("  {}  {}", device.address, device.name);
        }
    }

    let devices = handle.finish().await.context("Discovery failed")?;
    let devices: Vec<DeviceRecord> = if named_only {
        devices.named().cloned().collect()
    } else {
        devices.into_vec()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else {
        println!();
        println!("Found {} device(s)", devices.len());
    }
    Ok(devices)
}
