//! List devices the platform already holds a bond with.

use anyhow::{Context, Result};
use nearlink_client::{NearClient, Radio};
use nearlink_types::DeviceRecord;

/// Run the paired command.
pub async fn run<R: Radio>(client: &NearClient<R>, json: bool) -> Result<Vec<DeviceRecord>> {
    let devices = client
        .bonded_devices()
        .await
        .context("Failed to list bonded devices")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
    } else if devices.is_empty() {
        println!("No paired devices");
    } else {
        for device in &devices {
            println!("  {}  {}", device.address, device.name);
        }
    }
    Ok(devices)
}
