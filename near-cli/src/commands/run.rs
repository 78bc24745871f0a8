//! Role-driven flow: resolve the role, then scan and/or listen.

use anyhow::{Context, Result};
use nearlink_client::{IdentitySource, NearClient, Radio};
use nearlink_listener::ListenerConfig;
use std::time::Duration;

use super::{listen, scan};

/// Run the run command.
pub async fn run<R: Radio>(
    client: &NearClient<R>,
    source: &dyn IdentitySource,
    scan_timeout: Duration,
    listener: ListenerConfig,
) -> Result<()> {
    let assignment = client
        .prepare_role(source)
        .await
        .context("Failed to apply role")?;
    if let Some(error) = &assignment.error {
        println!("Identity unavailable ({}), continuing as {}", error, assignment.role);
    }
    println!("Role: {}", assignment.role);
    println!();

    if assignment.role.scans() {
        scan::run(client, scan_timeout, false, false).await?;
        println!();
    }

    if assignment.role.listens() {
        let handle = listen::start(client.adapter(), listener).await?;
        listen::serve(handle).await?;
    }
    Ok(())
}
