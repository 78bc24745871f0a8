//! Show the local identity and the role it resolves to.

use anyhow::Result;
use nearlink_client::{IdentitySource, NearClient, Radio};

/// Run the identity command.
pub async fn run<R: Radio>(client: &NearClient<R>, source: &dyn IdentitySource) -> Result<()> {
    let assignment = client.resolve_role(source).await;

    println!("=== nearlink identity ===");
    println!();
    match &assignment.identity {
        Some(identity) => {
            println!("  Name:      {}", identity.local_name);
            println!("  Stable ID: {}", identity.stable_id);
        }
        None => {
            println!("  Identity:  UNAVAILABLE");
            if let Some(error) = &assignment.error {
                println!("  Reason:    {}", error);
            }
        }
    }
    println!("  Role:      {}", assignment.role);
    println!("  Scans:     {}", yes_no(assignment.role.scans()));
    println!("  Listens:   {}", yes_no(assignment.role.listens()));

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
