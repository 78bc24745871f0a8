//! # nearlink
//!
//! Command-line front end for nearlink: find a nearby device, pair with it
//! and hand it a message.
//!
//! ## Commands
//!
//! - `identity`: Show the local identity and role
//! - `scan`: Discover nearby devices
//! - `pair`: Bond with a device
//! - `paired`: List already-bonded devices
//! - `send`: Send a message or payment payload
//! - `listen`: Print every message received
//! - `run`: Resolve the role, then scan and/or listen accordingly
//!
//! ## Example
//!
//! ```bash
//! # Try everything against the in-memory radio
//! nearlink --mock scan --named
//! nearlink --mock send BB:BB:BB:BB:BB:02 --amount 1200 --id 212121
//!
//! # Real adapter (build with --features bluez)
//! nearlink --config nearlink.toml listen
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nearlink_client::{
    ClientConfig, IdentitySource, MachineIdentity, NearClient, Radio, StaticIdentity,
};
use nearlink_types::{PaymentPayload, StableId};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod demo;

use commands::send::Outgoing;
use commands::{identity, listen, pair, paired, run, scan, send};
use config::Config;

/// Short-range device discovery, pairing and message handoff.
#[derive(Parser, Debug)]
#[command(name = "nearlink")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./nearlink.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory radio with demo devices instead of the real adapter
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the local identity and resolved role
    Identity,

    /// Discover nearby devices
    Scan {
        /// Scan duration in milliseconds (default: from config)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Hide devices that never reported a name
        #[arg(long)]
        named: bool,

        /// Print the final list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Bond with a device
    Pair {
        /// Device address (AA:BB:CC:DD:EE:FF)
        address: String,
    },

    /// List devices already bonded with this radio
    Paired {
        /// Print the list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send one message to a device
    Send {
        /// Device address (AA:BB:CC:DD:EE:FF)
        address: String,

        /// Text to send (or use --amount/--id for a payment payload)
        #[arg(required_unless_present = "amount", conflicts_with = "amount")]
        message: Option<String>,

        /// Payment amount
        #[arg(long, requires = "id")]
        amount: Option<f64>,

        /// Payment record id
        #[arg(long, requires = "amount")]
        id: Option<String>,

        /// Payment status
        #[arg(long, default_value = "true")]
        status: String,
    },

    /// Print every message received until Ctrl-C
    Listen,

    /// Resolve the role, then scan and/or listen accordingly
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if cli.mock || config.radio.mock {
        let service = config.service_id().context("Invalid service configuration")?;
        let demo = demo::Demo::start(&config.radio.mock_address, service).await?;
        if matches!(cli.command, Commands::Listen | Commands::Run) {
            demo.greet_later();
        }
        dispatch(demo.radio(), cli.command, &config).await
    } else {
        run_platform(cli.command, &config).await
    }
}

#[cfg(feature = "bluez")]
async fn run_platform(command: Commands, config: &Config) -> Result<()> {
    let radio = nearlink_client::BluezRadio::new()
        .await
        .context("Failed to open Bluetooth adapter")?;
    dispatch(radio, command, config).await
}

#[cfg(not(feature = "bluez"))]
async fn run_platform(_command: Commands, _config: &Config) -> Result<()> {
    anyhow::bail!(
        "No platform radio in this build. Rebuild with --features bluez or pass --mock"
    )
}

async fn dispatch<R: Radio>(radio: R, command: Commands, config: &Config) -> Result<()> {
    let client_config: ClientConfig = config
        .client_config()
        .context("Invalid service configuration")?;
    let scan_timeout = client_config.scan.timeout;
    let client = NearClient::new(radio, client_config);

    match command {
        Commands::Identity => {
            let source = identity_source(&client, config);
            identity::run(&client, source.as_ref()).await?;
        }
        Commands::Scan {
            timeout_ms,
            named,
            json,
        } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(scan_timeout);
            scan::run(&client, timeout, named, json).await?;
        }
        Commands::Pair { address } => {
            pair::run(&client, &address).await?;
        }
        Commands::Paired { json } => {
            paired::run(&client, json).await?;
        }
        Commands::Send {
            address,
            message,
            amount,
            id,
            status,
        } => {
            let outgoing = match (message, amount, id) {
                (Some(text), _, _) => Outgoing::Text(text),
                (None, Some(amount), Some(id)) => {
                    Outgoing::Payment(PaymentPayload::new(amount, id, status))
                }
                _ => anyhow::bail!("Must specify a message or --amount with --id"),
            };
            send::run(&client, &address, outgoing).await?;
        }
        Commands::Listen => {
            let listener = config
                .listener_config()
                .context("Invalid service configuration")?;
            listen::run(client.adapter(), listener).await?;
        }
        Commands::Run => {
            let listener = config
                .listener_config()
                .context("Invalid service configuration")?;
            let source = identity_source(&client, config);
            run::run(&client, source.as_ref(), scan_timeout, listener).await?;
        }
    }

    Ok(())
}

/// Fixed identity when both name and id are configured, else derived from
/// the machine id.
fn identity_source<R: Radio>(client: &NearClient<R>, config: &Config) -> Box<dyn IdentitySource> {
    match (&config.identity.name, &config.identity.stable_id) {
        (Some(name), Some(id)) => Box::new(StaticIdentity::new(
            name.clone(),
            StableId::new(id.clone()),
        )),
        _ => Box::new(MachineIdentity::new(
            client.radio().clone(),
            config.identity.machine_id_path.clone(),
        )),
    }
}
