//! # near-client
//!
//! Discovery, bonding and delivery for nearlink.
//!
//! This is the library applications use to find a nearby device, bond with
//! it and hand it a message.
//!
//! ## Features
//!
//! - **Dual-mode discovery**: LE advertisement scan and classic inquiry,
//!   merged and deduplicated, bounded in time
//! - **Bonding**: drives the platform pairing ceremony to exactly one outcome
//! - **Delivery**: connect with bounded retry-with-timeout, write, close
//! - **Radio Abstraction**: Pluggable radio layer (BlueZ, mock)
//! - **Pure State Machines**: Uses near-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use nearlink_client::{ClientConfig, NearClient};
//!
//! let client = NearClient::new(radio, ClientConfig::default());
//! let devices = client.scanner().scan_default().await?;
//! client.bonder().bond(&devices.records()[0].address).await?;
//! client.sender().send(&devices.records()[0].address, b"PING").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapter;
pub mod bonder;
pub mod client;
pub mod identity;
pub mod radio;
pub mod scanner;
pub mod sender;

pub use adapter::Adapter;
pub use bonder::{BondConfig, BondError, BondOutcome, Bonder, DEFAULT_BOND_TIMEOUT};
pub use client::{ClientConfig, NearClient};
pub use identity::{
    assign_role, derive_stable_id, IdentityError, IdentitySource, MachineIdentity,
    RoleAssignment, StaticIdentity, DEFAULT_MACHINE_ID_PATH,
};
#[cfg(feature = "bluez")]
pub use radio::BluezRadio;
pub use radio::{
    Acceptor, AdvertisementReport, BondStateChanged, InquiryEvent, Link, MockAir, MockRadio,
    Radio, RadioError, StreamLink,
};
pub use scanner::{DiscoveryHandle, ScanConfig, ScanError, Scanner};
pub use sender::{SendError, Sender, SenderConfig};
