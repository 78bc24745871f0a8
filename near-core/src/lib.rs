//! # near-core
//!
//! Pure logic for nearlink (no I/O, instant tests).
//!
//! This crate implements the parsing, bookkeeping and state machines behind
//! discovery, bonding, sending and listening without touching the radio.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual radio I/O is performed by `near-client` and `near-listener`,
//! which interpret the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod advert;
pub mod bonding;
pub mod discovery;
pub mod listener;
pub mod retry;
pub mod role;

pub use advert::{
    fallback_name, is_fallback_name, parse_advertised_name, resolve_name, UNKNOWN_DEVICE_PREFIX,
};
pub use bonding::{BondAction, BondEvent, BondFailure, BondState, PlatformBondState};
pub use discovery::{DeviceList, DiscoveryAccumulator};
pub use listener::{ListenerAction, ListenerEvent, ListenerState};
pub use retry::RetryPolicy;
pub use role::{broadcaster_name, resolve_role, KnownIds, BROADCASTER_ID, BROADCASTER_PREFIX};
