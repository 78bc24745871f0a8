//! # near-types
//!
//! Shared value types for nearlink, the short-range device handoff stack.
//!
//! This crate provides the foundational types used across all nearlink crates:
//! - [`BtAddress`], [`StableId`], [`ServiceId`] - Addressing and identity types
//! - [`DeviceRecord`], [`DeviceStatus`] - Discovered devices and their pairing status
//! - [`Identity`], [`Role`] - Per-installation identity and the role derived from it
//! - [`MessageReceived`], [`BondResult`], [`DeliveryReceipt`] - Events surfaced to the application
//! - [`PaymentPayload`] - JSON payload helper used by applications (opaque to the core)
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod device;
mod error;
mod events;
mod ids;
mod payload;

pub use device::{DeviceRecord, DeviceStatus, Identity, Role};
pub use error::TypesError;
pub use events::{BondResult, DeliveryReceipt, MessageReceived};
pub use ids::{BtAddress, ServiceId, StableId, SERIAL_PORT_SERVICE_UUID};
pub use payload::PaymentPayload;
