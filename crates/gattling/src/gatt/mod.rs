//! GATT (Generic Attribute Profile) client.
//!
//! Layers the service/characteristic/descriptor model over the ATT bearer:
//! discovery procedures, long reads and writes, and notification
//! registration, backed by a client-side cache of the discovered attribute
//! tree.

pub mod cache;
pub mod client;
pub mod types;

#[cfg(test)]
mod tests;

pub use cache::ServiceCache;
pub use client::{GattClient, GattError, GattResult};
pub use types::{Characteristic, CharacteristicProperties, Descriptor, Service, Uuid};
