//! gattling - a Bluetooth Low Energy ATT/GATT client stack
//!
//! This library implements the host side of the Attribute Protocol (ATT) and
//! the GATT client built on top of it: the PDU wire codec, the
//! one-outstanding-request connection engine, multi-round-trip discovery and
//! long-value I/O procedures, and a cache of the discovered service tree.
//!
//! The L2CAP channel itself is out of scope; the engine runs over anything
//! implementing [`transport::Transport`], a message-framed byte channel
//! delivering one ATT PDU per message.

pub mod att;
pub mod gatt;
pub mod transport;
pub mod uuid;

// Re-export common types for convenience
pub use att::{AttError, Connection, ErrorCode, Pdu};
pub use gatt::{Characteristic, CharacteristicProperties, Descriptor, GattClient, GattError, Service};
pub use transport::Transport;
pub use uuid::Uuid;
