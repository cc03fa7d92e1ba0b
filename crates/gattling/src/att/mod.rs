//! Attribute Protocol (ATT) implementation.
//!
//! ATT is the request/response layer GATT is built on: a strictly ordered
//! protocol with at most one outstanding request per bearer, plus
//! server-initiated notifications and indications. This module provides the
//! PDU codec and the client-side connection engine.

pub mod connection;
pub mod constants;
pub mod error;
pub mod pdu;


// Re-export the public API
pub use self::connection::{Completion, Connection, ValueCallback};
pub use self::constants::*;
pub use self::error::{AttError, AttResult, ErrorCode};
pub use self::pdu::{ExecuteWriteFlag, GroupData, HandleGroup, HandleUuid, HandleValue, Pdu};
