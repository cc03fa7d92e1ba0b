//! Common types for the GATT data model.

use bitflags::bitflags;

pub use crate::uuid::Uuid;

bitflags! {
    /// Characteristic properties bitmask from the declaration attribute.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

impl CharacteristicProperties {
    pub fn can_read(&self) -> bool {
        self.contains(CharacteristicProperties::READ)
    }

    pub fn can_write(&self) -> bool {
        self.contains(CharacteristicProperties::WRITE)
    }

    pub fn can_write_without_response(&self) -> bool {
        self.contains(CharacteristicProperties::WRITE_WITHOUT_RESPONSE)
    }

    pub fn can_notify(&self) -> bool {
        self.contains(CharacteristicProperties::NOTIFY)
    }

    pub fn can_indicate(&self) -> bool {
        self.contains(CharacteristicProperties::INDICATE)
    }
}

/// A discovered GATT service.
///
/// Invariant: `start_handle <= end_handle`, and the handle ranges of two
/// distinct services never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
    pub is_primary: bool,
    pub start_handle: u16,
    pub end_handle: u16,
}

impl Service {
    /// True when `handle` falls inside this service's range.
    pub fn contains(&self, handle: u16) -> bool {
        (self.start_handle..=self.end_handle).contains(&handle)
    }
}

/// A discovered GATT characteristic.
///
/// Invariant: `declaration_handle < value_handle <= service.end_handle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    pub declaration_handle: u16,
    pub value_handle: u16,
}

/// A discovered characteristic descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub handle: u16,
}
