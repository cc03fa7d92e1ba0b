//! Bluetooth UUID value type.
//!
//! A Bluetooth UUID is one of three sizes on the wire: a 16-bit or 32-bit
//! SIG-assigned short form, or a full 128-bit value. Internally every UUID is
//! stored as 16 little-endian bytes; short forms are expanded against the
//! Bluetooth base UUID so that comparisons and hashing never have to care
//! which form a UUID arrived in.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The Bluetooth base UUID, `00000000-0000-1000-8000-00805F9B34FB`, stored
/// little-endian. Short-form UUIDs occupy bytes 12..16.
const BASE_UUID: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Byte offset of the short-form value within the base UUID.
const SHORT_OFFSET: usize = 12;

/// A 128-bit Bluetooth UUID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uuid {
    bytes: [u8; 16],
}

impl Uuid {
    /// Builds a UUID from 16 bytes in little-endian (wire) order.
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Builds a UUID from 16 bytes in big-endian (display) order.
    pub fn from_bytes_be(mut bytes: [u8; 16]) -> Self {
        bytes.reverse();
        Uuid { bytes }
    }

    /// Expands a 16-bit SIG-assigned value against the base UUID.
    pub const fn from_u16(short: u16) -> Self {
        let mut bytes = BASE_UUID;
        bytes[SHORT_OFFSET] = short as u8;
        bytes[SHORT_OFFSET + 1] = (short >> 8) as u8;
        Uuid { bytes }
    }

    /// Expands a 32-bit SIG-assigned value against the base UUID.
    pub const fn from_u32(short: u32) -> Self {
        let mut bytes = BASE_UUID;
        bytes[SHORT_OFFSET] = short as u8;
        bytes[SHORT_OFFSET + 1] = (short >> 8) as u8;
        bytes[SHORT_OFFSET + 2] = (short >> 16) as u8;
        bytes[SHORT_OFFSET + 3] = (short >> 24) as u8;
        Uuid { bytes }
    }

    /// Interprets a little-endian byte slice as a UUID.
    ///
    /// Accepts 2, 4, or 16 bytes; returns `None` for any other length.
    pub fn try_from_slice_le(slice: &[u8]) -> Option<Self> {
        match slice.len() {
            2 => Some(Uuid::from_u16(u16::from_le_bytes([slice[0], slice[1]]))),
            4 => Some(Uuid::from_u32(u32::from_le_bytes([
                slice[0], slice[1], slice[2], slice[3],
            ]))),
            16 => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(slice);
                Some(Uuid::from_bytes_le(bytes))
            }
            _ => None,
        }
    }

    /// The 16 bytes in little-endian order (as carried on the ATT wire).
    pub const fn as_bytes_le(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// The 16 bytes in big-endian order (as printed).
    pub fn as_bytes_be(&self) -> [u8; 16] {
        let mut bytes = self.bytes;
        bytes.reverse();
        bytes
    }

    fn is_sig_assigned(&self) -> bool {
        self.bytes[..SHORT_OFFSET] == BASE_UUID[..SHORT_OFFSET]
    }

    /// The 16-bit short form, if this UUID has one.
    pub fn as_u16(&self) -> Option<u16> {
        if self.is_sig_assigned()
            && self.bytes[SHORT_OFFSET + 2] == 0
            && self.bytes[SHORT_OFFSET + 3] == 0
        {
            Some(u16::from_le_bytes([
                self.bytes[SHORT_OFFSET],
                self.bytes[SHORT_OFFSET + 1],
            ]))
        } else {
            None
        }
    }

    /// The 32-bit short form, if this UUID has one.
    pub fn as_u32(&self) -> Option<u32> {
        if self.is_sig_assigned() {
            Some(u32::from_le_bytes([
                self.bytes[SHORT_OFFSET],
                self.bytes[SHORT_OFFSET + 1],
                self.bytes[SHORT_OFFSET + 2],
                self.bytes[SHORT_OFFSET + 3],
            ]))
        } else {
            None
        }
    }

    /// The shortest ATT wire encoding of this UUID, little-endian.
    ///
    /// 16-bit short forms encode as 2 bytes; everything else (including
    /// 32-bit short forms, which ATT type fields do not admit) encodes as the
    /// full 16 bytes.
    pub fn wire_bytes(&self) -> Vec<u8> {
        match self.as_u16() {
            Some(short) => short.to_le_bytes().to_vec(),
            None => self.bytes.to_vec(),
        }
    }
}

impl From<u16> for Uuid {
    fn from(short: u16) -> Self {
        Uuid::from_u16(short)
    }
}

impl From<u32> for Uuid {
    fn from(short: u32) -> Self {
        Uuid::from_u32(short)
    }
}

impl From<[u8; 16]> for Uuid {
    /// Bytes are taken in little-endian order.
    fn from(bytes: [u8; 16]) -> Self {
        Uuid::from_bytes_le(bytes)
    }
}

impl PartialEq<u16> for Uuid {
    fn eq(&self, other: &u16) -> bool {
        self.as_u16() == Some(*other)
    }
}

impl PartialEq<Uuid> for u16 {
    fn eq(&self, other: &Uuid) -> bool {
        other.as_u16() == Some(*self)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.as_bytes_be();
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(short) = self.as_u16() {
            write!(f, "Uuid(0x{short:04X})")
        } else if let Some(short) = self.as_u32() {
            write!(f, "Uuid(0x{short:08X})")
        } else {
            write!(f, "Uuid({self})")
        }
    }
}

/// Errors produced when parsing a UUID from text.
#[derive(Debug, Error)]
pub enum UuidParseError {
    #[error("UUID string has invalid length")]
    InvalidLength,

    #[error("UUID string is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("UUID short form is not a valid number")]
    InvalidShortForm,
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    /// Parses `180A`, `0000180A`, or the full hyphenated/bare 128-bit form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| c.is_ascii_hexdigit()).collect();

        match cleaned.len() {
            4 => u16::from_str_radix(&cleaned, 16)
                .map(Uuid::from_u16)
                .map_err(|_| UuidParseError::InvalidShortForm),
            8 => u32::from_str_radix(&cleaned, 16)
                .map(Uuid::from_u32)
                .map_err(|_| UuidParseError::InvalidShortForm),
            32 => {
                let mut bytes = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes)?;
                Ok(Uuid::from_bytes_be(bytes))
            }
            _ => Err(UuidParseError::InvalidLength),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_round_trip() {
        let uuid = Uuid::from_u16(0x180A);
        assert_eq!(uuid.as_u16(), Some(0x180A));
        assert_eq!(uuid.as_u32(), Some(0x0000180A));
        assert_eq!(uuid.wire_bytes(), vec![0x0A, 0x18]);

        let wide = Uuid::from_u32(0x12345678);
        assert_eq!(wide.as_u16(), None);
        assert_eq!(wide.as_u32(), Some(0x12345678));
        assert_eq!(wide.wire_bytes().len(), 16);
    }

    #[test]
    fn test_slice_conversions() {
        assert_eq!(
            Uuid::try_from_slice_le(&[0x0A, 0x18]),
            Some(Uuid::from_u16(0x180A))
        );
        assert_eq!(
            Uuid::try_from_slice_le(&[0x78, 0x56, 0x34, 0x12]),
            Some(Uuid::from_u32(0x12345678))
        );
        let full = [7u8; 16];
        assert_eq!(
            Uuid::try_from_slice_le(&full),
            Some(Uuid::from_bytes_le(full))
        );
        assert_eq!(Uuid::try_from_slice_le(&[1, 2, 3]), None);
    }

    #[test]
    fn test_parse_and_display() {
        let uuid: Uuid = "180a".parse().unwrap();
        assert_eq!(uuid, Uuid::from_u16(0x180A));
        assert_eq!(uuid.to_string(), "0000180a-0000-1000-8000-00805f9b34fb");

        let full: Uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e".parse().unwrap();
        assert_eq!(full.as_u16(), None);
        assert_eq!(full.to_string(), "6e400001-b5a3-f393-e0a9-e50e24dcca9e");

        assert!("xyz".parse::<Uuid>().is_err());
    }
}
