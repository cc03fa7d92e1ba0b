//! Error handling for the ATT protocol layer.

use thiserror::Error;

use super::constants::*;
use super::pdu::Pdu;

/// ATT error codes as carried in an Error Response PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid handle
    InvalidHandle,
    /// Read not permitted
    ReadNotPermitted,
    /// Write not permitted
    WriteNotPermitted,
    /// Invalid PDU
    InvalidPdu,
    /// Insufficient authentication
    InsufficientAuthentication,
    /// Request not supported
    RequestNotSupported,
    /// Invalid offset
    InvalidOffset,
    /// Insufficient authorization
    InsufficientAuthorization,
    /// Prepare queue full
    PrepareQueueFull,
    /// Attribute not found
    AttributeNotFound,
    /// Attribute not long
    AttributeNotLong,
    /// Insufficient encryption key size
    InsufficientEncryptionKeySize,
    /// Invalid attribute value length
    InvalidAttributeValueLength,
    /// Unlikely error
    Unlikely,
    /// Insufficient encryption
    InsufficientEncryption,
    /// Unsupported group type
    UnsupportedGroupType,
    /// Insufficient resources
    InsufficientResources,
    /// Database out of sync
    DatabaseOutOfSync,
    /// Value not allowed
    ValueNotAllowed,
    /// Application error (0x80..=0x9F)
    ApplicationError(u8),
    /// Common profile and service error (0xE0..=0xFF)
    CommonProfileError(u8),
    /// Reserved or unassigned error code
    Unknown(u8),
}

impl From<u8> for ErrorCode {
    fn from(code: u8) -> Self {
        match code {
            ATT_ERROR_INVALID_HANDLE => ErrorCode::InvalidHandle,
            ATT_ERROR_READ_NOT_PERMITTED => ErrorCode::ReadNotPermitted,
            ATT_ERROR_WRITE_NOT_PERMITTED => ErrorCode::WriteNotPermitted,
            ATT_ERROR_INVALID_PDU => ErrorCode::InvalidPdu,
            ATT_ERROR_INSUFFICIENT_AUTHENTICATION => ErrorCode::InsufficientAuthentication,
            ATT_ERROR_REQUEST_NOT_SUPPORTED => ErrorCode::RequestNotSupported,
            ATT_ERROR_INVALID_OFFSET => ErrorCode::InvalidOffset,
            ATT_ERROR_INSUFFICIENT_AUTHORIZATION => ErrorCode::InsufficientAuthorization,
            ATT_ERROR_PREPARE_QUEUE_FULL => ErrorCode::PrepareQueueFull,
            ATT_ERROR_ATTRIBUTE_NOT_FOUND => ErrorCode::AttributeNotFound,
            ATT_ERROR_ATTRIBUTE_NOT_LONG => ErrorCode::AttributeNotLong,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE => ErrorCode::InsufficientEncryptionKeySize,
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH => ErrorCode::InvalidAttributeValueLength,
            ATT_ERROR_UNLIKELY => ErrorCode::Unlikely,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION => ErrorCode::InsufficientEncryption,
            ATT_ERROR_UNSUPPORTED_GROUP_TYPE => ErrorCode::UnsupportedGroupType,
            ATT_ERROR_INSUFFICIENT_RESOURCES => ErrorCode::InsufficientResources,
            ATT_ERROR_DATABASE_OUT_OF_SYNC => ErrorCode::DatabaseOutOfSync,
            ATT_ERROR_VALUE_NOT_ALLOWED => ErrorCode::ValueNotAllowed,
            c if (ATT_ERROR_APPLICATION_ERROR_START..=ATT_ERROR_APPLICATION_ERROR_END)
                .contains(&c) =>
            {
                ErrorCode::ApplicationError(c)
            }
            c if c >= ATT_ERROR_COMMON_PROFILE_ERROR_START => ErrorCode::CommonProfileError(c),
            c => ErrorCode::Unknown(c),
        }
    }
}

impl From<ErrorCode> for u8 {
    fn from(code: ErrorCode) -> u8 {
        match code {
            ErrorCode::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            ErrorCode::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            ErrorCode::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            ErrorCode::InvalidPdu => ATT_ERROR_INVALID_PDU,
            ErrorCode::InsufficientAuthentication => ATT_ERROR_INSUFFICIENT_AUTHENTICATION,
            ErrorCode::RequestNotSupported => ATT_ERROR_REQUEST_NOT_SUPPORTED,
            ErrorCode::InvalidOffset => ATT_ERROR_INVALID_OFFSET,
            ErrorCode::InsufficientAuthorization => ATT_ERROR_INSUFFICIENT_AUTHORIZATION,
            ErrorCode::PrepareQueueFull => ATT_ERROR_PREPARE_QUEUE_FULL,
            ErrorCode::AttributeNotFound => ATT_ERROR_ATTRIBUTE_NOT_FOUND,
            ErrorCode::AttributeNotLong => ATT_ERROR_ATTRIBUTE_NOT_LONG,
            ErrorCode::InsufficientEncryptionKeySize => {
                ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE
            }
            ErrorCode::InvalidAttributeValueLength => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
            ErrorCode::Unlikely => ATT_ERROR_UNLIKELY,
            ErrorCode::InsufficientEncryption => ATT_ERROR_INSUFFICIENT_ENCRYPTION,
            ErrorCode::UnsupportedGroupType => ATT_ERROR_UNSUPPORTED_GROUP_TYPE,
            ErrorCode::InsufficientResources => ATT_ERROR_INSUFFICIENT_RESOURCES,
            ErrorCode::DatabaseOutOfSync => ATT_ERROR_DATABASE_OUT_OF_SYNC,
            ErrorCode::ValueNotAllowed => ATT_ERROR_VALUE_NOT_ALLOWED,
            ErrorCode::ApplicationError(c) => c,
            ErrorCode::CommonProfileError(c) => c,
            ErrorCode::Unknown(c) => c,
        }
    }
}

/// Errors surfaced by the ATT connection engine.
#[derive(Debug, Error)]
pub enum AttError {
    /// The server answered a request with an Error Response. The wire fields
    /// are preserved verbatim.
    #[error("ATT error response: {code:?} for request 0x{request_opcode:02X} on handle 0x{handle:04X}")]
    ErrorResponse {
        request_opcode: u8,
        handle: u16,
        code: ErrorCode,
    },

    /// An inbound frame could not be decoded as an ATT PDU.
    #[error("malformed PDU")]
    Malformed,

    /// A PDU decoded cleanly but violates the protocol in context, such as a
    /// pagination cycle or a reliable-write echo mismatch.
    #[error("protocol-violating response: {0:?}")]
    InvalidResponse(Box<Pdu>),

    /// The transport reached end of stream; the bearer is unusable.
    #[error("transport closed")]
    TransportClosed,

    /// The transport failed while reading or writing.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A receive MTU outside 23..=517 was configured.
    #[error("MTU {0} outside the permitted 23..=517 range")]
    MtuTooSmall(u16),

    /// `send_request` was handed a PDU that is not a request.
    #[error("PDU is not a request")]
    NotARequest,
}

impl AttError {
    /// True when this is a wire Error Response carrying the given code.
    pub fn is_error_response(&self, wanted: ErrorCode) -> bool {
        matches!(self, AttError::ErrorResponse { code, .. } if *code == wanted)
    }
}

/// Result alias for ATT operations.
pub type AttResult<T> = Result<T, AttError>;
