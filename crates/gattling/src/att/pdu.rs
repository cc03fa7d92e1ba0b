//! ATT PDU definitions and the wire codec.
//!
//! Every ATT operation is one variant of [`Pdu`]; the opcode space is closed,
//! so the codec is a dense match rather than anything polymorphic. All
//! multi-byte integers are little-endian on the wire. Fixed-layout PDUs are
//! length-checked exactly; variable-length PDUs check a minimum length and
//! validate their grouping stride.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use super::constants::*;
use super::error::{AttError, AttResult, ErrorCode};
use crate::uuid::Uuid;

/// One `(found_handle, group_end_handle)` pair from a Find By Type Value
/// Response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleGroup {
    pub found_handle: u16,
    pub group_end_handle: u16,
}

/// One `(handle, value)` pair from a Read By Type Response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValue {
    pub handle: u16,
    pub value: Vec<u8>,
}

/// One `(start_handle, end_handle, value)` triple from a Read By Group Type
/// Response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupData {
    pub start_handle: u16,
    pub end_handle: u16,
    pub value: Vec<u8>,
}

/// One `(handle, uuid)` pair from a Find Information Response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleUuid {
    pub handle: u16,
    pub uuid: Uuid,
}

/// The flag carried by an Execute Write Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteWriteFlag {
    /// Discard the prepare queue.
    Cancel,
    /// Commit the prepare queue.
    Write,
}

impl From<ExecuteWriteFlag> for u8 {
    fn from(flag: ExecuteWriteFlag) -> u8 {
        match flag {
            ExecuteWriteFlag::Cancel => ATT_EXEC_WRITE_CANCEL,
            ExecuteWriteFlag::Write => ATT_EXEC_WRITE_COMMIT,
        }
    }
}

/// An ATT protocol data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    ErrorResponse {
        request_opcode: u8,
        handle: u16,
        code: ErrorCode,
    },
    ExchangeMtuRequest {
        client_rx_mtu: u16,
    },
    ExchangeMtuResponse {
        server_rx_mtu: u16,
    },
    FindInformationRequest {
        start_handle: u16,
        end_handle: u16,
    },
    FindInformationResponse {
        pairs: Vec<HandleUuid>,
    },
    FindByTypeValueRequest {
        start_handle: u16,
        end_handle: u16,
        attribute_type: u16,
        value: Vec<u8>,
    },
    FindByTypeValueResponse {
        groups: Vec<HandleGroup>,
    },
    ReadByTypeRequest {
        start_handle: u16,
        end_handle: u16,
        attribute_type: Uuid,
    },
    ReadByTypeResponse {
        pairs: Vec<HandleValue>,
    },
    ReadRequest {
        handle: u16,
    },
    ReadResponse {
        value: Vec<u8>,
    },
    ReadBlobRequest {
        handle: u16,
        offset: u16,
    },
    ReadBlobResponse {
        part_value: Vec<u8>,
    },
    ReadMultipleRequest {
        handles: Vec<u16>,
    },
    ReadMultipleResponse {
        values: Vec<u8>,
    },
    ReadByGroupTypeRequest {
        start_handle: u16,
        end_handle: u16,
        group_type: Uuid,
    },
    ReadByGroupTypeResponse {
        groups: Vec<GroupData>,
    },
    WriteRequest {
        handle: u16,
        value: Vec<u8>,
    },
    WriteResponse,
    WriteCommand {
        handle: u16,
        value: Vec<u8>,
    },
    SignedWriteCommand {
        handle: u16,
        value: Vec<u8>,
        signature: [u8; 12],
    },
    PrepareWriteRequest {
        handle: u16,
        offset: u16,
        part_value: Vec<u8>,
    },
    PrepareWriteResponse {
        handle: u16,
        offset: u16,
        part_value: Vec<u8>,
    },
    ExecuteWriteRequest {
        flags: ExecuteWriteFlag,
    },
    ExecuteWriteResponse,
    HandleValueNotification {
        handle: u16,
        value: Vec<u8>,
    },
    HandleValueIndication {
        handle: u16,
        value: Vec<u8>,
    },
    HandleValueConfirmation,
    /// An opcode this implementation does not know. The connection records it
    /// as a protocol error.
    Unknown {
        opcode: u8,
        payload: Vec<u8>,
    },
}

impl Pdu {
    /// The opcode byte this PDU encodes with.
    pub fn opcode(&self) -> u8 {
        match self {
            Pdu::ErrorResponse { .. } => ATT_ERROR_RSP,
            Pdu::ExchangeMtuRequest { .. } => ATT_EXCHANGE_MTU_REQ,
            Pdu::ExchangeMtuResponse { .. } => ATT_EXCHANGE_MTU_RSP,
            Pdu::FindInformationRequest { .. } => ATT_FIND_INFO_REQ,
            Pdu::FindInformationResponse { .. } => ATT_FIND_INFO_RSP,
            Pdu::FindByTypeValueRequest { .. } => ATT_FIND_BY_TYPE_VALUE_REQ,
            Pdu::FindByTypeValueResponse { .. } => ATT_FIND_BY_TYPE_VALUE_RSP,
            Pdu::ReadByTypeRequest { .. } => ATT_READ_BY_TYPE_REQ,
            Pdu::ReadByTypeResponse { .. } => ATT_READ_BY_TYPE_RSP,
            Pdu::ReadRequest { .. } => ATT_READ_REQ,
            Pdu::ReadResponse { .. } => ATT_READ_RSP,
            Pdu::ReadBlobRequest { .. } => ATT_READ_BLOB_REQ,
            Pdu::ReadBlobResponse { .. } => ATT_READ_BLOB_RSP,
            Pdu::ReadMultipleRequest { .. } => ATT_READ_MULTIPLE_REQ,
            Pdu::ReadMultipleResponse { .. } => ATT_READ_MULTIPLE_RSP,
            Pdu::ReadByGroupTypeRequest { .. } => ATT_READ_BY_GROUP_TYPE_REQ,
            Pdu::ReadByGroupTypeResponse { .. } => ATT_READ_BY_GROUP_TYPE_RSP,
            Pdu::WriteRequest { .. } => ATT_WRITE_REQ,
            Pdu::WriteResponse => ATT_WRITE_RSP,
            Pdu::WriteCommand { .. } => ATT_WRITE_CMD,
            Pdu::SignedWriteCommand { .. } => ATT_SIGNED_WRITE_CMD,
            Pdu::PrepareWriteRequest { .. } => ATT_PREPARE_WRITE_REQ,
            Pdu::PrepareWriteResponse { .. } => ATT_PREPARE_WRITE_RSP,
            Pdu::ExecuteWriteRequest { .. } => ATT_EXECUTE_WRITE_REQ,
            Pdu::ExecuteWriteResponse => ATT_EXECUTE_WRITE_RSP,
            Pdu::HandleValueNotification { .. } => ATT_HANDLE_VALUE_NTF,
            Pdu::HandleValueIndication { .. } => ATT_HANDLE_VALUE_IND,
            Pdu::HandleValueConfirmation => ATT_HANDLE_VALUE_CONF,
            Pdu::Unknown { opcode, .. } => *opcode,
        }
    }

    /// The response opcode this PDU expects, when it is a request.
    pub fn expected_response(&self) -> Option<u8> {
        match self.opcode() {
            ATT_EXCHANGE_MTU_REQ => Some(ATT_EXCHANGE_MTU_RSP),
            ATT_FIND_INFO_REQ => Some(ATT_FIND_INFO_RSP),
            ATT_FIND_BY_TYPE_VALUE_REQ => Some(ATT_FIND_BY_TYPE_VALUE_RSP),
            ATT_READ_BY_TYPE_REQ => Some(ATT_READ_BY_TYPE_RSP),
            ATT_READ_REQ => Some(ATT_READ_RSP),
            ATT_READ_BLOB_REQ => Some(ATT_READ_BLOB_RSP),
            ATT_READ_MULTIPLE_REQ => Some(ATT_READ_MULTIPLE_RSP),
            ATT_READ_BY_GROUP_TYPE_REQ => Some(ATT_READ_BY_GROUP_TYPE_RSP),
            ATT_WRITE_REQ => Some(ATT_WRITE_RSP),
            ATT_PREPARE_WRITE_REQ => Some(ATT_PREPARE_WRITE_RSP),
            ATT_EXECUTE_WRITE_REQ => Some(ATT_EXECUTE_WRITE_RSP),
            _ => None,
        }
    }

    /// True when the opcode byte carries the command flag.
    pub fn is_command(&self) -> bool {
        self.opcode() & ATT_OPCODE_COMMAND_FLAG != 0
    }

    /// Encodes this PDU to its wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.opcode()];
        match self {
            Pdu::ErrorResponse {
                request_opcode,
                handle,
                code,
            } => {
                out.push(*request_opcode);
                out.extend_from_slice(&handle.to_le_bytes());
                out.push(u8::from(*code));
            }
            Pdu::ExchangeMtuRequest { client_rx_mtu } => {
                out.extend_from_slice(&client_rx_mtu.to_le_bytes());
            }
            Pdu::ExchangeMtuResponse { server_rx_mtu } => {
                out.extend_from_slice(&server_rx_mtu.to_le_bytes());
            }
            Pdu::FindInformationRequest {
                start_handle,
                end_handle,
            } => {
                out.extend_from_slice(&start_handle.to_le_bytes());
                out.extend_from_slice(&end_handle.to_le_bytes());
            }
            Pdu::FindInformationResponse { pairs } => {
                // Wire format is uniform: one format byte for all pairs, so a
                // single 128-bit UUID forces the long form for the page.
                let all_short = pairs.iter().all(|p| p.uuid.as_u16().is_some());
                out.push(if all_short {
                    ATT_FIND_INFO_FORMAT_16BIT
                } else {
                    ATT_FIND_INFO_FORMAT_128BIT
                });
                for pair in pairs {
                    out.extend_from_slice(&pair.handle.to_le_bytes());
                    match (all_short, pair.uuid.as_u16()) {
                        (true, Some(short)) => out.extend_from_slice(&short.to_le_bytes()),
                        _ => out.extend_from_slice(pair.uuid.as_bytes_le()),
                    }
                }
            }
            Pdu::FindByTypeValueRequest {
                start_handle,
                end_handle,
                attribute_type,
                value,
            } => {
                out.extend_from_slice(&start_handle.to_le_bytes());
                out.extend_from_slice(&end_handle.to_le_bytes());
                out.extend_from_slice(&attribute_type.to_le_bytes());
                out.extend_from_slice(value);
            }
            Pdu::FindByTypeValueResponse { groups } => {
                for group in groups {
                    out.extend_from_slice(&group.found_handle.to_le_bytes());
                    out.extend_from_slice(&group.group_end_handle.to_le_bytes());
                }
            }
            Pdu::ReadByTypeRequest {
                start_handle,
                end_handle,
                attribute_type,
            } => {
                out.extend_from_slice(&start_handle.to_le_bytes());
                out.extend_from_slice(&end_handle.to_le_bytes());
                out.extend_from_slice(&attribute_type.wire_bytes());
            }
            Pdu::ReadByTypeResponse { pairs } => {
                let stride = pairs.first().map_or(2, |p| 2 + p.value.len());
                out.push(stride as u8);
                for pair in pairs {
                    out.extend_from_slice(&pair.handle.to_le_bytes());
                    out.extend_from_slice(&pair.value);
                }
            }
            Pdu::ReadRequest { handle } => {
                out.extend_from_slice(&handle.to_le_bytes());
            }
            Pdu::ReadResponse { value } => {
                out.extend_from_slice(value);
            }
            Pdu::ReadBlobRequest { handle, offset } => {
                out.extend_from_slice(&handle.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
            }
            Pdu::ReadBlobResponse { part_value } => {
                out.extend_from_slice(part_value);
            }
            Pdu::ReadMultipleRequest { handles } => {
                for handle in handles {
                    out.extend_from_slice(&handle.to_le_bytes());
                }
            }
            Pdu::ReadMultipleResponse { values } => {
                out.extend_from_slice(values);
            }
            Pdu::ReadByGroupTypeRequest {
                start_handle,
                end_handle,
                group_type,
            } => {
                out.extend_from_slice(&start_handle.to_le_bytes());
                out.extend_from_slice(&end_handle.to_le_bytes());
                out.extend_from_slice(&group_type.wire_bytes());
            }
            Pdu::ReadByGroupTypeResponse { groups } => {
                let stride = groups.first().map_or(4, |g| 4 + g.value.len());
                out.push(stride as u8);
                for group in groups {
                    out.extend_from_slice(&group.start_handle.to_le_bytes());
                    out.extend_from_slice(&group.end_handle.to_le_bytes());
                    out.extend_from_slice(&group.value);
                }
            }
            Pdu::WriteRequest { handle, value } | Pdu::WriteCommand { handle, value } => {
                out.extend_from_slice(&handle.to_le_bytes());
                out.extend_from_slice(value);
            }
            Pdu::SignedWriteCommand {
                handle,
                value,
                signature,
            } => {
                out.extend_from_slice(&handle.to_le_bytes());
                out.extend_from_slice(value);
                out.extend_from_slice(signature);
            }
            Pdu::PrepareWriteRequest {
                handle,
                offset,
                part_value,
            }
            | Pdu::PrepareWriteResponse {
                handle,
                offset,
                part_value,
            } => {
                out.extend_from_slice(&handle.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(part_value);
            }
            Pdu::ExecuteWriteRequest { flags } => {
                out.push(u8::from(*flags));
            }
            Pdu::HandleValueNotification { handle, value }
            | Pdu::HandleValueIndication { handle, value } => {
                out.extend_from_slice(&handle.to_le_bytes());
                out.extend_from_slice(value);
            }
            Pdu::WriteResponse
            | Pdu::ExecuteWriteResponse
            | Pdu::HandleValueConfirmation => {}
            Pdu::Unknown { payload, .. } => {
                out.extend_from_slice(payload);
            }
        }
        out
    }

    /// Decodes one wire frame into a PDU.
    ///
    /// Unknown opcodes decode to [`Pdu::Unknown`]; everything else is
    /// validated against its layout and yields [`AttError::Malformed`] on any
    /// length or stride violation.
    pub fn decode(data: &[u8]) -> AttResult<Pdu> {
        let opcode = *data.first().ok_or(AttError::Malformed)?;
        let body = &data[1..];

        match opcode {
            ATT_ERROR_RSP => {
                exact(body, 4)?;
                Ok(Pdu::ErrorResponse {
                    request_opcode: body[0],
                    handle: u16::from_le_bytes([body[1], body[2]]),
                    code: ErrorCode::from(body[3]),
                })
            }
            ATT_EXCHANGE_MTU_REQ => {
                exact(body, 2)?;
                Ok(Pdu::ExchangeMtuRequest {
                    client_rx_mtu: u16::from_le_bytes([body[0], body[1]]),
                })
            }
            ATT_EXCHANGE_MTU_RSP => {
                exact(body, 2)?;
                Ok(Pdu::ExchangeMtuResponse {
                    server_rx_mtu: u16::from_le_bytes([body[0], body[1]]),
                })
            }
            ATT_FIND_INFO_REQ => {
                exact(body, 4)?;
                let mut cur = Cursor::new(body);
                Ok(Pdu::FindInformationRequest {
                    start_handle: read_u16(&mut cur)?,
                    end_handle: read_u16(&mut cur)?,
                })
            }
            ATT_FIND_INFO_RSP => decode_find_information_response(body),
            ATT_FIND_BY_TYPE_VALUE_REQ => {
                at_least(body, 6)?;
                let mut cur = Cursor::new(body);
                Ok(Pdu::FindByTypeValueRequest {
                    start_handle: read_u16(&mut cur)?,
                    end_handle: read_u16(&mut cur)?,
                    attribute_type: read_u16(&mut cur)?,
                    value: body[6..].to_vec(),
                })
            }
            ATT_FIND_BY_TYPE_VALUE_RSP => {
                if body.len() % 4 != 0 {
                    return Err(AttError::Malformed);
                }
                let groups = body
                    .chunks_exact(4)
                    .map(|chunk| HandleGroup {
                        found_handle: u16::from_le_bytes([chunk[0], chunk[1]]),
                        group_end_handle: u16::from_le_bytes([chunk[2], chunk[3]]),
                    })
                    .collect();
                Ok(Pdu::FindByTypeValueResponse { groups })
            }
            ATT_READ_BY_TYPE_REQ => {
                let (start_handle, end_handle, attribute_type) = decode_typed_range(body)?;
                Ok(Pdu::ReadByTypeRequest {
                    start_handle,
                    end_handle,
                    attribute_type,
                })
            }
            ATT_READ_BY_TYPE_RSP => {
                let pairs = decode_strided(body, 2)?
                    .map(|chunk| HandleValue {
                        handle: u16::from_le_bytes([chunk[0], chunk[1]]),
                        value: chunk[2..].to_vec(),
                    })
                    .collect();
                Ok(Pdu::ReadByTypeResponse { pairs })
            }
            ATT_READ_REQ => {
                exact(body, 2)?;
                Ok(Pdu::ReadRequest {
                    handle: u16::from_le_bytes([body[0], body[1]]),
                })
            }
            ATT_READ_RSP => Ok(Pdu::ReadResponse {
                value: body.to_vec(),
            }),
            ATT_READ_BLOB_REQ => {
                exact(body, 4)?;
                let mut cur = Cursor::new(body);
                Ok(Pdu::ReadBlobRequest {
                    handle: read_u16(&mut cur)?,
                    offset: read_u16(&mut cur)?,
                })
            }
            ATT_READ_BLOB_RSP => Ok(Pdu::ReadBlobResponse {
                part_value: body.to_vec(),
            }),
            ATT_READ_MULTIPLE_REQ => {
                // The request must carry at least two handles.
                if body.len() < 4 || body.len() % 2 != 0 {
                    return Err(AttError::Malformed);
                }
                let handles = body
                    .chunks_exact(2)
                    .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
                    .collect();
                Ok(Pdu::ReadMultipleRequest { handles })
            }
            ATT_READ_MULTIPLE_RSP => Ok(Pdu::ReadMultipleResponse {
                values: body.to_vec(),
            }),
            ATT_READ_BY_GROUP_TYPE_REQ => {
                let (start_handle, end_handle, group_type) = decode_typed_range(body)?;
                Ok(Pdu::ReadByGroupTypeRequest {
                    start_handle,
                    end_handle,
                    group_type,
                })
            }
            ATT_READ_BY_GROUP_TYPE_RSP => {
                let groups = decode_strided(body, 4)?
                    .map(|chunk| GroupData {
                        start_handle: u16::from_le_bytes([chunk[0], chunk[1]]),
                        end_handle: u16::from_le_bytes([chunk[2], chunk[3]]),
                        value: chunk[4..].to_vec(),
                    })
                    .collect();
                Ok(Pdu::ReadByGroupTypeResponse { groups })
            }
            ATT_WRITE_REQ => {
                at_least(body, 2)?;
                Ok(Pdu::WriteRequest {
                    handle: u16::from_le_bytes([body[0], body[1]]),
                    value: body[2..].to_vec(),
                })
            }
            ATT_WRITE_RSP => {
                exact(body, 0)?;
                Ok(Pdu::WriteResponse)
            }
            ATT_WRITE_CMD => {
                at_least(body, 2)?;
                Ok(Pdu::WriteCommand {
                    handle: u16::from_le_bytes([body[0], body[1]]),
                    value: body[2..].to_vec(),
                })
            }
            ATT_SIGNED_WRITE_CMD => {
                at_least(body, 2 + ATT_SIGNATURE_LEN)?;
                let sig_start = body.len() - ATT_SIGNATURE_LEN;
                let mut signature = [0u8; ATT_SIGNATURE_LEN];
                signature.copy_from_slice(&body[sig_start..]);
                Ok(Pdu::SignedWriteCommand {
                    handle: u16::from_le_bytes([body[0], body[1]]),
                    value: body[2..sig_start].to_vec(),
                    signature,
                })
            }
            ATT_PREPARE_WRITE_REQ | ATT_PREPARE_WRITE_RSP => {
                at_least(body, 4)?;
                let mut cur = Cursor::new(body);
                let handle = read_u16(&mut cur)?;
                let offset = read_u16(&mut cur)?;
                let part_value = body[4..].to_vec();
                if opcode == ATT_PREPARE_WRITE_REQ {
                    Ok(Pdu::PrepareWriteRequest {
                        handle,
                        offset,
                        part_value,
                    })
                } else {
                    Ok(Pdu::PrepareWriteResponse {
                        handle,
                        offset,
                        part_value,
                    })
                }
            }
            ATT_EXECUTE_WRITE_REQ => {
                exact(body, 1)?;
                let flags = match body[0] {
                    ATT_EXEC_WRITE_CANCEL => ExecuteWriteFlag::Cancel,
                    ATT_EXEC_WRITE_COMMIT => ExecuteWriteFlag::Write,
                    _ => return Err(AttError::Malformed),
                };
                Ok(Pdu::ExecuteWriteRequest { flags })
            }
            ATT_EXECUTE_WRITE_RSP => {
                exact(body, 0)?;
                Ok(Pdu::ExecuteWriteResponse)
            }
            ATT_HANDLE_VALUE_NTF => {
                at_least(body, 2)?;
                Ok(Pdu::HandleValueNotification {
                    handle: u16::from_le_bytes([body[0], body[1]]),
                    value: body[2..].to_vec(),
                })
            }
            ATT_HANDLE_VALUE_IND => {
                at_least(body, 2)?;
                Ok(Pdu::HandleValueIndication {
                    handle: u16::from_le_bytes([body[0], body[1]]),
                    value: body[2..].to_vec(),
                })
            }
            ATT_HANDLE_VALUE_CONF => {
                exact(body, 0)?;
                Ok(Pdu::HandleValueConfirmation)
            }
            _ => Ok(Pdu::Unknown {
                opcode,
                payload: body.to_vec(),
            }),
        }
    }
}

fn exact(body: &[u8], len: usize) -> AttResult<()> {
    if body.len() == len {
        Ok(())
    } else {
        Err(AttError::Malformed)
    }
}

fn at_least(body: &[u8], len: usize) -> AttResult<()> {
    if body.len() >= len {
        Ok(())
    } else {
        Err(AttError::Malformed)
    }
}

fn read_u16(cur: &mut Cursor<&[u8]>) -> AttResult<u16> {
    cur.read_u16::<LittleEndian>().map_err(|_| AttError::Malformed)
}

/// Parses the `start | end | type` body shared by Read By Type and Read By
/// Group Type requests. The attribute type is 2 or 16 bytes; the total body
/// length disambiguates.
fn decode_typed_range(body: &[u8]) -> AttResult<(u16, u16, Uuid)> {
    let uuid = match body.len() {
        6 => Uuid::from_u16(u16::from_le_bytes([body[4], body[5]])),
        20 => {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&body[4..20]);
            Uuid::from_bytes_le(bytes)
        }
        _ => return Err(AttError::Malformed),
    };
    let mut cur = Cursor::new(body);
    Ok((read_u16(&mut cur)?, read_u16(&mut cur)?, uuid))
}

/// Validates the leading per-item length byte of a strided list response and
/// yields the item chunks.
fn decode_strided(body: &[u8], min_stride: usize) -> AttResult<std::slice::ChunksExact<'_, u8>> {
    let stride = *body.first().ok_or(AttError::Malformed)? as usize;
    if stride < min_stride {
        return Err(AttError::Malformed);
    }
    let items = &body[1..];
    if items.len() % stride != 0 {
        return Err(AttError::Malformed);
    }
    Ok(items.chunks_exact(stride))
}

fn decode_find_information_response(body: &[u8]) -> AttResult<Pdu> {
    let format = *body.first().ok_or(AttError::Malformed)?;
    let width = match format {
        ATT_FIND_INFO_FORMAT_16BIT => 4,
        ATT_FIND_INFO_FORMAT_128BIT => 18,
        _ => return Err(AttError::Malformed),
    };
    let items = &body[1..];
    if items.len() % width != 0 {
        return Err(AttError::Malformed);
    }
    let pairs = items
        .chunks_exact(width)
        .map(|chunk| {
            let handle = u16::from_le_bytes([chunk[0], chunk[1]]);
            let uuid = match Uuid::try_from_slice_le(&chunk[2..]) {
                Some(uuid) => uuid,
                // chunk width is always 4 or 18, so the slice is 2 or 16
                None => Uuid::from_u16(0),
            };
            HandleUuid { handle, uuid }
        })
        .collect();
    Ok(Pdu::FindInformationResponse { pairs })
}
