//! GATT client procedures.
//!
//! Every multi-round-trip procedure here (discovery, long reads, long
//! writes) drives the ATT bearer one transaction at a time and applies the
//! shared termination policy: an Error Response carrying *Attribute Not
//! Found* ends a discovery procedure successfully with whatever has been
//! accumulated, while any other error code aborts the procedure with that
//! error.

use std::collections::BTreeMap;

use log::{debug, warn};
use thiserror::Error;

use crate::att::connection::{Connection, ValueCallback};
use crate::att::constants::*;
use crate::att::error::{AttError, ErrorCode};
use crate::att::pdu::{ExecuteWriteFlag, HandleValue, Pdu};
use crate::gatt::cache::ServiceCache;
use crate::gatt::types::{Characteristic, CharacteristicProperties, Descriptor, Service, Uuid};
use crate::transport::Transport;

/// Errors surfaced by GATT procedures.
#[derive(Debug, Error)]
pub enum GattError {
    #[error("ATT error: {0}")]
    Att(#[from] AttError),

    #[error("service not found")]
    ServiceNotFound,

    #[error("characteristic not found")]
    CharacteristicNotFound,

    #[error("characteristic has no client characteristic configuration descriptor")]
    ClientConfigurationMissing,

    #[error("a long write is already in progress on this bearer")]
    InLongWrite,

    #[error("operation not permitted by characteristic properties")]
    NotPermitted,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result alias for GATT operations.
pub type GattResult<T> = Result<T, GattError>;

fn protocol_violation(pdu: &Pdu) -> GattError {
    GattError::Att(AttError::InvalidResponse(Box::new(pdu.clone())))
}

/// A client for one remote GATT server over one ATT bearer.
pub struct GattClient<T: Transport> {
    connection: Connection<T>,
    cache: ServiceCache,
    in_long_write: bool,
}

impl<T: Transport> GattClient<T> {
    /// Creates a client over a fresh bearer with the given preferred receive
    /// MTU.
    pub fn new(transport: T, rx_mtu: u16) -> GattResult<Self> {
        Ok(GattClient {
            connection: Connection::new(transport, rx_mtu)?,
            cache: ServiceCache::new(),
            in_long_write: false,
        })
    }

    /// Negotiates the MTU with the server and returns the effective value.
    pub fn exchange_mtu(&mut self) -> GattResult<u16> {
        Ok(self.connection.exchange_mtu()?)
    }

    /// The bearer's current effective MTU.
    pub fn mtu(&self) -> u16 {
        self.connection.mtu()
    }

    /// The discovered view of the server.
    pub fn cache(&self) -> &ServiceCache {
        &self.cache
    }

    /// The underlying ATT bearer.
    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.connection
    }

    /// Discovers every primary service on the server.
    ///
    /// This is a complete-set discovery: cached services absent from the
    /// result are evicted.
    pub fn discover_services(&mut self) -> GattResult<Vec<Service>> {
        let mut services = Vec::new();
        let mut start = ATT_HANDLE_MIN;

        loop {
            let response = match self.connection.request(Pdu::ReadByGroupTypeRequest {
                start_handle: start,
                end_handle: ATT_HANDLE_MAX,
                group_type: Uuid::from_u16(PRIMARY_SERVICE_UUID),
            }) {
                Ok(response) => response,
                Err(err) if err.is_error_response(ErrorCode::AttributeNotFound) => break,
                Err(err) => return Err(err.into()),
            };
            let groups = match &response {
                Pdu::ReadByGroupTypeResponse { groups } => groups,
                other => return Err(protocol_violation(other)),
            };
            if groups.is_empty() {
                break;
            }
            let mut last_end = start;
            for group in groups {
                let uuid = match group.value.len() {
                    2 | 16 => match Uuid::try_from_slice_le(&group.value) {
                        Some(uuid) => uuid,
                        None => return Err(protocol_violation(&response)),
                    },
                    _ => return Err(protocol_violation(&response)),
                };
                services.push(Service {
                    uuid,
                    is_primary: true,
                    start_handle: group.start_handle,
                    end_handle: group.end_handle,
                });
                last_end = group.end_handle;
            }
            // A group ending below where this round started would paginate
            // backwards forever.
            if last_end < start {
                return Err(protocol_violation(&response));
            }
            if last_end == ATT_HANDLE_MAX {
                break;
            }
            start = last_end + 1;
        }

        debug!("discovered {} primary services", services.len());
        self.cache.insert_services(&services, true);
        Ok(services)
    }

    /// Discovers the primary services with a specific UUID.
    ///
    /// This is a partial discovery; unrelated cache entries are untouched.
    /// The response does not echo the UUID, so the result records the one
    /// that was asked for.
    pub fn discover_services_by_uuid(&mut self, uuid: Uuid) -> GattResult<Vec<Service>> {
        let mut services = Vec::new();
        let mut start = ATT_HANDLE_MIN;

        loop {
            let response = match self.connection.request(Pdu::FindByTypeValueRequest {
                start_handle: start,
                end_handle: ATT_HANDLE_MAX,
                attribute_type: PRIMARY_SERVICE_UUID,
                value: uuid.wire_bytes(),
            }) {
                Ok(response) => response,
                Err(err) if err.is_error_response(ErrorCode::AttributeNotFound) => break,
                Err(err) => return Err(err.into()),
            };
            let groups = match &response {
                Pdu::FindByTypeValueResponse { groups } => groups,
                other => return Err(protocol_violation(other)),
            };
            if groups.is_empty() {
                break;
            }
            let mut last_end = start;
            for group in groups {
                services.push(Service {
                    uuid,
                    is_primary: true,
                    start_handle: group.found_handle,
                    end_handle: group.group_end_handle,
                });
                last_end = group.group_end_handle;
            }
            if last_end < start {
                return Err(protocol_violation(&response));
            }
            if last_end == ATT_HANDLE_MAX {
                break;
            }
            start = last_end + 1;
        }

        self.cache.insert_services(&services, false);
        Ok(services)
    }

    /// Discovers every characteristic of a service.
    ///
    /// Complete-set for that service: cached characteristics absent from the
    /// result are evicted.
    pub fn discover_characteristics(&mut self, service: &Service) -> GattResult<Vec<Characteristic>> {
        let found =
            self.discover_characteristics_in_range(service.start_handle, service.end_handle, None)?;
        self.cache.insert_services(std::slice::from_ref(service), false);
        self.cache.insert_characteristics(&service.uuid, &found, true);
        Ok(found)
    }

    /// Discovers the first characteristic of a service with the given UUID,
    /// stopping as soon as it is seen.
    pub fn discover_characteristic_by_uuid(
        &mut self,
        service: &Service,
        uuid: Uuid,
    ) -> GattResult<Characteristic> {
        let found = self.discover_characteristics_in_range(
            service.start_handle,
            service.end_handle,
            Some(uuid),
        )?;
        let characteristic = found
            .into_iter()
            .find(|c| c.uuid == uuid)
            .ok_or(GattError::CharacteristicNotFound)?;
        self.cache.insert_services(std::slice::from_ref(service), false);
        self.cache.insert_characteristics(
            &service.uuid,
            std::slice::from_ref(&characteristic),
            false,
        );
        Ok(characteristic)
    }

    fn discover_characteristics_in_range(
        &mut self,
        start_handle: u16,
        end_handle: u16,
        target: Option<Uuid>,
    ) -> GattResult<Vec<Characteristic>> {
        let mut found = Vec::new();
        let mut start = start_handle;

        'pages: while start <= end_handle {
            let response = match self.connection.request(Pdu::ReadByTypeRequest {
                start_handle: start,
                end_handle,
                attribute_type: Uuid::from_u16(CHARACTERISTIC_UUID),
            }) {
                Ok(response) => response,
                Err(err) if err.is_error_response(ErrorCode::AttributeNotFound) => break,
                Err(err) => return Err(err.into()),
            };
            let pairs = match &response {
                Pdu::ReadByTypeResponse { pairs } => pairs,
                other => return Err(protocol_violation(other)),
            };
            if pairs.is_empty() {
                break;
            }
            let mut last_declaration = start;
            for pair in pairs {
                if pair.handle < start {
                    return Err(protocol_violation(&response));
                }
                let characteristic = match parse_characteristic_declaration(pair) {
                    Some(c) => c,
                    None => return Err(protocol_violation(&response)),
                };
                last_declaration = characteristic.declaration_handle;
                let matched = target.map_or(false, |t| characteristic.uuid == t);
                found.push(characteristic);
                if matched {
                    break 'pages;
                }
            }
            if last_declaration == ATT_HANDLE_MAX {
                break;
            }
            start = last_declaration + 1;
        }

        Ok(found)
    }

    /// Discovers the descriptors of a characteristic.
    ///
    /// The search range runs from one past the value handle to the
    /// characteristic's end handle, which the cache derives from the next
    /// characteristic's declaration (or the service end when it is the
    /// last). The service and characteristic must have been discovered
    /// first.
    pub fn discover_descriptors(
        &mut self,
        characteristic: &Characteristic,
    ) -> GattResult<Vec<Descriptor>> {
        let end_handle = self
            .cache
            .end_handle_of(characteristic)
            .ok_or(GattError::ServiceNotFound)?;
        let mut descriptors = Vec::new();

        if characteristic.value_handle < end_handle {
            let mut start = characteristic.value_handle + 1;
            while start <= end_handle {
                let response = match self.connection.request(Pdu::FindInformationRequest {
                    start_handle: start,
                    end_handle,
                }) {
                    Ok(response) => response,
                    Err(err) if err.is_error_response(ErrorCode::AttributeNotFound) => break,
                    Err(err) => return Err(err.into()),
                };
                let pairs = match &response {
                    Pdu::FindInformationResponse { pairs } => pairs,
                    other => return Err(protocol_violation(other)),
                };
                if pairs.is_empty() {
                    break;
                }
                let mut last_handle = start;
                for pair in pairs {
                    if pair.handle < start {
                        return Err(protocol_violation(&response));
                    }
                    descriptors.push(Descriptor {
                        uuid: pair.uuid,
                        handle: pair.handle,
                    });
                    last_handle = pair.handle;
                }
                if last_handle >= end_handle {
                    break;
                }
                start = last_handle + 1;
            }
        }

        if !self.cache.insert_descriptors(characteristic, &descriptors) {
            return Err(GattError::CharacteristicNotFound);
        }
        Ok(descriptors)
    }

    /// Reads an attribute value, transparently escalating to Read Blob
    /// requests when the value may exceed one PDU.
    pub fn read(&mut self, handle: u16) -> GattResult<Vec<u8>> {
        let mtu = self.connection.mtu() as usize;
        let response = self.connection.request(Pdu::ReadRequest { handle })?;
        let mut value = match response {
            Pdu::ReadResponse { value } => value,
            other => return Err(protocol_violation(&other)),
        };

        // A payload of exactly MTU-1 bytes may be truncated.
        while value.len() % (mtu - 1) == 0 && !value.is_empty() {
            let offset = value.len() as u16;
            match self.connection.request(Pdu::ReadBlobRequest { handle, offset }) {
                Ok(Pdu::ReadBlobResponse { part_value }) => {
                    let full = part_value.len() == mtu - 1;
                    value.extend_from_slice(&part_value);
                    if !full {
                        break;
                    }
                }
                Ok(other) => return Err(protocol_violation(&other)),
                // Servers answer a blob request past the end of a value, or
                // on a value that is not long, with these codes; the data in
                // hand is complete.
                Err(err)
                    if err.is_error_response(ErrorCode::InvalidOffset)
                        || err.is_error_response(ErrorCode::AttributeNotLong) =>
                {
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(value)
    }

    /// Reads the value of a characteristic, checking its properties.
    pub fn read_characteristic(&mut self, characteristic: &Characteristic) -> GattResult<Vec<u8>> {
        if !characteristic.properties.can_read() {
            return Err(GattError::NotPermitted);
        }
        self.read(characteristic.value_handle)
    }

    /// Reads every attribute of a given type in a handle range, returning
    /// the accumulated handle-to-value map.
    ///
    /// *Attribute Not Found* after at least one page completes the
    /// procedure; with nothing accumulated it is surfaced as the wire error.
    pub fn read_by_uuid(
        &mut self,
        start_handle: u16,
        end_handle: u16,
        uuid: Uuid,
    ) -> GattResult<BTreeMap<u16, Vec<u8>>> {
        let mut values = BTreeMap::new();
        let mut start = start_handle;

        while start <= end_handle {
            let response = match self.connection.request(Pdu::ReadByTypeRequest {
                start_handle: start,
                end_handle,
                attribute_type: uuid,
            }) {
                Ok(response) => response,
                Err(err) if err.is_error_response(ErrorCode::AttributeNotFound) => {
                    if values.is_empty() {
                        return Err(err.into());
                    }
                    break;
                }
                Err(err) => return Err(err.into()),
            };
            let pairs = match &response {
                Pdu::ReadByTypeResponse { pairs } => pairs,
                other => return Err(protocol_violation(other)),
            };
            if pairs.is_empty() {
                break;
            }
            let mut last_handle = start;
            for pair in pairs {
                if pair.handle < start {
                    return Err(protocol_violation(&response));
                }
                values.insert(pair.handle, pair.value.clone());
                last_handle = pair.handle;
            }
            if last_handle >= end_handle {
                break;
            }
            start = last_handle + 1;
        }

        Ok(values)
    }

    /// Reads several attributes in one request.
    ///
    /// The server concatenates the values without delimiters, so this is
    /// only usable when the caller knows the field widths; the raw bytes are
    /// returned as-is. Requires at least two handles.
    pub fn read_multiple(&mut self, handles: &[u16]) -> GattResult<Vec<u8>> {
        if handles.len() < 2 {
            return Err(GattError::InvalidParameter(
                "read multiple requires at least two handles".into(),
            ));
        }
        let response = self.connection.request(Pdu::ReadMultipleRequest {
            handles: handles.to_vec(),
        })?;
        match response {
            Pdu::ReadMultipleResponse { values } => Ok(values),
            other => Err(protocol_violation(&other)),
        }
    }

    /// Writes an attribute value without response, truncating silently to
    /// the first MTU-3 bytes.
    pub fn write_command(&mut self, handle: u16, value: &[u8]) -> GattResult<()> {
        let take = value.len().min(self.connection.mtu() as usize - ATT_WRITE_HEADER_LEN);
        self.connection.send_command(Pdu::WriteCommand {
            handle,
            value: value[..take].to_vec(),
        })?;
        Ok(())
    }

    /// Writes an attribute value with a Write Request, truncating to the
    /// first MTU-3 bytes. Completes on the Write Response.
    pub fn write(&mut self, handle: u16, value: &[u8]) -> GattResult<()> {
        let take = value.len().min(self.connection.mtu() as usize - ATT_WRITE_HEADER_LEN);
        let response = self.connection.request(Pdu::WriteRequest {
            handle,
            value: value[..take].to_vec(),
        })?;
        match response {
            Pdu::WriteResponse => Ok(()),
            other => Err(protocol_violation(&other)),
        }
    }

    /// Writes the value of a characteristic with response, checking its
    /// properties.
    pub fn write_characteristic(
        &mut self,
        characteristic: &Characteristic,
        value: &[u8],
    ) -> GattResult<()> {
        if !characteristic.properties.can_write() {
            return Err(GattError::NotPermitted);
        }
        self.write(characteristic.value_handle, value)
    }

    /// Writes the value of a characteristic without response, checking its
    /// properties.
    pub fn write_characteristic_without_response(
        &mut self,
        characteristic: &Characteristic,
        value: &[u8],
    ) -> GattResult<()> {
        if !characteristic.properties.can_write_without_response() {
            return Err(GattError::NotPermitted);
        }
        self.write_command(characteristic.value_handle, value)
    }

    /// Writes a value of any length through the prepare/execute queue.
    ///
    /// The value is chunked into MTU-5 byte slices at successive offsets. In
    /// reliable mode each Prepare Write Response must echo the slice it
    /// acknowledges; on a mismatch the prepare queue is cancelled before the
    /// error is surfaced. Only one long write may run on a bearer at a time.
    pub fn write_long(&mut self, handle: u16, value: &[u8], reliable: bool) -> GattResult<()> {
        if self.in_long_write {
            return Err(GattError::InLongWrite);
        }
        self.in_long_write = true;
        let result = self.write_long_inner(handle, value, reliable);
        self.in_long_write = false;
        result
    }

    fn write_long_inner(&mut self, handle: u16, value: &[u8], reliable: bool) -> GattResult<()> {
        let chunk_len = self.connection.mtu() as usize - ATT_PREPARE_WRITE_HEADER_LEN;
        let mut offset = 0usize;

        for part in value.chunks(chunk_len) {
            let response = self.connection.request(Pdu::PrepareWriteRequest {
                handle,
                offset: offset as u16,
                part_value: part.to_vec(),
            })?;
            let echo_ok = match &response {
                Pdu::PrepareWriteResponse {
                    handle: echo_handle,
                    offset: echo_offset,
                    part_value: echo_part,
                } => {
                    !reliable
                        || (*echo_handle == handle
                            && *echo_offset == offset as u16
                            && echo_part == part)
                }
                _ => false,
            };
            if !echo_ok {
                if let Err(err) = self.execute_write(ExecuteWriteFlag::Cancel) {
                    warn!("failed to cancel prepare queue: {err}");
                }
                return Err(protocol_violation(&response));
            }
            offset += part.len();
        }

        self.execute_write(ExecuteWriteFlag::Write)
    }

    fn execute_write(&mut self, flags: ExecuteWriteFlag) -> GattResult<()> {
        let response = self
            .connection
            .request(Pdu::ExecuteWriteRequest { flags })?;
        match response {
            Pdu::ExecuteWriteResponse => Ok(()),
            other => Err(protocol_violation(&other)),
        }
    }

    /// Enables or disables server-initiated value updates for a
    /// characteristic.
    ///
    /// With a callback, writes notify (0x0001) or indicate (0x0002) bits to
    /// the Client Characteristic Configuration descriptor, preferring notify
    /// when the characteristic supports both, and installs the callback for
    /// the value handle. With `None`, writes 0x0000 and removes the
    /// callback. Descriptor discovery runs on demand.
    pub fn subscribe(
        &mut self,
        characteristic: &Characteristic,
        callback: Option<ValueCallback>,
    ) -> GattResult<()> {
        if self.cache.descriptors_of(characteristic).is_none() {
            self.discover_descriptors(characteristic)?;
        }
        let cccd = self
            .cache
            .descriptor(characteristic, &Uuid::from_u16(CLIENT_CHAR_CONFIG_UUID))
            .ok_or(GattError::ClientConfigurationMissing)?;

        let bits = match &callback {
            Some(_) if characteristic.properties.can_notify() => CCCD_NOTIFICATION_BIT,
            Some(_) if characteristic.properties.can_indicate() => CCCD_INDICATION_BIT,
            Some(_) => return Err(GattError::NotPermitted),
            None => 0,
        };
        self.write(cccd.handle, &bits.to_le_bytes())?;

        match callback {
            Some(callback) => self
                .connection
                .register_value_callback(characteristic.value_handle, callback),
            None => self
                .connection
                .unregister_value_callback(characteristic.value_handle),
        }
        self.cache.update_client_config(characteristic, bits);
        Ok(())
    }
}

/// Decodes a characteristic declaration pair from a Read By Type Response:
/// properties (1 byte), value handle (2 bytes), UUID (2 or 16 bytes).
fn parse_characteristic_declaration(pair: &HandleValue) -> Option<Characteristic> {
    let value = &pair.value;
    let uuid = match value.len() {
        5 => Uuid::from_u16(u16::from_le_bytes([value[3], value[4]])),
        19 => Uuid::try_from_slice_le(&value[3..19])?,
        _ => return None,
    };
    Some(Characteristic {
        uuid,
        properties: CharacteristicProperties::from_bits_truncate(value[0]),
        declaration_handle: pair.handle,
        value_handle: u16::from_le_bytes([value[1], value[2]]),
    })
}
