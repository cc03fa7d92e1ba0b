//! Unit tests for the GATT cache and client procedures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use crate::att::connection::ValueCallback;
use crate::att::error::{AttError, ErrorCode};
use crate::gatt::cache::ServiceCache;
use crate::gatt::client::{GattClient, GattError};
use crate::gatt::types::{Characteristic, CharacteristicProperties, Descriptor, Service, Uuid};
use crate::transport::Transport;

#[derive(Default)]
struct Shared {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<Vec<u8>>,
}

/// Scripted transport: tests queue the server's frames up front and inspect
/// what the client transmitted.
#[derive(Clone, Default)]
struct MockTransport {
    shared: Rc<RefCell<Shared>>,
}

impl MockTransport {
    fn new() -> Self {
        MockTransport::default()
    }

    fn push_inbound(&self, frame: &[u8]) {
        self.shared.borrow_mut().inbound.push_back(frame.to_vec());
    }

    fn outbound(&self) -> Vec<Vec<u8>> {
        self.shared.borrow().outbound.clone()
    }
}

impl Transport for MockTransport {
    fn read_message(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.shared.borrow_mut().inbound.pop_front())
    }

    fn write_message(&mut self, pdu: &[u8]) -> io::Result<()> {
        self.shared.borrow_mut().outbound.push(pdu.to_vec());
        Ok(())
    }
}

fn client(transport: &MockTransport) -> GattClient<MockTransport> {
    GattClient::new(transport.clone(), 23).expect("valid MTU")
}

fn service(uuid: u16, start: u16, end: u16) -> Service {
    Service {
        uuid: Uuid::from_u16(uuid),
        is_primary: true,
        start_handle: start,
        end_handle: end,
    }
}

fn characteristic(uuid: u16, declaration: u16, value: u16, props: u8) -> Characteristic {
    Characteristic {
        uuid: Uuid::from_u16(uuid),
        properties: CharacteristicProperties::from_bits_truncate(props),
        declaration_handle: declaration,
        value_handle: value,
    }
}

#[test]
fn test_cache_complete_set_evicts_absent_services() {
    let mut cache = ServiceCache::new();
    cache.insert_services(&[service(0x1800, 1, 5), service(0x1801, 6, 10)], true);
    assert_eq!(cache.services().len(), 2);

    cache.insert_services(&[service(0x1801, 6, 10), service(0x180F, 11, 20)], true);
    let uuids: Vec<_> = cache.services().iter().map(|s| s.uuid).collect();
    assert!(!uuids.contains(&Uuid::from_u16(0x1800)));
    assert!(uuids.contains(&Uuid::from_u16(0x1801)));
    assert!(uuids.contains(&Uuid::from_u16(0x180F)));
}

#[test]
fn test_cache_partial_insert_keeps_unrelated_entries() {
    let mut cache = ServiceCache::new();
    cache.insert_services(&[service(0x1800, 1, 5), service(0x1801, 6, 10)], true);
    cache.insert_services(&[service(0x180F, 11, 20)], false);
    assert_eq!(cache.services().len(), 3);
    assert!(cache.service(&Uuid::from_u16(0x1800)).is_some());
}

#[test]
fn test_cache_characteristic_eviction_and_config() {
    let mut cache = ServiceCache::new();
    cache.insert_services(&[service(0x1800, 1, 10)], true);
    let first = characteristic(0x2A00, 2, 3, 0x0A);
    let second = characteristic(0x2A01, 6, 7, 0x10);
    assert!(cache.insert_characteristics(
        &Uuid::from_u16(0x1800),
        &[first.clone(), second.clone()],
        true
    ));

    // Complete-set re-discovery without the second evicts it.
    assert!(cache.insert_characteristics(&Uuid::from_u16(0x1800), &[first.clone()], true));
    assert!(cache
        .characteristic(&Uuid::from_u16(0x1800), &Uuid::from_u16(0x2A01))
        .is_none());

    // Partial insert does not evict.
    assert!(cache.insert_characteristics(&Uuid::from_u16(0x1800), &[second.clone()], false));
    assert_eq!(cache.characteristics(&Uuid::from_u16(0x1800)).len(), 2);

    assert_eq!(cache.client_config(&first), Some(0));
    assert!(cache.update_client_config(&first, 1));
    assert_eq!(cache.client_config(&first), Some(1));
}

#[test]
fn test_cache_end_handle_of() {
    let mut cache = ServiceCache::new();
    cache.insert_services(&[service(0x1800, 1, 10)], true);
    let first = characteristic(0x2A00, 2, 3, 0x02);
    let last = characteristic(0x2A01, 6, 7, 0x02);
    cache.insert_characteristics(&Uuid::from_u16(0x1800), &[first.clone(), last.clone()], true);

    // One below the next declaration, or the service end for the last.
    assert_eq!(cache.end_handle_of(&first), Some(5));
    assert_eq!(cache.end_handle_of(&last), Some(10));

    let unknown = characteristic(0x2A02, 40, 41, 0x02);
    assert_eq!(cache.end_handle_of(&unknown), None);
}

#[test]
fn test_cache_descriptor_discovery_state() {
    let mut cache = ServiceCache::new();
    cache.insert_services(&[service(0x1800, 1, 10)], true);
    let ch = characteristic(0x2A00, 2, 3, 0x10);
    cache.insert_characteristics(&Uuid::from_u16(0x1800), &[ch.clone()], true);

    assert_eq!(cache.descriptors_of(&ch), None);
    assert!(cache.insert_descriptors(
        &ch,
        &[Descriptor {
            uuid: Uuid::from_u16(0x2902),
            handle: 4,
        }]
    ));
    assert_eq!(cache.descriptors_of(&ch).map(|d| d.len()), Some(1));
    assert_eq!(
        cache.descriptor(&ch, &Uuid::from_u16(0x2902)).map(|d| d.handle),
        Some(4)
    );
}

#[test]
fn test_discover_services_single_page() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[
        0x11, 0x06, 0x01, 0x00, 0x05, 0x00, 0x00, 0x18, 0x06, 0x00, 0x0A, 0x00, 0x01, 0x18,
    ]);
    transport.push_inbound(&[0x01, 0x10, 0x0B, 0x00, 0x0A]);

    let services = client.discover_services().expect("discovery");
    assert_eq!(
        services,
        vec![service(0x1800, 1, 5), service(0x1801, 6, 10)]
    );
    assert_eq!(
        transport.outbound(),
        vec![
            vec![0x10, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x28],
            vec![0x10, 0x0B, 0x00, 0xFF, 0xFF, 0x00, 0x28],
        ]
    );
    assert_eq!(
        client.cache().service(&Uuid::from_u16(0x1800)),
        Some(service(0x1800, 1, 5))
    );
    assert_eq!(
        client.cache().service(&Uuid::from_u16(0x1801)),
        Some(service(0x1801, 6, 10))
    );
}

#[test]
fn test_discover_services_pagination_cycle_guard() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[0x11, 0x06, 0x01, 0x00, 0x05, 0x00, 0x00, 0x18]);
    // Second page claims a group ending below the round's start handle.
    transport.push_inbound(&[0x11, 0x06, 0x02, 0x00, 0x02, 0x00, 0x00, 0x18]);

    let result = client.discover_services();
    assert!(matches!(
        result,
        Err(GattError::Att(AttError::InvalidResponse(_)))
    ));
}

#[test]
fn test_discover_services_by_uuid_remembers_uuid() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[0x07, 0x01, 0x00, 0x08, 0x00]);
    transport.push_inbound(&[0x01, 0x06, 0x09, 0x00, 0x0A]);

    let uuid = Uuid::from_u16(0x1800);
    let services = client.discover_services_by_uuid(uuid).expect("discovery");
    assert_eq!(services, vec![service(0x1800, 1, 8)]);
    // The request carries the UUID little-endian as the match value.
    assert_eq!(
        transport.outbound()[0],
        vec![0x06, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x28, 0x00, 0x18]
    );
    // Partial discovery: nothing else is evicted.
    assert_eq!(client.cache().services().len(), 1);
}

#[test]
fn test_discover_characteristics_full_range() {
    let transport = MockTransport::new();
    let mut client = client(&transport);
    let svc = service(0x1800, 1, 10);

    transport.push_inbound(&[0x09, 0x07, 0x02, 0x00, 0x0A, 0x03, 0x00, 0x00, 0x2A]);
    transport.push_inbound(&[0x09, 0x07, 0x06, 0x00, 0x10, 0x07, 0x00, 0x01, 0x2A]);
    transport.push_inbound(&[0x01, 0x08, 0x07, 0x00, 0x0A]);

    let found = client.discover_characteristics(&svc).expect("discovery");
    assert_eq!(
        found,
        vec![
            characteristic(0x2A00, 2, 3, 0x0A),
            characteristic(0x2A01, 6, 7, 0x10),
        ]
    );
    assert_eq!(
        transport.outbound(),
        vec![
            vec![0x08, 0x01, 0x00, 0x0A, 0x00, 0x03, 0x28],
            vec![0x08, 0x03, 0x00, 0x0A, 0x00, 0x03, 0x28],
            vec![0x08, 0x07, 0x00, 0x0A, 0x00, 0x03, 0x28],
        ]
    );
    assert_eq!(client.cache().characteristics(&svc.uuid).len(), 2);
}

#[test]
fn test_discover_characteristic_by_uuid_stops_early() {
    let transport = MockTransport::new();
    let mut client = client(&transport);
    let svc = service(0x1800, 1, 10);

    transport.push_inbound(&[0x09, 0x07, 0x02, 0x00, 0x0A, 0x03, 0x00, 0x00, 0x2A]);

    let found = client
        .discover_characteristic_by_uuid(&svc, Uuid::from_u16(0x2A00))
        .expect("discovery");
    assert_eq!(found, characteristic(0x2A00, 2, 3, 0x0A));
    // Early termination: exactly one request went out.
    assert_eq!(
        transport.outbound(),
        vec![vec![0x08, 0x01, 0x00, 0x0A, 0x00, 0x03, 0x28]]
    );
}

#[test]
fn test_discover_descriptors_uses_characteristic_end() {
    let transport = MockTransport::new();
    let mut client = client(&transport);
    let svc = service(0x1800, 1, 10);

    // Two characteristics; the first one's descriptors end at handle 5.
    transport.push_inbound(&[0x09, 0x07, 0x02, 0x00, 0x0A, 0x03, 0x00, 0x00, 0x2A]);
    transport.push_inbound(&[0x09, 0x07, 0x06, 0x00, 0x10, 0x07, 0x00, 0x01, 0x2A]);
    transport.push_inbound(&[0x01, 0x08, 0x07, 0x00, 0x0A]);
    let found = client.discover_characteristics(&svc).expect("discovery");

    transport.push_inbound(&[
        0x05, 0x01, 0x04, 0x00, 0x02, 0x29, 0x05, 0x00, 0x01, 0x29,
    ]);
    let descriptors = client.discover_descriptors(&found[0]).expect("discovery");
    assert_eq!(
        descriptors,
        vec![
            Descriptor {
                uuid: Uuid::from_u16(0x2902),
                handle: 4,
            },
            Descriptor {
                uuid: Uuid::from_u16(0x2901),
                handle: 5,
            },
        ]
    );
    // The search range ran from past the value handle to the next
    // declaration minus one.
    assert_eq!(
        transport.outbound().last(),
        Some(&vec![0x04, 0x04, 0x00, 0x05, 0x00])
    );
    assert_eq!(client.cache().descriptors_of(&found[0]).map(|d| d.len()), Some(2));
}

#[test]
fn test_read_escalates_to_blobs() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    let stored: Vec<u8> = (0..50).collect();
    let mut first = vec![0x0B];
    first.extend_from_slice(&stored[..22]);
    let mut second = vec![0x0D];
    second.extend_from_slice(&stored[22..44]);
    let mut third = vec![0x0D];
    third.extend_from_slice(&stored[44..]);
    transport.push_inbound(&first);
    transport.push_inbound(&second);
    transport.push_inbound(&third);

    let value = client.read(5).expect("read");
    assert_eq!(value, stored);
    assert_eq!(
        transport.outbound(),
        vec![
            vec![0x0A, 0x05, 0x00],
            vec![0x0C, 0x05, 0x00, 0x16, 0x00],
            vec![0x0C, 0x05, 0x00, 0x2C, 0x00],
        ]
    );
}

#[test]
fn test_read_invalid_offset_ends_long_read() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    // First part fills the PDU exactly; the follow-up blob request runs past
    // the end of the value and the server answers Invalid Offset.
    let mut first = vec![0x0B];
    first.extend_from_slice(&[7u8; 22]);
    transport.push_inbound(&first);
    transport.push_inbound(&[0x01, 0x0C, 0x05, 0x00, 0x07]);

    let value = client.read(5).expect("read");
    assert_eq!(value, vec![7u8; 22]);
}

#[test]
fn test_read_short_value_single_request() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[0x0B, 0x01, 0x02, 0x03]);
    let value = client.read(5).expect("read");
    assert_eq!(value, vec![1, 2, 3]);
    assert_eq!(transport.outbound().len(), 1);
}

#[test]
fn test_read_by_uuid_accumulates_map() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[0x09, 0x04, 0x03, 0x00, 0x41, 0x42]);
    transport.push_inbound(&[0x01, 0x08, 0x04, 0x00, 0x0A]);

    let values = client
        .read_by_uuid(0x0001, 0xFFFF, Uuid::from_u16(0x2A00))
        .expect("read");
    assert_eq!(values.len(), 1);
    assert_eq!(values.get(&3), Some(&vec![0x41, 0x42]));
    assert_eq!(
        transport.outbound()[0],
        vec![0x08, 0x01, 0x00, 0xFF, 0xFF, 0x00, 0x2A]
    );
}

#[test]
fn test_read_by_uuid_with_no_results_surfaces_error() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[0x01, 0x08, 0x01, 0x00, 0x0A]);
    let result = client.read_by_uuid(0x0001, 0xFFFF, Uuid::from_u16(0x2A00));
    assert!(matches!(
        result,
        Err(GattError::Att(AttError::ErrorResponse {
            code: ErrorCode::AttributeNotFound,
            ..
        }))
    ));
}

#[test]
fn test_read_multiple_requires_two_handles() {
    let transport = MockTransport::new();
    let mut client = client(&transport);
    assert!(matches!(
        client.read_multiple(&[3]),
        Err(GattError::InvalidParameter(_))
    ));

    transport.push_inbound(&[0x0F, 0x01, 0x02, 0x03]);
    let values = client.read_multiple(&[3, 7]).expect("read");
    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(
        transport.outbound(),
        vec![vec![0x0E, 0x03, 0x00, 0x07, 0x00]]
    );
}

#[test]
fn test_write_command_truncates_silently() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    let value = [0xABu8; 30];
    client.write_command(4, &value).expect("write");
    let frames = transport.outbound();
    // MTU 23 leaves 20 value bytes after opcode and handle.
    assert_eq!(frames[0].len(), 23);
    assert_eq!(&frames[0][..3], &[0x52, 0x04, 0x00]);
    assert_eq!(&frames[0][3..], &value[..20]);
}

#[test]
fn test_write_request_completes_on_response() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[0x13]);
    client.write(4, &[0x01, 0x00]).expect("write");
    assert_eq!(
        transport.outbound(),
        vec![vec![0x12, 0x04, 0x00, 0x01, 0x00]]
    );
}

#[test]
fn test_reliable_long_write_round_trip() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    let value: Vec<u8> = (0..50).collect();
    for (offset, part) in [(0u16, &value[..18]), (18, &value[18..36]), (36, &value[36..])] {
        let mut echo = vec![0x17, 0x01, 0x00];
        echo.extend_from_slice(&offset.to_le_bytes());
        echo.extend_from_slice(part);
        transport.push_inbound(&echo);
    }
    transport.push_inbound(&[0x19]);

    client.write_long(1, &value, true).expect("long write");

    let frames = transport.outbound();
    assert_eq!(frames.len(), 4);
    // MTU 23 chunks the value at offsets 0, 18, and 36.
    assert_eq!(&frames[0][..5], &[0x16, 0x01, 0x00, 0x00, 0x00]);
    assert_eq!(&frames[0][5..], &value[..18]);
    assert_eq!(&frames[1][..5], &[0x16, 0x01, 0x00, 0x12, 0x00]);
    assert_eq!(&frames[2][..5], &[0x16, 0x01, 0x00, 0x24, 0x00]);
    assert_eq!(&frames[2][5..], &value[36..]);
    assert_eq!(frames[3], vec![0x18, 0x01]);
}

#[test]
fn test_reliable_long_write_mismatch_cancels() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    let value: Vec<u8> = (0..30).collect();
    let mut echo = vec![0x17, 0x01, 0x00, 0x00, 0x00];
    echo.extend_from_slice(&value[..18]);
    transport.push_inbound(&echo);
    // Second echo comes back with a corrupted offset.
    let mut bad = vec![0x17, 0x01, 0x00, 0x11, 0x00];
    bad.extend_from_slice(&value[18..]);
    transport.push_inbound(&bad);
    // Response to the cancel.
    transport.push_inbound(&[0x19]);

    let result = client.write_long(1, &value, true);
    assert!(matches!(
        result,
        Err(GattError::Att(AttError::InvalidResponse(_)))
    ));
    // The prepare queue was cancelled before the error surfaced.
    assert_eq!(transport.outbound().last(), Some(&vec![0x18, 0x00]));
}

#[test]
fn test_unreliable_long_write_skips_echo_check() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    let value: Vec<u8> = (0..10).collect();
    // Server echoes garbage; without reliable mode it is accepted.
    transport.push_inbound(&[0x17, 0x01, 0x00, 0x00, 0x00, 0xFF]);
    transport.push_inbound(&[0x19]);

    client.write_long(1, &value, false).expect("long write");
    assert_eq!(transport.outbound().last(), Some(&vec![0x18, 0x01]));
}

#[test]
fn test_subscribe_and_notification_routing() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    // Discover the service and its single notifying characteristic.
    transport.push_inbound(&[0x11, 0x06, 0x01, 0x00, 0x0A, 0x00, 0x00, 0x18]);
    transport.push_inbound(&[0x01, 0x10, 0x0B, 0x00, 0x0A]);
    let services = client.discover_services().expect("services");

    transport.push_inbound(&[0x09, 0x07, 0x02, 0x00, 0x10, 0x03, 0x00, 0x00, 0x2A]);
    transport.push_inbound(&[0x01, 0x08, 0x03, 0x00, 0x0A]);
    let chars = client.discover_characteristics(&services[0]).expect("chars");
    let ch = chars[0].clone();

    // Subscribe runs descriptor discovery on demand, then writes the CCCD.
    transport.push_inbound(&[0x05, 0x01, 0x04, 0x00, 0x02, 0x29]);
    transport.push_inbound(&[0x01, 0x04, 0x05, 0x00, 0x0A]);
    transport.push_inbound(&[0x13]);

    let events: Rc<RefCell<Vec<Vec<u8>>>> = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&events);
    let callback: ValueCallback = Box::new(move |value| log.borrow_mut().push(value.to_vec()));
    client.subscribe(&ch, Some(callback)).expect("subscribe");

    // Notify bit, little-endian, written to the CCCD handle.
    assert_eq!(
        transport.outbound().last(),
        Some(&vec![0x12, 0x04, 0x00, 0x01, 0x00])
    );
    assert_eq!(client.cache().client_config(&ch), Some(0x0001));

    // An incoming notification reaches the installed callback.
    transport.push_inbound(&[0x1B, 0x03, 0x00, 0xAA, 0xBB]);
    client.connection_mut().run_read().expect("read");
    assert_eq!(*events.borrow(), vec![vec![0xAA, 0xBB]]);

    // Unsubscribing writes 0x0000 and removes the callback.
    transport.push_inbound(&[0x13]);
    client.subscribe(&ch, None).expect("unsubscribe");
    assert_eq!(
        transport.outbound().last(),
        Some(&vec![0x12, 0x04, 0x00, 0x00, 0x00])
    );
    assert_eq!(client.cache().client_config(&ch), Some(0x0000));

    transport.push_inbound(&[0x1B, 0x03, 0x00, 0xCC]);
    client.connection_mut().run_read().expect("read");
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn test_subscribe_without_cccd_fails() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[0x11, 0x06, 0x01, 0x00, 0x03, 0x00, 0x00, 0x18]);
    transport.push_inbound(&[0x01, 0x10, 0x04, 0x00, 0x0A]);
    let services = client.discover_services().expect("services");

    transport.push_inbound(&[0x09, 0x07, 0x02, 0x00, 0x10, 0x03, 0x00, 0x00, 0x2A]);
    let chars = client.discover_characteristics(&services[0]).expect("chars");

    // The value handle is the last in the service: no descriptor range to
    // search, so no Find Information request goes out.
    let callback: ValueCallback = Box::new(|_| {});
    let result = client.subscribe(&chars[0], Some(callback));
    assert!(matches!(result, Err(GattError::ClientConfigurationMissing)));
}

#[test]
fn test_subscribe_requires_notify_or_indicate() {
    let transport = MockTransport::new();
    let mut client = client(&transport);

    transport.push_inbound(&[0x11, 0x06, 0x01, 0x00, 0x0A, 0x00, 0x00, 0x18]);
    transport.push_inbound(&[0x01, 0x10, 0x0B, 0x00, 0x0A]);
    let services = client.discover_services().expect("services");

    // Read-only characteristic.
    transport.push_inbound(&[0x09, 0x07, 0x02, 0x00, 0x02, 0x03, 0x00, 0x00, 0x2A]);
    transport.push_inbound(&[0x01, 0x08, 0x03, 0x00, 0x0A]);
    let chars = client.discover_characteristics(&services[0]).expect("chars");

    transport.push_inbound(&[0x05, 0x01, 0x04, 0x00, 0x02, 0x29]);
    transport.push_inbound(&[0x01, 0x04, 0x05, 0x00, 0x0A]);
    let callback: ValueCallback = Box::new(|_| {});
    let result = client.subscribe(&chars[0], Some(callback));
    assert!(matches!(result, Err(GattError::NotPermitted)));
}

#[test]
fn test_characteristic_property_gates() {
    let transport = MockTransport::new();
    let mut client = client(&transport);
    let write_only = characteristic(0x2A00, 2, 3, 0x08);

    assert!(matches!(
        client.read_characteristic(&write_only),
        Err(GattError::NotPermitted)
    ));
    assert!(matches!(
        client.write_characteristic_without_response(&write_only, &[1]),
        Err(GattError::NotPermitted)
    ));

    transport.push_inbound(&[0x13]);
    client
        .write_characteristic(&write_only, &[0x01])
        .expect("write");
}

#[test]
fn test_client_rejects_out_of_range_mtu() {
    let transport = MockTransport::new();
    assert!(matches!(
        GattClient::new(transport, 5),
        Err(GattError::Att(AttError::MtuTooSmall(5)))
    ));
}
