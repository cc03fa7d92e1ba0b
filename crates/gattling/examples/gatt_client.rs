//! Walks a GATT server: discovers everything, reads what is readable, and
//! subscribes to battery level updates when the server has them.
//!
//! The ATT bearer here runs over a Unix stream socket with a two-byte length
//! prefix standing in for L2CAP framing, which makes the example easy to
//! drive from a test harness:
//!
//! ```sh
//! cargo run --example gatt_client -- /tmp/att.sock
//! ```

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

use gattling::transport::Transport;
use gattling::{GattClient, Uuid};

/// One ATT PDU per length-prefixed frame.
struct FramedUnixTransport {
    stream: UnixStream,
}

impl Transport for FramedUnixTransport {
    fn read_message(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut len = [0u8; 2];
        match self.stream.read_exact(&mut len) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err),
        }
        let mut frame = vec![0u8; u16::from_le_bytes(len) as usize];
        self.stream.read_exact(&mut frame)?;
        Ok(Some(frame))
    }

    fn write_message(&mut self, pdu: &[u8]) -> std::io::Result<()> {
        self.stream
            .write_all(&(pdu.len() as u16).to_le_bytes())?;
        self.stream.write_all(pdu)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/att.sock".to_string());
    println!("Connecting to {path}...");
    let stream = UnixStream::connect(&path)?;
    let mut client = GattClient::new(FramedUnixTransport { stream }, 247)?;

    let mtu = client.exchange_mtu()?;
    println!("Effective MTU: {mtu}");

    let services = client.discover_services()?;
    println!("Found {} services", services.len());

    for service in &services {
        println!(
            "Service {} [0x{:04X}..0x{:04X}]",
            service.uuid, service.start_handle, service.end_handle
        );

        let characteristics = client.discover_characteristics(service)?;
        for characteristic in &characteristics {
            println!(
                "  Characteristic {} (value handle 0x{:04X}, properties {:?})",
                characteristic.uuid, characteristic.value_handle, characteristic.properties
            );

            if characteristic.properties.can_read() {
                match client.read_characteristic(characteristic) {
                    Ok(value) => println!("    Value: {value:02X?}"),
                    Err(err) => println!("    Failed to read: {err}"),
                }
            }

            for descriptor in client.discover_descriptors(characteristic)? {
                println!(
                    "    Descriptor {} at 0x{:04X}",
                    descriptor.uuid, descriptor.handle
                );
            }
        }
    }

    // Battery Service / Battery Level, when the server has them.
    let battery = services
        .iter()
        .find(|s| s.uuid == Uuid::from_u16(0x180F))
        .cloned();
    if let Some(service) = battery {
        let level = client.discover_characteristic_by_uuid(&service, Uuid::from_u16(0x2A19))?;
        client.subscribe(
            &level,
            Some(Box::new(|value: &[u8]| {
                if let Some(percent) = value.first() {
                    println!("Battery level: {percent}%");
                }
            })),
        )?;
        println!("Subscribed to battery level; waiting for notifications...");
        loop {
            client.connection_mut().run_read()?;
        }
    }

    Ok(())
}
