//! The ATT bearer: request/response pairing over one transport.
//!
//! ATT allows at most one outstanding request per bearer. The connection
//! keeps a FIFO queue of outgoing PDUs and a single pending-response slot;
//! the write pump refuses to transmit a further request while a response is
//! pending, while commands and confirmations pass the gate freely.
//!
//! A `Connection` is single-threaded cooperative: it is not `Send` or
//! `Sync`, callbacks run synchronously from the dispatch path, and the only
//! blocking points are the transport's read and write calls. Run independent
//! bearers on independent threads; never share one.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use log::{debug, trace, warn};

use super::constants::*;
use super::error::{AttError, AttResult};
use super::pdu::Pdu;
use crate::transport::Transport;

/// Completion invoked with the matched response, the matching Error
/// Response, or a transport failure.
pub type Completion = Box<dyn FnOnce(AttResult<Pdu>)>;

/// Callback invoked with the value bytes of a notification or indication.
pub type ValueCallback = Box<dyn FnMut(&[u8])>;

/// The single in-flight transaction of a bearer.
struct PendingRequest {
    request_opcode: u8,
    response_opcode: u8,
    completion: Completion,
}

/// One queued outbound PDU, tagged with its response expectation.
struct Outgoing {
    pdu: Pdu,
    expects: Option<PendingRequest>,
}

/// An ATT client bearer over a message-framed transport.
pub struct Connection<T: Transport> {
    transport: T,
    /// Our receive MTU, as offered in the MTU exchange.
    rx_mtu: u16,
    /// Effective MTU. Stays at the protocol default until the exchange
    /// completes.
    mtu: u16,
    pending: Option<PendingRequest>,
    queue: VecDeque<Outgoing>,
    /// Notification/indication callbacks keyed by attribute value handle.
    value_callbacks: HashMap<u16, ValueCallback>,
    closed: bool,
    protocol_errors: u64,
}

impl<T: Transport> Connection<T> {
    /// Creates a bearer with the given preferred receive MTU.
    ///
    /// The effective MTU starts at the protocol default of 23 until
    /// [`exchange_mtu`](Self::exchange_mtu) negotiates it up.
    pub fn new(transport: T, rx_mtu: u16) -> AttResult<Self> {
        if !(ATT_DEFAULT_MTU..=ATT_MAX_MTU).contains(&rx_mtu) {
            return Err(AttError::MtuTooSmall(rx_mtu));
        }
        Ok(Connection {
            transport,
            rx_mtu,
            mtu: ATT_DEFAULT_MTU,
            pending: None,
            queue: VecDeque::new(),
            value_callbacks: HashMap::new(),
            closed: false,
            protocol_errors: 0,
        })
    }

    /// The current effective MTU.
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Overrides the effective MTU, for embedders that negotiated it out of
    /// band.
    pub fn set_mtu(&mut self, mtu: u16) -> AttResult<()> {
        if !(ATT_DEFAULT_MTU..=ATT_MAX_MTU).contains(&mtu) {
            return Err(AttError::MtuTooSmall(mtu));
        }
        self.mtu = mtu;
        Ok(())
    }

    /// Count of malformed or state-inappropriate inbound PDUs observed so
    /// far. The bearer records these and keeps running.
    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors
    }

    /// Negotiates the MTU with the server.
    ///
    /// The effective MTU becomes `min(client_rx, server_rx)`, clamped to the
    /// protocol minimum of 23.
    pub fn exchange_mtu(&mut self) -> AttResult<u16> {
        let response = self.request(Pdu::ExchangeMtuRequest {
            client_rx_mtu: self.rx_mtu,
        })?;
        match response {
            Pdu::ExchangeMtuResponse { server_rx_mtu } => {
                self.mtu = self.rx_mtu.min(server_rx_mtu).max(ATT_DEFAULT_MTU);
                debug!("MTU negotiated: effective {}", self.mtu);
                Ok(self.mtu)
            }
            other => Err(AttError::InvalidResponse(Box::new(other))),
        }
    }

    /// Installs the callback receiving notification and indication values
    /// for an attribute handle.
    pub fn register_value_callback(&mut self, handle: u16, callback: ValueCallback) {
        self.value_callbacks.insert(handle, callback);
    }

    /// Removes the value callback for an attribute handle.
    pub fn unregister_value_callback(&mut self, handle: u16) {
        self.value_callbacks.remove(&handle);
    }

    /// Enqueues a request and its completion, then pumps the write side.
    ///
    /// The request transmits immediately unless a response is already
    /// pending, in which case it waits in the queue.
    pub fn send_request(&mut self, pdu: Pdu, completion: Completion) -> AttResult<()> {
        if self.closed {
            return Err(AttError::TransportClosed);
        }
        let response_opcode = pdu.expected_response().ok_or(AttError::NotARequest)?;
        let request_opcode = pdu.opcode();
        self.queue.push_back(Outgoing {
            pdu,
            expects: Some(PendingRequest {
                request_opcode,
                response_opcode,
                completion,
            }),
        });
        self.run_write()
    }

    /// Enqueues a PDU that expects no response (command or confirmation) and
    /// pumps the write side. These bypass the one-outstanding-request gate.
    pub fn send_command(&mut self, pdu: Pdu) -> AttResult<()> {
        if self.closed {
            return Err(AttError::TransportClosed);
        }
        self.queue.push_back(Outgoing { pdu, expects: None });
        self.run_write()
    }

    /// Sends a request and drives the bearer until that transaction
    /// completes, delivering any notifications and indications that arrive
    /// in the meantime.
    pub fn request(&mut self, pdu: Pdu) -> AttResult<Pdu> {
        let slot: Rc<RefCell<Option<AttResult<Pdu>>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        self.send_request(
            pdu,
            Box::new(move |result| {
                *sink.borrow_mut() = Some(result);
            }),
        )?;
        loop {
            if let Some(result) = slot.borrow_mut().take() {
                return result;
            }
            if let Err(err) = self.run_read() {
                // Closure already failed the completion into the slot.
                if let Some(result) = slot.borrow_mut().take() {
                    return result;
                }
                return Err(err);
            }
        }
    }

    /// Transmits queued PDUs until the queue is empty or the front is a
    /// request gated behind the pending response.
    pub fn run_write(&mut self) -> AttResult<()> {
        if self.closed {
            return Err(AttError::TransportClosed);
        }
        loop {
            let gated = match self.queue.front() {
                Some(out) => out.expects.is_some() && self.pending.is_some(),
                None => return Ok(()),
            };
            if gated {
                return Ok(());
            }
            if let Some(out) = self.queue.pop_front() {
                let frame = out.pdu.encode();
                trace!("tx {:02X?}", frame);
                if let Err(err) = self.transport.write_message(&frame) {
                    self.fail_all(out.expects);
                    return Err(AttError::Transport(err));
                }
                if let Some(expects) = out.expects {
                    self.pending = Some(expects);
                }
            }
        }
    }

    /// Reads and dispatches one inbound PDU.
    ///
    /// Returns `TransportClosed` once the peer has disconnected; every
    /// pending and queued transaction is failed exactly once, in FIFO order.
    pub fn run_read(&mut self) -> AttResult<()> {
        if self.closed {
            return Err(AttError::TransportClosed);
        }
        let frame = match self.transport.read_message() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.fail_all(None);
                return Err(AttError::TransportClosed);
            }
            Err(err) => {
                self.fail_all(None);
                return Err(AttError::Transport(err));
            }
        };
        trace!("rx {:02X?}", frame);
        match Pdu::decode(&frame) {
            Ok(pdu) => self.dispatch(pdu),
            Err(_) => {
                self.note_protocol_error("undecodable inbound frame");
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, pdu: Pdu) -> AttResult<()> {
        match pdu {
            Pdu::ErrorResponse {
                request_opcode,
                handle,
                code,
            } => {
                let matches =
                    self.pending.as_ref().map(|p| p.request_opcode) == Some(request_opcode);
                if matches {
                    if let Some(pending) = self.pending.take() {
                        (pending.completion)(Err(AttError::ErrorResponse {
                            request_opcode,
                            handle,
                            code,
                        }));
                    }
                    self.run_write()
                } else {
                    self.note_protocol_error("error response without matching request");
                    Ok(())
                }
            }
            Pdu::HandleValueNotification { handle, value } => {
                match self.value_callbacks.get_mut(&handle) {
                    Some(callback) => callback(&value),
                    None => debug!("notification for unregistered handle 0x{handle:04X}"),
                }
                Ok(())
            }
            Pdu::HandleValueIndication { handle, value } => {
                match self.value_callbacks.get_mut(&handle) {
                    Some(callback) => callback(&value),
                    None => debug!("indication for unregistered handle 0x{handle:04X}"),
                }
                // The confirmation must go out ahead of any queued request.
                self.queue.push_front(Outgoing {
                    pdu: Pdu::HandleValueConfirmation,
                    expects: None,
                });
                self.run_write()
            }
            other => {
                let expected = self.pending.as_ref().map(|p| p.response_opcode);
                if Some(other.opcode()) == expected {
                    if let Some(pending) = self.pending.take() {
                        (pending.completion)(Ok(other));
                    }
                    self.run_write()
                } else {
                    self.note_protocol_error("PDU unexpected in current state");
                    Ok(())
                }
            }
        }
    }

    /// Marks the bearer closed and fails the pending transaction, the given
    /// in-flight expectation, and every queued request, oldest first.
    fn fail_all(&mut self, in_flight: Option<PendingRequest>) {
        self.closed = true;
        if let Some(pending) = self.pending.take() {
            (pending.completion)(Err(AttError::TransportClosed));
        }
        if let Some(pending) = in_flight {
            (pending.completion)(Err(AttError::TransportClosed));
        }
        while let Some(out) = self.queue.pop_front() {
            if let Some(pending) = out.expects {
                (pending.completion)(Err(AttError::TransportClosed));
            }
        }
    }

    fn note_protocol_error(&mut self, what: &str) {
        self.protocol_errors += 1;
        warn!("protocol error on bearer: {what}");
    }
}
