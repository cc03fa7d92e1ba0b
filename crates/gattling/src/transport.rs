//! The byte channel an ATT bearer runs over.
//!
//! ATT assumes a message-oriented transport: L2CAP delivers each PDU as one
//! framed message, and the connection engine never reassembles or splits
//! frames itself. This module only defines the interface; the actual L2CAP
//! socket (BlueZ, a controller library, a test double) is supplied by the
//! embedder.

use std::io;

/// A message-framed byte channel carrying one ATT PDU per message.
pub trait Transport {
    /// Reads the next message.
    ///
    /// Blocks until a message arrives, the peer disconnects (`Ok(None)`), or
    /// the channel fails.
    fn read_message(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Writes one message.
    fn write_message(&mut self, pdu: &[u8]) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read_message(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).read_message()
    }

    fn write_message(&mut self, pdu: &[u8]) -> io::Result<()> {
        (**self).write_message(pdu)
    }
}
