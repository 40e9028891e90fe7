//! The seam between the protocol engine and the platform it runs on.
//!
//! Every capability the engine cannot provide itself — moving bytes onto
//! the wire, blocking with a timeout, producing identifiers, handing out
//! scratch memory — is collected into a single [`Host`] trait. A `Handle`
//! borrows a `&mut H: Host` for the lifetime of one transaction and never
//! retains state the host doesn't already own.

use crate::error::Error;

/// Which wire framing a [`crate::client::Handle`] speaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    /// RFC 7252 framing over an unreliable datagram link.
    Udp,
    /// RFC 8323 framing over a reliable byte stream.
    Tcp,
    /// Reserved for a future SMS transport; selecting it is not yet
    /// implemented by the engine.
    Sms,
}

/// A one-way notification the engine raises so the host can log, meter, or
/// drive an LED without the engine depending on any particular logging
/// crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// A transaction has started.
    RoutineWillStart,
    /// A transaction has finished (successfully or not).
    RoutineDidFinish,
    /// The request is being retransmitted after an ACK timeout.
    RetransmittingRequest,
    /// An ACK was sent for a separate CON response.
    SentAck,
    /// An ACK was received.
    ReceivedAck,
    /// A Reset was received.
    ReceivedReset,
    /// A packet arrived that failed validation.
    ReceivedWrongPacket,
    /// A single byte was appended to the response buffer.
    ReceivedByte,
    /// The response buffer now holds a complete frame.
    ReceivedComplete,
    /// The incoming response would not fit in the response buffer.
    ResponseTooLong,
}

/// Everything the engine needs from the platform it runs on.
///
/// `Block` is the scratch-memory type handed out by [`Host::alloc_block`];
/// it is generic (rather than, say, always `&'static mut [u8; N]`) so a
/// host can back it with a static pool, a stack array, or any other
/// allocation strategy appropriate to its RAM budget.
pub trait Host {
    /// A scratch buffer owned by the host for the duration of one
    /// transaction.
    type Block: AsRef<[u8]> + AsMut<[u8]>;

    /// Hands out a buffer of at least `min_len` bytes, or `NoFreeMem` if
    /// none is available.
    fn alloc_block(&mut self, min_len: u16) -> Result<Self::Block, Error>;

    /// Returns a buffer obtained from [`Host::alloc_block`] to the host.
    fn free_block(&mut self, block: Self::Block);

    /// Transmits `bytes` on the underlying link.
    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Blocks until a response frame is available or `timeout_ms`
    /// elapses, returning `Timeout` in the latter case.
    fn wait_event(&mut self, timeout_ms: u32) -> Result<(), Error>;

    /// Raises a one-way notification.
    fn signal(&mut self, signal: Signal);

    /// Produces a fresh 16-bit message ID for a UDP exchange.
    fn next_message_id(&mut self) -> u16;

    /// Fills `token` with fresh, unpredictable bytes.
    fn fill_token(&mut self, token: &mut [u8]);

    /// Emits a debug trace of an outgoing or incoming packet. Only called
    /// when the handle's debug flag is set; a no-op host may ignore it.
    fn debug_print_packet(&mut self, _bytes: &[u8]) {}

    /// Emits a debug trace of decoded options. Only called when the
    /// handle's debug flag is set.
    fn debug_print_options(&mut self, _buf: &[u8]) {}

    /// Emits a debug trace of the payload. Only called when the handle's
    /// debug flag is set.
    fn debug_print_payload(&mut self, _payload: &[u8]) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    extern crate std;

    use super::*;
    use std::vec::Vec;

    /// A fully in-memory [`Host`] for tests: records every transmitted
    /// frame and plays back a scripted sequence of wait outcomes, last
    /// scripted result first (`wait_results` is popped from the back).
    pub struct MockHost {
        pub sent: Vec<Vec<u8>>,
        pub wait_results: Vec<Result<(), Error>>,
        pub next_mid: u16,
        pub token_byte: u8,
        pub retransmit_count: u32,
    }

    impl MockHost {
        pub fn new() -> Self {
            MockHost {
                sent: Vec::new(),
                wait_results: Vec::new(),
                next_mid: 1,
                token_byte: 0xAB,
                retransmit_count: 0,
            }
        }
    }

    impl Host for MockHost {
        type Block = [u8; 96];

        fn alloc_block(&mut self, min_len: u16) -> Result<Self::Block, Error> {
            if usize::from(min_len) > 96 {
                return Err(Error::NoFreeMem);
            }
            Ok([0u8; 96])
        }

        fn free_block(&mut self, _block: Self::Block) {}

        fn transmit(&mut self, bytes: &[u8]) -> Result<(), Error> {
            self.sent.push(Vec::from(bytes));
            Ok(())
        }

        fn wait_event(&mut self, _timeout_ms: u32) -> Result<(), Error> {
            self.wait_results.pop().unwrap_or(Err(Error::Timeout))
        }

        fn signal(&mut self, signal: Signal) {
            if signal == Signal::RetransmittingRequest {
                self.retransmit_count += 1;
            }
        }

        fn next_message_id(&mut self) -> u16 {
            let v = self.next_mid;
            self.next_mid = self.next_mid.wrapping_add(1);
            v
        }

        fn fill_token(&mut self, token: &mut [u8]) {
            for byte in token.iter_mut() {
                *byte = self.token_byte;
            }
        }
    }
}
