//! Error taxonomy returned by transaction and codec operations.

use core::fmt;

/// Everything that can go wrong while assembling, sending, or parsing a
/// CoAP exchange.
///
/// `Ok` results are represented by `Result::Ok`, not a variant here, so this
/// enum only lists failures. It is `Copy` and carries no allocated data,
/// which keeps it usable from `no_std` callbacks and debug-print hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transaction is already in flight on this handle.
    Busy,
    /// The request descriptor violates a caller contract (e.g. an
    /// empty-code message with a non-zero token length).
    Param,
    /// The host could not provide a buffer of the requested size.
    NoFreeMem,
    /// No byte arrived before the deadline.
    Timeout,
    /// The peer answered with a Reset.
    NrstAnswer,
    /// A confirmable request exhausted its retransmissions without an ACK.
    NoAck,
    /// An ACK arrived but the separate response never did.
    NoResp,
    /// Incoming bytes would overflow the response buffer.
    RxBuffFull,
    /// A byte arrived while the handle was not expecting one.
    WrongState,
    /// An option header used the reserved nibble value 15, or otherwise
    /// failed to decode.
    WrongOptions,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::Busy => "a transaction is already in flight",
            Error::Param => "invalid request descriptor",
            Error::NoFreeMem => "host has no free memory block",
            Error::Timeout => "no acknowledgement received in time",
            Error::NrstAnswer => "peer answered with reset",
            Error::NoAck => "confirmable request was never acknowledged",
            Error::NoResp => "acknowledged but no separate response arrived",
            Error::RxBuffFull => "response buffer is full",
            Error::WrongState => "byte received while not waiting for a response",
            Error::WrongOptions => "malformed option encoding",
        })
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::format;

    #[test]
    fn display_is_non_empty_for_every_variant() {
        let variants = [
            Error::Busy,
            Error::Param,
            Error::NoFreeMem,
            Error::Timeout,
            Error::NrstAnswer,
            Error::NoAck,
            Error::NoResp,
            Error::RxBuffFull,
            Error::WrongState,
            Error::WrongOptions,
        ];

        for e in &variants {
            assert!(!format!("{}", e).is_empty());
        }
    }

    #[test]
    fn is_copy_and_eq() {
        let a = Error::Timeout;
        let b = a;
        assert_eq!(a, b);
    }
}
