//! A client-side CoAP (RFC 7252 / RFC 8323) protocol engine for deeply
//! constrained devices: no heap, no sockets, no threads.
//!
//! The engine never touches the network itself. Moving bytes onto the
//! wire, blocking with a timeout, and handing out scratch memory are the
//! platform's job, modeled by the single [`host::Host`] trait. Everything
//! this crate does is pure: assemble a request frame into a buffer the
//! host provides, hand it to [`host::Host::transmit`], wait, then parse
//! whatever the host placed back into the buffer.
//!
//! # Example
//!
//! ```
//! use coaplet::client::{Handle, Params};
//! use coaplet::code::{Method, Type};
//! use coaplet::error::Error;
//! use coaplet::host::{Host, Signal, Transport};
//! use coaplet::option::OptionView;
//! use coaplet::request::RequestDescriptor;
//!
//! struct LoopbackHost;
//!
//! impl Host for LoopbackHost {
//!     type Block = [u8; 64];
//!     fn alloc_block(&mut self, _min_len: u16) -> Result<Self::Block, Error> {
//!         Ok([0u8; 64])
//!     }
//!     fn free_block(&mut self, _block: Self::Block) {}
//!     fn transmit(&mut self, _bytes: &[u8]) -> Result<(), Error> { Ok(()) }
//!     fn wait_event(&mut self, _timeout_ms: u32) -> Result<(), Error> { Err(Error::Timeout) }
//!     fn signal(&mut self, _signal: Signal) {}
//!     fn next_message_id(&mut self) -> u16 { 1 }
//!     fn fill_token(&mut self, token: &mut [u8]) {
//!         for b in token {
//!             *b = 0x42;
//!         }
//!     }
//! }
//!
//! let mut handle = Handle::with_params(LoopbackHost, Transport::Udp, Params::default());
//!
//! let descriptor = RequestDescriptor {
//!     type_: Type::NonConfirmable,
//!     code: Method::Get.into(),
//!     tkl: 0,
//!     payload: &[],
//!     options: &[OptionView::new(coaplet::option::OptionNumber::UriPath, b"sensors")],
//!     wants_response: false,
//! };
//!
//! handle.send_request(&descriptor, |_response| {}).unwrap();
//! ```
//!
//! # Module map
//!
//! - [`error`] — the crate's single `Error` enum.
//! - [`code`] — the CoAP Type and Code fields (`Method`, `Response`,
//!   `SignalCode`, `ContentFormat`).
//! - [`option`] — option delta/length codec and the zero-copy `Options`
//!   iterator.
//! - [`block`] — the Block2 option's packed `{num, more, szx}` triple.
//! - [`udp`] — RFC 7252 framing and response disposition classification.
//! - [`tcp`] — RFC 8323 framing with its variable-length prefix.
//! - [`reliability`] — the Confirmable-request retransmission state
//!   machine.
//! - [`host`] — the seam to the platform.
//! - [`pdu`] — a length-tracking view over a host-provided buffer.
//! - [`request`] — caller-facing request/response types.
//! - [`client`] — the transaction coordinator (`Handle`, `Params`).

#![deny(missing_docs)]
#![deny(rust_2018_compatibility)]
#![deny(rust_2018_idioms)]
#![deny(warnings)]
#![no_std]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

#[macro_use]
mod macros;

mod traits;

/// The crate's single error type.
pub mod error;

/// CoAP Type and Code fields.
pub mod code;
/// Option delta/length codec and the zero-copy decoded-option iterator.
pub mod option;

/// The Block2 option's packed `{num, more, szx}` triple.
pub mod block;

/// RFC 7252 framing over an unreliable datagram link.
pub mod udp;

/// RFC 8323 framing over a reliable byte stream.
pub mod tcp;

/// The Confirmable-request retransmission state machine.
pub mod reliability;

/// The seam between the protocol engine and the platform it runs on.
pub mod host;
/// A length-tracking view over a host-provided scratch buffer.
pub mod pdu;
/// Caller-facing request/response data types.
pub mod request;

/// The transaction coordinator.
pub mod client;
