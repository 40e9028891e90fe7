//! Caller-facing request/response data types.

use crate::code::{Code, Type};
use crate::option::{OptionView, Options};

/// Everything needed to assemble and send one CoAP request.
///
/// `type_` only matters on [`crate::host::Transport::Udp`]; the TCP path
/// ignores it, matching the original implementation, since a CoAP-over-TCP
/// frame carries no Type field at all.
pub struct RequestDescriptor<'a> {
    /// Confirmable / Non-confirmable / Acknowledgement / Reset.
    pub type_: Type,
    /// Request code, e.g. `Method::Get.into()`.
    pub code: Code,
    /// Token length, 0..=8. Must be 0 when `code` is `Code::EMPTY`.
    pub tkl: u8,
    /// Request payload; empty means no payload marker is emitted.
    pub payload: &'a [u8],
    /// Options to encode, pre-sorted ascending by number.
    pub options: &'a [OptionView<'a>],
    /// When `true`, the engine waits for and parses a response; when
    /// `false`, the request is sent and the transaction ends immediately
    /// (fire-and-forget, typically paired with `type_ = NonConfirmable`).
    pub wants_response: bool,
}

/// The classification of an incoming response's code, replacing the
/// OR-able bit mask of the original implementation (where the signalling
/// and failure bits collided) with a plain three-way enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Class 2.
    Success,
    /// Class 4 or 5.
    Failure,
    /// Class 7 (CoAP-over-TCP signalling).
    Signalling,
}

/// A successfully parsed response, valid only for the duration of the
/// callback it's delivered to (its `payload` and `options` borrow the
/// response buffer).
#[derive(Debug)]
pub struct ResponseResult<'a> {
    /// The response code as it appeared on the wire.
    pub code: Code,
    /// How the response code classifies.
    pub classification: Classification,
    /// The response payload.
    pub payload: &'a [u8],
    /// Lazily-decoded response options.
    pub options: Options<'a>,
}

pub(crate) fn classify(code: Code) -> Option<Classification> {
    match code.class() {
        2 => Some(Classification::Success),
        4 | 5 => Some(Classification::Failure),
        7 => Some(Classification::Signalling),
        _ => None,
    }
}
