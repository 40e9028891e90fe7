//! UDP framing (RFC 7252): a fixed 4-byte header, then token, options, and
//! an optional payload.

use byteorder::{ByteOrder, NetworkEndian as NE};

use crate::code::{Code, Type};
use crate::error::Error;
use crate::option::{self, OptionView, PAYLOAD_MARKER};
use crate::request::Classification;

const VER_T_TKL: usize = 0;
const CODE: usize = 1;
const MESSAGE_ID: core::ops::Range<usize> = 2..4;
const TOKEN_START: usize = MESSAGE_ID.end;

/// Size of the fixed UDP CoAP header.
pub const HEADER_SIZE: u16 = MESSAGE_ID.end as u16;

mod tkl {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = 0;
    pub const SIZE: u8 = 4;
}

mod t {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = super::tkl::OFFSET + super::tkl::SIZE;
    pub const SIZE: u8 = 2;
}

mod ver {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = super::t::OFFSET + super::t::SIZE;
    pub const SIZE: u8 = 2;
}

/// Assembles a request frame into `buf`. Returns the number of bytes
/// written.
///
/// `token` must be exactly `tkl` bytes, already filled in by
/// [`crate::host::Host::fill_token`].
pub fn assemble_request(
    buf: &mut [u8],
    type_: Type,
    code: Code,
    message_id: u16,
    token: &[u8],
    options: &[OptionView<'_>],
    payload: &[u8],
) -> usize {
    let tkl = token.len();
    buf[VER_T_TKL] = 0;
    set!(buf[VER_T_TKL], ver, 1);
    set!(buf[VER_T_TKL], t, type_.into_nibble());
    set!(buf[VER_T_TKL], tkl, tkl as u8);
    buf[CODE] = code.as_byte();
    NE::write_u16(&mut buf[MESSAGE_ID], message_id);
    buf[TOKEN_START..TOKEN_START + tkl].copy_from_slice(token);

    let opts_start = TOKEN_START + tkl;
    let opts_len = option::encode(&mut buf[opts_start..], options);
    let mut cursor = opts_start + opts_len;

    if !payload.is_empty() {
        buf[cursor] = PAYLOAD_MARKER;
        cursor += 1;
        buf[cursor..cursor + payload.len()].copy_from_slice(payload);
        cursor += payload.len();
    }

    cursor
}

/// Builds a bare 4-byte ACK (or RST) by flipping `type_`/`code`/`tkl` on a
/// copy of the incoming header and echoing its message ID. Used both to
/// ACK a separate CON response and, symmetrically, to re-assemble the
/// header when the engine needs to answer in kind.
pub fn assemble_bare(buf: &mut [u8; 4], type_: Type, message_id: u16) {
    buf[VER_T_TKL] = 0;
    set!(buf[VER_T_TKL], ver, 1);
    set!(buf[VER_T_TKL], t, type_.into_nibble());
    set!(buf[VER_T_TKL], tkl, 0);
    buf[CODE] = Code::EMPTY.as_byte();
    NE::write_u16(&mut buf[MESSAGE_ID], message_id);
}

fn get_version(buf: &[u8]) -> u8 {
    get!(buf[VER_T_TKL], ver)
}

fn get_type(buf: &[u8]) -> Type {
    Type::from_nibble(get!(buf[VER_T_TKL], t))
}

fn get_tkl(buf: &[u8]) -> u8 {
    get!(buf[VER_T_TKL], tkl)
}

fn get_code(buf: &[u8]) -> Code {
    Code::from_byte(buf[CODE])
}

fn get_message_id(buf: &[u8]) -> u16 {
    NE::read_u16(&buf[MESSAGE_ID])
}

/// How an incoming UDP frame relates to the outstanding request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// An empty ACK; a separate response is still owed.
    PureAck,
    /// The response was piggybacked on the ACK.
    Piggybacked {
        /// The classification of the piggybacked response.
        classification: Classification,
    },
    /// A separate response carried in a Confirmable message; the engine
    /// owes the peer an ACK.
    SeparateNeedsAck {
        /// The classification of the separate response.
        classification: Classification,
    },
    /// A separate response carried in a Non-confirmable message.
    SeparateNoAck {
        /// The classification of the separate response.
        classification: Classification,
    },
    /// The peer reset the exchange.
    Reset,
}

/// Validates and classifies an incoming UDP frame against the outstanding
/// request, per RFC 7252 §4.2/§4.3.
///
/// Returns the [`Disposition`], the response [`Code`], and the byte offset
/// (into `frame`) at which options begin. For `PureAck` and `Reset` the
/// offset is meaningless (those frames carry no options) and is reported
/// as `frame.len()`.
pub fn parse_response(
    frame: &[u8],
    request_mid: u16,
    request_tkl: u8,
    request_token: &[u8],
) -> Result<(Disposition, Code, usize), Error> {
    if frame.len() < usize::from(HEADER_SIZE) {
        return Err(Error::WrongOptions);
    }
    if get_version(frame) != 1 {
        return Err(Error::WrongOptions);
    }

    let ty = get_type(frame);
    let code = get_code(frame);
    let mid = get_message_id(frame);
    let tkl = get_tkl(frame);

    match ty {
        Type::Acknowledgement => {
            if mid != request_mid {
                return Err(Error::WrongOptions);
            }
            if code == Code::EMPTY {
                if tkl != 0 || frame.len() != usize::from(HEADER_SIZE) {
                    return Err(Error::WrongOptions);
                }
                return Ok((Disposition::PureAck, code, frame.len()));
            }

            validate_token(frame, tkl, request_tkl, request_token)?;
            let classification = classify_or_err(code)?;
            Ok((
                Disposition::Piggybacked { classification },
                code,
                usize::from(HEADER_SIZE) + usize::from(tkl),
            ))
        }
        Type::Reset => {
            if tkl != 0 || code != Code::EMPTY || frame.len() != usize::from(HEADER_SIZE) {
                return Err(Error::WrongOptions);
            }
            if mid != request_mid {
                return Err(Error::WrongOptions);
            }
            Ok((Disposition::Reset, code, frame.len()))
        }
        Type::Confirmable | Type::NonConfirmable => {
            if mid == request_mid {
                return Err(Error::WrongOptions);
            }
            validate_token(frame, tkl, request_tkl, request_token)?;
            let classification = classify_or_err(code)?;
            let disposition = if ty == Type::Confirmable {
                Disposition::SeparateNeedsAck { classification }
            } else {
                Disposition::SeparateNoAck { classification }
            };
            Ok((
                disposition,
                code,
                usize::from(HEADER_SIZE) + usize::from(tkl),
            ))
        }
    }
}

fn validate_token(
    frame: &[u8],
    tkl: u8,
    request_tkl: u8,
    request_token: &[u8],
) -> Result<(), Error> {
    if tkl != request_tkl {
        return Err(Error::WrongOptions);
    }
    let start = TOKEN_START;
    let end = start + usize::from(tkl);
    if frame.len() < end {
        return Err(Error::WrongOptions);
    }
    if &frame[start..end] != request_token {
        return Err(Error::WrongOptions);
    }
    Ok(())
}

/// Like `crate::request::classify`, but rejects class 7: CoAP-over-TCP
/// signalling codes have no meaning on the UDP path, which knows only
/// classes 2, 4, and 5.
fn classify_or_err(code: Code) -> Result<Classification, Error> {
    if code.class() == 7 {
        return Err(Error::WrongOptions);
    }
    crate::request::classify(code).ok_or(Error::WrongOptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Method;
    use crate::option::OptionNumber;

    #[test]
    fn assembles_minimal_non_get() {
        let mut buf = [0u8; 16];
        let n = assemble_request(
            &mut buf,
            Type::NonConfirmable,
            Method::Get.into(),
            0x1234,
            &[],
            &[],
            &[],
        );
        assert_eq!(&buf[..n], &[0x50, 0x01, 0x12, 0x34]);
    }

    #[test]
    fn assembles_con_get_with_uri_path_and_token() {
        let mut buf = [0u8; 16];
        let opts = [OptionView::new(OptionNumber::UriPath, b"t")];
        let n = assemble_request(
            &mut buf,
            Type::Confirmable,
            Method::Get.into(),
            0x0005,
            &[0xAA, 0xBB],
            &opts,
            &[],
        );
        assert_eq!(&buf[..n], &[0x42, 0x01, 0x00, 0x05, 0xAA, 0xBB, 0xB1, b't']);
    }

    #[test]
    fn parses_piggybacked_response() {
        let frame = [0x62, 0x45, 0x00, 0x05, 0xAA, 0xBB, PAYLOAD_MARKER, b'X'];
        let (disposition, code, opts_start) =
            parse_response(&frame, 0x0005, 2, &[0xAA, 0xBB]).unwrap();
        assert_eq!(
            disposition,
            Disposition::Piggybacked { classification: Classification::Success }
        );
        assert_eq!(code, Code::from_byte(0x45));
        assert_eq!(opts_start, 6);
    }

    #[test]
    fn parses_pure_ack() {
        let frame = [0x60, 0x00, 0x00, 0x05];
        let (disposition, _, _) = parse_response(&frame, 0x0005, 2, &[0xAA, 0xBB]).unwrap();
        assert_eq!(disposition, Disposition::PureAck);
    }

    #[test]
    fn parses_reset() {
        let frame = [0x70, 0x00, 0x00, 0x05];
        let (disposition, _, _) = parse_response(&frame, 0x0005, 0, &[]).unwrap();
        assert_eq!(disposition, Disposition::Reset);
    }

    #[test]
    fn rejects_mismatched_token() {
        let frame = [0x62, 0x45, 0x00, 0x05, 0xFF, 0xFF, PAYLOAD_MARKER, b'X'];
        assert!(parse_response(&frame, 0x0005, 2, &[0xAA, 0xBB]).is_err());
    }

    #[test]
    fn separate_response_must_have_different_mid() {
        let frame = [0x42, 0x45, 0x00, 0x05, 0xAA, 0xBB];
        assert!(parse_response(&frame, 0x0005, 2, &[0xAA, 0xBB]).is_err());
    }

    #[test]
    fn rejects_class_seven_on_piggybacked_ack() {
        // 0xE1 = class 7, detail 1 (CSM) -- a TCP-only signalling code.
        let frame = [0x62, 0xE1, 0x00, 0x05, 0xAA, 0xBB, PAYLOAD_MARKER, b'X'];
        assert_eq!(
            parse_response(&frame, 0x0005, 2, &[0xAA, 0xBB]).unwrap_err(),
            Error::WrongOptions
        );
    }

    #[test]
    fn rejects_class_seven_on_separate_response() {
        let frame = [0x42, 0xE1, 0x00, 0x09, 0xAA, 0xBB];
        assert_eq!(
            parse_response(&frame, 0x0005, 2, &[0xAA, 0xBB]).unwrap_err(),
            Error::WrongOptions
        );
    }
}
