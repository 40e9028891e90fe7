//! TCP framing (RFC 8323): a variable-length prefix, then Code, token,
//! options, and an optional payload.
//!
//! The prefix's own length depends on the total encoded length, which in
//! turn depends on the encoded option length — so the encoder predicts a
//! layout, writes options at the predicted offset, then shifts them into
//! place once the real length (and therefore the real prefix size) is
//! known.

use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::{u32, u8, usize};

use crate::code::Code;
use crate::error::Error;
use crate::option::{self, OptionView, PAYLOAD_MARKER};
use crate::request::Classification;

const MIN_HEADER_LEN: usize = 2;

const LEN_1BYTE: u8 = 13;
const LEN_2BYTES: u8 = 14;
const LEN_4BYTES: u8 = 15;

const LEN_MIN: u32 = 13;
const LEN_MED: u32 = 269;
const LEN_MAX: u32 = 65805;

mod len_nibble {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = 4;
    pub const SIZE: u8 = 4;
}

mod tkl_nibble {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = 0;
    pub const SIZE: u8 = 4;
}

/// Tier selection for the variable-length prefix: how many extended-length
/// bytes follow the first header byte, and the base value subtracted
/// before encoding.
struct Tier {
    nibble: u8,
    ext_len_bytes: usize,
    base: u32,
}

fn select_tier(encoded_len: u32) -> Tier {
    if encoded_len < LEN_MIN {
        Tier { nibble: u8(encoded_len).unwrap(), ext_len_bytes: 0, base: 0 }
    } else if encoded_len < LEN_MED {
        Tier { nibble: LEN_1BYTE, ext_len_bytes: 1, base: LEN_MIN }
    } else if encoded_len < LEN_MAX {
        Tier { nibble: LEN_2BYTES, ext_len_bytes: 2, base: LEN_MED }
    } else {
        Tier { nibble: LEN_4BYTES, ext_len_bytes: 4, base: LEN_MAX }
    }
}

/// Offset (from the start of the frame) at which options begin, once the
/// tier for this frame is known. Shared by the encoder and the shifter so
/// there is exactly one formula, not one per branch.
fn options_offset(tkl: u8, ext_len_bytes: usize) -> usize {
    MIN_HEADER_LEN + usize::from(tkl) + ext_len_bytes
}

/// Assembles a TCP-framed request into `buf`. Returns the number of bytes
/// written.
pub fn assemble_request(
    buf: &mut [u8],
    code: Code,
    token: &[u8],
    options: &[OptionView<'_>],
    payload: &[u8],
) -> usize {
    let tkl = token.len();

    // Predict a layout before the real encoded length is known: assume no
    // extended-length bytes unless the payload alone already suggests
    // we'll need at least one.
    let predicted_ext = if payload.len() > 10 { 1 } else { 0 };
    let predicted_offset = options_offset(u8(tkl).unwrap(), predicted_ext);

    let opts_len = option::encode(&mut buf[predicted_offset..], options);
    let encoded_len = u32(opts_len as u32)
        + if payload.is_empty() { 0 } else { u32(payload.len() as u32) + 1 };

    let tier = select_tier(encoded_len);
    let actual_offset = options_offset(u8(tkl).unwrap(), tier.ext_len_bytes);

    if actual_offset != predicted_offset {
        shift(buf, predicted_offset, actual_offset, opts_len);
    }

    // header
    buf[0] = 0;
    set!(buf[0], len_nibble, tier.nibble);
    set!(buf[0], tkl_nibble, u8(tkl).unwrap());

    let mut cursor = 1;
    match tier.ext_len_bytes {
        0 => {}
        1 => {
            buf[cursor] = u8(encoded_len - tier.base).unwrap();
            cursor += 1;
        }
        2 => {
            NE::write_u16(&mut buf[cursor..cursor + 2], cast::u16(encoded_len - tier.base).unwrap());
            cursor += 2;
        }
        4 => {
            NE::write_u32(&mut buf[cursor..cursor + 4], encoded_len - tier.base);
            cursor += 4;
        }
        _ => unreachable!(),
    }

    buf[cursor] = code.as_byte();
    cursor += 1;
    buf[cursor..cursor + tkl].copy_from_slice(token);
    cursor += tkl;

    debug_assert_eq!(cursor, actual_offset);
    cursor += opts_len;

    if !payload.is_empty() {
        buf[cursor] = PAYLOAD_MARKER;
        cursor += 1;
        buf[cursor..cursor + payload.len()].copy_from_slice(payload);
        cursor += payload.len();
    }

    cursor
}

/// Moves the `len`-byte block at `from` to `to`, choosing a copy direction
/// that tolerates overlapping ranges.
fn shift(buf: &mut [u8], from: usize, to: usize, len: usize) {
    if to < from {
        for i in 0..len {
            buf[to + i] = buf[from + i];
        }
    } else {
        for i in (0..len).rev() {
            buf[to + i] = buf[from + i];
        }
    }
}

fn extract_len(buf: &[u8]) -> Result<(u32, usize), Error> {
    let nibble = get!(buf[0], len_nibble);
    match nibble {
        n if n == LEN_1BYTE => {
            let b = *buf.get(1).ok_or(Error::WrongOptions)?;
            Ok((u32(b) + LEN_MIN, 1))
        }
        n if n == LEN_2BYTES => {
            if buf.len() < 3 {
                return Err(Error::WrongOptions);
            }
            Ok((u32(NE::read_u16(&buf[1..3])) + LEN_MED, 2))
        }
        n if n == LEN_4BYTES => {
            if buf.len() < 5 {
                return Err(Error::WrongOptions);
            }
            Ok((NE::read_u32(&buf[1..5]) + LEN_MAX, 4))
        }
        n => Ok((u32(n), 0)),
    }
}

/// Validates and classifies an incoming TCP frame.
///
/// Returns the response [`Code`], the [`Classification`] of that code, and
/// the byte offset at which options begin.
pub fn parse_response(
    frame: &[u8],
    request_tkl: u8,
    request_token: &[u8],
) -> Result<(Code, Classification, usize), Error> {
    if frame.len() < MIN_HEADER_LEN {
        return Err(Error::WrongOptions);
    }

    let tkl = get!(frame[0], tkl_nibble);
    let (data_len, ext_len_bytes) = extract_len(frame)?;

    let code_idx = 1 + ext_len_bytes;
    let code = *frame.get(code_idx).ok_or(Error::WrongOptions)?;
    let code = Code::from_byte(code);

    let opts_start = code_idx + 1 + usize::from(tkl);
    let total_len = opts_start + usize(data_len);
    if frame.len() < total_len {
        return Err(Error::WrongOptions);
    }
    if tkl != request_tkl {
        return Err(Error::WrongOptions);
    }
    if &frame[code_idx + 1..opts_start] != request_token {
        return Err(Error::WrongOptions);
    }

    let classification = crate::request::classify(code).ok_or(Error::WrongOptions)?;
    Ok((code, classification, opts_start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Method;

    #[test]
    fn assembles_minimal_request_with_inline_length() {
        let mut buf = [0u8; 32];
        let n = assemble_request(&mut buf, Method::Get.into(), &[], &[], &[]);
        // no options, no payload -> encoded length 0, tkl=0
        assert_eq!(buf[0], 0);
        assert_eq!(buf[1], Method::Get.into_code_byte());
        assert_eq!(n, 2);
    }

    trait MethodExt {
        fn into_code_byte(self) -> u8;
    }
    impl MethodExt for Method {
        fn into_code_byte(self) -> u8 {
            let c: Code = self.into();
            c.as_byte()
        }
    }

    #[test]
    fn large_body_uses_two_extended_bytes_and_shifts_forward() {
        let payload = [7u8; 300];
        let mut buf = [0u8; 512];
        let n = assemble_request(&mut buf, Method::Post.into(), &[], &[], &payload);

        // encoded_len = payload.len() + 1 (marker) = 301, which falls in
        // the [269, 65805) tier -> 2 extended bytes, 4-byte header total.
        assert_eq!(get!(buf[0], len_nibble), LEN_2BYTES);
        let (data_len, ext) = extract_len(&buf).unwrap();
        assert_eq!(ext, 2);
        assert_eq!(data_len, 301);
        assert_eq!(buf[1 + ext], Method::Post.into_code_byte());
        assert_eq!(&buf[n - payload.len()..n], &payload[..]);
    }

    #[test]
    fn round_trips_through_parse_response() {
        let mut buf = [0u8; 32];
        let token = [0x11, 0x22];
        let code: Code = crate::code::Response::Content.into();

        // hand-assemble a response frame with the same shape as a request
        let n = assemble_request(&mut buf, code, &token, &[], b"hi");
        let (parsed_code, classification, opts_start) =
            parse_response(&buf[..n], 2, &token).unwrap();
        assert_eq!(parsed_code, code);
        assert_eq!(classification, Classification::Success);
        assert_eq!(&buf[opts_start..n], &[PAYLOAD_MARKER, b'h', b'i']);
    }

    #[test]
    fn rejects_token_mismatch() {
        let mut buf = [0u8; 32];
        let token = [0x11, 0x22];
        let n = assemble_request(&mut buf, Method::Get.into(), &token, &[], &[]);
        assert!(parse_response(&buf[..n], 2, &[0x00, 0x00]).is_err());
    }
}
