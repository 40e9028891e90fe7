//! Option delta/length codec, shared by the UDP and TCP framings.
//!
//! Options are encoded as an ordered sequence of (number, length, value)
//! triples. Each entry is stored as a header byte (delta nibble, length
//! nibble) followed by up to two extension bytes per field and the raw
//! value bytes. A standalone 0xFF marks the end of the option block.

use byteorder::{ByteOrder, NetworkEndian as NE};
use cast::{u16, u8, usize};

use crate::error::Error;

/// Marks the end of the option block / start of the payload.
pub const PAYLOAD_MARKER: u8 = 0xff;

const RESERVED: u8 = 0b1111;
const OFFSET8: u16 = 13;
const OFFSET16: u16 = 269;
const DELTA8: u8 = 13;
const DELTA16: u8 = 14;
const LENGTH8: u8 = 13;
const LENGTH16: u8 = 14;

mod length {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = 0;
    pub const SIZE: u8 = 4;
}

mod delta {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = super::length::OFFSET + super::length::SIZE;
    pub const SIZE: u8 = 4;
}

full_range!(
    u16,
    /// CoAP option numbers.
    #[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
    pub enum OptionNumber {
        /// If-Match
        IfMatch = 1,
        /// Uri-Host
        UriHost = 3,
        /// ETag
        ETag = 4,
        /// If-None-Match
        IfNoneMatch = 5,
        /// Uri-Port
        UriPort = 7,
        /// Location-Path
        LocationPath = 8,
        /// Uri-Path
        UriPath = 11,
        /// Content-Format
        ContentFormat = 12,
        /// Max-Age
        MaxAge = 14,
        /// Uri-Query
        UriQuery = 15,
        /// Accept
        Accept = 17,
        /// Location-Query
        LocationQuery = 20,
        /// Block2: NUM/M/SZX for block-wise responses.
        Block2 = 23,
        /// Block1: option number only; this engine does not encode or decode Block1 semantics, only recognizes the number.
        Block1 = 27,
        /// Proxy-Uri
        ProxyUri = 35,
        /// Proxy-Scheme
        ProxyScheme = 39,
        /// Size1
        Size1 = 60,
    }
);

impl OptionNumber {
    /// Odd option numbers are critical: an unrecognized critical option
    /// must cause the whole message to be rejected.
    pub fn is_critical(&self) -> bool {
        u16::from(*self) % 2 == 1
    }

    /// Even option numbers are elective: safe to ignore if unrecognized.
    pub fn is_elective(&self) -> bool {
        !self.is_critical()
    }
}

/// One option the caller wants encoded into an outgoing request.
///
/// A slice of these is handed to [`encode`]. The slice MUST already be
/// sorted by ascending `number` (ties broken by input order) — this is a
/// precondition, not something `encode` re-establishes, since re-sorting
/// on every request would hide a caller bug at a cost paid on every call.
#[derive(Clone, Copy, Debug)]
pub struct OptionView<'a> {
    number: OptionNumber,
    value: &'a [u8],
}

impl<'a> OptionView<'a> {
    /// Builds an option view over a caller-owned value.
    pub fn new(number: OptionNumber, value: &'a [u8]) -> Self {
        OptionView { number, value }
    }

    /// The option number.
    pub fn number(&self) -> OptionNumber {
        self.number
    }

    /// The raw option value.
    pub fn value(&self) -> &'a [u8] {
        self.value
    }
}

fn ext_bytes(x: u16) -> u16 {
    if x < OFFSET8 {
        0
    } else if x < OFFSET16 {
        1
    } else {
        2
    }
}

/// Encodes `options` (pre-sorted ascending by number) into `buf`, starting
/// at offset 0. Returns the number of bytes written.
///
/// # Panics
///
/// Panics if `options` is not sorted ascending in debug builds, or if
/// `buf` is not large enough to hold the encoding — both are caller
/// contract violations rather than recoverable protocol errors.
pub fn encode(buf: &mut [u8], options: &[OptionView<'_>]) -> usize {
    let mut cursor = 0usize;
    let mut running: u16 = 0;

    for (i, opt) in options.iter().enumerate() {
        let number: u16 = opt.number().into();
        if i > 0 {
            let prev: u16 = options[i - 1].number().into();
            debug_assert!(number >= prev, "options passed to encode() must be sorted");
        }

        let delta = number.checked_sub(running).expect("options must be sorted ascending");
        running = number;

        let len = u16(opt.value().len()).expect("option value too long");
        let size = 1 + usize(ext_bytes(delta)) + usize(ext_bytes(len)) + usize(len);
        assert!(buf.len() >= cursor + size, "buffer too small for options");

        let head_idx = cursor;
        let mut writer = cursor + 1;
        buf[head_idx] = 0;

        if delta < OFFSET8 {
            set!(buf[head_idx], delta, u8(delta).unwrap());
        } else if delta < OFFSET16 {
            set!(buf[head_idx], delta, DELTA8);
            buf[writer] = u8(delta - OFFSET8).unwrap();
            writer += 1;
        } else {
            set!(buf[head_idx], delta, DELTA16);
            NE::write_u16(&mut buf[writer..writer + 2], delta - OFFSET16);
            writer += 2;
        }

        if len < OFFSET8 {
            set!(buf[head_idx], length, u8(len).unwrap());
        } else if len < OFFSET16 {
            set!(buf[head_idx], length, LENGTH8);
            buf[writer] = u8(len - OFFSET8).unwrap();
            writer += 1;
        } else {
            set!(buf[head_idx], length, LENGTH16);
            NE::write_u16(&mut buf[writer..writer + 2], len - OFFSET16);
            writer += 2;
        }

        buf[writer..writer + usize(len)].copy_from_slice(opt.value());
        cursor = head_idx + size;
    }

    cursor
}

/// A decoded option, borrowing its value from the buffer it was parsed
/// from.
#[derive(Clone, Copy, Debug)]
pub struct DecodedOption<'a> {
    number: u16,
    value: &'a [u8],
}

impl<'a> DecodedOption<'a> {
    /// The option number. Falls back to `Unknown` for numbers this crate
    /// doesn't name.
    pub fn number(&self) -> OptionNumber {
        self.number.into()
    }

    /// The raw option value.
    pub fn value(&self) -> &'a [u8] {
        self.value
    }
}

/// Lazily decodes the options found at the start of `buf`, up to the
/// payload marker. Zero-copy: each item borrows its value directly from
/// `buf`.
///
/// Yields no items (not an error) when the very first byte is the payload
/// marker — the wire's "no options" case.
#[derive(Clone, Debug)]
pub struct Options<'a> {
    number: u16,
    rest: &'a [u8],
}

/// Decodes the options in `buf` and reports where the payload begins.
///
/// `buf` is the full message tail starting right after the token. Returns
/// the iterator plus the index (relative to `buf`) of the first payload
/// byte, or `buf.len()` if there is no payload.
pub fn decode(buf: &[u8]) -> Result<(Options<'_>, usize), Error> {
    let mut cursor = 0usize;

    loop {
        match buf.get(cursor) {
            None => break,
            Some(&PAYLOAD_MARKER) => break,
            Some(&head) => {
                cursor += 1;
                let delta4 = get!(head, delta);
                let len4 = get!(head, length);

                if delta4 == RESERVED || len4 == RESERVED {
                    return Err(Error::WrongOptions);
                }

                cursor += match delta4 {
                    d if d == DELTA8 => {
                        if cursor >= buf.len() {
                            return Err(Error::WrongOptions);
                        }
                        1
                    }
                    d if d == DELTA16 => {
                        if cursor + 2 > buf.len() {
                            return Err(Error::WrongOptions);
                        }
                        2
                    }
                    _ => 0,
                };

                let len = match len4 {
                    l if l == LENGTH8 => {
                        let byte = *buf.get(cursor).ok_or(Error::WrongOptions)?;
                        cursor += 1;
                        u16(byte) + OFFSET8
                    }
                    l if l == LENGTH16 => {
                        if cursor + 2 > buf.len() {
                            return Err(Error::WrongOptions);
                        }
                        let v = NE::read_u16(&buf[cursor..cursor + 2]) + OFFSET16;
                        cursor += 2;
                        v
                    }
                    l => u16(l),
                };

                let end = cursor.checked_add(usize(len)).ok_or(Error::WrongOptions)?;
                if end > buf.len() {
                    return Err(Error::WrongOptions);
                }
                cursor = end;
            }
        }
    }

    let payload_start = if cursor < buf.len() && buf[cursor] == PAYLOAD_MARKER {
        cursor + 1
    } else {
        cursor
    };

    Ok((
        Options {
            number: 0,
            rest: &buf[..cursor],
        },
        payload_start,
    ))
}

impl<'a> Iterator for Options<'a> {
    type Item = DecodedOption<'a>;

    fn next(&mut self) -> Option<DecodedOption<'a>> {
        if self.rest.is_empty() {
            return None;
        }

        let head = self.rest[0];
        let mut p = 1usize;
        let delta4 = get!(head, delta);
        let len4 = get!(head, length);

        self.number += if delta4 == DELTA8 {
            let v = u16(self.rest[p]) + OFFSET8;
            p += 1;
            v
        } else if delta4 == DELTA16 {
            let v = NE::read_u16(&self.rest[p..p + 2]) + OFFSET16;
            p += 2;
            v
        } else {
            u16(delta4)
        };

        let len = if len4 == LENGTH8 {
            let v = u16(self.rest[p]) + OFFSET8;
            p += 1;
            v
        } else if len4 == LENGTH16 {
            let v = NE::read_u16(&self.rest[p..p + 2]) + OFFSET16;
            p += 2;
            v
        } else {
            u16(len4)
        };

        let value_start = p;
        let value_end = p + usize(len);
        let value = &self.rest[value_start..value_end];
        self.rest = &self.rest[value_end..];

        Some(DecodedOption {
            number: self.number,
            value,
        })
    }
}

impl<'a> Options<'a> {
    /// Returns the first option matching `target`, scanning in ascending
    /// order and stopping early once `target` has been passed (mirrors the
    /// sorted-list lookup of the original option-by-number helper).
    pub fn find_by_number(self, target: OptionNumber) -> Option<DecodedOption<'a>> {
        let target: u16 = target.into();
        for opt in self {
            let n: u16 = opt.number().into();
            if n == target {
                return Some(opt);
            }
            if n > target {
                break;
            }
        }
        None
    }
}
