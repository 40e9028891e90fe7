//! CoAP Type and Code fields, shared by the UDP and TCP framings.

use core::fmt;

/// CoAP message Type, carried in the UDP header only; TCP framing has no
/// notion of Type (the stream itself supplies reliability).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    /// Confirmable message: the peer must ACK or RST it.
    Confirmable,
    /// Non-confirmable message: fire and forget.
    NonConfirmable,
    /// Acknowledgement of a Confirmable message.
    Acknowledgement,
    /// Reset: the peer could not process the message at all.
    Reset,
}

impl Type {
    pub(crate) fn from_nibble(nibble: u8) -> Self {
        match nibble & 0b11 {
            0b00 => Type::Confirmable,
            0b01 => Type::NonConfirmable,
            0b10 => Type::Acknowledgement,
            0b11 => Type::Reset,
            _ => unreachable!(),
        }
    }

    pub(crate) fn into_nibble(self) -> u8 {
        match self {
            Type::Confirmable => 0,
            Type::NonConfirmable => 1,
            Type::Acknowledgement => 2,
            Type::Reset => 3,
        }
    }
}

/// A CoAP Code: class (3 bits) and detail (5 bits) packed into one byte.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Code(u8);

mod detail {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = 0;
    pub const SIZE: u8 = 5;
}

mod class {
    pub const MASK: u8 = (1 << SIZE) - 1;
    pub const OFFSET: u8 = 5;
    pub const SIZE: u8 = 3;
}

impl Code {
    /// The empty message code, 0.00. Used by pure ACKs and RSTs.
    pub const EMPTY: Self = Code(0b000_00000);

    /// Builds a Code from the raw wire byte.
    pub fn from_byte(byte: u8) -> Self {
        Code(byte)
    }

    /// Returns the raw wire byte.
    pub fn as_byte(&self) -> u8 {
        self.0
    }

    /// Returns the class (request=0, success=2, client error=4, server
    /// error=5, signalling=7).
    pub fn class(&self) -> u8 {
        get!(self.0, class)
    }

    /// Returns the detail.
    pub fn detail(&self) -> u8 {
        get!(self.0, detail)
    }

    /// `true` for any non-empty code with class 0 (a request method).
    pub fn is_request(&self) -> bool {
        self.class() == 0 && self.detail() != 0
    }

    /// `true` for a success code (2.xx).
    pub fn is_success(&self) -> bool {
        self.class() == 2
    }

    /// `true` for a client- or server-error code (4.xx or 5.xx).
    pub fn is_error(&self) -> bool {
        self.class() == 4 || self.class() == 5
    }

    /// `true` for a signalling code (7.xx, CoAP-over-TCP only).
    pub fn is_signalling(&self) -> bool {
        self.class() == 7
    }

    pub(crate) fn from_parts(class: u8, detail: u8) -> Self {
        let mut code = 0;
        set!(code, class, class);
        set!(code, detail, detail);
        Code(code)
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code(0b{:03b}_{:05b})", self.class(), self.detail())
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

code!(
    /// Request methods (class 0).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Method {
        /// GET
        Get = (0, 1),
        /// POST
        Post = (0, 2),
        /// PUT
        Put = (0, 3),
        /// DELETE
        Delete = (0, 4),
    }
);

code!(
    /// Response codes (classes 2, 4, 5).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Response {
        /// Created
        Created = (2, 1),
        /// Deleted
        Deleted = (2, 2),
        /// Valid
        Valid = (2, 3),
        /// Changed
        Changed = (2, 4),
        /// Content
        Content = (2, 5),

        /// Bad Request
        BadRequest = (4, 0),
        /// Unauthorized
        Unauthorized = (4, 1),
        /// Bad Option
        BadOption = (4, 2),
        /// Forbidden
        Forbidden = (4, 3),
        /// Not Found
        NotFound = (4, 4),
        /// Method Not Allowed
        MethodNotAllowed = (4, 5),
        /// Not Acceptable
        NotAcceptable = (4, 6),
        /// Precondition Failed
        PreconditionFailed = (4, 12),
        /// Request Entity Too Large
        RequestEntityTooLarge = (4, 13),
        /// Unsupported Content-Format
        UnsupportedContentFormat = (4, 15),

        /// Internal Server Error
        InternalServerError = (5, 0),
        /// Not Implemented
        NotImplemented = (5, 1),
        /// Bad Gateway
        BadGateway = (5, 2),
        /// Service Unavailable
        ServiceUnavailable = (5, 3),
        /// Gateway Timeout
        GatewayTimeout = (5, 4),
        /// Proxying Not Supported
        ProxyingNotSupported = (5, 5),
    }
);

// Class 7: CoAP-over-TCP signalling (RFC 8323 §5). The engine recognizes
// these as valid response codes on the TCP path but does not originate or
// negotiate them.
code!(
    /// CoAP-over-TCP signalling codes (class 7).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum SignalCode {
        /// 7.00 Unassigned
        Unassigned = (7, 0),
        /// 7.01 CSM
        Csm = (7, 1),
        /// 7.02 Ping
        Ping = (7, 2),
        /// 7.03 Pong
        Pong = (7, 3),
        /// 7.04 Release
        Release = (7, 4),
        /// 7.05 Abort
        Abort = (7, 5),
    }
);

full_range!(
    u16,
    /// CoAP Content-Format registry values actually in use by this engine's
    /// callers; anything else round-trips through `Unknown`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ContentFormat {
        /// text/plain; charset=utf-8
        TextPlain = 0,
        /// application/link-format
        ApplicationLinkFormat = 40,
        /// application/xml
        ApplicationXml = 41,
        /// application/octet-stream
        ApplicationOctetStream = 42,
        /// application/exi
        ApplicationExi = 47,
        /// application/json
        ApplicationJson = 50,
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::TryFrom;

    #[test]
    fn code_round_trips_through_method() {
        let code: Code = Method::Get.into();
        assert_eq!(Method::try_from(code), Ok(Method::Get));
        assert_eq!(code.class(), 0);
        assert_eq!(code.detail(), 1);
    }

    #[test]
    fn code_round_trips_through_response() {
        let code: Code = Response::Content.into();
        assert_eq!(Response::try_from(code), Ok(Response::Content));
        assert!(code.is_success());
        assert!(!code.is_error());
    }

    #[test]
    fn signal_code_is_class_seven() {
        let code: Code = SignalCode::Ping.into();
        assert!(code.is_signalling());
        assert_eq!(SignalCode::try_from(code), Ok(SignalCode::Ping));
    }

    #[test]
    fn unassigned_signal_code_round_trips() {
        let code: Code = SignalCode::Unassigned.into();
        assert_eq!(code.class(), 7);
        assert_eq!(code.detail(), 0);
        assert_eq!(SignalCode::try_from(code), Ok(SignalCode::Unassigned));
    }

    #[test]
    fn unrelated_code_is_not_a_method() {
        let code = Code::from_parts(2, 5);
        assert!(Method::try_from(code).is_err());
    }

    #[test]
    fn empty_code_is_not_a_request() {
        assert!(!Code::EMPTY.is_request());
    }

    #[test]
    fn display_matches_dotted_notation() {
        use core::fmt::Write;

        struct Buf {
            bytes: [u8; 8],
            len: usize,
        }

        impl Write for Buf {
            fn write_str(&mut self, s: &str) -> core::fmt::Result {
                let end = self.len + s.len();
                self.bytes[self.len..end].copy_from_slice(s.as_bytes());
                self.len = end;
                Ok(())
            }
        }

        let code: Code = Response::NotFound.into();
        let mut buf = Buf { bytes: [0; 8], len: 0 };
        write!(buf, "{}", code).unwrap();
        assert_eq!(&buf.bytes[..buf.len], b"4.04");
    }
}
