use alloc::vec::Vec;
use core::fmt;

use crate::error::MessageError;

/// The raw byte header representation, useful for encoding/decoding directly.
#[derive(Debug, Clone)]
pub struct HeaderRaw {
    ver_type_tkl: u8,
    code: u8,
    message_id: u16,
}

impl HeaderRaw {
    /// Writes the header into the given buffer, which must have a capacity of
    /// at least 4.
    pub fn serialize_into(
        &self,
        buf: &mut Vec<u8>,
    ) -> Result<(), MessageError> {
        if buf.capacity() < 4 {
            return Err(MessageError::InvalidPacketLength);
        }

        buf.push(self.ver_type_tkl);
        buf.push(self.code);
        let id_bytes = self.message_id.to_be_bytes();
        buf.extend(&id_bytes);

        Ok(())
    }

    /// Reads the first 4 bytes of `buf` as a raw header. Only checks that
    /// enough bytes are present; semantic validation (version, token
    /// length, code class) happens in [`Header::from_raw`].
    pub fn try_from(buf: &[u8]) -> Result<HeaderRaw, MessageError> {
        if buf.len() < 4 {
            return Err(MessageError::InvalidPacketLength);
        }

        Ok(HeaderRaw {
            ver_type_tkl: buf[0],
            code: buf[1],
            message_id: u16::from_be_bytes([buf[2], buf[3]]),
        })
    }
}

impl Default for HeaderRaw {
    fn default() -> HeaderRaw {
        HeaderRaw {
            ver_type_tkl: 0x40, // version: 1, type: Confirmable, TKL: 0
            code: 0x01,         // GET
            message_id: 0,
        }
    }
}

/// The detailed class (request/response) of a message, derived from its raw
/// `code_class`/`code_detail` pair. This is a best-effort, informative view:
/// the canonical representation of the code lives in [`Header::get_code_class`]
/// and [`Header::get_code_detail`], so an unrecognised `(class, detail)` pair
/// is never lossy, it just renders here as `Reserved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Empty,
    Request(RequestType),
    Response(ResponseType),
    Reserved,
}

impl MessageClass {
    fn from_parts(class: u8, detail: u8) -> MessageClass {
        match (class, detail) {
            (0, 0) => MessageClass::Empty,
            (0, 1) => MessageClass::Request(RequestType::Get),
            (0, 2) => MessageClass::Request(RequestType::Post),
            (0, 3) => MessageClass::Request(RequestType::Put),
            (0, 4) => MessageClass::Request(RequestType::Delete),
            (0, 5) => MessageClass::Request(RequestType::Fetch),
            (0, 6) => MessageClass::Request(RequestType::Patch),
            (0, 7) => MessageClass::Request(RequestType::IPatch),

            (2, 1) => MessageClass::Response(ResponseType::Created),
            (2, 2) => MessageClass::Response(ResponseType::Deleted),
            (2, 3) => MessageClass::Response(ResponseType::Valid),
            (2, 4) => MessageClass::Response(ResponseType::Changed),
            (2, 5) => MessageClass::Response(ResponseType::Content),
            (2, 31) => MessageClass::Response(ResponseType::Continue),

            (4, 0) => MessageClass::Response(ResponseType::BadRequest),
            (4, 1) => MessageClass::Response(ResponseType::Unauthorized),
            (4, 2) => MessageClass::Response(ResponseType::BadOption),
            (4, 3) => MessageClass::Response(ResponseType::Forbidden),
            (4, 4) => MessageClass::Response(ResponseType::NotFound),
            (4, 5) => MessageClass::Response(ResponseType::MethodNotAllowed),
            (4, 6) => MessageClass::Response(ResponseType::NotAcceptable),
            (4, 8) => {
                MessageClass::Response(ResponseType::RequestEntityIncomplete)
            }
            (4, 9) => MessageClass::Response(ResponseType::Conflict),
            (4, 12) => {
                MessageClass::Response(ResponseType::PreconditionFailed)
            }
            (4, 13) => {
                MessageClass::Response(ResponseType::RequestEntityTooLarge)
            }
            (4, 15) => {
                MessageClass::Response(ResponseType::UnsupportedContentFormat)
            }

            (5, 0) => {
                MessageClass::Response(ResponseType::InternalServerError)
            }
            (5, 1) => MessageClass::Response(ResponseType::NotImplemented),
            (5, 2) => MessageClass::Response(ResponseType::BadGateway),
            (5, 3) => {
                MessageClass::Response(ResponseType::ServiceUnavailable)
            }
            (5, 4) => MessageClass::Response(ResponseType::GatewayTimeout),
            (5, 5) => {
                MessageClass::Response(ResponseType::ProxyingNotSupported)
            }

            _ => MessageClass::Reserved,
        }
    }
}

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The request codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Get,
    Post,
    Put,
    Delete,
    Fetch,
    Patch,
    IPatch,
    UnKnown,
}

/// The response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    // 200 Codes
    Created,
    Deleted,
    Valid,
    Changed,
    Content,
    Continue,

    // 400 Codes
    BadRequest,
    Unauthorized,
    BadOption,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    Conflict,
    PreconditionFailed,
    RequestEntityTooLarge,
    UnsupportedContentFormat,
    RequestEntityIncomplete,

    // 500 Codes
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    ProxyingNotSupported,

    UnKnown,
}

/// The message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Confirmable,
    NonConfirmable,
    Acknowledgement,
    Reset,
}

/// The message header.
///
/// Unlike the raw wire byte, the code is kept as a `(class, detail)` pair
/// rather than round-tripped through a named code enum, so that any
/// semantically valid code (`class` in `{0, 2, 4, 5}`, `detail <= 31`) is
/// preserved exactly even when it isn't one this crate knows a name for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    ver_type_tkl: u8,
    code_class: u8,
    code_detail: u8,
    pub message_id: u16,
}

impl Default for Header {
    fn default() -> Header {
        Header {
            ver_type_tkl: 0x40,
            code_class: 0,
            code_detail: 1,
            message_id: 0,
        }
    }
}

impl Header {
    /// Creates a new header (version 1, GET, message id 0).
    pub fn new() -> Header {
        Default::default()
    }

    /// Reads a raw header, validating the version, the token length nibble
    /// and the code class. Does not know the overall buffer length, so a
    /// token length nibble that is in range but exceeds the remaining
    /// buffer is caught later by the caller.
    pub fn from_raw(raw: &HeaderRaw) -> Result<Header, MessageError> {
        let version = raw.ver_type_tkl >> 6;
        if version != 1 {
            return Err(MessageError::UnsupportedVersion);
        }

        let token_length = raw.ver_type_tkl & 0x0F;
        if token_length > 8 {
            return Err(MessageError::InvalidTokenLength);
        }

        let code_class = (raw.code & 0xE0) >> 5;
        let code_detail = raw.code & 0x1F;
        if !matches!(code_class, 0 | 2 | 4 | 5) {
            return Err(MessageError::InvalidCodeClass);
        }

        Ok(Header {
            ver_type_tkl: raw.ver_type_tkl,
            code_class,
            code_detail,
            message_id: raw.message_id,
        })
    }

    /// Returns the raw header.
    pub fn to_raw(&self) -> HeaderRaw {
        HeaderRaw {
            ver_type_tkl: self.ver_type_tkl,
            code: (self.code_class << 5) | self.code_detail,
            message_id: self.message_id,
        }
    }

    /// Returns the protocol version. Always 1; there is no setter, since
    /// this crate only ever constructs and accepts version-1 messages.
    #[inline]
    pub fn get_version(&self) -> u8 {
        self.ver_type_tkl >> 6
    }

    /// Sets the message type.
    #[inline]
    pub fn set_type(&mut self, t: MessageType) {
        let tn = match t {
            MessageType::Confirmable => 0,
            MessageType::NonConfirmable => 1,
            MessageType::Acknowledgement => 2,
            MessageType::Reset => 3,
        };

        let ver_tkl = 0xCF & self.ver_type_tkl;
        self.ver_type_tkl = (tn << 4) | ver_tkl;
    }

    /// Returns the message type.
    #[inline]
    pub fn get_type(&self) -> MessageType {
        let tn = (0x30 & self.ver_type_tkl) >> 4;
        match tn {
            0 => MessageType::Confirmable,
            1 => MessageType::NonConfirmable,
            2 => MessageType::Acknowledgement,
            3 => MessageType::Reset,
            _ => unreachable!(),
        }
    }

    /// Sets the token length. Only used internally when the token bytes
    /// are set; callers never set this independently of the token.
    #[inline]
    pub(crate) fn set_token_length(&mut self, tkl: u8) {
        debug_assert_eq!(0xF0 & tkl, 0);

        let ver_type = 0xF0 & self.ver_type_tkl;
        self.ver_type_tkl = tkl | ver_type;
    }

    /// Returns the token length.
    #[inline]
    pub fn get_token_length(&self) -> u8 {
        0x0F & self.ver_type_tkl
    }

    /// Returns the raw code class (0..=7).
    #[inline]
    pub fn get_code_class(&self) -> u8 {
        self.code_class
    }

    /// Returns the raw code detail (0..=31).
    #[inline]
    pub fn get_code_detail(&self) -> u8 {
        self.code_detail
    }

    /// Sets the raw code. Panics (in every build profile) if `class`
    /// doesn't fit in 3 bits or `detail` doesn't fit in 5 bits.
    pub fn set_code_raw(&mut self, class: u8, detail: u8) {
        assert_eq!(0xF8 & class, 0, "code class out of range: {}", class);
        assert_eq!(0xE0 & detail, 0, "code detail out of range: {}", detail);
        self.code_class = class;
        self.code_detail = detail;
    }

    /// Sets the message code from a "class.detail" string, e.g. `"2.05"`.
    pub fn set_code(&mut self, code: &str) {
        let mut parts = code.split('.');
        let class = parts.next().and_then(|s| s.parse::<u8>().ok());
        let detail = parts.next().and_then(|s| s.parse::<u8>().ok());
        match (class, detail) {
            (Some(class), Some(detail)) => self.set_code_raw(class, detail),
            _ => panic!("invalid CoAP code string: {}", code),
        }
    }

    /// Returns the message code as a "class.detail" string.
    pub fn get_code(&self) -> alloc::string::String {
        format!("{}.{:02}", self.code_class, self.code_detail)
    }

    /// Returns a best-effort classification of the code as a named
    /// request/response type. See [`MessageClass`] for why this is a
    /// derived, non-canonical view.
    pub fn code(&self) -> MessageClass {
        MessageClass::from_parts(self.code_class, self.code_detail)
    }
}
