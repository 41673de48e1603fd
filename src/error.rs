//! The errors of the `coap` module.

use alloc::string::String;
use core::fmt;
#[cfg(feature = "std")]
use std::error;

/// The errors that can occur when encoding/decoding messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageError {
    /// The buffer is too short to contain a valid header, or the formatted
    /// message would exceed the configured size ceiling.
    InvalidPacketLength,
    /// The header's version bits are not `1`, the only version this crate
    /// understands.
    UnsupportedVersion,
    /// The header's token-length nibble is greater than 8, or the buffer
    /// ends before `token_len` token bytes have been read.
    InvalidTokenLength,
    /// The header's code-class bits are not one of the semantically valid
    /// classes `{0, 2, 4, 5}`.
    InvalidCodeClass,
    /// An option's delta nibble is the reserved value `15`, the buffer ends
    /// before an extended delta can be read, or the accumulated option
    /// number would overflow `u16`.
    InvalidOptionDelta,
    /// An option's length nibble is the reserved value `15`, the buffer
    /// ends before an extended length can be read, or the buffer ends
    /// before `len` value bytes have been read.
    InvalidOptionLength,
    /// A `0xFF` payload marker is present with no payload bytes following
    /// it.
    InvalidPayloadMarker,
    /// A structurally well-formed message violates one of the cross-field
    /// rules for empty or Reset messages.
    InvalidMessageSemantics,
}

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MessageError::InvalidPacketLength => {
                write!(f, "CoAP error: invalid packet length")
            }
            MessageError::UnsupportedVersion => {
                write!(f, "CoAP error: unsupported protocol version")
            }
            MessageError::InvalidTokenLength => {
                write!(f, "CoAP error: invalid token length")
            }
            MessageError::InvalidCodeClass => {
                write!(f, "CoAP error: invalid code class")
            }
            MessageError::InvalidOptionDelta => {
                write!(f, "CoAP error: invalid option delta")
            }
            MessageError::InvalidOptionLength => {
                write!(f, "CoAP error: invalid option length")
            }
            MessageError::InvalidPayloadMarker => {
                write!(f, "CoAP error: payload marker with no payload")
            }
            MessageError::InvalidMessageSemantics => {
                write!(f, "CoAP error: message violates empty/reset rules")
            }
        }
    }
}

#[cfg(feature = "std")]
impl error::Error for MessageError {}

/// The error that can occur when parsing a content-format.
#[derive(Debug, PartialEq, Eq)]
pub struct InvalidContentFormat;

impl fmt::Display for InvalidContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CoAP error: invalid content-format number")
    }
}

#[cfg(feature = "std")]
impl error::Error for InvalidContentFormat {}

/// The error that can occur when parsing an option value.
#[derive(Debug, PartialEq)]
pub struct IncompatibleOptionValueFormat {
    pub message: String,
}

impl fmt::Display for IncompatibleOptionValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Incompatible option value: {}", self.message)
    }
}

#[cfg(feature = "std")]
impl error::Error for IncompatibleOptionValueFormat {}
