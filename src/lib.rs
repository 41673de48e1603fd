//! A lightweight, `#![no_std]` CoAP (RFC 7252) message codec crate, ideal
//! for embedded environments.
//!
//! ## Overview
//! This crate provides the types needed to build, inspect and encode/decode
//! CoAP messages to/from their byte representation, with strict conformance
//! to the base message format (RFC 7252 §3). It deliberately stops at the
//! message layer: there is no retransmission, de-duplication, Observe
//! (RFC 7641) or Block-wise transfer (RFC 7959) state here, and no
//! transport binding. Those belong in a layer built on top of this one.
//!
//! It does require allocation, so you might have to set a global allocator
//! depending on your target.
//!
//! ## Usage
//! ```rust
//! use coap_codec::{CoapOption, Message, MessageType};
//!
//! let mut request = Message::new();
//! request.header.message_id = 23839;
//! request.header.set_code_raw(0, 1); // GET
//! request.set_token(vec![0, 0, 57, 116]);
//! request.add_option(CoapOption::UriHost, b"localhost".to_vec());
//! request.add_option(CoapOption::UriPath, b"tv1".to_vec());
//! assert_eq!(
//!     [
//!         0x44, 0x01, 0x5D, 0x1F, 0x00, 0x00, 0x39, 0x74, 0x39, 0x6C, 0x6F,
//!         0x63, 0x61, 0x6C, 0x68, 0x6F, 0x73, 0x74, 0x83, 0x74, 0x76, 0x31,
//!     ],
//!     request.to_bytes().unwrap()[..]
//! );
//!
//! let response = Message::from_bytes(&[
//!     0x64, 0x45, 0x5D, 0x1F, 0x00, 0x00, 0x39, 0x74, 0xFF, 0x48, 0x65,
//!     0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64, 0x21,
//! ])
//! .unwrap();
//! assert_eq!(23839, response.header.message_id);
//! assert_eq!(2, response.header.get_code_class());
//! assert_eq!(5, response.header.get_code_detail());
//! assert_eq!(MessageType::Acknowledgement, response.header.get_type());
//! assert_eq!([0, 0, 57, 116], response.get_token()[..]);
//! assert_eq!(b"Hello World!", &response.payload[..]);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
extern crate alloc;

#[macro_use]
mod log;

#[cfg_attr(tarpaulin, skip)]
pub mod error;

mod header;
mod option_value;
mod packet;
mod token;
mod validator;

pub use header::{
    Header, HeaderRaw, MessageClass, MessageType, RequestType, ResponseType,
};
pub use option_value::{
    OptionValueString, OptionValueType, OptionValueU16, OptionValueU32,
    OptionValueU64, OptionValueU8,
};
pub use packet::{CoapOption, ContentFormat, Message, Options};
pub use token::TokenGenerator;
