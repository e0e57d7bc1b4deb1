//! Length-prefixed framing for the router wire protocol.
//!
//! Two framing variants share a single stream. Short frames carry a list of
//! NUL-terminated text fields behind a 2-byte big-endian length and are used
//! for commands and control replies. Long frames carry raw bytes behind a
//! 4-byte big-endian length and are used for credentials and log payloads.
//! The router only ever replies with short frames, so inbound decoding is
//! limited to that variant.

pub mod codec;
pub mod errors;

pub use codec::{
    Outbound,
    RouterCodec,
    decode_long,
    decode_short,
    encode_long,
    encode_short,
    split_fields,
};
pub use errors::FrameError;

/// Length of the short-frame header in bytes.
pub const SHORT_HEADER_LEN: usize = 2;
/// Length of the long-frame header in bytes.
pub const LONG_HEADER_LEN: usize = 4;
/// Largest payload a short frame can describe.
pub const MAX_SHORT_PAYLOAD: usize = u16::MAX as usize;
/// Largest payload a long frame can describe.
pub const MAX_LONG_PAYLOAD: usize = u32::MAX as usize;
/// Byte terminating every field of a short frame.
pub const FIELD_TERMINATOR: u8 = 0;

/// Ordered text fields carried by one short frame.
pub type Fields = Vec<String>;
