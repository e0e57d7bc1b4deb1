//! Error types for router frame encoding and decoding.

use std::io;

use thiserror::Error;

/// Errors that can occur when framing router messages.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Payload does not fit the length header of its frame variant.
    #[error("payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        len: usize,
        /// Largest size the frame variant can describe.
        max: usize,
    },
    /// I/O error surfaced through the Tokio codec traits.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
