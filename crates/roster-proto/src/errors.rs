//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Line exceeds [`MAX_LINE_LEN`](crate::MAX_LINE_LEN).
    ///
    /// Enforced before parsing so an oversized line is rejected without
    /// being buffered or inspected.
    #[error("line too long: {size} bytes exceeds maximum {max}")]
    LineTooLong {
        /// Length of the offending line in bytes.
        size: usize,
        /// Maximum permitted length.
        max: usize,
    },

    /// Input is not valid JSON or matches no known message shape.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Message could not be serialized.
    ///
    /// Should never happen for the closed [`ServerMessage`](crate::ServerMessage)
    /// enum; indicates a bug if it does.
    #[error("encode failed: {0}")]
    Encode(String),
}
