//! Wire-level error types.
//!
//! These map one-to-one onto the malformed-frame error kinds: `InvalidFrame`,
//! `PayloadTooLarge`, `UnknownFrameType`, `IncompleteFrame`. Higher layers
//! (`termstream-core`) wrap these rather than re-deriving them from strings.

use thiserror::Error;

/// Result alias for fallible wire operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding frames and payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Buffer shorter than the fixed header size.
    #[error("frame header too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum required length.
        expected: usize,
        /// Actual buffer length.
        actual: usize,
    },

    /// Header parsed but the buffer doesn't hold the full claimed payload.
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    IncompleteFrame {
        /// Payload length claimed by the header.
        expected: usize,
        /// Payload bytes actually available.
        actual: usize,
    },

    /// `payloadLength` exceeds the negotiated or structural maximum.
    #[error("payload too large: {size} bytes exceeds maximum of {max}")]
    PayloadTooLarge {
        /// Claimed or actual payload size.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },

    /// Header declared a version this endpoint does not support.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// `frameType` byte does not correspond to a known `FrameType`.
    #[error("unknown frame type: {0:#04x}")]
    UnknownFrameType(u8),

    /// Payload bytes did not deserialize as CBOR for the indicated type.
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),

    /// A payload value failed to serialize as CBOR.
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),
}
