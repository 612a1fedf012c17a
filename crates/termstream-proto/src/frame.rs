//! Frame type combining header and payload.
//!
//! A `Frame` is the transport-layer packet: a 10-byte raw binary header
//! (big-endian) for O(1) routing, plus variable-length bytes already encoded
//! by the payload layer.

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame (header + raw payload bytes).
///
/// Holds raw bytes, not the decoded [`crate::Payload`] enum, so routing never
/// requires deserializing the payload.
///
/// # Invariants
///
/// `payload.len()` always matches `header.payload_length()`; this is enforced
/// by [`Frame::new`] and re-derived (not merely checked) by [`Frame::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header (10 bytes).
    pub header: FrameHeader,
    /// Raw payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame, setting `header.payload_length` to match `payload`.
    ///
    /// # Panics
    ///
    /// Panics if `payload.len() > u32::MAX`, which cannot occur in practice
    /// since `Bytes` is bounded by `isize::MAX`.
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();

        #[allow(clippy::expect_used)]
        let payload_len = u32::try_from(payload.len())
            .expect("invariant: payload length fits in u32 (bounded by isize::MAX)");

        header.set_payload_length(payload_len);

        Self { header, payload }
    }

    /// Encode `header + payload` into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if `payload.len()` exceeds
    /// `max_message_size`.
    pub fn encode(&self, dst: &mut impl BufMut, max_message_size: u32) -> Result<()> {
        if self.payload.len() > max_message_size as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: max_message_size as usize,
            });
        }

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Decode a frame from a fully-buffered slice.
    ///
    /// Validates `bytes.len() >= 10`, that the declared `payloadLength` does
    /// not exceed `max_message_size`, and that `bytes` holds the full
    /// payload.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::FrameTooShort`] if the header itself is truncated.
    /// - [`ProtocolError::PayloadTooLarge`] if the declared length exceeds
    ///   `max_message_size`.
    /// - [`ProtocolError::IncompleteFrame`] if fewer payload bytes are
    ///   present than declared.
    pub fn decode(bytes: &[u8], max_message_size: u32) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let payload_length = header.payload_length();
        if payload_length > max_message_size {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_length as usize,
                max: max_message_size as usize,
            });
        }

        let available = bytes.len() - FrameHeader::SIZE;
        if available < payload_length as usize {
            return Err(ProtocolError::IncompleteFrame {
                expected: payload_length as usize,
                actual: available,
            });
        }

        let end = FrameHeader::SIZE + payload_length as usize;
        let payload = Bytes::copy_from_slice(&bytes[FrameHeader::SIZE..end]);

        Ok(Self { header: *header, payload })
    }
}
