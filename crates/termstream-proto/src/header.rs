//! Frame header implementation with zero-copy parsing.
//!
//! The `FrameHeader` is a fixed 10-byte structure serialized as raw binary
//! (big-endian). All fields are byte arrays so the layout has no padding and
//! needs no `packed` representation.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::errors::{ProtocolError, Result};

/// Fixed 10-byte frame header (big-endian network byte order).
///
/// ```text
/// offset  size  field
/// 0       1     version
/// 1       4     sessionId (big-endian; 0 = control)
/// 5       1     frameType
/// 6       4     payloadLength (big-endian)
/// ```
#[repr(C)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, PartialEq, Eq, Debug)]
pub struct FrameHeader {
    version: u8,
    session_id: [u8; 4],
    frame_type: u8,
    payload_length: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header (10 bytes).
    pub const SIZE: usize = 10;

    /// Current and minimum supported protocol version.
    pub const VERSION: u8 = 1;

    /// `sessionId` reserved for control frames.
    pub const CONTROL_SESSION: u32 = 0;

    /// Create a new header addressed to `session_id` carrying `frame_type`.
    ///
    /// `payload_length` is left at zero; [`crate::Frame::new`] fills it in
    /// from the actual payload.
    #[must_use]
    pub fn new(session_id: u32, frame_type: u8) -> Self {
        Self {
            version: Self::VERSION,
            session_id: session_id.to_be_bytes(),
            frame_type,
            payload_length: [0; 4],
        }
    }

    /// Parse a header from the first [`Self::SIZE`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FrameTooShort`] if fewer than [`Self::SIZE`]
    /// bytes are available, or [`ProtocolError::UnsupportedVersion`] if the
    /// version byte is not [`Self::VERSION`].
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        Ok(header)
    }

    /// Serialize this header to its 10-byte wire form.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(&self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Session this frame targets; `0` means a control frame.
    #[must_use]
    pub fn session_id(&self) -> u32 {
        u32::from_be_bytes(self.session_id)
    }

    /// Raw frame type byte. Use [`crate::FrameType::from_u8`] to interpret it.
    #[must_use]
    pub fn frame_type(&self) -> u8 {
        self.frame_type
    }

    /// Declared payload length in bytes.
    #[must_use]
    pub fn payload_length(&self) -> u32 {
        u32::from_be_bytes(self.payload_length)
    }

    /// Overwrite the target session id.
    pub fn set_session_id(&mut self, session_id: u32) {
        self.session_id = session_id.to_be_bytes();
    }

    /// Overwrite the frame type byte.
    pub fn set_frame_type(&mut self, frame_type: u8) {
        self.frame_type = frame_type;
    }

    /// Overwrite the declared payload length.
    pub fn set_payload_length(&mut self, payload_length: u32) {
        self.payload_length = payload_length.to_be_bytes();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    impl Arbitrary for FrameHeader {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            (any::<u32>(), any::<u8>(), any::<u32>())
                .prop_map(|(session_id, frame_type, payload_length)| {
                    let mut header = Self::new(session_id, frame_type);
                    header.set_payload_length(payload_length);
                    header
                })
                .boxed()
        }
    }

    #[test]
    fn header_size_is_ten_bytes() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
        assert_eq!(FrameHeader::SIZE, 10);
    }

    proptest! {
        #[test]
        fn header_round_trip(header in any::<FrameHeader>()) {
            let bytes = header.to_bytes();
            let parsed = FrameHeader::from_bytes(&bytes).expect("should parse");
            prop_assert_eq!(&header, parsed);
        }
    }

    #[test]
    fn reject_short_buffer() {
        let short_buf = [0u8; 8];
        let result = FrameHeader::from_bytes(&short_buf);
        assert_eq!(result, Err(ProtocolError::FrameTooShort { expected: 10, actual: 8 }));
    }

    #[test]
    fn reject_invalid_version() {
        let mut buf = [0u8; 10];
        buf[0] = 0xFF;
        let result = FrameHeader::from_bytes(&buf);
        assert_eq!(result, Err(ProtocolError::UnsupportedVersion(0xFF)));
    }

    #[test]
    fn control_session_is_zero() {
        let header = FrameHeader::new(0, 0x04);
        assert_eq!(header.session_id(), FrameHeader::CONTROL_SESSION);
    }
}
