//! CBOR-encoded protocol messages.
//!
//! Frame headers are raw binary for performance, but payloads use CBOR for
//! type safety without code generation. The `Payload` enum covers every
//! message type in the closed frame-type set.
//!
//! We encode with CBOR rather than Protocol Buffers proper because it's
//! self-describing and needs no schema compiler; each struct field still
//! carries a doc comment naming its stable field number so the mapping to
//! the wire schema stays auditable.
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one [`crate::FrameType`] (enforced by
//! match exhaustiveness in [`Payload::frame_type`], [`Payload::encode`], and
//! [`Payload::decode`]). Round-trip encoding must produce an equivalent
//! value.

pub mod control;
pub mod data;
pub mod flow;
pub mod session;
pub mod state;

use bytes::BufMut;

use crate::{
    Frame, FrameHeader, FrameType,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads.
///
/// The payload type is determined by the frame header's `frameType`, so we
/// serialize only the inner struct content; there is no variant tag in the
/// CBOR bytes. This also means a mismatched `(frameType, payload)` pair can
/// never arise from an honestly-constructed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// See [`control::VersionNegotiation`].
    VersionNegotiation(control::VersionNegotiation),
    /// See [`control::VersionResponse`].
    VersionResponse(control::VersionResponse),
    /// See [`control::CapabilityExchange`].
    CapabilityExchange(control::CapabilityExchange),
    /// See [`control::CapabilityResponse`].
    CapabilityResponse(control::CapabilityResponse),
    /// See [`control::Heartbeat`].
    Heartbeat(control::Heartbeat),
    /// See [`control::HeartbeatAck`].
    HeartbeatAck(control::HeartbeatAck),
    /// See [`control::ErrorPayload`].
    Error(control::ErrorPayload),
    /// See [`control::Close`].
    Close(control::Close),
    /// See [`control::AuthenticationRequest`].
    Authentication(control::AuthenticationRequest),
    /// See [`control::AuthenticationResponse`].
    AuthResponse(control::AuthenticationResponse),
    /// See [`control::CompressionControl`].
    CompressionControl(control::CompressionControl),

    /// See [`session::SessionCreate`].
    SessionCreate(session::SessionCreate),
    /// See [`session::SessionCreated`].
    SessionCreated(session::SessionCreated),
    /// See [`session::SessionAttach`].
    SessionAttach(session::SessionAttach),
    /// See [`session::SessionAttached`].
    SessionAttached(session::SessionAttached),
    /// See [`session::SessionDetach`].
    SessionDetach(session::SessionDetach),
    /// See [`session::SessionDetached`].
    SessionDetached(session::SessionDetached),
    /// See [`session::SessionClose`].
    SessionClose(session::SessionClose),
    /// See [`session::SessionClosed`].
    SessionClosed(session::SessionClosed),
    /// See [`session::SessionList`].
    SessionList(session::SessionList),
    /// See [`session::SessionListResponse`].
    SessionListResponse(session::SessionListResponse),

    /// See [`data::TerminalOutputData`].
    TerminalOutput(data::TerminalOutputData),
    /// See [`data::TerminalInputData`].
    TerminalInput(data::TerminalInputData),
    /// See [`data::TerminalResize`].
    Resize(data::TerminalResize),
    /// See [`data::Signal`].
    Signal(data::Signal),

    /// See [`state::StateSnapshot`].
    StateSnapshot(state::StateSnapshot),
    /// See [`state::StateDelta`].
    StateDelta(state::StateDelta),
    /// See [`state::CursorPosition`].
    CursorPosition(state::CursorPosition),
    /// See [`state::ScrollbackRequest`].
    ScrollbackRequest(state::ScrollbackRequest),
    /// See [`state::ScrollbackResponse`].
    ScrollbackResponse(state::ScrollbackResponse),

    /// See [`flow::FlowControlMessage`].
    FlowControl(flow::FlowControlMessage),
    /// See [`flow::WindowUpdate`].
    WindowUpdate(flow::WindowUpdate),
    /// See [`flow::Pause`].
    Pause(flow::Pause),
    /// See [`flow::Resume`].
    Resume(flow::Resume),
}

/// Helper macro: one match arm per variant for a single-expression body.
/// Keeps `frame_type`/`encode`/`decode` exhaustive without twenty-nine
/// hand-copied arms drifting out of sync.
macro_rules! for_each_variant {
    ($self:expr, |$inner:ident| $body:expr) => {
        match $self {
            Self::VersionNegotiation($inner) => $body,
            Self::VersionResponse($inner) => $body,
            Self::CapabilityExchange($inner) => $body,
            Self::CapabilityResponse($inner) => $body,
            Self::Heartbeat($inner) => $body,
            Self::HeartbeatAck($inner) => $body,
            Self::Error($inner) => $body,
            Self::Close($inner) => $body,
            Self::Authentication($inner) => $body,
            Self::AuthResponse($inner) => $body,
            Self::CompressionControl($inner) => $body,
            Self::SessionCreate($inner) => $body,
            Self::SessionCreated($inner) => $body,
            Self::SessionAttach($inner) => $body,
            Self::SessionAttached($inner) => $body,
            Self::SessionDetach($inner) => $body,
            Self::SessionDetached($inner) => $body,
            Self::SessionClose($inner) => $body,
            Self::SessionClosed($inner) => $body,
            Self::SessionList($inner) => $body,
            Self::SessionListResponse($inner) => $body,
            Self::TerminalOutput($inner) => $body,
            Self::TerminalInput($inner) => $body,
            Self::Resize($inner) => $body,
            Self::Signal($inner) => $body,
            Self::StateSnapshot($inner) => $body,
            Self::StateDelta($inner) => $body,
            Self::CursorPosition($inner) => $body,
            Self::ScrollbackRequest($inner) => $body,
            Self::ScrollbackResponse($inner) => $body,
            Self::FlowControl($inner) => $body,
            Self::WindowUpdate($inner) => $body,
            Self::Pause($inner) => $body,
            Self::Resume($inner) => $body,
        }
    };
}

impl Payload {
    /// Frame type corresponding to this payload's variant.
    #[must_use]
    pub const fn frame_type(&self) -> FrameType {
        match self {
            Self::VersionNegotiation(_) => FrameType::VersionNegotiation,
            Self::VersionResponse(_) => FrameType::VersionResponse,
            Self::CapabilityExchange(_) => FrameType::CapabilityExchange,
            Self::CapabilityResponse(_) => FrameType::CapabilityResponse,
            Self::Heartbeat(_) => FrameType::Heartbeat,
            Self::HeartbeatAck(_) => FrameType::HeartbeatAck,
            Self::Error(_) => FrameType::Error,
            Self::Close(_) => FrameType::Close,
            Self::Authentication(_) => FrameType::Authentication,
            Self::AuthResponse(_) => FrameType::AuthResponse,
            Self::CompressionControl(_) => FrameType::CompressionControl,
            Self::SessionCreate(_) => FrameType::SessionCreate,
            Self::SessionCreated(_) => FrameType::SessionCreated,
            Self::SessionAttach(_) => FrameType::SessionAttach,
            Self::SessionAttached(_) => FrameType::SessionAttached,
            Self::SessionDetach(_) => FrameType::SessionDetach,
            Self::SessionDetached(_) => FrameType::SessionDetached,
            Self::SessionClose(_) => FrameType::SessionClose,
            Self::SessionClosed(_) => FrameType::SessionClosed,
            Self::SessionList(_) => FrameType::SessionList,
            Self::SessionListResponse(_) => FrameType::SessionListResponse,
            Self::TerminalOutput(_) => FrameType::TerminalOutput,
            Self::TerminalInput(_) => FrameType::TerminalInput,
            Self::Resize(_) => FrameType::Resize,
            Self::Signal(_) => FrameType::Signal,
            Self::StateSnapshot(_) => FrameType::StateSnapshot,
            Self::StateDelta(_) => FrameType::StateDelta,
            Self::CursorPosition(_) => FrameType::CursorPosition,
            Self::ScrollbackRequest(_) => FrameType::ScrollbackRequest,
            Self::ScrollbackResponse(_) => FrameType::ScrollbackResponse,
            Self::FlowControl(_) => FrameType::FlowControl,
            Self::WindowUpdate(_) => FrameType::WindowUpdate,
            Self::Pause(_) => FrameType::Pause,
            Self::Resume(_) => FrameType::Resume,
        }
    }

    /// Encode the payload body (not the frame header) to CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborEncode`] if serialization fails.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();
        for_each_variant!(self, |inner| ciborium::ser::into_writer(inner, &mut writer))
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Decode a payload body given the frame type that identifies its shape.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborDecode`] if `frame_type` isn't one this
    /// function knows, or if CBOR deserialization of `bytes` fails.
    pub fn decode(frame_type: FrameType, bytes: &[u8]) -> Result<Self> {
        fn from_cbor<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
            ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
        }

        Ok(match frame_type {
            FrameType::VersionNegotiation => Self::VersionNegotiation(from_cbor(bytes)?),
            FrameType::VersionResponse => Self::VersionResponse(from_cbor(bytes)?),
            FrameType::CapabilityExchange => Self::CapabilityExchange(from_cbor(bytes)?),
            FrameType::CapabilityResponse => Self::CapabilityResponse(from_cbor(bytes)?),
            FrameType::Heartbeat => Self::Heartbeat(from_cbor(bytes)?),
            FrameType::HeartbeatAck => Self::HeartbeatAck(from_cbor(bytes)?),
            FrameType::Error => Self::Error(from_cbor(bytes)?),
            FrameType::Close => Self::Close(from_cbor(bytes)?),
            FrameType::Authentication => Self::Authentication(from_cbor(bytes)?),
            FrameType::AuthResponse => Self::AuthResponse(from_cbor(bytes)?),
            FrameType::CompressionControl => Self::CompressionControl(from_cbor(bytes)?),
            FrameType::SessionCreate => Self::SessionCreate(from_cbor(bytes)?),
            FrameType::SessionCreated => Self::SessionCreated(from_cbor(bytes)?),
            FrameType::SessionAttach => Self::SessionAttach(from_cbor(bytes)?),
            FrameType::SessionAttached => Self::SessionAttached(from_cbor(bytes)?),
            FrameType::SessionDetach => Self::SessionDetach(from_cbor(bytes)?),
            FrameType::SessionDetached => Self::SessionDetached(from_cbor(bytes)?),
            FrameType::SessionClose => Self::SessionClose(from_cbor(bytes)?),
            FrameType::SessionClosed => Self::SessionClosed(from_cbor(bytes)?),
            FrameType::SessionList => Self::SessionList(from_cbor(bytes)?),
            FrameType::SessionListResponse => Self::SessionListResponse(from_cbor(bytes)?),
            FrameType::TerminalOutput => Self::TerminalOutput(from_cbor(bytes)?),
            FrameType::TerminalInput => Self::TerminalInput(from_cbor(bytes)?),
            FrameType::Resize => Self::Resize(from_cbor(bytes)?),
            FrameType::Signal => Self::Signal(from_cbor(bytes)?),
            FrameType::StateSnapshot => Self::StateSnapshot(from_cbor(bytes)?),
            FrameType::StateDelta => Self::StateDelta(from_cbor(bytes)?),
            FrameType::CursorPosition => Self::CursorPosition(from_cbor(bytes)?),
            FrameType::ScrollbackRequest => Self::ScrollbackRequest(from_cbor(bytes)?),
            FrameType::ScrollbackResponse => Self::ScrollbackResponse(from_cbor(bytes)?),
            FrameType::FlowControl => Self::FlowControl(from_cbor(bytes)?),
            FrameType::WindowUpdate => Self::WindowUpdate(from_cbor(bytes)?),
            FrameType::Pause => Self::Pause(from_cbor(bytes)?),
            FrameType::Resume => Self::Resume(from_cbor(bytes)?),
        })
    }

    /// Convert this payload into a wire frame targeting `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborEncode`] if serialization fails.
    pub fn into_frame(self, session_id: u32) -> Result<Frame> {
        let frame_type = self.frame_type();
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        let header = FrameHeader::new(session_id, frame_type.to_u8());
        Ok(Frame::new(header, buf))
    }

    /// Parse a payload from a raw transport frame using its `frameType`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownFrameType`] if the header's
    /// `frameType` byte isn't recognized, or [`ProtocolError::CborDecode`] if
    /// the payload bytes don't deserialize as the expected shape.
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let frame_type = FrameType::from_u8(frame.header.frame_type())
            .ok_or(ProtocolError::UnknownFrameType(frame.header.frame_type()))?;
        Self::decode(frame_type, &frame.payload)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ping_like_heartbeat_round_trips_through_a_frame() {
        let payload = Payload::Heartbeat(control::Heartbeat {
            sequence_number: 1,
            timestamp_ms: 1000,
            pending_acks: 0,
        });

        let frame = payload.clone().into_frame(0).expect("should create frame");
        let decoded = Payload::from_frame(&frame).expect("should parse payload");
        assert_eq!(payload, decoded);
    }

    #[test]
    fn error_payload_round_trips_through_a_frame() {
        let payload = Payload::Error(control::ErrorPayload::for_session(
            control::ErrorCode::SessionNotFound,
            7,
            "no such session",
        ));

        let frame = payload.clone().into_frame(7).expect("should create frame");
        assert_eq!(frame.header.session_id(), 7);

        let decoded = Payload::from_frame(&frame).expect("should parse payload");
        assert_eq!(payload, decoded);
    }

    #[test]
    fn terminal_output_round_trips_through_a_frame() {
        let payload = Payload::TerminalOutput(data::TerminalOutputData {
            session_id: 3,
            data: b"chunk0".to_vec(),
            sequence_number: 1,
            compressed: false,
            is_replay: false,
        });

        let frame = payload.clone().into_frame(3).expect("should create frame");
        let decoded = Payload::from_frame(&frame).expect("should parse payload");
        assert_eq!(payload, decoded);
    }

    #[test]
    fn unknown_frame_type_byte_is_rejected() {
        let mut header = FrameHeader::new(0, 0x60);
        header.set_payload_length(0);
        let frame = Frame { header, payload: bytes::Bytes::new() };
        assert!(matches!(Payload::from_frame(&frame), Err(ProtocolError::UnknownFrameType(0x60))));
    }
}
