//! The closed set of wire frame type codes.

/// Stable byte code for every frame kind the protocol defines.
///
/// Grouped by range: control `0x00..=0x0F`, session `0x10..=0x1F`, data
/// `0x30..=0x3F`, state `0x40..=0x4F`, flow `0x50..=0x5F`. `0x60..=0x6F` is
/// reserved for future multiplexer frames and intentionally has no variants
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Client proposes a version range.
    VersionNegotiation = 0x00,
    /// Server selects a version or rejects the proposal.
    VersionResponse = 0x01,
    /// Client advertises compression/feature capabilities.
    CapabilityExchange = 0x02,
    /// Server replies with the negotiated intersection.
    CapabilityResponse = 0x03,
    /// Keepalive probe, either direction.
    Heartbeat = 0x04,
    /// Keepalive response.
    HeartbeatAck = 0x05,
    /// Machine-readable error with human-readable message.
    Error = 0x06,
    /// Graceful connection close.
    Close = 0x07,
    /// Client presents credentials.
    Authentication = 0x08,
    /// Server reports authentication outcome.
    AuthResponse = 0x09,
    /// Adjusts compression settings on a live session.
    CompressionControl = 0x0A,

    /// Request to create a new session.
    SessionCreate = 0x10,
    /// Session creation succeeded.
    SessionCreated = 0x11,
    /// Client attaches (or reattaches) to a session.
    SessionAttach = 0x12,
    /// Attach succeeded; carries replay/resync metadata.
    SessionAttached = 0x13,
    /// Client detaches from a session without closing it.
    SessionDetach = 0x14,
    /// Detach acknowledged.
    SessionDetached = 0x15,
    /// Explicit session teardown request.
    SessionClose = 0x16,
    /// Session closed.
    SessionClosed = 0x17,
    /// Request the list of sessions visible to this connection.
    SessionList = 0x18,
    /// Session listing response.
    SessionListResponse = 0x19,

    /// Terminal output bytes flowing toward a client.
    TerminalOutput = 0x30,
    /// Terminal input bytes flowing from a client.
    TerminalInput = 0x31,
    /// Terminal column/row resize.
    Resize = 0x32,
    /// Signal delivery (e.g. `SIGWINCH`, `SIGINT`) toward the PTY.
    Signal = 0x33,

    /// Full terminal screen state.
    StateSnapshot = 0x40,
    /// Incremental terminal state change.
    StateDelta = 0x41,
    /// Standalone cursor position update.
    CursorPosition = 0x42,
    /// Request a page of scrollback history.
    ScrollbackRequest = 0x43,
    /// Scrollback history page response.
    ScrollbackResponse = 0x44,

    /// Client reports window size and bytes acknowledged.
    FlowControl = 0x50,
    /// Server grants additional send credit.
    WindowUpdate = 0x51,
    /// Pause output delivery.
    Pause = 0x52,
    /// Resume output delivery.
    Resume = 0x53,
}

impl FrameType {
    /// This type's stable wire byte.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Resolve a wire byte to a known frame type, if recognized.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::VersionNegotiation,
            0x01 => Self::VersionResponse,
            0x02 => Self::CapabilityExchange,
            0x03 => Self::CapabilityResponse,
            0x04 => Self::Heartbeat,
            0x05 => Self::HeartbeatAck,
            0x06 => Self::Error,
            0x07 => Self::Close,
            0x08 => Self::Authentication,
            0x09 => Self::AuthResponse,
            0x0A => Self::CompressionControl,
            0x10 => Self::SessionCreate,
            0x11 => Self::SessionCreated,
            0x12 => Self::SessionAttach,
            0x13 => Self::SessionAttached,
            0x14 => Self::SessionDetach,
            0x15 => Self::SessionDetached,
            0x16 => Self::SessionClose,
            0x17 => Self::SessionClosed,
            0x18 => Self::SessionList,
            0x19 => Self::SessionListResponse,
            0x30 => Self::TerminalOutput,
            0x31 => Self::TerminalInput,
            0x32 => Self::Resize,
            0x33 => Self::Signal,
            0x40 => Self::StateSnapshot,
            0x41 => Self::StateDelta,
            0x42 => Self::CursorPosition,
            0x43 => Self::ScrollbackRequest,
            0x44 => Self::ScrollbackResponse,
            0x50 => Self::FlowControl,
            0x51 => Self::WindowUpdate,
            0x52 => Self::Pause,
            0x53 => Self::Resume,
            _ => return None,
        })
    }

    /// `true` for frame types that always target `sessionId = 0`.
    #[must_use]
    pub const fn is_control(self) -> bool {
        (self.to_u8()) <= FrameType::CompressionControl.to_u8()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::FrameType;

    #[test]
    fn every_variant_round_trips_through_its_byte() {
        let variants = [
            FrameType::VersionNegotiation,
            FrameType::VersionResponse,
            FrameType::CapabilityExchange,
            FrameType::CapabilityResponse,
            FrameType::Heartbeat,
            FrameType::HeartbeatAck,
            FrameType::Error,
            FrameType::Close,
            FrameType::Authentication,
            FrameType::AuthResponse,
            FrameType::CompressionControl,
            FrameType::SessionCreate,
            FrameType::SessionCreated,
            FrameType::SessionAttach,
            FrameType::SessionAttached,
            FrameType::SessionDetach,
            FrameType::SessionDetached,
            FrameType::SessionClose,
            FrameType::SessionClosed,
            FrameType::SessionList,
            FrameType::SessionListResponse,
            FrameType::TerminalOutput,
            FrameType::TerminalInput,
            FrameType::Resize,
            FrameType::Signal,
            FrameType::StateSnapshot,
            FrameType::StateDelta,
            FrameType::CursorPosition,
            FrameType::ScrollbackRequest,
            FrameType::ScrollbackResponse,
            FrameType::FlowControl,
            FrameType::WindowUpdate,
            FrameType::Pause,
            FrameType::Resume,
        ];

        for variant in variants {
            assert_eq!(FrameType::from_u8(variant.to_u8()), Some(variant));
        }
    }

    #[test]
    fn unknown_byte_is_none() {
        assert_eq!(FrameType::from_u8(0x60), None);
        assert_eq!(FrameType::from_u8(0xFF), None);
    }

    #[test]
    fn control_range_matches_session_zero_convention() {
        assert!(FrameType::Heartbeat.is_control());
        assert!(!FrameType::SessionCreate.is_control());
        assert!(!FrameType::TerminalOutput.is_control());
    }
}
