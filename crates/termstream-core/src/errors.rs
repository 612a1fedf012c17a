//! Per-component error types for the streaming core.
//!
//! Every component gets its own closed `thiserror` enum; lower-layer errors
//! are lifted with `#[from]` rather than restringified. `EndpointError` is
//! the sum type the connection driver returns, wide enough to build a wire
//! `ErrorPayload{error_code, message}` without re-deriving one from text.

use thiserror::Error;

use termstream_proto::payloads::control::ErrorCode;

/// Errors from [`crate::ring_buffer::OutputRingBuffer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// Configured bound is not usable (e.g. `max_chunks == 0`).
    #[error("invalid ring buffer bound: {0}")]
    InvalidBound(&'static str),
}

/// Errors from [`crate::compressor::AdaptiveCompressor`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    /// `setCompressionLevel` received a level outside `0..=9`.
    #[error("compression level {0} out of range 0..=9")]
    InvalidLevel(u8),

    /// `decompress` was asked to invert a compression type it does not know.
    #[error("unknown compression type tag {0}")]
    UnknownCompressionType(u8),

    /// The underlying DEFLATE codec failed.
    #[error("deflate failure: {0}")]
    Deflate(String),
}

/// Errors from [`crate::state_store::TerminalStateStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// `applyDelta` received a delta whose `baseSequenceNumber` does not
    /// match the store's current sequence.
    #[error("state out of sync: delta base {base} does not match current {current}")]
    OutOfSync {
        /// Sequence the delta expected to apply onto.
        base: u64,
        /// Store's actual current sequence.
        current: u64,
    },

    /// A delta update referenced a variant that cannot occur at runtime
    /// (reserved for forward-compatibility; `StateUpdate` itself is a closed
    /// enum so this currently can't be produced by `termstream-proto`, but
    /// the store still validates defensively should it grow a reserved tag).
    #[error("malformed state update: {0}")]
    MalformedUpdate(String),

    /// `updateSnapshot(initial = true)` was called when a snapshot already
    /// existed and no resync was in progress.
    #[error("cannot install an initial snapshot: one is already present")]
    SnapshotAlreadyPresent,
}

/// Errors from [`crate::flow_control::FlowControlWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowControlError {
    /// A client exceeded its blocked-send deadline or queue depth.
    #[error("flow control violation for client {client_id}: {reason}")]
    Violation {
        /// Offending client.
        client_id: String,
        /// Human-readable reason.
        reason: String,
    },
}

/// Errors from [`crate::service::StreamingDataService`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Referenced `sessionId` has no session.
    #[error("session {0} not found")]
    SessionNotFound(u32),

    /// Referenced `clientId` is not registered on the session it was looked
    /// up against.
    #[error("client {0} not found")]
    ClientNotFound(String),

    /// `createSession` was called with an id already in use.
    #[error("session {0} already exists")]
    SessionAlreadyExists(u32),

    /// Session creation was refused due to a configured limit.
    #[error("session limit exceeded: {current}/{limit}")]
    SessionLimitExceeded {
        /// Sessions currently open.
        current: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// Ring buffer operation failed.
    #[error(transparent)]
    RingBuffer(#[from] RingBufferError),

    /// Compression operation failed.
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// State store operation failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// Flow control operation failed.
    #[error(transparent)]
    FlowControl(#[from] FlowControlError),
}

/// Sum type returned by [`crate::endpoint::ProtocolEndpoint::process_event`].
///
/// Wide enough to build a wire `ErrorPayload{errorCode, message}` without
/// re-deriving one from a formatted string: [`EndpointError::error_code`]
/// maps every variant onto the closed wire error-kind set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    /// Frame decoding failed.
    #[error(transparent)]
    Protocol(#[from] termstream_proto::ProtocolError),

    /// An event arrived in a driver state that does not accept it.
    #[error("unexpected event in state {state}: {detail}")]
    UnexpectedEvent {
        /// Driver state at the time.
        state: &'static str,
        /// What was unexpected about it.
        detail: String,
    },

    /// Client and server version ranges did not overlap.
    #[error("version mismatch: no overlap between client and server ranges")]
    VersionMismatch,

    /// A requested feature is not supported by this endpoint.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A frame requiring authentication arrived before it completed.
    #[error("authentication required before this operation")]
    AuthenticationRequired,

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Delegated error from the orchestrator.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Missed enough heartbeat intervals to be considered dead.
    #[error("heartbeat timeout")]
    HeartbeatTimeout,

    /// A generic operation deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// An error local to this endpoint, not attributable to the peer.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EndpointError {
    /// Machine-readable wire error kind for this error.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Protocol(termstream_proto::ProtocolError::FrameTooShort { .. })
            | Self::Protocol(termstream_proto::ProtocolError::CborDecode(_))
            | Self::Protocol(termstream_proto::ProtocolError::CborEncode(_)) => {
                ErrorCode::InvalidFrame
            },
            Self::Protocol(termstream_proto::ProtocolError::PayloadTooLarge { .. }) => {
                ErrorCode::PayloadTooLarge
            },
            Self::Protocol(termstream_proto::ProtocolError::UnknownFrameType(_)) => {
                ErrorCode::UnknownFrameType
            },
            Self::Protocol(termstream_proto::ProtocolError::IncompleteFrame { .. }) => {
                ErrorCode::IncompleteFrame
            },
            Self::Protocol(termstream_proto::ProtocolError::UnsupportedVersion(_))
            | Self::VersionMismatch => ErrorCode::VersionMismatch,
            Self::UnexpectedEvent { .. } => ErrorCode::InvalidFrame,
            Self::UnsupportedFeature(_) => ErrorCode::UnsupportedFeature,
            Self::AuthenticationRequired => ErrorCode::AuthenticationRequired,
            Self::AuthenticationFailed(_) => ErrorCode::AuthenticationFailed,
            Self::Service(ServiceError::SessionNotFound(_))
            | Self::Service(ServiceError::ClientNotFound(_)) => ErrorCode::SessionNotFound,
            Self::Service(ServiceError::SessionAlreadyExists(_))
            | Self::Service(ServiceError::SessionLimitExceeded { .. }) => {
                ErrorCode::SessionLimitExceeded
            },
            Self::Service(ServiceError::FlowControl(_)) => ErrorCode::FlowControlViolation,
            Self::Service(ServiceError::Compression(_)) => ErrorCode::CompressionError,
            Self::Service(ServiceError::State(_)) => ErrorCode::StateOutOfSync,
            Self::Service(ServiceError::RingBuffer(_)) => ErrorCode::InternalError,
            Self::HeartbeatTimeout => ErrorCode::HeartbeatTimeout,
            Self::Timeout => ErrorCode::Timeout,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether this error should close the whole connection rather than
    /// just one session or client.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::VersionMismatch
                | Self::AuthenticationRequired
                | Self::AuthenticationFailed(_)
                | Self::HeartbeatTimeout
                | Self::Internal(_)
        )
    }
}
