//! Connection-level control payloads: version/capability negotiation,
//! authentication, heartbeat, and the generic error frame.

use serde::{Deserialize, Serialize};

/// Client's proposed version range (`VersionNegotiation`, frame `0x00`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionNegotiation {
    /// Version the client itself implements.
    pub client_version: u32,
    /// Minimum version the client will accept.
    pub min_version: u32,
    /// Maximum version the client will accept.
    pub max_version: u32,
}

/// Server's version decision (`VersionResponse`, frame `0x01`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResponse {
    /// Version selected for the rest of the connection.
    pub selected_version: u32,
    /// Whether negotiation succeeded.
    pub accepted: bool,
    /// Present when `accepted == false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// Client capability advertisement (`CapabilityExchange`, frame `0x02`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityExchange {
    /// Compression schemes the client can decode.
    pub compression_list: Vec<CompressionType>,
    /// Free-form feature flags the client supports.
    pub features: Vec<String>,
    /// Largest payload the client is willing to receive.
    pub max_message_size: u32,
    /// Largest number of sessions the client will multiplex.
    pub max_concurrent_sessions: u32,
}

/// Server's negotiated capability intersection (`CapabilityResponse`, frame
/// `0x03`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityResponse {
    /// Compression schemes both sides support.
    pub compression_list: Vec<CompressionType>,
    /// Feature flags both sides support.
    pub features: Vec<String>,
    /// `min` of both sides' advertised `max_message_size`; bounds every
    /// subsequent payload on this connection.
    pub max_message_size: u32,
    /// Heartbeat cadence both endpoints must honor.
    pub heartbeat_interval_ms: u32,
}

/// Compression scheme identifiers exchanged during capability negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    /// No compression.
    None,
    /// DEFLATE (RFC 1951).
    Deflate,
}

/// Keepalive probe (`Heartbeat`, frame `0x04`). Sent by either endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Monotonic per-sender sequence number. Field 1.
    pub sequence_number: u64,
    /// Sender's wall clock at send time, Unix milliseconds. Field 2.
    pub timestamp_ms: u64,
    /// Heartbeats sent without any ack so far, including this one. Field 3.
    pub pending_acks: u32,
}

/// Keepalive response (`HeartbeatAck`, frame `0x05`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatAck {
    /// Echoes the probe's sequence number. Field 1.
    pub sequence_number: u64,
    /// Responder's wall clock at ack time, Unix milliseconds. Field 2.
    pub server_timestamp_ms: u64,
    /// `now - timestampMs` measured by the responder. Field 3.
    pub latency_ms: u64,
}

/// Machine-readable error kind, closed per the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Header or framing was structurally malformed.
    InvalidFrame,
    /// Declared payload length exceeded the negotiated maximum.
    PayloadTooLarge,
    /// `frameType` byte did not match a known frame type.
    UnknownFrameType,
    /// Frame was truncated mid-stream.
    IncompleteFrame,
    /// Client and server version ranges did not overlap.
    VersionMismatch,
    /// A requested feature is not supported by this endpoint.
    UnsupportedFeature,
    /// A frame requiring authentication arrived before it completed.
    AuthenticationRequired,
    /// Credentials were rejected.
    AuthenticationFailed,
    /// Referenced `sessionId` has no session.
    SessionNotFound,
    /// Session creation was refused due to a configured limit.
    SessionLimitExceeded,
    /// Client exceeded its flow-control window or blocked-send deadline.
    FlowControlViolation,
    /// Compression or decompression failed.
    CompressionError,
    /// A state delta's `baseSequence` did not match the current sequence.
    StateOutOfSync,
    /// Missed enough heartbeat intervals to be considered dead.
    HeartbeatTimeout,
    /// A generic operation deadline elapsed.
    Timeout,
    /// An error local to this endpoint, not attributable to the peer.
    InternalError,
}

/// Error frame payload (`Error`, frame `0x06`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable kind.
    pub error_code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// `sessionId` this error concerns, if any (control-level errors have
    /// none).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u32>,
    /// Whether the endpoint is closing as a result of this error.
    pub fatal: bool,
}

impl ErrorPayload {
    /// Build a fatal error with no associated session.
    #[must_use]
    pub fn fatal(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self { error_code, message: message.into(), session_id: None, fatal: true }
    }

    /// Build a non-fatal error scoped to `session_id`.
    #[must_use]
    pub fn for_session(error_code: ErrorCode, session_id: u32, message: impl Into<String>) -> Self {
        Self { error_code, message: message.into(), session_id: Some(session_id), fatal: false }
    }
}

/// Graceful close notification (`Close`, frame `0x07`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    /// Human-readable close reason.
    pub reason: String,
}

/// Client credential presentation (`Authentication`, frame `0x08`).
///
/// Authentication policy itself is out of scope for this crate; the token is
/// an opaque string handed to an external authenticator by the surrounding
/// agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    /// Opaque credential supplied by the client.
    pub token: String,
}

/// Authentication outcome (`AuthResponse`, frame `0x09`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    /// Whether the credential was accepted.
    pub success: bool,
    /// Session token to present on reconnection, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// Token lifetime in milliseconds, present only on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_ms: Option<u64>,
}

/// Runtime compression adjustment (`CompressionControl`, frame `0x0A`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionControl {
    /// Session whose compressor is being adjusted.
    pub session_id: u32,
    /// Enable or disable compression entirely.
    pub enabled: bool,
    /// Explicit level override; `None` restores adaptive behavior.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}
