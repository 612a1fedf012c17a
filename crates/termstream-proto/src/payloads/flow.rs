//! Per-client flow control payloads.

use serde::{Deserialize, Serialize};

/// Client's credit report.
///
/// Field numbers: `1:sessionId, 2:windowSize, 3:bytesAcknowledged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowControlMessage {
    /// Session this window applies to. Field 1.
    pub session_id: u32,
    /// Max unacknowledged bytes the client allows in flight. Field 2.
    pub window_size: u64,
    /// Cumulative bytes the client has processed. Field 3.
    pub bytes_acknowledged: u64,
}

/// Additional send credit grant, independent of an acknowledgment.
///
/// Field numbers: `1:sessionId, 2:windowIncrement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowUpdate {
    /// Session this credit applies to. Field 1.
    pub session_id: u32,
    /// Bytes to add to the remaining credit. Field 2.
    pub window_increment: u64,
}

/// Request to pause output delivery for a session without detaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pause {
    /// Session to pause.
    pub session_id: u32,
}

/// Request to resume a previously paused session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    /// Session to resume.
    pub session_id: u32,
}
