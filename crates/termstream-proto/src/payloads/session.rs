//! Session lifecycle payloads: create, attach/reattach, detach, close, list.

use serde::{Deserialize, Serialize};

/// Request to create a new logical terminal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreate {
    /// Initial terminal width, must be in `[1, 1000]`.
    pub columns: u16,
    /// Initial terminal height, must be in `[1, 500]`.
    pub rows: u16,
}

/// Confirms a session was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreated {
    /// Id assigned to the new session.
    pub session_id: u32,
}

/// Attach (first time) or reattach (after disconnection) to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttach {
    /// Session to attach to.
    pub session_id: u32,
    /// Last output sequence this client has already seen, if reattaching.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_from_sequence: Option<u64>,
    /// Last terminal-state sequence this client has already seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_known_state_sequence: Option<u64>,
}

/// Result of a [`SessionAttach`], mirroring `RegistrationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAttached {
    /// Number of ring-buffer chunks replayed ahead of live output.
    pub chunks_replayed: u32,
    /// Oldest sequence number still available in the ring buffer.
    pub oldest_available_sequence: u64,
    /// `true` if `replayFromSequence` was older than `oldestAvailableSequence`.
    pub data_lost: bool,
}

/// Detach from a session without destroying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetach {
    /// Session to detach from.
    pub session_id: u32,
}

/// Confirms a detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetached {
    /// Session that was detached from.
    pub session_id: u32,
}

/// Explicit request to destroy a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClose {
    /// Session to destroy.
    pub session_id: u32,
}

/// Confirms a session was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClosed {
    /// Session that was destroyed.
    pub session_id: u32,
}

/// Request the set of sessions visible on this connection. Carries no fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionList;

/// One row of a session listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session id.
    pub session_id: u32,
    /// Current terminal width.
    pub columns: u16,
    /// Current terminal height.
    pub rows: u16,
    /// Number of clients currently attached.
    pub client_count: u32,
}

/// Response to [`SessionList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionListResponse {
    /// Visible sessions.
    pub sessions: Vec<SessionSummary>,
}
