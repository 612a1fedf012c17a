//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of a session at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use serde::Serialize;

/// Snapshot of the entire system state: every session currently tracked by
/// the driver.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemSnapshot {
    /// Per-session state snapshots.
    pub sessions: Vec<SessionSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no sessions).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single session.
    #[must_use]
    pub fn single(session: SessionSnapshot) -> Self {
        Self { sessions: vec![session] }
    }

    /// Create a snapshot from multiple sessions.
    #[must_use]
    pub fn from_sessions(sessions: Vec<SessionSnapshot>) -> Self {
        Self { sessions }
    }

    /// Add a session snapshot.
    pub fn add_session(&mut self, session: SessionSnapshot) {
        self.sessions.push(session);
    }
}

/// Snapshot of a single session's observable state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: u32,
    /// Output sequence numbers observed so far, in delivery order.
    pub output_sequences: Vec<u64>,
    /// Per-client flow-control window sizes remaining, keyed by client id.
    pub client_windows: Vec<(String, i64)>,
    /// `true` if this session has been destroyed.
    pub destroyed: bool,
}

impl SessionSnapshot {
    /// Create a session snapshot with the given id.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self { id, ..Default::default() }
    }

    /// Record an observed output sequence.
    #[must_use]
    pub fn with_output_sequences(mut self, sequences: impl IntoIterator<Item = u64>) -> Self {
        self.output_sequences.extend(sequences);
        self
    }

    /// Record a client's remaining flow-control window.
    #[must_use]
    pub fn with_client_window(mut self, client_id: impl Into<String>, remaining: i64) -> Self {
        self.client_windows.push((client_id.into(), remaining));
        self
    }

    /// Mark this session as destroyed.
    #[must_use]
    pub fn with_destroyed(mut self, destroyed: bool) -> Self {
        self.destroyed = destroyed;
        self
    }
}
