//! Tracks recently-disconnected clients and serves replay + snapshot data
//! on reattach.

use std::{collections::HashMap, time::Duration};

use termstream_proto::payloads::state::StateSnapshot;

use crate::{
    config::ReconnectionConfig,
    ring_buffer::OutputChunk,
    service::StreamingDataService,
};

/// Bookkeeping kept for a client between disconnection and either
/// reconnection or window expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectedClientState {
    /// Session the client was attached to.
    pub session_id: u32,
    /// Last output sequence the client had seen.
    pub last_sequence_number: u64,
    /// Last terminal-state sequence the client had seen.
    pub last_state_sequence: Option<u64>,
    /// Time of disconnection, relative to the manager's own clock.
    pub disconnected_at: Duration,
}

/// Outcome of [`ReconnectionManager::attempt_reconnection`]. Always
/// returned, never an `Err`: a failed reattach degrades to `success: false`
/// plus `error_code` so the caller can fall back to a fresh attach instead
/// of tearing down the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectionResult {
    /// `true` if the client was re-registered with its prior session.
    pub success: bool,
    /// Sequence replay resumed from. Only meaningful when `success`.
    pub resume_from_sequence: u64,
    /// Number of ring-buffer chunks queued for replay.
    pub chunks_replayed: u32,
    /// Oldest sequence the session's ring buffer can still serve.
    pub oldest_sequence_available: Option<u64>,
    /// `true` if the requested replay point was older than the oldest
    /// sequence still retained.
    pub data_lost: bool,
    /// Present when the client's cached state sequence is stale; carries a
    /// full resync snapshot.
    pub state_snapshot: Option<StateSnapshot>,
    /// Always `None`: `TerminalStateStore` retains only the latest
    /// snapshot, not a delta history, so resync is snapshot-only.
    pub state_deltas: Option<Vec<StateSnapshot>>,
    /// Machine-readable reason, set only when `success` is `false`.
    pub error_code: Option<String>,
    /// The actual replay chunks backing `chunks_replayed`, in sequence
    /// order, for the caller to deliver ahead of live output.
    pub replayed_chunks: Vec<OutputChunk>,
}

impl ReconnectionResult {
    fn failure(error_code: &str) -> Self {
        Self {
            success: false,
            resume_from_sequence: 0,
            chunks_replayed: 0,
            oldest_sequence_available: None,
            data_lost: false,
            state_snapshot: None,
            state_deltas: None,
            error_code: Some(error_code.to_string()),
            replayed_chunks: Vec::new(),
        }
    }
}

/// Per-session cache of the latest [`StateSnapshot`], plus per-client
/// disconnection bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct ReconnectionManager {
    config: ReconnectionConfigOrDefault,
    disconnected: HashMap<String, DisconnectedClientState>,
    state_snapshots: HashMap<u32, StateSnapshot>,
}

#[derive(Debug, Clone, Copy)]
struct ReconnectionConfigOrDefault(ReconnectionConfig);

impl Default for ReconnectionConfigOrDefault {
    fn default() -> Self {
        Self(ReconnectionConfig::default())
    }
}

impl ReconnectionManager {
    /// Create a manager honoring `config`'s window and replay bounds.
    #[must_use]
    pub fn new(config: ReconnectionConfig) -> Self {
        Self {
            config: ReconnectionConfigOrDefault(config),
            disconnected: HashMap::new(),
            state_snapshots: HashMap::new(),
        }
    }

    /// Record (or overwrite) a client's disconnection. A later call for the
    /// same `client_id` replaces the prior entry outright.
    pub fn record_disconnection(
        &mut self,
        client_id: impl Into<String>,
        session_id: u32,
        last_sequence_number: u64,
        last_state_sequence: Option<u64>,
        now: Duration,
    ) {
        self.disconnected.insert(
            client_id.into(),
            DisconnectedClientState {
                session_id,
                last_sequence_number,
                last_state_sequence,
                disconnected_at: now,
            },
        );
    }

    /// `true` if `client_id` is unknown (never disconnected) or its entry
    /// is still within the reconnection window at `now`.
    #[must_use]
    pub fn can_reconnect(&self, client_id: &str, now: Duration) -> bool {
        match self.disconnected.get(client_id) {
            None => true,
            Some(entry) => now.saturating_sub(entry.disconnected_at) < self.config.0.reconnection_window,
        }
    }

    /// `true` if `client_id` has a recorded disconnection still pending
    /// (not yet reattached, expired, or explicitly cleared).
    #[must_use]
    pub fn has_pending_disconnection(&self, client_id: &str) -> bool {
        self.disconnected.contains_key(client_id)
    }

    /// Attempt to reattach `client_id` to `requested_session_id`, serving
    /// replay and state resync through `service` on success.
    ///
    /// Never returns an error: failure (unknown client, expired window,
    /// session mismatch, or a session that no longer exists) is reported
    /// via `ReconnectionResult::success = false` plus `error_code`, leaving
    /// the caller free to fall back to a fresh attach rather than abort the
    /// connection.
    pub fn attempt_reconnection(
        &mut self,
        client_id: &str,
        requested_session_id: u32,
        last_known_sequence: Option<u64>,
        last_known_state_sequence: Option<u64>,
        now: Duration,
        service: &mut StreamingDataService,
    ) -> ReconnectionResult {
        let Some(entry) = self.disconnected.get(client_id).copied() else {
            return ReconnectionResult::failure("unknown_client");
        };

        if entry.session_id != requested_session_id {
            return ReconnectionResult::failure("session_mismatch");
        }

        if now.saturating_sub(entry.disconnected_at) >= self.config.0.reconnection_window {
            self.disconnected.remove(client_id);
            return ReconnectionResult::failure("window_expired");
        }

        let resume_from_sequence = last_known_sequence.unwrap_or(entry.last_sequence_number);
        let state_sequence = last_known_state_sequence.or(entry.last_state_sequence);

        let registration = match service.register_client(
            entry.session_id,
            client_id,
            Some(resume_from_sequence),
            state_sequence,
        ) {
            Ok(registration) => registration,
            Err(_) => {
                self.disconnected.remove(client_id);
                return ReconnectionResult::failure("session_not_found");
            },
        };

        self.disconnected.remove(client_id);

        ReconnectionResult {
            success: true,
            resume_from_sequence,
            chunks_replayed: u32::try_from(registration.chunks_replayed).unwrap_or(u32::MAX),
            oldest_sequence_available: registration.oldest_available_sequence,
            data_lost: registration.data_lost,
            state_snapshot: registration.state_snapshot,
            state_deltas: None,
            error_code: None,
            replayed_chunks: registration.replayed_chunks,
        }
    }

    /// Cache the latest snapshot for `session_id`.
    pub fn update_state_snapshot(&mut self, session_id: u32, snapshot: StateSnapshot) {
        self.state_snapshots.insert(session_id, snapshot);
    }

    /// Cached snapshot for `session_id`, if any.
    #[must_use]
    pub fn state_snapshot(&self, session_id: u32) -> Option<&StateSnapshot> {
        self.state_snapshots.get(&session_id)
    }

    /// Drop all bookkeeping for `session_id` (called when a session is
    /// destroyed).
    pub fn clear_session_state(&mut self, session_id: u32) {
        self.state_snapshots.remove(&session_id);
        self.disconnected.retain(|_, entry| entry.session_id != session_id);
    }

    /// Drop bookkeeping for a single client (called once it reconnects
    /// through some other path, or is explicitly forgotten).
    pub fn clear_client_state(&mut self, client_id: &str) {
        self.disconnected.remove(client_id);
    }

    /// Evict every entry whose window (plus configured grace) has elapsed
    /// as of `now`. Idempotent; safe to call on a timer.
    pub fn cleanup_expired(&mut self, now: Duration) {
        let window = self.config.0.reconnection_window + self.config.0.cleanup_grace;
        self.disconnected.retain(|_, entry| now.saturating_sub(entry.disconnected_at) < window);
    }

    /// Number of clients currently tracked as disconnected.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.disconnected.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn service_with_session(session_id: u32) -> StreamingDataService {
        let mut service = StreamingDataService::new(ServiceConfig::default());
        service.start();
        service.create_session(session_id).unwrap();
        service
    }

    #[test]
    fn reconnection_window_scenario_from_concrete_example() {
        let config = ReconnectionConfig { reconnection_window: Duration::from_millis(5000), ..Default::default() };
        let mut manager = ReconnectionManager::new(config);
        let mut service = service_with_session(1);

        manager.record_disconnection("client-a", 1, 10, None, Duration::ZERO);

        assert!(manager.can_reconnect("client-a", Duration::from_millis(4000)));
        assert!(
            manager
                .attempt_reconnection("client-a", 1, None, None, Duration::from_millis(4000), &mut service)
                .success
        );

        manager.record_disconnection("client-a", 1, 10, None, Duration::ZERO);
        assert!(!manager.can_reconnect("client-a", Duration::from_millis(6000)));
        let result =
            manager.attempt_reconnection("client-a", 1, None, None, Duration::from_millis(6000), &mut service);
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("window_expired"));
    }

    #[test]
    fn unknown_client_can_always_reconnect() {
        let manager = ReconnectionManager::new(ReconnectionConfig::default());
        assert!(manager.can_reconnect("never-seen", Duration::from_secs(999)));
    }

    #[test]
    fn unknown_client_reconnection_attempt_fails_without_touching_the_service() {
        let mut manager = ReconnectionManager::new(ReconnectionConfig::default());
        let mut service = service_with_session(1);

        let result =
            manager.attempt_reconnection("never-seen", 1, None, None, Duration::from_millis(100), &mut service);
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("unknown_client"));
    }

    #[test]
    fn reconnection_fails_if_session_gone() {
        let mut manager = ReconnectionManager::new(ReconnectionConfig::default());
        let mut service = StreamingDataService::new(ServiceConfig::default());
        service.start();
        manager.record_disconnection("client-a", 1, 10, None, Duration::ZERO);

        let result =
            manager.attempt_reconnection("client-a", 1, None, None, Duration::from_millis(100), &mut service);
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("session_not_found"));
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn reconnection_fails_on_session_mismatch() {
        let mut manager = ReconnectionManager::new(ReconnectionConfig::default());
        let mut service = service_with_session(1);
        manager.record_disconnection("client-a", 1, 10, None, Duration::ZERO);

        let result =
            manager.attempt_reconnection("client-a", 2, None, None, Duration::from_millis(100), &mut service);
        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("session_mismatch"));
    }

    #[test]
    fn reconnection_defaults_to_last_recorded_sequence() {
        let mut manager = ReconnectionManager::new(ReconnectionConfig::default());
        let mut service = service_with_session(1);
        manager.record_disconnection("client-a", 1, 42, None, Duration::ZERO);

        let result =
            manager.attempt_reconnection("client-a", 1, None, None, Duration::from_millis(10), &mut service);
        assert!(result.success);
        assert_eq!(result.resume_from_sequence, 42);
        assert!(result.state_deltas.is_none());
    }

    #[test]
    fn reconnection_replays_chunks_written_since_disconnection() {
        let mut manager = ReconnectionManager::new(ReconnectionConfig::default());
        let mut service = service_with_session(1);
        service.register_client(1, "client-a", None, None).unwrap();
        service.process_terminal_output(1, b"one", 0).unwrap();
        service.process_terminal_output(1, b"two", 0).unwrap();

        manager.record_disconnection("client-a", 1, 0, None, Duration::ZERO);
        let result =
            manager.attempt_reconnection("client-a", 1, Some(0), None, Duration::from_millis(10), &mut service);

        assert!(result.success);
        assert_eq!(result.chunks_replayed, 2);
        assert_eq!(result.replayed_chunks.len(), 2);
        assert!(!manager.has_pending_disconnection("client-a"));
    }

    #[test]
    fn cleanup_expired_is_idempotent() {
        let config = ReconnectionConfig {
            reconnection_window: Duration::from_millis(100),
            cleanup_grace: Duration::from_millis(0),
            ..Default::default()
        };
        let mut manager = ReconnectionManager::new(config);
        manager.record_disconnection("client-a", 1, 1, None, Duration::ZERO);

        manager.cleanup_expired(Duration::from_millis(200));
        assert_eq!(manager.pending_count(), 0);
        manager.cleanup_expired(Duration::from_millis(200));
        assert_eq!(manager.pending_count(), 0);
    }
}
