//! Orchestrator: owns every session's components, fans output out to
//! subscribers, and fans input in from clients.
//!
//! The session map is the only place session state lives; clients and the
//! connection driver address sessions and clients purely by id, never by
//! reference.

use std::{collections::HashMap, time::Instant};

use termstream_proto::payloads::{
    control::CompressionType,
    state::{StateDelta, StateSnapshot},
};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::{
    compressor::AdaptiveCompressor,
    config::ServiceConfig,
    errors::ServiceError,
    flow_control::FlowControlWindow,
    ring_buffer::{OutputChunk, OutputRingBuffer, RingBufferStatistics},
    state_store::{ScrollbackPage, TerminalStateStore},
};

/// Service-wide lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No sessions may be created; `start()` must be called first.
    Stopped,
    /// Accepting session and client operations.
    Running,
}

/// One chunk of session output ready for a per-client writer loop to frame
/// and send, subject to that client's own flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutput {
    /// Session this chunk belongs to.
    pub session_id: u32,
    /// Ring-buffer sequence number assigned to this chunk.
    pub sequence: u64,
    /// Output bytes, possibly compressed.
    pub output_data: Vec<u8>,
    /// Compression scheme applied to `output_data`.
    pub compression_type: CompressionType,
    /// `true` if this chunk is being replayed to a reattaching client rather
    /// than delivered live.
    pub is_replay: bool,
}

/// A single item of client input, tagged with a service-wide monotonic
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInputEvent {
    /// Session the input targets.
    pub session_id: u32,
    /// Client that sent the input.
    pub client_id: String,
    /// Raw input bytes.
    pub data: Vec<u8>,
    /// Service-wide monotonic sequence, assigned at emission time.
    pub sequence: u64,
}

/// Result of [`StreamingDataService::register_client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationResult {
    /// Number of ring-buffer chunks queued for replay, if any were
    /// requested.
    pub chunks_replayed: usize,
    /// Oldest sequence the session's ring buffer can still serve.
    pub oldest_available_sequence: Option<u64>,
    /// `true` if the requested replay point was older than the oldest
    /// sequence still retained.
    pub data_lost: bool,
    /// Present when the client's last known state sequence is stale (or
    /// absent); carries a full resync snapshot.
    pub state_snapshot: Option<StateSnapshot>,
    /// The actual ring-buffer chunks backing `chunks_replayed`, in sequence
    /// order, for the caller to deliver ahead of live output.
    pub replayed_chunks: Vec<OutputChunk>,
}

/// Cumulative counters exposed via [`StreamingDataService::statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceStatistics {
    /// Sessions created over the service's lifetime.
    pub sessions_created: u64,
    /// Sessions destroyed over the service's lifetime.
    pub sessions_destroyed: u64,
    /// Clients registered over the service's lifetime (not currently
    /// connected count).
    pub clients_registered: u64,
    /// Output chunks processed via `process_terminal_output`.
    pub output_chunks_processed: u64,
}

struct Session {
    ring_buffer: OutputRingBuffer,
    compressor: AdaptiveCompressor,
    state_store: TerminalStateStore,
    clients: HashMap<String, FlowControlWindow>,
    output_tx: broadcast::Sender<SessionOutput>,
}

/// Owns every session's ring buffer, compressor, and state store; the only
/// mutator of the session map.
pub struct StreamingDataService {
    config: ServiceConfig,
    state: ServiceState,
    sessions: HashMap<u32, Session>,
    input_tx: mpsc::UnboundedSender<ClientInputEvent>,
    input_rx: Option<mpsc::UnboundedReceiver<ClientInputEvent>>,
    next_input_sequence: u64,
    statistics: ServiceStatistics,
}

impl StreamingDataService {
    /// Create a stopped service honoring `config`.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        Self {
            config,
            state: ServiceState::Stopped,
            sessions: HashMap::new(),
            input_tx,
            input_rx: Some(input_rx),
            next_input_sequence: 1,
            statistics: ServiceStatistics::default(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Transition `Stopped -> Running`. A second call while already running
    /// is a no-op that logs a warning.
    pub fn start(&mut self) {
        if self.state == ServiceState::Running {
            warn!("start() called while the service is already running");
            return;
        }
        self.state = ServiceState::Running;
    }

    /// Transition to `Stopped`, dropping every session and client.
    pub fn stop(&mut self) {
        self.state = ServiceState::Stopped;
        self.sessions.clear();
    }

    /// Create a new session with empty components.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionLimitExceeded`] if the configured
    /// `max_sessions` bound would be exceeded.
    ///
    /// Returns `Ok(false)` (not an error) if `session_id` already exists.
    pub fn create_session(&mut self, session_id: u32) -> Result<bool, ServiceError> {
        if self.sessions.contains_key(&session_id) {
            return Ok(false);
        }
        if self.config.max_sessions > 0 && self.sessions.len() >= self.config.max_sessions {
            return Err(ServiceError::SessionLimitExceeded {
                current: self.sessions.len(),
                limit: self.config.max_sessions,
            });
        }

        let ring_buffer = OutputRingBuffer::new(self.config.ring_buffer)?;
        let compressor = AdaptiveCompressor::new(self.config.compression);
        let (output_tx, _unused_rx) = broadcast::channel(self.config.output_broadcast_capacity.max(1));

        self.sessions.insert(
            session_id,
            Session { ring_buffer, compressor, state_store: TerminalStateStore::new(), clients: HashMap::new(), output_tx },
        );
        self.statistics.sessions_created += 1;
        Ok(true)
    }

    /// Evict a session and every client attached to it. Does not notify
    /// [`crate::reconnection::ReconnectionManager`] — callers wanting
    /// clients to retain reconnection eligibility must record their
    /// disconnection first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn destroy_session(&mut self, session_id: u32) -> Result<(), ServiceError> {
        self.sessions.remove(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        self.statistics.sessions_destroyed += 1;
        Ok(())
    }

    /// Attach `client_id` to `session_id`, granting it a default flow
    /// control window. Optionally queues ring-buffer replay and resolves
    /// whether a state resync is needed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn register_client(
        &mut self,
        session_id: u32,
        client_id: impl Into<String>,
        replay_from_sequence: Option<u64>,
        last_known_state_sequence: Option<u64>,
    ) -> Result<RegistrationResult, ServiceError> {
        let default_window_size = self.config.flow_control.default_window_size;
        let session = self.sessions.get_mut(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;

        session.clients.insert(client_id.into(), FlowControlWindow::new(default_window_size));
        self.statistics.clients_registered += 1;

        let (replayed_chunks, data_lost) = match replay_from_sequence {
            Some(from) => {
                let oldest = session.ring_buffer.oldest_sequence();
                let chunks = session.ring_buffer.read_from(from);
                let data_lost = oldest.is_some_and(|oldest| from < oldest);
                (chunks, data_lost)
            },
            None => (Vec::new(), false),
        };
        let chunks_replayed = replayed_chunks.len();
        let oldest_available_sequence = session.ring_buffer.oldest_sequence();

        let current_state_sequence = session.state_store.current_sequence();
        let state_snapshot = match last_known_state_sequence {
            Some(last) if last == current_state_sequence => None,
            _ => session.state_store.snapshot().cloned(),
        };

        Ok(RegistrationResult { chunks_replayed, oldest_available_sequence, data_lost, state_snapshot, replayed_chunks })
    }

    /// Detach `client_id` from `session_id`. Reconnection bookkeeping is the
    /// caller's responsibility via
    /// [`crate::reconnection::ReconnectionManager`].
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn unregister_client(&mut self, session_id: u32, client_id: &str) -> Result<(), ServiceError> {
        let session = self.sessions.get_mut(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        session.clients.remove(client_id);
        Ok(())
    }

    /// Subscribe to a session's live output stream.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn subscribe_output(&self, session_id: u32) -> Result<broadcast::Receiver<SessionOutput>, ServiceError> {
        self.sessions
            .get(&session_id)
            .map(|session| session.output_tx.subscribe())
            .ok_or(ServiceError::SessionNotFound(session_id))
    }

    /// Take ownership of the service-wide input receiver. Returns `None` if
    /// already taken.
    pub fn take_input_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<ClientInputEvent>> {
        self.input_rx.take()
    }

    /// Compress, store, and broadcast one chunk of terminal output.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn process_terminal_output(
        &mut self,
        session_id: u32,
        data: &[u8],
        timestamp_ms: u64,
    ) -> Result<u64, ServiceError> {
        let started = Instant::now();
        let session = self.sessions.get_mut(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;

        let result = session.compressor.compress(data);
        let sequence =
            session.ring_buffer.write(result.data.clone(), result.compressed, result.compression_type, timestamp_ms);

        let _dropped_if_no_subscribers = session.output_tx.send(SessionOutput {
            session_id,
            sequence,
            output_data: result.data,
            compression_type: result.compression_type,
            is_replay: false,
        });

        self.statistics.output_chunks_processed += 1;

        let elapsed = started.elapsed();
        if elapsed > self.config.target_latency {
            warn!(session_id, elapsed_us = elapsed.as_micros() as u64, "processTerminalOutput exceeded target latency");
        }

        Ok(sequence)
    }

    /// Forward one chunk of client input to the service-wide input channel.
    /// Silently drops (with a warning) input from an unknown session or an
    /// unregistered client.
    pub fn process_client_input(&mut self, client_id: &str, session_id: u32, data: Vec<u8>) {
        let Some(session) = self.sessions.get(&session_id) else {
            warn!(session_id, client_id, "input for unknown session dropped");
            return;
        };
        if !session.clients.contains_key(client_id) {
            warn!(session_id, client_id, "input from unregistered client dropped");
            return;
        }

        let sequence = self.next_input_sequence;
        self.next_input_sequence += 1;

        let event = ClientInputEvent { session_id, client_id: client_id.to_string(), data, sequence };
        if self.input_tx.send(event).is_err() {
            warn!(session_id, client_id, "input channel has no receiver");
        }
    }

    /// Replace a session's stored terminal state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] or a wrapped
    /// [`crate::errors::StateError`].
    pub fn update_terminal_state(
        &mut self,
        session_id: u32,
        snapshot: StateSnapshot,
        initial: bool,
    ) -> Result<(), ServiceError> {
        let session = self.sessions.get_mut(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        session.state_store.update_snapshot(snapshot, initial)?;
        Ok(())
    }

    /// Apply a state delta to a session's stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] or a wrapped
    /// [`crate::errors::StateError`].
    pub fn apply_state_delta(&mut self, session_id: u32, delta: &StateDelta) -> Result<(), ServiceError> {
        let session = self.sessions.get_mut(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        session.state_store.apply_delta(delta)?;
        Ok(())
    }

    /// A session's current state snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn state_snapshot(&self, session_id: u32) -> Result<Option<StateSnapshot>, ServiceError> {
        let session = self.sessions.get(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session.state_store.snapshot().cloned())
    }

    /// A page of a session's scrollback history.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn scrollback_page(
        &self,
        session_id: u32,
        start_line: u32,
        line_count: u32,
    ) -> Result<ScrollbackPage, ServiceError> {
        let session = self.sessions.get(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session.state_store.scrollback_page(start_line, line_count))
    }

    /// Apply a client's flow-control acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] or
    /// [`ServiceError::ClientNotFound`].
    pub fn handle_flow_control(
        &mut self,
        session_id: u32,
        client_id: &str,
        window_size: u64,
        bytes_acknowledged: u64,
    ) -> Result<(), ServiceError> {
        let window = self.client_window_mut(session_id, client_id)?;
        window.apply_flow_control_message(window_size, bytes_acknowledged);
        Ok(())
    }

    /// Apply a standalone client window-update credit grant.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] or
    /// [`ServiceError::ClientNotFound`].
    pub fn handle_window_update(&mut self, session_id: u32, client_id: &str, increment: u64) -> Result<(), ServiceError> {
        let window = self.client_window_mut(session_id, client_id)?;
        window.apply_window_update(increment);
        Ok(())
    }

    /// Reserve `bytes` of a client's send credit.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] or
    /// [`ServiceError::ClientNotFound`].
    pub fn try_reserve_credit(&mut self, session_id: u32, client_id: &str, bytes: u64) -> Result<bool, ServiceError> {
        let window = self.client_window_mut(session_id, client_id)?;
        Ok(window.try_send(bytes))
    }

    /// Override a session's compression enablement and, optionally, its
    /// level. `level = None` restores adaptive level adjustment.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent,
    /// or a wrapped [`crate::errors::CompressionError`] if `level` is out of
    /// range.
    pub fn set_compression_override(
        &mut self,
        session_id: u32,
        enabled: bool,
        level: Option<u8>,
    ) -> Result<(), ServiceError> {
        let session = self.sessions.get_mut(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        session.compressor.set_compression_enabled(enabled);
        match level {
            Some(level) => session.compressor.set_compression_level(u32::from(level))?,
            None => session.compressor.clear_compression_level_override(),
        }
        Ok(())
    }

    /// Feed a measured transfer rate into a session's compressor.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn update_client_network_metrics(
        &mut self,
        session_id: u32,
        bytes: u64,
        duration_ms: u64,
    ) -> Result<(), ServiceError> {
        let session = self.sessions.get_mut(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        session.compressor.update_network_metrics(bytes, duration_ms);
        Ok(())
    }

    /// Ring-buffer chunks from `from_sequence` onward, for manual replay.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn replay_data(&self, session_id: u32, from_sequence: u64) -> Result<Vec<OutputChunk>, ServiceError> {
        let session = self.sessions.get(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session.ring_buffer.read_from(from_sequence))
    }

    /// Most recent output bytes up to `max_bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn latest_output(&self, session_id: u32, max_bytes: usize) -> Result<Vec<u8>, ServiceError> {
        let session = self.sessions.get(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session.ring_buffer.latest_bytes(max_bytes))
    }

    /// Cumulative service-wide counters.
    #[must_use]
    pub fn statistics(&self) -> ServiceStatistics {
        self.statistics
    }

    /// A session's ring-buffer occupancy.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn buffer_statistics(&self, session_id: u32) -> Result<RingBufferStatistics, ServiceError> {
        let session = self.sessions.get(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session.ring_buffer.statistics())
    }

    /// A session's current compression settings.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn compression_settings(&self, session_id: u32) -> Result<(bool, u32), ServiceError> {
        let session = self.sessions.get(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session.compressor.settings())
    }

    /// Number of clients currently attached to a session.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn client_count(&self, session_id: u32) -> Result<usize, ServiceError> {
        let session = self.sessions.get(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session.clients.len())
    }

    /// Ids of clients currently attached to a session.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::SessionNotFound`] if `session_id` is absent.
    pub fn connected_clients(&self, session_id: u32) -> Result<Vec<String>, ServiceError> {
        let session = self.sessions.get(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        Ok(session.clients.keys().cloned().collect())
    }

    /// `true` if `session_id` currently exists.
    #[must_use]
    pub fn session_exists(&self, session_id: u32) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Ids of every currently open session.
    #[must_use]
    pub fn session_ids(&self) -> Vec<u32> {
        self.sessions.keys().copied().collect()
    }

    fn client_window_mut(&mut self, session_id: u32, client_id: &str) -> Result<&mut FlowControlWindow, ServiceError> {
        let session = self.sessions.get_mut(&session_id).ok_or(ServiceError::SessionNotFound(session_id))?;
        session.clients.get_mut(client_id).ok_or_else(|| ServiceError::ClientNotFound(client_id.to_string()))
    }
}
