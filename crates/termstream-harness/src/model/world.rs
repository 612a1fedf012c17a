//! Model world — a minimal reference implementation of session/client
//! bookkeeping, used as the oracle in model-based tests against the real
//! [`termstream_core::service::StreamingDataService`].

use std::collections::{BTreeSet, HashMap};

use super::operation::{ModelClientId, ModelSessionId, Operation, OperationError, OperationResult, SmallPayload};

#[derive(Debug, Clone, Default)]
struct ModelSession {
    clients: BTreeSet<ModelClientId>,
    next_output_sequence: u64,
}

/// Observable state for oracle comparison against the real service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Sorted ids of every existing session.
    pub session_ids: Vec<ModelSessionId>,
    /// Per-session sorted client ids.
    pub session_clients: Vec<(ModelSessionId, Vec<ModelClientId>)>,
    /// Per-session next output sequence (one past the highest assigned).
    pub next_output_sequences: Vec<(ModelSessionId, u64)>,
}

/// Reference implementation of session/client lifecycle, with an optional
/// bound on the number of concurrent sessions mirroring
/// `ServiceConfig::max_sessions`.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    sessions: HashMap<ModelSessionId, ModelSession>,
    max_sessions: usize,
}

impl ModelWorld {
    /// Create an empty world. `max_sessions = 0` means unbounded.
    #[must_use]
    pub fn new(max_sessions: usize) -> Self {
        Self { sessions: HashMap::new(), max_sessions }
    }

    /// Apply one operation, returning the outcome to compare against the
    /// real service's response to the same operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::CreateSession { session_id } => self.apply_create(*session_id),
            Operation::DestroySession { session_id } => self.apply_destroy(*session_id),
            Operation::RegisterClient { session_id, client_id } => self.apply_register(*session_id, *client_id),
            Operation::UnregisterClient { session_id, client_id } => self.apply_unregister(*session_id, *client_id),
            Operation::ProcessOutput { session_id, data } => self.apply_output(*session_id, data),
            Operation::ProcessInput { session_id, client_id, .. } => self.require_registered(*session_id, *client_id),
            Operation::WindowUpdate { session_id, client_id, .. } => self.require_registered(*session_id, *client_id),
            Operation::Disconnect { session_id, client_id } => self.apply_unregister(*session_id, *client_id),
            Operation::AdvanceTime { .. } => OperationResult::Ok,
        }
    }

    /// Extract state for comparison against the real service.
    #[must_use]
    pub fn observable_state(&self) -> ObservableState {
        let mut session_ids: Vec<_> = self.sessions.keys().copied().collect();
        session_ids.sort_unstable();

        let session_clients =
            session_ids.iter().map(|id| (*id, self.sessions[id].clients.iter().copied().collect())).collect();
        let next_output_sequences =
            session_ids.iter().map(|id| (*id, self.sessions[id].next_output_sequence)).collect();

        ObservableState { session_ids, session_clients, next_output_sequences }
    }

    fn apply_create(&mut self, session_id: ModelSessionId) -> OperationResult {
        if self.sessions.contains_key(&session_id) {
            return OperationResult::Created(false);
        }
        if self.max_sessions > 0 && self.sessions.len() >= self.max_sessions {
            return OperationResult::Error(OperationError::SessionLimitExceeded);
        }
        self.sessions.insert(session_id, ModelSession { clients: BTreeSet::new(), next_output_sequence: 1 });
        OperationResult::Created(true)
    }

    fn apply_destroy(&mut self, session_id: ModelSessionId) -> OperationResult {
        match self.sessions.remove(&session_id) {
            Some(_) => OperationResult::Ok,
            None => OperationResult::Error(OperationError::SessionNotFound(session_id)),
        }
    }

    fn apply_register(&mut self, session_id: ModelSessionId, client_id: ModelClientId) -> OperationResult {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return OperationResult::Error(OperationError::SessionNotFound(session_id));
        };
        session.clients.insert(client_id);
        OperationResult::Ok
    }

    fn apply_unregister(&mut self, session_id: ModelSessionId, client_id: ModelClientId) -> OperationResult {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return OperationResult::Error(OperationError::SessionNotFound(session_id));
        };
        session.clients.remove(&client_id);
        OperationResult::Ok
    }

    fn apply_output(&mut self, session_id: ModelSessionId, _data: &SmallPayload) -> OperationResult {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return OperationResult::Error(OperationError::SessionNotFound(session_id));
        };
        let sequence = session.next_output_sequence;
        session.next_output_sequence += 1;
        OperationResult::OutputSequence(sequence)
    }

    fn require_registered(&self, session_id: ModelSessionId, client_id: ModelClientId) -> OperationResult {
        let Some(session) = self.sessions.get(&session_id) else {
            return OperationResult::Error(OperationError::SessionNotFound(session_id));
        };
        if !session.clients.contains(&client_id) {
            return OperationResult::Error(OperationError::ClientNotFound(client_id));
        }
        OperationResult::Ok
    }
}
