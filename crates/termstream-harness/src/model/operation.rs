//! Arbitrary-derived operations for model-based testing of
//! [`termstream_core::service::StreamingDataService`].

use arbitrary::Arbitrary;

/// Session identifier used by generated operations. Kept small so sequences
/// exercise session reuse and session limits quickly.
pub type ModelSessionId = u8;
/// Client identifier used by generated operations.
pub type ModelClientId = u8;

/// A small, deterministically-generated payload standing in for terminal
/// output or client input bytes.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub struct SmallPayload {
    seed: u8,
    len: u8,
}

impl SmallPayload {
    /// Construct a payload directly from its seed and length, bypassing
    /// `arbitrary` generation. Used by hand-written tests that need a
    /// specific payload rather than a generated one.
    #[must_use]
    pub fn new(seed: u8, len: u8) -> Self {
        Self { seed, len }
    }

    /// Expand this payload to its byte representation.
    ///
    /// Deterministic: the same `(seed, len)` always expands to the same
    /// bytes, so a recorded failing operation sequence reproduces exactly.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = usize::from(self.len) % 64;
        (0..len).map(|i| self.seed.wrapping_add(u8::try_from(i % 256).unwrap_or(0))).collect()
    }
}

/// One step of a generated simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Create a session.
    CreateSession {
        /// Session to create.
        session_id: ModelSessionId,
    },
    /// Destroy a session.
    DestroySession {
        /// Session to destroy.
        session_id: ModelSessionId,
    },
    /// Attach a client to a session.
    RegisterClient {
        /// Target session.
        session_id: ModelSessionId,
        /// Client attaching.
        client_id: ModelClientId,
    },
    /// Detach a client from a session.
    UnregisterClient {
        /// Target session.
        session_id: ModelSessionId,
        /// Client detaching.
        client_id: ModelClientId,
    },
    /// Process a chunk of terminal output on a session.
    ProcessOutput {
        /// Target session.
        session_id: ModelSessionId,
        /// Output bytes.
        data: SmallPayload,
    },
    /// Process a chunk of client input on a session.
    ProcessInput {
        /// Target session.
        session_id: ModelSessionId,
        /// Client sending input.
        client_id: ModelClientId,
        /// Input bytes.
        data: SmallPayload,
    },
    /// Grant additional flow-control credit to a client.
    WindowUpdate {
        /// Target session.
        session_id: ModelSessionId,
        /// Client receiving credit.
        client_id: ModelClientId,
        /// Credit increment.
        increment: u16,
    },
    /// Record a client disconnection for later reconnection.
    Disconnect {
        /// Target session.
        session_id: ModelSessionId,
        /// Client disconnecting.
        client_id: ModelClientId,
    },
    /// Advance the simulation clock without touching the service.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },
}

/// Classification of an [`OperationError`], used by a simulation driver to
/// decide whether a failing operation should end the run or is expected
/// noise that a well-behaved client would simply retry or ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorProperties {
    /// `true` if the error should end the simulated connection outright.
    pub is_fatal: bool,
    /// `true` if retrying the same operation later could succeed.
    pub is_retryable: bool,
}

/// Errors the model can produce, mirroring the externally observable
/// variants of `termstream_core::errors::ServiceError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// Referenced session does not exist.
    SessionNotFound(ModelSessionId),
    /// Referenced client is not registered on the session.
    ClientNotFound(ModelClientId),
    /// `max_sessions` would be exceeded.
    SessionLimitExceeded,
}

impl OperationError {
    /// Classify this error for simulation control flow.
    #[must_use]
    pub fn properties(&self) -> ErrorProperties {
        match self {
            Self::SessionNotFound(_) | Self::ClientNotFound(_) => {
                ErrorProperties { is_fatal: false, is_retryable: false }
            },
            Self::SessionLimitExceeded => ErrorProperties { is_fatal: false, is_retryable: true },
        }
    }
}

/// Outcome of applying an [`Operation`] to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded; nothing further to compare.
    Ok,
    /// `CreateSession` outcome: `false` if the session already existed.
    Created(bool),
    /// `ProcessOutput` outcome: the assigned sequence number.
    OutputSequence(u64),
    /// Operation failed.
    Error(OperationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_payload_expansion_is_deterministic() {
        let payload = SmallPayload { seed: 7, len: 5 };
        assert_eq!(payload.to_bytes(), payload.to_bytes());
        assert_eq!(payload.to_bytes().len(), 5);
    }

    #[test]
    fn small_payload_length_is_bounded() {
        let payload = SmallPayload { seed: 0, len: 255 };
        assert_eq!(payload.to_bytes().len(), 255 % 64);
    }

    #[test]
    fn session_limit_exceeded_is_retryable_not_fatal() {
        let props = OperationError::SessionLimitExceeded.properties();
        assert!(!props.is_fatal);
        assert!(props.is_retryable);
    }

    #[test]
    fn not_found_errors_are_neither_fatal_nor_retryable() {
        let props = OperationError::SessionNotFound(1).properties();
        assert!(!props.is_fatal);
        assert!(!props.is_retryable);
    }
}
