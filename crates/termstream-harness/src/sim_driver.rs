//! Simulation driver for model-based testing of
//! [`StreamingDataService`].
//!
//! The driver applies each generated [`Operation`] to both [`ModelWorld`]
//! (the oracle) and a real `StreamingDataService`, and fails loudly the
//! moment their responses or observable states diverge.
//!
//! # Usage
//!
//! ```ignore
//! let mut driver = SimDriver::new(42, 0);
//! for op in operations {
//!     driver.apply(&op);
//! }
//! ```

use termstream_core::config::ServiceConfig;
use termstream_core::errors::ServiceError;
use termstream_core::service::StreamingDataService;

use crate::invariants::{InvariantRegistry, SessionSnapshot, SystemSnapshot};
use crate::model::{ModelClientId, ModelWorld, Operation, OperationError, OperationResult};
use crate::sim_env::SimEnv;

fn client_id(id: ModelClientId) -> String {
    format!("client-{id}")
}

/// Runs generated operations against both the model and the real service,
/// asserting their responses agree at every step.
pub struct SimDriver {
    env: SimEnv,
    model: ModelWorld,
    real: StreamingDataService,
    invariants: Option<InvariantRegistry>,
}

impl SimDriver {
    /// Create a driver with a freshly seeded environment and a real service
    /// configured with `max_sessions`.
    #[must_use]
    pub fn new(seed: u64, max_sessions: usize) -> Self {
        let config = ServiceConfig { max_sessions, ..Default::default() };
        let mut real = StreamingDataService::new(config);
        real.start();

        Self { env: SimEnv::with_seed(seed), model: ModelWorld::new(max_sessions), real, invariants: None }
    }

    /// Enable invariant checking after each operation.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// The simulation environment backing this driver's virtual clock.
    #[must_use]
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Apply one operation to both the model and the real service.
    ///
    /// # Panics
    ///
    /// Panics with a descriptive message if the model and the real service
    /// disagree about the operation's outcome, or if an enabled invariant is
    /// violated afterward.
    pub fn apply(&mut self, op: &Operation) {
        let model_result = self.model.apply(op);
        let real_result = self.apply_to_real(op);

        assert_eq!(model_result, real_result, "model/real divergence applying {op:?}");

        self.check_invariants(&format!("after {op:?}"));
    }

    fn apply_to_real(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::CreateSession { session_id } => match self.real.create_session(u32::from(*session_id)) {
                Ok(created) => OperationResult::Created(created),
                Err(err) => OperationResult::Error(to_operation_error(&err)),
            },
            Operation::DestroySession { session_id } => match self.real.destroy_session(u32::from(*session_id)) {
                Ok(()) => OperationResult::Ok,
                Err(err) => OperationResult::Error(to_operation_error(&err)),
            },
            Operation::RegisterClient { session_id, client_id: cid } => {
                match self.real.register_client(u32::from(*session_id), client_id(*cid), None, None) {
                    Ok(_) => OperationResult::Ok,
                    Err(err) => OperationResult::Error(to_operation_error(&err)),
                }
            },
            Operation::UnregisterClient { session_id, client_id: cid }
            | Operation::Disconnect { session_id, client_id: cid } => {
                match self.real.unregister_client(u32::from(*session_id), &client_id(*cid)) {
                    Ok(()) => OperationResult::Ok,
                    Err(err) => OperationResult::Error(to_operation_error(&err)),
                }
            },
            Operation::ProcessOutput { session_id, data } => {
                let timestamp_ms = self.elapsed_ms();
                match self.real.process_terminal_output(u32::from(*session_id), &data.to_bytes(), timestamp_ms) {
                    Ok(sequence) => OperationResult::OutputSequence(sequence),
                    Err(err) => OperationResult::Error(to_operation_error(&err)),
                }
            },
            Operation::ProcessInput { session_id, client_id: cid, data } => {
                if !self.real.session_exists(u32::from(*session_id)) {
                    return OperationResult::Error(OperationError::SessionNotFound(*session_id));
                }
                let connected = self.real.connected_clients(u32::from(*session_id)).unwrap_or_default();
                if !connected.contains(&client_id(*cid)) {
                    return OperationResult::Error(OperationError::ClientNotFound(*cid));
                }
                self.real.process_client_input(&client_id(*cid), u32::from(*session_id), data.to_bytes());
                OperationResult::Ok
            },
            Operation::WindowUpdate { session_id, client_id: cid, increment } => {
                match self.real.handle_window_update(u32::from(*session_id), &client_id(*cid), u64::from(*increment)) {
                    Ok(()) => OperationResult::Ok,
                    Err(err) => OperationResult::Error(to_operation_error(&err)),
                }
            },
            Operation::AdvanceTime { millis } => {
                self.env.advance(std::time::Duration::from_millis(u64::from(*millis)));
                OperationResult::Ok
            },
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.env.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
    }

    fn check_invariants(&self, context: &str) {
        if let Some(ref registry) = self.invariants {
            registry.assert_all(&self.snapshot(), context);
        }
    }

    /// Snapshot the real service's observable state for invariant checking.
    #[must_use]
    pub fn snapshot(&self) -> SystemSnapshot {
        let sessions = self
            .real
            .session_ids()
            .into_iter()
            .map(|id| {
                let newest = self.real.buffer_statistics(id).ok().and_then(|s| s.newest_sequence);
                SessionSnapshot::new(id).with_output_sequences(newest)
            })
            .collect();

        SystemSnapshot::from_sessions(sessions)
    }
}

fn to_operation_error(err: &ServiceError) -> OperationError {
    match err {
        ServiceError::SessionNotFound(id) | ServiceError::SessionAlreadyExists(id) => {
            OperationError::SessionNotFound(u8::try_from(*id).unwrap_or(u8::MAX))
        },
        ServiceError::ClientNotFound(id) => OperationError::ClientNotFound(parse_client_id(id)),
        ServiceError::SessionLimitExceeded { .. } => OperationError::SessionLimitExceeded,
    }
}

fn parse_client_id(formatted: &str) -> ModelClientId {
    formatted.strip_prefix("client-").and_then(|s| s.parse().ok()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SmallPayload;

    #[test]
    fn create_and_destroy_session_agree_with_model() {
        let mut driver = SimDriver::new(1, 0);
        driver.apply(&Operation::CreateSession { session_id: 1 });
        driver.apply(&Operation::DestroySession { session_id: 1 });
    }

    #[test]
    fn register_then_input_agree_with_model() {
        let mut driver = SimDriver::new(2, 0).with_invariants(InvariantRegistry::standard());
        driver.apply(&Operation::CreateSession { session_id: 1 });
        driver.apply(&Operation::RegisterClient { session_id: 1, client_id: 9 });
        driver.apply(&Operation::ProcessInput { session_id: 1, client_id: 9, data: SmallPayload::new(3, 4) });
    }

    #[test]
    fn session_limit_is_enforced_identically() {
        let mut driver = SimDriver::new(3, 1);
        driver.apply(&Operation::CreateSession { session_id: 1 });
        driver.apply(&Operation::CreateSession { session_id: 2 });
    }

    #[test]
    fn output_sequences_climb_together() {
        let mut driver = SimDriver::new(4, 0).with_invariants(InvariantRegistry::standard());
        driver.apply(&Operation::CreateSession { session_id: 1 });
        for seed in 0..5u8 {
            driver.apply(&Operation::ProcessOutput { session_id: 1, data: SmallPayload::new(seed, 2) });
        }
    }

    #[test]
    fn advance_time_moves_the_virtual_clock() {
        let mut driver = SimDriver::new(5, 0);
        driver.apply(&Operation::AdvanceTime { millis: 250 });
        assert_eq!(driver.elapsed_ms(), 250);
    }
}
