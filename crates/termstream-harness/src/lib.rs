//! Deterministic simulation harness for terminal streaming core testing.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. [`model::Operation`]s are generated by `arbitrary` and applied to
//! both the model and the real `StreamingDataService`, and their observable
//! states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths,
//! not specific scenarios. Use [`InvariantRegistry::standard()`] for the
//! common session invariants.
//!
//! # Simulation Environment
//!
//! [`sim_env::SimEnv`] is a seeded, virtual-clock `Environment` so a
//! recorded operation sequence replays identically regardless of wall-clock
//! timing or host entropy.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{
    DestroyedSessionHasNoState, FlowControlWindowNonNegative, Invariant, InvariantRegistry, InvariantResult,
    OutputSequenceMonotonicity, SessionSnapshot, SystemSnapshot, Violation,
};
pub use model::{
    ErrorProperties, ModelClientId, ModelSessionId, ModelWorld, ObservableState, Operation, OperationError,
    OperationResult, SmallPayload,
};
pub use sim_driver::SimDriver;
pub use sim_env::SimEnv;
