//! Reference model for property-based testing of session/client lifecycle.
//!
//! [`Operation`] is generated by `arbitrary` and applied in parallel to
//! [`ModelWorld`] (the oracle) and the real
//! `termstream_core::service::StreamingDataService`; their
//! [`ObservableState`]/responses are compared after each step.

mod operation;
mod world;

pub use operation::{
    ErrorProperties, ModelClientId, ModelSessionId, Operation, OperationError, OperationResult, SmallPayload,
};
pub use world::{ModelWorld, ObservableState};
