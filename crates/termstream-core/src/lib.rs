//! Sans-IO domain logic for the terminal streaming core.
//!
//! This crate holds every piece of protocol and session-management logic
//! that does not itself perform I/O: ring-buffered output retention,
//! adaptive compression, terminal state tracking, credit-based flow
//! control, reconnection bookkeeping, and the per-connection protocol
//! driver that ties them together. A thin runtime (see `termstream-server`)
//! drives this logic against real sockets and a real clock; a simulation
//! harness can drive the identical logic against virtual ones.

#![forbid(unsafe_code)]

pub mod compressor;
pub mod config;
pub mod endpoint;
pub mod env;
pub mod errors;
pub mod flow_control;
pub mod reconnection;
pub mod ring_buffer;
pub mod service;
pub mod state_store;

pub use compressor::{AdaptiveCompressor, CompressionResult, NetworkCategory};
pub use config::{CompressionConfig, FlowControlConfig, ReconnectionConfig, RingBufferConfig, ServiceConfig};
pub use endpoint::{Authenticator, EndpointAction, EndpointConfig, EndpointEvent, EndpointState, ProtocolEndpoint};
pub use env::Environment;
pub use errors::{CompressionError, EndpointError, FlowControlError, RingBufferError, ServiceError, StateError};
pub use flow_control::FlowControlWindow;
pub use reconnection::{DisconnectedClientState, ReconnectionManager, ReconnectionResult};
pub use ring_buffer::{OutputChunk, OutputRingBuffer, RingBufferStatistics};
pub use service::{ClientInputEvent, RegistrationResult, ServiceState, ServiceStatistics, SessionOutput, StreamingDataService};
pub use state_store::{ScrollbackPage, TerminalStateStore};
