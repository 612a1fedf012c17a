//! Wire protocol for the terminal streaming core: binary frame headers plus
//! CBOR-encoded payloads.
//!
//! This crate is pure codec logic with no I/O and no async runtime
//! dependency; it is used both by the production server and by simulation
//! harnesses that drive the protocol over in-memory transports.

#![forbid(unsafe_code)]

mod errors;
mod frame;
mod frame_type;
mod header;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use frame_type::FrameType;
pub use header::FrameHeader;
pub use payloads::Payload;
