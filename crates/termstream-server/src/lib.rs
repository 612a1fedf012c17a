//! Production runtime for the terminal streaming core.
//!
//! # Architecture
//!
//! This crate provides the production "glue" that wraps
//! [`termstream_core`]'s Sans-IO driver ([`termstream_core::service::StreamingDataService`]
//! + [`termstream_core::reconnection::ReconnectionManager`] + one
//! [`termstream_core::endpoint::ProtocolEndpoint`] per connection) with real
//! I/O: a TCP listener, optional TLS, system time, and OS randomness.
//!
//! The connection handler in [`runtime`] is generic over
//! `AsyncRead + AsyncWrite + Unpin + Send` rather than any specific
//! transport library, so the identical logic drives a plain TCP stream, a
//! TLS stream, or (in simulation) a virtual one.
//!
//! # Components
//!
//! - [`runtime::handle_connection`]: reads frames, feeds them to a
//!   `ProtocolEndpoint`, and executes the actions it returns.
//! - [`listener::Server`]: binds a `TcpListener`, optionally wraps accepted
//!   streams in TLS, and spawns a connection task per accept.
//! - [`system_env::SystemEnv`]: production `Environment` (real clock, OS
//!   RNG).
//! - [`auth::PermissiveAuthenticator`]: default `Authenticator`; real
//!   deployments plug in their own.
//! - [`config::RuntimeConfig`]: layered configuration (defaults, TOML file,
//!   CLI flags).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod listener;
pub mod runtime;
pub mod system_env;
mod tls;

pub use auth::PermissiveAuthenticator;
pub use config::{FileConfig, RuntimeConfig};
pub use error::ServerError;
pub use listener::Server;
pub use runtime::SharedDriver;
pub use system_env::SystemEnv;
