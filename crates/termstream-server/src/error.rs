//! Server-wide error type.
//!
//! Unlike [`termstream_core::errors::EndpointError`], which is per-connection
//! protocol logic, this type covers the runtime that hosts it: startup
//! configuration, TLS setup, and transport I/O.

use thiserror::Error;

use termstream_core::errors::EndpointError;

/// Errors raised by the production runtime.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid bind address, malformed config file, or missing required TLS
    /// material. Fatal; fix configuration and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// TLS certificate or key could not be loaded or parsed.
    #[error("tls error: {0}")]
    Tls(String),

    /// Transport-level I/O failure (accept, read, write).
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Frame decoding or encoding failed at the wire layer.
    #[error(transparent)]
    Protocol(#[from] termstream_proto::ProtocolError),

    /// The connection driver rejected a frame or closed the connection.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ServerError::Config("missing --cert".to_string());
        assert_eq!(err.to_string(), "configuration error: missing --cert");
    }

    #[test]
    fn endpoint_error_is_wrapped_transparently() {
        let err = ServerError::from(EndpointError::VersionMismatch);
        assert_eq!(err.to_string(), EndpointError::VersionMismatch.to_string());
    }
}
