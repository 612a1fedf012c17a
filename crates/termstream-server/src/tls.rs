//! TLS configuration for the TCP transport.
//!
//! Loads a certificate and key from PEM files, or falls back to a
//! self-signed certificate for local development. Optionally builds a client
//! certificate verifier for mutual TLS.

use std::sync::Arc;

use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::error::ServerError;

/// Build a [`TlsAcceptor`] from certificate and key paths.
///
/// If `cert_path`/`key_path` are `None`, generates a self-signed certificate
/// for `localhost` and logs a warning; this is not suitable for production.
/// If `mtls` is `true`, client certificates are required and verified
/// against the same root the server certificate chains to.
pub fn build_acceptor(
    cert_path: Option<&str>,
    key_path: Option<&str>,
    mtls: bool,
) -> Result<TlsAcceptor, ServerError> {
    let (cert_chain, key) = match (cert_path, key_path) {
        (Some(cert), Some(key)) => load_cert_and_key(cert, key)?,
        _ => {
            tracing::warn!("no TLS certificate provided, using a self-signed certificate");
            tracing::warn!("this is not suitable for production use");
            generate_self_signed()?
        },
    };

    let builder = ServerConfig::builder();

    let config = if mtls {
        let mut roots = RootCertStore::empty();
        for cert in &cert_chain {
            roots
                .add(cert.clone())
                .map_err(|e| ServerError::Tls(format!("failed to build client trust root: {e}")))?;
        }
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .map_err(|e| ServerError::Tls(format!("failed to build client verifier: {e}")))?;
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(cert_chain, key)
            .map_err(|e| ServerError::Tls(format!("invalid tls config: {e}")))?
    } else {
        builder
            .with_no_client_auth()
            .with_single_cert(cert_chain, key)
            .map_err(|e| ServerError::Tls(format!("invalid tls config: {e}")))?
    };

    Ok(TlsAcceptor::from(Arc::new(config)))
}

#[allow(clippy::type_complexity)]
fn load_cert_and_key(
    cert_path: &str,
    key_path: &str,
) -> Result<(Vec<rustls::pki_types::CertificateDer<'static>>, rustls::pki_types::PrivateKeyDer<'static>), ServerError> {
    let cert_pem = std::fs::read(cert_path)
        .map_err(|e| ServerError::Config(format!("failed to read cert '{cert_path}': {e}")))?;
    let key_pem = std::fs::read(key_path)
        .map_err(|e| ServerError::Config(format!("failed to read key '{key_path}': {e}")))?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Tls(format!("failed to parse certificate: {e}")))?;

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| ServerError::Tls(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ServerError::Tls("no private key found".to_string()))?;

    Ok((certs, key))
}

#[allow(clippy::type_complexity)]
fn generate_self_signed()
-> Result<(Vec<rustls::pki_types::CertificateDer<'static>>, rustls::pki_types::PrivateKeyDer<'static>), ServerError> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Tls(format!("failed to generate self-signed certificate: {e}")))?;

    let cert_der = cert.cert.der().clone();
    let key_der = rustls::pki_types::PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    Ok((vec![cert_der], key_der.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_signed_certificate_builds_an_acceptor() {
        let acceptor = build_acceptor(None, None, false);
        assert!(acceptor.is_ok(), "self-signed cert should build an acceptor");
    }

    #[test]
    fn missing_cert_file_is_a_config_error() {
        let err = build_acceptor(Some("/nonexistent/cert.pem"), Some("/nonexistent/key.pem"), false);
        assert!(matches!(err, Err(ServerError::Config(_))));
    }
}
