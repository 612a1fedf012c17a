//! TCP accept loop, optionally wrapping each connection in TLS before
//! handing it to [`crate::runtime::handle_connection`].

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use termstream_core::endpoint::EndpointConfig;

use crate::config::RuntimeConfig;
use crate::error::ServerError;
use crate::runtime::SharedDriver;
use crate::system_env::SystemEnv;
use crate::tls;

/// A bound, not-yet-running server.
pub struct Server {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    shared: Arc<SharedDriver>,
    endpoint_config: EndpointConfig,
}

impl Server {
    /// Bind to `config.bind_address()`, optionally building a TLS acceptor.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] if the address is unusable, or
    /// [`ServerError::Tls`]/[`ServerError::Config`] if TLS material cannot
    /// be loaded.
    pub async fn bind(config: &RuntimeConfig, shared: Arc<SharedDriver>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_address())
            .await
            .map_err(|e| ServerError::Config(format!("failed to bind {}: {e}", config.bind_address())))?;

        let acceptor = if config.tls || config.mtls {
            Some(tls::build_acceptor(config.cert.as_deref(), config.key.as_deref(), config.mtls)?)
        } else {
            None
        };

        let endpoint_config = EndpointConfig::from_service_config(&config.service);

        tracing::info!(address = %config.bind_address(), tls = acceptor.is_some(), "server bound");

        Ok(Self { listener, acceptor, shared, endpoint_config })
    }

    /// Local address actually bound (useful when `port = 0` was requested).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] if the OS cannot report it.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the process is terminated.
    ///
    /// Each connection is handled on its own task; a failure on one
    /// connection never brings down the listener.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(%err, "accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                },
            };

            let shared = Arc::clone(&self.shared);
            let endpoint_config = self.endpoint_config.clone();
            let env = SystemEnv::new();

            match &self.acceptor {
                Some(acceptor) => {
                    let acceptor = acceptor.clone();
                    tokio::spawn(async move {
                        match acceptor.accept(stream).await {
                            Ok(tls_stream) => {
                                if let Err(err) = crate::runtime::handle_connection(
                                    tls_stream,
                                    shared,
                                    env,
                                    endpoint_config,
                                )
                                .await
                                {
                                    tracing::warn!(%peer, %err, "connection ended with an error");
                                }
                            },
                            Err(err) => tracing::warn!(%peer, %err, "tls handshake failed"),
                        }
                    });
                },
                None => {
                    tokio::spawn(async move {
                        if let Err(err) =
                            crate::runtime::handle_connection(stream, shared, env, endpoint_config).await
                        {
                            tracing::warn!(%peer, %err, "connection ended with an error");
                        }
                    });
                },
            }
        }
    }
}
