//! Server listener
//!
//! Binds the HTTP (TCP) surface and, when configured, the QUIC endpoint,
//! then serves both until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::broadcast::Broadcaster;
use crate::error::{Error, Result};
use crate::server::config::ServerConfig;
use crate::server::handlers::{self, AppState};
use crate::server::quic::QuicServer;

/// Broadcast server
pub struct Server {
    config: ServerConfig,
    broadcaster: Arc<Broadcaster>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let broadcaster = Arc::new(Broadcaster::with_config(config.broadcast.clone()));
        Self::with_broadcaster(config, broadcaster)
    }

    /// Create a server around an existing broadcaster
    pub fn with_broadcaster(config: ServerConfig, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            config,
            broadcaster,
        }
    }

    /// Get a reference to the broadcaster
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the HTTP router, optionally stamping `Alt-Svc` on every response
    pub fn router(&self, alt_svc: Option<&str>) -> Result<Router> {
        let state = AppState::new(Arc::clone(&self.broadcaster));
        let mut router = Router::new()
            .fallback(handlers::dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if let Some(value) = alt_svc {
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("Alt-Svc value {value:?}: {e}")))?;
            router = router.layer(SetResponseHeaderLayer::if_not_present(header::ALT_SVC, value));
        }

        Ok(router)
    }

    /// Bind the TCP listener and the QUIC endpoint
    pub async fn bind(self) -> Result<Listening> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;

        let quic = match self.config.quic {
            Some(ref quic) => Some(QuicServer::bind(quic, Arc::clone(&self.broadcaster))?),
            None => None,
        };

        Ok(self.listening(listener, quic))
    }

    /// Serve on an already bound listener and optional QUIC endpoint
    pub fn listening(self, listener: TcpListener, quic: Option<QuicServer>) -> Listening {
        let quic_port = quic
            .as_ref()
            .and_then(|quic| quic.local_addr().ok())
            .map(|addr| addr.port());
        let alt_svc = self.config.alt_svc(quic_port);

        Listening {
            server: self,
            listener,
            quic,
            alt_svc,
        }
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(self) -> Result<()> {
        self.bind().await?.run().await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.bind().await?.run_until(shutdown).await
    }
}

/// A bound server, ready to serve
pub struct Listening {
    server: Server,
    listener: TcpListener,
    quic: Option<QuicServer>,
    alt_svc: Option<String>,
}

impl Listening {
    /// Local TCP address of the HTTP surface
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Local UDP address of the QUIC endpoint
    pub fn quic_addr(&self) -> Option<SocketAddr> {
        self.quic.as_ref().and_then(|quic| quic.local_addr().ok())
    }

    /// `Alt-Svc` value sent with every response
    pub fn alt_svc(&self) -> Option<&str> {
        self.alt_svc.as_deref()
    }

    /// Get a reference to the broadcaster
    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        self.server.broadcaster()
    }

    /// Serve until an error occurs
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves, then close every subscriber
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let router = self.server.router(self.alt_svc.as_deref())?;
        let broadcaster = Arc::clone(&self.server.broadcaster);
        let listener = self.listener;
        let quic = self.quic;

        tracing::info!(
            addr = ?listener.local_addr().ok(),
            alt_svc = ?self.alt_svc,
            "HTTP server listening"
        );

        let http = async move { axum::serve(listener, router).await.map_err(Error::from) };
        let quic_ref = quic.as_ref();
        let quic_loop = async move {
            match quic_ref {
                Some(quic) => quic.accept_loop().await,
                None => std::future::pending().await,
            }
        };

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = http => result,
            result = quic_loop => result,
        };

        broadcaster.close();
        if let Some(ref quic) = quic {
            quic.endpoint().close(0u32.into(), b"shutdown");
        }

        result
    }
}
