//! QUIC push endpoint
//!
//! The alternate transport advertised through `Alt-Svc`. Each bidirectional
//! stream a client opens becomes one subscriber: the value is written as a
//! line (`<value>\n`) on every delivery, inbound bytes are read only to
//! notice when the client goes away.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use quinn::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::sync::oneshot;

use crate::broadcast::{Broadcaster, Subscription, Value};
use crate::error::Result;
use crate::server::config::{QuicConfig, QUIC_PROTOCOL_ID};
use crate::server::push::{self, PushSink};
use crate::tls;

/// QUIC endpoint serving socket-push subscribers
pub struct QuicServer {
    endpoint: quinn::Endpoint,
    broadcaster: Arc<Broadcaster>,
}

impl QuicServer {
    /// Bind using the certificate and key files named in `config`
    pub fn bind(config: &QuicConfig, broadcaster: Arc<Broadcaster>) -> Result<Self> {
        let certs = tls::load_certs(&config.cert_path)?;
        let key = tls::load_key(&config.key_path)?;
        Self::bind_with_cert(config.bind_addr, certs, key, broadcaster)
    }

    /// Bind with an in-memory certificate chain and key
    ///
    /// Connections must negotiate ALPN [`QUIC_PROTOCOL_ID`].
    pub fn bind_with_cert(
        addr: SocketAddr,
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
        broadcaster: Arc<Broadcaster>,
    ) -> Result<Self> {
        let crypto = tls::server_crypto(certs, key, QUIC_PROTOCOL_ID.as_bytes())?;
        let server_config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
        let endpoint = quinn::Endpoint::server(server_config, addr)?;

        Ok(Self {
            endpoint,
            broadcaster,
        })
    }

    /// Local UDP address
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    /// Handle to the underlying endpoint, used to close it on shutdown
    pub fn endpoint(&self) -> &quinn::Endpoint {
        &self.endpoint
    }

    /// Accept connections until the endpoint is closed
    pub async fn accept_loop(&self) -> Result<()> {
        tracing::info!(addr = ?self.endpoint.local_addr().ok(), "QUIC endpoint listening");

        while let Some(incoming) = self.endpoint.accept().await {
            let broadcaster = Arc::clone(&self.broadcaster);

            tokio::spawn(async move {
                let peer = incoming.remote_address();
                match incoming.await {
                    Ok(connection) => serve_connection(connection, broadcaster).await,
                    Err(e) => {
                        tracing::debug!(peer = %peer, error = %e, "QUIC handshake failed");
                    }
                }
            });
        }

        tracing::info!("QUIC endpoint closed");
        Ok(())
    }
}

async fn serve_connection(connection: quinn::Connection, broadcaster: Arc<Broadcaster>) {
    let peer = connection.remote_address();
    tracing::debug!(peer = %peer, "New QUIC connection");

    loop {
        match connection.accept_bi().await {
            Ok((send, recv)) => {
                let subscription = match broadcaster.subscribe() {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        tracing::debug!(peer = %peer, error = %e, "Refusing QUIC stream");
                        connection.close(0u32.into(), b"closed");
                        break;
                    }
                };
                tokio::spawn(serve_stream(send, recv, subscription, peer));
            }
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "QUIC connection closed");
                break;
            }
        }
    }
}

async fn serve_stream(
    send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    subscription: Subscription,
    peer: SocketAddr,
) {
    let client_id = subscription.id();
    let (closed_tx, closed_rx) = oneshot::channel();

    let reader = tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        // Inbound content is ignored; EOF, reset or error ends the stream
        while let Ok(Some(_)) = recv.read(&mut buf).await {}
        let _ = closed_tx.send(());
    });

    let mut sink = LineSink(send);
    let end = push::run(subscription, &mut sink, closed_rx).await;

    reader.abort();
    let _ = sink.0.finish();

    tracing::debug!(client_id = %client_id, peer = %peer, reason = ?end, "QUIC stream closed");
}

struct LineSink(quinn::SendStream);

#[async_trait]
impl PushSink for LineSink {
    async fn deliver(&mut self, value: &Value) -> io::Result<()> {
        self.0.write_all(value.bytes()).await?;
        self.0.write_all(b"\n").await?;
        Ok(())
    }
}
