//! Upgrade negotiation
//!
//! ```text
//!   connect(uri)
//!        │
//!        ▼
//!   WebSocket handshake ──► response carries Alt-Svc with protocol_id?
//!                                  │ no                 │ yes
//!                                  ▼                    ▼
//!                           WebSocket stream     resolve ─► QUIC dial ─► open stream
//!                                                           │ ok            │ failed
//!                                                           ▼               ▼
//!                                                  close WebSocket,   fallback? WebSocket
//!                                                  QUIC stream        strict?   error
//! ```

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderMap};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::altsvc::{self, AltService, AltSvc};
use crate::client::config::ClientConfig;
use crate::client::duplex::{DuplexStream, QuicDuplex, WsDuplex};
use crate::client::error::{NegotiateError, UpgradeError};

/// Written once after opening the QUIC stream so the server sees it
///
/// Streams are announced to the peer lazily, on first data. The server
/// ignores inbound bytes.
pub const STREAM_OPENER: &[u8] = b"\n";

type BaselineSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Opens a WebSocket and upgrades it when the server advertises an
/// alternative transport
#[derive(Debug, Clone, Default)]
pub struct Negotiator {
    config: ClientConfig,
}

impl Negotiator {
    /// Create a negotiator
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Connect to `uri` (`ws://` or `wss://`), upgrading when possible
    pub async fn connect(&self, uri: &str) -> Result<DuplexStream, NegotiateError> {
        let request = uri.into_client_request()?;
        let origin_host = request
            .uri()
            .host()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_string())
            .ok_or_else(|| NegotiateError::MissingHost(uri.to_string()))?;

        let (mut socket, response) = tokio_tungstenite::connect_async(request).await?;
        tracing::debug!(uri = %uri, status = %response.status(), "Baseline WebSocket connected");

        let advertised = advertised_services(response.headers());
        let service = advertised
            .as_ref()
            .and_then(|alt_svc| alt_svc.matching(&self.config.protocol_id).next())
            .cloned();

        let Some(service) = service else {
            return Ok(DuplexStream::WebSocket(WsDuplex::new(socket)));
        };

        let authority = service.authority(&origin_host);
        tracing::debug!(
            authority = %authority,
            protocol = %service.protocol_id,
            "Upgrading transport"
        );

        match self.upgrade(&service, &origin_host).await {
            Ok(quic) => {
                close_baseline(&mut socket).await;
                tracing::info!(authority = %authority, "Upgraded to QUIC");
                Ok(DuplexStream::Quic(quic))
            }
            Err(e) if self.config.fallback_on_upgrade_failure => {
                tracing::warn!(
                    authority = %authority,
                    error = %e,
                    "Upgrade failed, staying on WebSocket"
                );
                Ok(DuplexStream::WebSocket(WsDuplex::new(socket)))
            }
            Err(e) => {
                close_baseline(&mut socket).await;
                Err(e.into())
            }
        }
    }

    /// Dial an advertised service and open one bidirectional stream
    ///
    /// An empty advertised host means the origin's host.
    pub async fn upgrade(
        &self,
        service: &AltService,
        origin_host: &str,
    ) -> Result<QuicDuplex, UpgradeError> {
        let host = if service.is_same_host() {
            origin_host
        } else {
            service.host.as_str()
        };
        let addr = resolve(host, service.port).await?;
        let client_config = self.config.quic_client_config()?;

        let bind: SocketAddr = if addr.is_ipv6() {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        };
        let mut endpoint = quinn::Endpoint::client(bind)?;
        endpoint.set_default_client_config(client_config);

        let connecting = endpoint.connect(addr, host)?;
        let connection = timeout(self.config.dial_timeout, connecting)
            .await
            .map_err(|_| UpgradeError::DialTimeout(self.config.dial_timeout))??;

        let open = async {
            let (mut send, recv) = connection.open_bi().await?;
            send.write_all(STREAM_OPENER).await?;
            Ok::<_, UpgradeError>((send, recv))
        };

        let (send, recv) = match timeout(self.config.open_timeout, open).await {
            Ok(streams) => streams?,
            Err(_) => {
                connection.close(0u32.into(), b"open timeout");
                return Err(UpgradeError::OpenTimeout(self.config.open_timeout));
            }
        };

        Ok(QuicDuplex::new(send, recv, connection, endpoint))
    }
}

/// Connect with the default configuration
pub async fn connect(uri: &str) -> Result<DuplexStream, NegotiateError> {
    Negotiator::default().connect(uri).await
}

/// Parse every `Alt-Svc` header on a response
///
/// Absent or malformed headers yield `None`; malformed ones are logged.
pub fn advertised_services(headers: &HeaderMap) -> Option<AltSvc> {
    let mut combined = String::new();
    for value in headers.get_all(header::ALT_SVC) {
        let Ok(text) = value.to_str() else {
            tracing::warn!(header = ?value, "Ignoring non-ASCII Alt-Svc header");
            return None;
        };
        if !combined.is_empty() {
            combined.push_str(", ");
        }
        combined.push_str(text);
    }

    if combined.is_empty() {
        return None;
    }

    match altsvc::parse(&combined) {
        Ok(alt_svc) => Some(alt_svc),
        Err(e) => {
            tracing::warn!(header = %combined, error = %e, "Ignoring malformed Alt-Svc header");
            None
        }
    }
}

/// Resolve `host:port`, preferring IPv4 when both families are offered
async fn resolve(host: &str, port: u16) -> Result<SocketAddr, UpgradeError> {
    let authority = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| UpgradeError::Resolve {
            authority: authority.clone(),
            source,
        })?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or(UpgradeError::NoAddress(authority))
}

async fn close_baseline(socket: &mut BaselineSocket) {
    if let Err(e) = socket.close(None).await {
        tracing::debug!(error = %e, "Closing baseline WebSocket failed");
    }
}
