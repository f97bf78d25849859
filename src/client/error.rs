//! Client error types

use std::io;
use std::time::Duration;

use tokio_tungstenite::tungstenite;

use crate::error::TlsError;

/// Error returned by [`Negotiator::connect`](super::Negotiator::connect)
#[derive(Debug, thiserror::Error)]
pub enum NegotiateError {
    /// URI has no host component
    #[error("URI has no host: {0}")]
    MissingHost(String),

    /// Baseline WebSocket handshake failed
    #[error("WebSocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),

    /// Upgrade failed and fallback is disabled
    #[error("transport upgrade failed: {0}")]
    Upgrade(#[from] UpgradeError),
}

/// Error raised while switching to the advertised alternative transport
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// No roots configured to verify the alternative endpoint
    #[error("no root certificates configured")]
    NoRootCertificates,

    /// Root store or client TLS configuration rejected
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Advertised authority did not resolve
    #[error("failed to resolve {authority}: {source}")]
    Resolve {
        /// `host:port` that was looked up
        authority: String,
        /// Resolver error
        #[source]
        source: io::Error,
    },

    /// Advertised authority resolved to nothing
    #[error("no address for {0}")]
    NoAddress(String),

    /// Local UDP endpoint could not be created
    #[error("failed to bind client endpoint: {0}")]
    Bind(#[from] io::Error),

    /// Connection parameters rejected before dialing
    #[error("dial rejected: {0}")]
    Connect(#[from] quinn::ConnectError),

    /// Handshake or stream setup failed
    #[error("connection failed: {0}")]
    Connection(#[from] quinn::ConnectionError),

    /// Handshake did not complete in time
    #[error("dial timed out after {0:?}")]
    DialTimeout(Duration),

    /// Stream could not be opened in time
    #[error("opening stream timed out after {0:?}")]
    OpenTimeout(Duration),

    /// Writing the stream opener failed
    #[error("stream write failed: {0}")]
    Write(#[from] quinn::WriteError),
}
