//! Error types

use std::io;
use std::path::PathBuf;

use crate::broadcast::BroadcastError;
use crate::client::NegotiateError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Subscription management failure
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    /// Certificate or key loading failure
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Client connection negotiation failure
    #[error(transparent)]
    Negotiate(#[from] NegotiateError),

    /// Unusable configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Error type for certificate and key loading
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// PEM file could not be read or decoded
    #[error("failed to read {}: {source}", path.display())]
    Pem {
        /// File that failed
        path: PathBuf,
        /// Underlying decoding error
        #[source]
        source: quinn::rustls::pki_types::pem::Error,
    },

    /// Certificate file contains no certificates
    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    /// rustls rejected the certificate, key or root store
    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] quinn::rustls::Error),

    /// Cipher suites unusable for QUIC
    #[error(transparent)]
    NoInitialCipherSuite(#[from] quinn::crypto::rustls::NoInitialCipherSuite),
}
