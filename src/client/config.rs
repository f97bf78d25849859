//! Client configuration

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use quinn::rustls::pki_types::CertificateDer;
use quinn::rustls::RootCertStore;

use crate::client::error::UpgradeError;
use crate::error::TlsError;
use crate::tls;

/// Protocol id the negotiator looks for in `Alt-Svc`
pub const DEFAULT_PROTOCOL_ID: &str = "h3";

/// Default bound on the alternative transport handshake
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound on opening the stream once connected
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(1);

/// Negotiator configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `Alt-Svc` protocol id to upgrade to
    pub protocol_id: String,

    /// Handshake timeout for the alternative transport
    pub dial_timeout: Duration,

    /// Stream open timeout for the alternative transport
    pub open_timeout: Duration,

    /// Keep the baseline connection when the upgrade fails
    pub fallback_on_upgrade_failure: bool,

    /// Trusted roots for the alternative endpoint
    pub roots: Vec<CertificateDer<'static>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol_id: DEFAULT_PROTOCOL_ID.into(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            fallback_on_upgrade_failure: true,
            roots: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the protocol id to look for
    pub fn protocol_id(mut self, id: impl Into<String>) -> Self {
        self.protocol_id = id.into();
        self
    }

    /// Set the handshake timeout
    pub fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the stream open timeout
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Fail the connect call instead of falling back when the upgrade fails
    pub fn strict(mut self) -> Self {
        self.fallback_on_upgrade_failure = false;
        self
    }

    /// Trust an additional root certificate
    pub fn add_root(mut self, cert: CertificateDer<'static>) -> Self {
        self.roots.push(cert);
        self
    }

    /// Trust every certificate in a PEM file
    pub fn add_roots_from_pem(mut self, path: &Path) -> Result<Self, TlsError> {
        self.roots.extend(tls::load_certs(path)?);
        Ok(self)
    }

    /// Build the QUIC client configuration from the trusted roots
    ///
    /// ALPN is set to the protocol id.
    pub fn quic_client_config(&self) -> Result<quinn::ClientConfig, UpgradeError> {
        if self.roots.is_empty() {
            return Err(UpgradeError::NoRootCertificates);
        }

        let mut store = RootCertStore::empty();
        for cert in &self.roots {
            store.add(cert.clone()).map_err(TlsError::Rustls)?;
        }

        let crypto = tls::client_crypto(store, self.protocol_id.as_bytes())?;
        Ok(quinn::ClientConfig::new(Arc::new(crypto)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();

        assert_eq!(config.protocol_id, "h3");
        assert_eq!(config.dial_timeout, Duration::from_secs(1));
        assert_eq!(config.open_timeout, Duration::from_secs(1));
        assert!(config.fallback_on_upgrade_failure);
        assert!(config.roots.is_empty());
    }

    #[test]
    fn test_builders() {
        let config = ClientConfig::new()
            .protocol_id("h3-29")
            .dial_timeout(Duration::from_millis(250))
            .open_timeout(Duration::from_millis(100))
            .strict();

        assert_eq!(config.protocol_id, "h3-29");
        assert_eq!(config.dial_timeout, Duration::from_millis(250));
        assert_eq!(config.open_timeout, Duration::from_millis(100));
        assert!(!config.fallback_on_upgrade_failure);
    }

    #[test]
    fn test_quic_config_needs_roots() {
        let result = ClientConfig::default().quic_client_config();

        assert!(matches!(result, Err(UpgradeError::NoRootCertificates)));
    }

    #[test]
    fn test_quic_config_with_root() {
        let generated = rcgen::generate_simple_self_signed(vec!["localhost".into()]).unwrap();
        let config = ClientConfig::new().add_root(generated.cert.der().clone());

        assert!(config.quic_client_config().is_ok());
    }
}
