//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::altsvc::AltService;
use crate::broadcast::BroadcastConfig;

/// Default listening port for both HTTP (TCP) and QUIC (UDP)
pub const DEFAULT_PORT: u16 = 8080;

/// Protocol id advertised for the QUIC endpoint
pub const QUIC_PROTOCOL_ID: &str = "h3";

/// QUIC endpoint configuration
#[derive(Debug, Clone)]
pub struct QuicConfig {
    /// UDP address to bind to
    pub bind_addr: SocketAddr,

    /// PEM certificate chain
    pub cert_path: PathBuf,

    /// PEM private key
    pub key_path: PathBuf,
}

impl QuicConfig {
    /// Create a QUIC config from a bind address and PEM file paths
    pub fn new(
        bind_addr: SocketAddr,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bind_addr,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP address for the HTTP surface
    pub bind_addr: SocketAddr,

    /// Broadcaster settings
    pub broadcast: BroadcastConfig,

    /// QUIC endpoint (None = HTTP only)
    pub quic: Option<QuicConfig>,

    /// `ma` parameter on the generated `Alt-Svc` header
    pub alt_svc_max_age: Option<u64>,

    /// Explicit `Alt-Svc` value, replacing the generated one
    pub advertise: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            broadcast: BroadcastConfig::default(),
            quic: None,
            alt_svc_max_age: None,
            advertise: None,
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the broadcaster configuration
    pub fn broadcast(mut self, broadcast: BroadcastConfig) -> Self {
        self.broadcast = broadcast;
        self
    }

    /// Set the maximum interval between deliveries
    pub fn max_message_interval(mut self, interval: Duration) -> Self {
        self.broadcast = self.broadcast.max_message_interval(interval);
        self
    }

    /// Enable the QUIC endpoint
    pub fn quic(mut self, quic: QuicConfig) -> Self {
        self.quic = Some(quic);
        self
    }

    /// Set the `ma` parameter of the advertisement
    pub fn alt_svc_max_age(mut self, seconds: u64) -> Self {
        self.alt_svc_max_age = Some(seconds);
        self
    }

    /// Advertise a fixed `Alt-Svc` value
    pub fn advertise(mut self, value: impl Into<String>) -> Self {
        self.advertise = Some(value.into());
        self
    }

    /// `Alt-Svc` value for a QUIC endpoint listening on `quic_port`
    pub fn alt_svc(&self, quic_port: Option<u16>) -> Option<String> {
        if let Some(ref value) = self.advertise {
            return Some(value.clone());
        }

        quic_port.map(|port| {
            let mut service = AltService::new(QUIC_PROTOCOL_ID, "", port);
            service.max_age = self.alt_svc_max_age;
            service.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.quic.is_none());
        assert!(config.advertise.is_none());
        assert_eq!(config.broadcast.max_message_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr, addr);
    }

    #[test]
    fn test_alt_svc_generated_from_quic_port() {
        let config = ServerConfig::default();

        assert_eq!(config.alt_svc(None), None);
        assert_eq!(config.alt_svc(Some(8443)).as_deref(), Some(r#"h3=":8443""#));

        let config = config.alt_svc_max_age(3600);
        assert_eq!(config.alt_svc(Some(8443)).as_deref(), Some(r#"h3=":8443"; ma=3600"#));
    }

    #[test]
    fn test_alt_svc_override() {
        let config = ServerConfig::default().advertise(r#"h3="alt.example.com:443""#);

        assert_eq!(config.alt_svc(None).as_deref(), Some(r#"h3="alt.example.com:443""#));
        assert_eq!(config.alt_svc(Some(8443)).as_deref(), Some(r#"h3="alt.example.com:443""#));
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_message_interval(Duration::from_millis(500))
            .quic(QuicConfig::new(addr, "cert.pem", "key.pem"));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.broadcast.max_message_interval, Duration::from_millis(500));
        assert_eq!(config.quic.unwrap().cert_path, PathBuf::from("cert.pem"));
    }
}
