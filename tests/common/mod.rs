#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use altcast::server::QuicServer;
use altcast::{Broadcaster, Server, ServerConfig};
use quinn::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rcgen::CertifiedKey;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Server running on loopback for the duration of a test
pub struct TestServer {
    pub addr: SocketAddr,
    pub quic_addr: Option<SocketAddr>,
    pub alt_svc: Option<String>,
    pub broadcaster: Arc<Broadcaster>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<altcast::Result<()>>,
}

impl TestServer {
    pub async fn start(config: ServerConfig) -> Self {
        Self::start_with(config, None).await
    }

    pub async fn start_with(config: ServerConfig, cert: Option<&CertifiedKey>) -> Self {
        let broadcaster = Arc::new(Broadcaster::with_config(config.broadcast.clone()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let quic = cert.map(|cert| {
            QuicServer::bind_with_cert(
                "127.0.0.1:0".parse().unwrap(),
                vec![cert_der(cert)],
                key_der(cert),
                Arc::clone(&broadcaster),
            )
            .unwrap()
        });

        let listening =
            Server::with_broadcaster(config, Arc::clone(&broadcaster)).listening(listener, quic);
        let addr = listening.local_addr().unwrap();
        let quic_addr = listening.quic_addr();
        let alt_svc = listening.alt_svc().map(str::to_owned);

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(listening.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            quic_addr,
            alt_svc,
            broadcaster,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub async fn stop(mut self) -> altcast::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap()
    }
}

/// Poll until the broadcaster has `count` subscribers or `within` elapses
pub async fn wait_for_subscribers(broadcaster: &Broadcaster, count: usize, within: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if broadcaster.subscriber_count() == count {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Self-signed certificate valid for `localhost` and `127.0.0.1`
pub fn self_signed() -> CertifiedKey {
    rcgen::generate_simple_self_signed(vec!["localhost".into(), "127.0.0.1".into()]).unwrap()
}

pub fn cert_der(cert: &CertifiedKey) -> CertificateDer<'static> {
    cert.cert.der().clone()
}

pub fn key_der(cert: &CertifiedKey) -> PrivateKeyDer<'static> {
    PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der()))
}
