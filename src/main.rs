//! altcast server
//!
//! Broadcasts the local time once per second over poll, event stream and
//! WebSocket on `PORT`. When the certificate and key files exist, the same
//! port number also serves QUIC and every response advertises it with
//! `Alt-Svc`.
//!
//! Run with: cargo run -- --port 8080 --cert localhost.pem --key localhost-key.pem

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use altcast::{Broadcaster, QuicConfig, Server, ServerConfig};
use anyhow::Context;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Port for HTTP (TCP) and QUIC (UDP)
    #[arg(short, long, env = "PORT", default_value_t = altcast::server::config::DEFAULT_PORT)]
    port: u16,

    /// PEM certificate chain for QUIC
    #[arg(long, env = "CERT", default_value = "localhost.pem")]
    cert: PathBuf,

    /// PEM private key for QUIC
    #[arg(long, env = "KEY", default_value = "localhost-key.pem")]
    key: PathBuf,

    /// Seconds between clock updates
    #[arg(long, default_value_t = 1)]
    interval: u64,

    /// Seconds between heartbeat deliveries when the value is unchanged
    #[arg(long, default_value_t = 3)]
    max_message_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "altcast=info,tower_http=info".into()),
        )
        .init();

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let mut config = ServerConfig::with_addr(addr)
        .max_message_interval(Duration::from_secs(cli.max_message_interval));

    if cli.cert.exists() && cli.key.exists() {
        config = config.quic(QuicConfig::new(addr, &cli.cert, &cli.key));
    } else {
        tracing::info!(
            cert = %cli.cert.display(),
            key = %cli.key.display(),
            "Certificate or key missing, serving without QUIC"
        );
    }

    let broadcaster = Arc::new(Broadcaster::with_config(config.broadcast.clone()));
    let clock = broadcaster.spawn_source(Duration::from_secs(cli.interval.max(1)), || {
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    });

    let listening = Server::with_broadcaster(config, broadcaster)
        .bind()
        .await
        .context("failed to bind")?;

    match listening.alt_svc() {
        Some(alt_svc) => tracing::info!(
            quic = ?listening.quic_addr(),
            alt_svc,
            "Advertising QUIC endpoint"
        ),
        None => tracing::info!("No alternative transport advertised"),
    }

    listening
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
        })
        .await
        .context("server failed")?;

    clock.abort();
    Ok(())
}
