//! Dial an altcast server
//!
//! Connects over WebSocket, upgrades to QUIC when the server advertises it,
//! then copies the stream to stdout and stdin to the stream.
//!
//! Run with: cargo run --bin dial -- ws://localhost:8080 --ca localhost.pem

use std::path::PathBuf;

use altcast::client::{ClientConfig, Negotiator};
use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncWriteExt;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// WebSocket URI of the server
    #[arg(default_value = "ws://localhost:8080")]
    uri: String,

    /// PEM root certificate trusted for the QUIC endpoint
    #[arg(long, env = "CA")]
    ca: Option<PathBuf>,

    /// Fail instead of staying on WebSocket when the upgrade fails
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "altcast=info,dial=info".into()),
        )
        .init();

    let mut config = ClientConfig::new();
    if let Some(ref ca) = cli.ca {
        config = config.add_roots_from_pem(ca)?;
    }
    if cli.strict {
        config = config.strict();
    }

    let stream = Negotiator::new(config)
        .connect(&cli.uri)
        .await
        .with_context(|| format!("failed to connect to {}", cli.uri))?;
    tracing::info!(uri = %cli.uri, transport = ?stream.transport(), "Connected");

    let (mut reader, mut writer) = tokio::io::split(stream);

    let upstream = tokio::spawn(async move {
        let mut stdin = tokio::io::stdin();
        tokio::io::copy(&mut stdin, &mut writer).await?;
        writer.shutdown().await
    });

    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut reader, &mut stdout).await?;
    stdout.flush().await?;

    upstream.abort();
    Ok(())
}
