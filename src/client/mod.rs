//! Upgrading client
//!
//! Connects over WebSocket, then switches to the QUIC endpoint the server
//! advertises in `Alt-Svc` when it can. Either way the caller gets one
//! [`DuplexStream`].
//!
//! ```no_run
//! use altcast::client::{ClientConfig, Negotiator};
//! use tokio::io::AsyncReadExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new().add_roots_from_pem("localhost.pem".as_ref())?;
//! let mut stream = Negotiator::new(config).connect("ws://localhost:8080").await?;
//!
//! let mut buf = [0u8; 64];
//! let n = stream.read(&mut buf).await?;
//! println!("{:?}: {}", stream.transport(), String::from_utf8_lossy(&buf[..n]));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod duplex;
pub mod error;
pub mod negotiator;

pub use config::ClientConfig;
pub use duplex::{DuplexStream, QuicDuplex, Transport, WsDuplex};
pub use error::{NegotiateError, UpgradeError};
pub use negotiator::{connect, Negotiator};
