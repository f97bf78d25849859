//! altcast: one value, broadcast three ways
//!
//! A [`Broadcaster`] holds a single string value and pushes every update to
//! its subscribers. The [`Server`] exposes it over HTTP as a one-shot poll,
//! an event stream and a WebSocket, and optionally over QUIC, which it
//! advertises through `Alt-Svc`. The [`client::Negotiator`] connects over
//! WebSocket and switches to the advertised QUIC endpoint when it can.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use altcast::{Broadcaster, Server, ServerConfig};
//!
//! # async fn example() -> altcast::error::Result<()> {
//! let broadcaster = Arc::new(Broadcaster::new());
//! let mut tick = 0u64;
//! broadcaster.spawn_source(Duration::from_secs(1), move || {
//!     tick += 1;
//!     format!("tick {tick}")
//! });
//!
//! let server = Server::with_broadcaster(ServerConfig::default(), broadcaster);
//! server.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await
//! # }
//! ```

pub mod altsvc;
pub mod broadcast;
pub mod client;
pub mod error;
pub mod server;
pub mod tls;

pub use altsvc::{AltService, AltSvc};
pub use broadcast::{BroadcastConfig, Broadcaster, Subscription, Value};
pub use client::{ClientConfig, DuplexStream, Negotiator, Transport};
pub use error::{Error, Result};
pub use server::{QuicConfig, Server, ServerConfig};
