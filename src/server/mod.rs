//! Broadcast server
//!
//! One HTTP surface serves all three delivery modes, chosen per request by
//! [`Route::classify`]:
//!
//! | Request                          | Delivery                              |
//! |----------------------------------|---------------------------------------|
//! | `Upgrade: websocket`, any path   | WebSocket, binary frame per delivery  |
//! | `Accept: text/event-stream`      | event stream, `data: <value>\n\n`     |
//! | `/` otherwise                    | index page                            |
//! | `/favicon.ico` otherwise         | empty `200`                           |
//! | anything else (e.g. `/once`)     | one `data: <value>\n\n` block         |
//!
//! When a QUIC endpoint is configured, every HTTP response advertises it
//! with `Alt-Svc: h3=":<port>"`.

pub mod config;
pub mod handlers;
pub mod listener;
pub mod push;
pub mod quic;
pub mod router;

pub use config::{QuicConfig, ServerConfig};
pub use listener::{Listening, Server};
pub use quic::QuicServer;
pub use router::Route;
