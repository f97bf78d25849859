//! Single-value broadcast engine
//!
//! The broadcaster holds one string and a registry of subscribers. Each
//! subscriber owns a small bounded wake-queue; `set_data` replaces the value
//! and pushes one token into every queue without blocking.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<Broadcaster>
//!                  ┌────────────────────────────┐
//!                  │ value: SharedValue         │
//!                  │ registry: RwLock<HashMap<  │
//!                  │   ClientId,                │
//!                  │   mpsc::Sender<()>,        │
//!                  │ >>                         │
//!                  └─────────────┬──────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [Source task]         [Subscription]          [Subscription]
//!   set_data(v)           wait() -> Value         wait() -> Value
//!        │                       │                       │
//!        └──► notify_all() ──► try_send(()) ──► SSE / WebSocket / QUIC
//! ```
//!
//! # Backpressure
//!
//! A subscriber that does not drain its queue fast enough has tokens dropped
//! instead of buffered. It is never disconnected for being slow; its next
//! delivery simply carries the latest value.

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod value;

pub use config::BroadcastConfig;
pub use engine::{Broadcaster, Subscription, MIN_SOURCE_INTERVAL};
pub use error::BroadcastError;
pub use registry::{ClientId, ClientRegistry, FanOut};
pub use value::{SharedValue, Value};
