//! Broadcaster implementation
//!
//! Owns the shared value and the subscriber registry. Writers call
//! [`Broadcaster::set_data`]; every streaming connection holds a
//! [`Subscription`] and loops on [`Subscription::wait`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::config::BroadcastConfig;
use super::error::BroadcastError;
use super::registry::{ClientId, ClientRegistry, FanOut};
use super::value::{SharedValue, Value};

/// Shortest period accepted by [`Broadcaster::spawn_source`]
pub const MIN_SOURCE_INTERVAL: Duration = Duration::from_millis(1);

/// Single-value broadcaster
///
/// Shared between handlers as `Arc<Broadcaster>`.
#[derive(Debug)]
pub struct Broadcaster {
    value: SharedValue,
    registry: ClientRegistry,
    next_client_id: AtomicU64,
    config: BroadcastConfig,
}

impl Broadcaster {
    /// Create a broadcaster with default configuration
    pub fn new() -> Self {
        Self::with_config(BroadcastConfig::default())
    }

    /// Create a broadcaster with custom configuration
    pub fn with_config(config: BroadcastConfig) -> Self {
        Self {
            value: SharedValue::new(),
            registry: ClientRegistry::new(),
            next_client_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the broadcaster configuration
    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    /// Replace the value and wake every subscriber.
    ///
    /// Never blocks on a subscriber: a full wake-queue is skipped for this
    /// round, and that subscriber picks up the latest value on its next
    /// delivery.
    pub fn set_data(&self, data: impl Into<String>) -> FanOut {
        let value = self.value.replace(data);
        let fan_out = self.registry.notify_all();

        tracing::trace!(
            version = value.version(),
            notified = fan_out.notified,
            skipped = fan_out.skipped,
            "Value broadcast"
        );

        fan_out
    }

    /// Current value snapshot
    pub fn current(&self) -> Value {
        self.value.load()
    }

    /// Register a new subscriber
    pub fn subscribe(self: &Arc<Self>) -> Result<Subscription, BroadcastError> {
        let id = ClientId::new(self.next_client_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.wake_capacity);

        self.registry.add(id, tx)?;

        tracing::debug!(
            client_id = %id,
            subscribers = self.registry.len(),
            "Subscriber added"
        );

        Ok(Subscription {
            id,
            wake: rx,
            broadcaster: Arc::clone(self),
        })
    }

    /// Remove a subscriber. Removing an absent id is a no-op.
    pub fn unsubscribe(&self, id: ClientId) -> bool {
        let removed = self.registry.remove(id);

        if removed {
            tracing::debug!(
                client_id = %id,
                subscribers = self.registry.len(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Get the subscriber registry
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Disconnect every subscriber and refuse new ones.
    ///
    /// Each open [`Subscription::wait`] returns `None` afterwards.
    pub fn close(&self) -> usize {
        let removed = self.registry.close();
        tracing::info!(subscribers = removed, "Broadcaster closed");
        removed
    }

    /// Check whether the broadcaster has been closed
    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }

    /// Spawn a task that publishes `source()` every `interval`
    ///
    /// `interval` is raised to [`MIN_SOURCE_INTERVAL`] if shorter. Returns a
    /// handle that can be used to abort the task.
    pub fn spawn_source<F>(
        self: &Arc<Self>,
        interval: Duration,
        mut source: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnMut() -> String + Send + 'static,
    {
        let broadcaster = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_SOURCE_INTERVAL));
            loop {
                ticker.tick().await;
                if broadcaster.is_closed() {
                    break;
                }
                broadcaster.set_data(source());
            }
        })
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered subscriber
///
/// Dropping the subscription removes it from the registry, so a handler that
/// returns for any reason releases its entry.
#[derive(Debug)]
pub struct Subscription {
    id: ClientId,
    wake: mpsc::Receiver<()>,
    broadcaster: Arc<Broadcaster>,
}

impl Subscription {
    /// Identity of this subscriber
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next delivery.
    ///
    /// Resolves with the current value after a wake token arrives or after
    /// the maximum message interval elapses, whichever comes first. Returns
    /// `None` once the broadcaster is closed.
    ///
    /// Cancel safe.
    pub async fn wait(&mut self) -> Option<Value> {
        let interval = self.broadcaster.config.max_message_interval;

        tokio::select! {
            token = self.wake.recv() => {
                token?;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        Some(self.broadcaster.current())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcaster.unsubscribe(self.id);
    }
}
