//! Broadcaster configuration

use std::time::Duration;

/// Default maximum time between two deliveries to a subscriber
pub const DEFAULT_MAX_MESSAGE_INTERVAL: Duration = Duration::from_secs(3);

/// Default number of pending wake tokens per subscriber
pub const DEFAULT_WAKE_CAPACITY: usize = 4;

/// Configuration for a [`Broadcaster`](super::Broadcaster)
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Upper bound on the wait between deliveries.
    ///
    /// A subscriber receives the current value at least this often, even
    /// when nothing changed, so idle connections still see heartbeats.
    pub max_message_interval: Duration,

    /// Capacity of each subscriber's wake-queue (minimum 1)
    pub wake_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_message_interval: DEFAULT_MAX_MESSAGE_INTERVAL,
            wake_capacity: DEFAULT_WAKE_CAPACITY,
        }
    }
}

impl BroadcastConfig {
    /// Set the maximum interval between deliveries
    pub fn max_message_interval(mut self, interval: Duration) -> Self {
        self.max_message_interval = interval;
        self
    }

    /// Set the wake-queue capacity
    pub fn wake_capacity(mut self, capacity: usize) -> Self {
        self.wake_capacity = capacity.max(1);
        self
    }
}
