//! Subscriber registry
//!
//! Maps each live subscriber to the sending half of its wake-queue. Fan-out
//! takes the read lock; registration and removal take the write lock.

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::error::BroadcastError;

/// Process-unique subscriber identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub(super) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one notification round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    /// Subscribers that received a wake token
    pub notified: usize,
    /// Subscribers skipped because their queue was full
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct Clients {
    queues: HashMap<ClientId, mpsc::Sender<()>>,
    closed: bool,
}

/// Concurrency-safe map of subscriber wake-queues
#[derive(Debug, Default)]
pub struct ClientRegistry {
    inner: RwLock<Clients>,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wake-queue under `id`
    pub fn add(&self, id: ClientId, queue: mpsc::Sender<()>) -> Result<(), BroadcastError> {
        let mut clients = self.inner.write();

        if clients.closed {
            return Err(BroadcastError::Closed);
        }
        if clients.queues.contains_key(&id) {
            debug_assert!(false, "client {id} registered twice");
            return Err(BroadcastError::DuplicateClient(id));
        }

        clients.queues.insert(id, queue);
        Ok(())
    }

    /// Remove `id`, returning whether it was present
    pub fn remove(&self, id: ClientId) -> bool {
        self.inner.write().queues.remove(&id).is_some()
    }

    /// Check whether `id` is registered
    pub fn contains(&self, id: ClientId) -> bool {
        self.inner.read().queues.contains_key(&id)
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.inner.read().queues.len()
    }

    /// Check whether no subscriber is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push one wake token to every subscriber without blocking.
    ///
    /// Full queues are skipped. A closed queue means its handler is already
    /// gone and its guard will remove the entry; it counts as skipped.
    pub fn notify_all(&self) -> FanOut {
        let clients = self.inner.read();
        let mut fan_out = FanOut::default();

        for (id, queue) in clients.queues.iter() {
            match queue.try_send(()) {
                Ok(()) => fan_out.notified += 1,
                Err(TrySendError::Full(())) => {
                    tracing::trace!(client_id = %id, "Wake-queue full, skipping notification");
                    fan_out.skipped += 1;
                }
                Err(TrySendError::Closed(())) => {
                    fan_out.skipped += 1;
                }
            }
        }

        fan_out
    }

    /// Drop every wake-queue and refuse further registrations.
    ///
    /// Returns the number of subscribers that were removed.
    pub fn close(&self) -> usize {
        let mut clients = self.inner.write();
        clients.closed = true;
        let removed = clients.queues.len();
        clients.queues.clear();
        removed
    }

    /// Check whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_remove() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::channel(4);

        registry.add(ClientId::new(1), tx).unwrap();
        assert!(registry.contains(ClientId::new(1)));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(ClientId::new(1)));
        assert!(!registry.contains(ClientId::new(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        registry.add(ClientId::new(7), tx).unwrap();

        assert!(registry.remove(ClientId::new(7)));
        assert!(!registry.remove(ClientId::new(7)));
        assert!(!registry.remove(ClientId::new(8)));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_duplicate_add_rejected() {
        let registry = ClientRegistry::new();
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        registry.add(ClientId::new(1), tx1).unwrap();
        let result = registry.add(ClientId::new(1), tx2);

        assert_eq!(result, Err(BroadcastError::DuplicateClient(ClientId::new(1))));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    #[cfg(debug_assertions)]
    fn test_duplicate_add_asserts() {
        let registry = ClientRegistry::new();
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        registry.add(ClientId::new(1), tx1).unwrap();
        let _ = registry.add(ClientId::new(1), tx2);
    }

    #[test]
    fn test_notify_skips_full_queue() {
        let registry = ClientRegistry::new();
        let (fast_tx, mut fast_rx) = mpsc::channel(1);
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        registry.add(ClientId::new(1), fast_tx).unwrap();
        registry.add(ClientId::new(2), slow_tx).unwrap();

        let first = registry.notify_all();
        assert_eq!(first, FanOut { notified: 2, skipped: 0 });

        // Only the fast subscriber drains
        fast_rx.try_recv().unwrap();

        let second = registry.notify_all();
        assert_eq!(second, FanOut { notified: 1, skipped: 1 });

        // Slow subscriber is still registered
        assert!(registry.contains(ClientId::new(2)));
    }

    #[test]
    fn test_notify_counts_closed_queue_as_skipped() {
        let registry = ClientRegistry::new();
        let (tx, rx) = mpsc::channel(4);
        registry.add(ClientId::new(1), tx).unwrap();
        drop(rx);

        assert_eq!(registry.notify_all(), FanOut { notified: 0, skipped: 1 });
    }

    #[test]
    fn test_close_drops_queues_and_rejects_add() {
        let registry = ClientRegistry::new();
        let (tx, mut rx) = mpsc::channel(4);
        registry.add(ClientId::new(1), tx).unwrap();

        assert_eq!(registry.close(), 1);
        assert!(registry.is_closed());
        assert!(registry.is_empty());

        // Sender dropped, receiver sees the end of the queue
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        let (tx, _rx) = mpsc::channel(4);
        assert_eq!(registry.add(ClientId::new(2), tx), Err(BroadcastError::Closed));
    }
}
