//! Push delivery loop
//!
//! Shared by the WebSocket and QUIC handlers: wait for a wake token or the
//! heartbeat timer, write the current value, repeat until the peer goes away,
//! a write fails, or the broadcaster closes.

use std::io;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::broadcast::{Subscription, Value};

/// Transport-specific writer for one push connection
#[async_trait]
pub trait PushSink: Send {
    /// Write one value to the peer
    async fn deliver(&mut self, value: &Value) -> io::Result<()>;
}

/// Why a push loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEnd {
    /// The peer closed its side or its reader failed
    PeerClosed,
    /// Writing to the peer failed
    WriteFailed,
    /// The broadcaster was closed
    Shutdown,
}

/// Run the wait/deliver loop until a terminal condition.
///
/// The subscription is consumed and dropped on return, which removes it from
/// the registry. `peer_closed` resolves (or its sender is dropped) when the
/// connection's reader observes EOF or an error.
pub async fn run<S: PushSink>(
    mut subscription: Subscription,
    sink: &mut S,
    mut peer_closed: oneshot::Receiver<()>,
) -> PushEnd {
    let client_id = subscription.id();

    loop {
        tokio::select! {
            _ = &mut peer_closed => return PushEnd::PeerClosed,
            next = subscription.wait() => {
                let Some(value) = next else {
                    return PushEnd::Shutdown;
                };

                if let Err(e) = sink.deliver(&value).await {
                    tracing::debug!(client_id = %client_id, error = %e, "Push write failed");
                    return PushEnd::WriteFailed;
                }

                tracing::trace!(client_id = %client_id, version = value.version(), "Value pushed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Broadcaster;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelSink {
        tx: mpsc::UnboundedSender<String>,
        fail_after: Option<usize>,
    }

    #[async_trait]
    impl PushSink for ChannelSink {
        async fn deliver(&mut self, value: &Value) -> io::Result<()> {
            if let Some(remaining) = self.fail_after.as_mut() {
                if *remaining == 0 {
                    return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
                }
                *remaining -= 1;
            }
            self.tx
                .send(value.as_str().to_string())
                .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
        }
    }

    #[tokio::test]
    async fn test_delivers_until_peer_closes() {
        let broadcaster = Arc::new(Broadcaster::new());
        let subscription = broadcaster.subscribe().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut sink = ChannelSink { tx, fail_after: None };
            run(subscription, &mut sink, closed_rx).await
        });

        broadcaster.set_data("one");
        assert_eq!(rx.recv().await.unwrap(), "one");
        broadcaster.set_data("two");
        assert_eq!(rx.recv().await.unwrap(), "two");

        closed_tx.send(()).unwrap();
        assert_eq!(task.await.unwrap(), PushEnd::PeerClosed);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_unsubscribes() {
        let broadcaster = Arc::new(Broadcaster::new());
        let subscription = broadcaster.subscribe().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_closed_tx, closed_rx) = oneshot::channel();

        broadcaster.set_data("x");
        let mut sink = ChannelSink { tx, fail_after: Some(0) };
        let end = run(subscription, &mut sink, closed_rx).await;

        assert_eq!(end, PushEnd::WriteFailed);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_reader_counts_as_peer_closed() {
        let broadcaster = Arc::new(Broadcaster::new());
        let subscription = broadcaster.subscribe().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = oneshot::channel::<()>();
        drop(closed_tx);

        let mut sink = ChannelSink { tx, fail_after: None };
        let end = tokio::time::timeout(Duration::from_secs(1), run(subscription, &mut sink, closed_rx))
            .await
            .unwrap();

        assert_eq!(end, PushEnd::PeerClosed);
    }

    #[tokio::test]
    async fn test_shutdown_ends_loop() {
        let broadcaster = Arc::new(Broadcaster::new());
        let subscription = broadcaster.subscribe().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_closed_tx, closed_rx) = oneshot::channel();

        broadcaster.close();
        let mut sink = ChannelSink { tx, fail_after: None };

        assert_eq!(run(subscription, &mut sink, closed_rx).await, PushEnd::Shutdown);
    }
}
