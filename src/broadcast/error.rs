//! Broadcaster error types

use super::registry::ClientId;

/// Error type for subscription management
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// The broadcaster has been closed and accepts no new subscribers
    #[error("broadcaster is closed")]
    Closed,

    /// An identity was registered twice without being removed in between
    #[error("client {0} is already registered")]
    DuplicateClient(ClientId),
}
