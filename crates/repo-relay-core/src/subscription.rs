//! # Subscription Resolver
//!
//! Read-only view of the subscription store: which conversations receive
//! events for a repository. The store's lifecycle and schema belong to the
//! subscribe/unsubscribe path; adapters live in [`crate::adapters`].

use crate::{ConversationId, RepositoryName};
use async_trait::async_trait;

/// Resolves the conversations subscribed to a repository.
///
/// Implementations must tolerate concurrent calls from simultaneous webhook
/// requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Conversations subscribed to `repository`.
    ///
    /// Returns an empty list, not an error, when nothing is subscribed.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] when the store cannot be read. The whole
    /// webhook is then dropped; no conversation is delivered to.
    async fn resolve(
        &self,
        repository: &RepositoryName,
    ) -> Result<Vec<ConversationId>, SubscriptionError>;
}

/// Subscription store failures. Always fatal for the request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubscriptionError {
    #[error("Subscription store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Subscription store returned invalid data: {message}")]
    InvalidData { message: String },
}
