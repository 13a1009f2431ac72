//! # In-Memory Subscription Store
//!
//! Thread-safe in-memory implementation for testing and small deployments.

use crate::subscription::{SubscriptionError, SubscriptionStore};
use crate::{ConversationId, RepositoryName};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Subscriptions held in process memory
///
/// Cloning shares the underlying map, so a clone handed to the dispatcher sees
/// subscriptions added through another clone.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<HashMap<RepositoryName, BTreeSet<ConversationId>>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `(repository, conversation)` pairs
    pub fn with_subscriptions<I>(subscriptions: I) -> Self
    where
        I: IntoIterator<Item = (RepositoryName, ConversationId)>,
    {
        let mut map: HashMap<RepositoryName, BTreeSet<ConversationId>> = HashMap::new();
        for (repository, conversation) in subscriptions {
            map.entry(repository).or_default().insert(conversation);
        }
        Self {
            subscriptions: Arc::new(RwLock::new(map)),
        }
    }

    /// Subscribe a conversation. Returns `false` if it was already subscribed.
    pub async fn subscribe(
        &self,
        repository: RepositoryName,
        conversation: ConversationId,
    ) -> bool {
        self.subscriptions
            .write()
            .await
            .entry(repository)
            .or_default()
            .insert(conversation)
    }

    /// Remove a subscription. Returns `false` if there was none.
    pub async fn unsubscribe(
        &self,
        repository: &RepositoryName,
        conversation: &ConversationId,
    ) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let Some(conversations) = subscriptions.get_mut(repository) else {
            return false;
        };
        let removed = conversations.remove(conversation);
        if conversations.is_empty() {
            subscriptions.remove(repository);
        }
        removed
    }

    /// Conversations subscribed to `repository`, in sorted order
    pub async fn conversations_for(&self, repository: &RepositoryName) -> Vec<ConversationId> {
        self.subscriptions
            .read()
            .await
            .get(repository)
            .map(|conversations| conversations.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn resolve(
        &self,
        repository: &RepositoryName,
    ) -> Result<Vec<ConversationId>, SubscriptionError> {
        Ok(self.conversations_for(repository).await)
    }
}

#[cfg(test)]
#[path = "memory_subscriptions_tests.rs"]
mod tests;
