//! # File Subscription Store
//!
//! Reads subscriptions from a YAML or JSON document on disk:
//!
//! ```yaml
//! subscriptions:
//!   - repository: org/proj
//!     conversations: [conv-A, conv-B]
//! ```
//!
//! The file is re-read on every resolve so that the subscribe path can edit
//! it while the relay is running.

use crate::subscription::{SubscriptionError, SubscriptionStore};
use crate::{ConversationId, RepositoryName};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct SubscriptionDocument {
    #[serde(default)]
    subscriptions: Vec<SubscriptionEntry>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionEntry {
    repository: RepositoryName,
    #[serde(default)]
    conversations: Vec<ConversationId>,
}

/// File-backed subscription store
///
/// # Examples
///
/// ```no_run
/// use repo_relay_core::adapters::FileSubscriptionStore;
/// use repo_relay_core::{RepositoryName, SubscriptionStore};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = FileSubscriptionStore::new("/var/lib/repo-relay/subscriptions.yaml");
/// let conversations = store.resolve(&RepositoryName::new("org/proj")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FileSubscriptionStore {
    path: PathBuf,
}

impl FileSubscriptionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<SubscriptionDocument, SubscriptionError> {
        let contents = fs::read_to_string(&self.path).await.map_err(|e| {
            SubscriptionError::Unavailable {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            }
        })?;

        if contents.trim().is_empty() {
            return Ok(SubscriptionDocument::default());
        }

        serde_yaml::from_str(&contents).map_err(|e| SubscriptionError::InvalidData {
            message: format!("Failed to parse {}: {}", self.path.display(), e),
        })
    }
}

#[async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn resolve(
        &self,
        repository: &RepositoryName,
    ) -> Result<Vec<ConversationId>, SubscriptionError> {
        let document = self.load().await?;

        let conversations: BTreeSet<ConversationId> = document
            .subscriptions
            .into_iter()
            .filter(|entry| &entry.repository == repository)
            .flat_map(|entry| entry.conversations)
            .collect();

        debug!(
            repository = %repository,
            count = conversations.len(),
            path = %self.path.display(),
            "Resolved subscriptions from file"
        );

        Ok(conversations.into_iter().collect())
    }
}

#[cfg(test)]
#[path = "file_subscriptions_tests.rs"]
mod tests;
