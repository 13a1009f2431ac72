//! # Repo-Relay Core
//!
//! Routing and delivery engine that relays source-control webhook events into
//! subscribed chat conversations.
//!
//! The pipeline for one inbound webhook is:
//!
//! 1. [`events::classify`] decodes the payload into a [`events::WebhookEvent`]
//! 2. [`formatting::MessageFormatter`] renders the chat message
//! 3. [`subscription::SubscriptionStore`] resolves subscribed conversations
//! 4. [`secret::SecretValidator`] authenticates the payload per conversation
//! 5. [`redirect::DirectMessageRedirector`] optionally delivers it to assignees,
//!    once the payload is authenticated for at least one conversation
//! 6. [`transport::ChatTransport`] sends the message
//!
//! [`dispatch::Dispatcher`] ties these steps together.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - All per-request data is request-local; only the store and the transport are shared
//!
//! ## Usage
//!
//! ```rust
//! use repo_relay_core::{ConversationId, RepositoryName};
//!
//! let repo = RepositoryName::new("Org/Proj");
//! assert_eq!(repo.as_str(), "org/proj");
//!
//! let conversation = ConversationId::new("conv-A").unwrap();
//! assert_eq!(conversation.as_str(), "conv-A");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod adapters;
pub mod dispatch;
pub mod events;
pub mod formatting;
pub mod redirect;
pub mod secret;
pub mod subscription;
pub mod transport;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Numeric source-control user identifier.
///
/// Self-notification suppression compares users by this value only, since
/// display names can collide or be absent. Signed because Gitea reports
/// deleted accounts as the ghost user with id `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    /// Create new user ID
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.parse::<i64>().map_err(|_| ParseError::InvalidFormat {
            expected: "integer".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self::new(id))
    }
}

/// Lower-cased repository full name (`owner/name`).
///
/// Repository names are matched case-insensitively, both for subscription
/// lookup and for secret derivation. Constructing this type is the single
/// place where the lower-casing happens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Create a repository name, lower-casing the input.
    pub fn new(full_name: impl AsRef<str>) -> Self {
        Self(full_name.as_ref().trim().to_lowercase())
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the name is empty (payload carried no repository).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RepositoryName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<RepositoryName> for String {
    fn from(value: RepositoryName) -> Self {
        value.0
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a chat conversation subscribed to repositories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    /// Create new conversation ID with validation
    ///
    /// # Validation Rules
    /// - Must not be empty
    /// - Must not contain whitespace
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "conversation_id".to_string(),
            });
        }

        if value.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidCharacters {
                field: "conversation_id".to_string(),
                invalid_chars: "whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConversationId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConversationId> for String {
    fn from(value: ConversationId) -> Self {
        value.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConversationId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Username on the chat system, the target of a direct message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatUsername(String);

impl ChatUsername {
    /// Create new chat username with validation
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "chat_username".to_string(),
            });
        }

        if value.chars().any(|c| c.is_whitespace() || c == ',') {
            return Err(ValidationError::InvalidCharacters {
                field: "chat_username".to_string(),
                invalid_chars: "whitespace or comma".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChatUsername {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChatUsername> for String {
    fn from(value: ChatUsername) -> Self {
        value.0
    }
}

impl fmt::Display for ChatUsername {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Validation errors for domain types and configuration values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// Re-export commonly used types
pub use dispatch::{DeliverySummary, DispatchError, DispatchReport, Dispatcher, IgnoreReason};
pub use events::{classify, EventError, EventKind, WebhookEvent};
pub use formatting::MessageFormatter;
pub use redirect::{
    DirectMessageRedirector, NotHandledReason, RedirectError, RedirectOutcome, RedirectTargets,
    UserDirectory,
};
pub use secret::{derive_token, validate_token, SecretToken, SecretValidator, SharedSecret};
pub use subscription::{SubscriptionError, SubscriptionStore};
pub use transport::{ChatTransport, TransportError};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
