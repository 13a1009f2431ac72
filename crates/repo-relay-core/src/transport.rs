//! # Chat Transport
//!
//! Outbound boundary to the chat system. The relay only needs two
//! operations: post into a conversation and message a user directly.

use crate::{ChatUsername, ConversationId};
use async_trait::async_trait;

/// Sends messages to the chat system.
///
/// Implementations are shared across requests and must tolerate concurrent calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post `message` into a subscribed conversation.
    async fn send(&self, conversation: &ConversationId, message: &str)
        -> Result<(), TransportError>;

    /// Send `message` privately to a chat user.
    async fn send_direct(&self, user: &ChatUsername, message: &str) -> Result<(), TransportError>;
}

/// Chat delivery failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The chat system refused this one message (unknown user, no access to
    /// the conversation, ...). Other recipients may still succeed.
    #[error("Chat delivery to {recipient} rejected: {message}")]
    Rejected { recipient: String, message: String },

    /// The chat system could not be reached at all.
    #[error("Chat transport unavailable: {message}")]
    Unavailable { message: String },
}

impl TransportError {
    /// Hard failures abort a direct-message redirect; soft ones only mark
    /// the recipient as not reached.
    pub fn is_hard(&self) -> bool {
        match self {
            Self::Rejected { .. } => false,
            Self::Unavailable { .. } => true,
        }
    }
}
