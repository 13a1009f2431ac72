//! Operator alerts for dropped webhooks.

use repo_relay_core::{ChatTransport, ConversationId};
use std::sync::Arc;
use tracing::warn;

/// Posts request-level failures into an operator conversation.
#[derive(Clone)]
pub struct OperatorAlerts {
    transport: Arc<dyn ChatTransport>,
    conversation: ConversationId,
}

impl OperatorAlerts {
    pub fn new(transport: Arc<dyn ChatTransport>, conversation: ConversationId) -> Self {
        Self {
            transport,
            conversation,
        }
    }

    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }

    /// Send `message` to the operator conversation. A failure is only logged.
    pub async fn report(&self, message: &str) {
        if let Err(e) = self.transport.send(&self.conversation, message).await {
            warn!(
                conversation = %self.conversation,
                error = %e,
                "Failed to send operator alert"
            );
        }
    }
}

impl std::fmt::Debug for OperatorAlerts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorAlerts")
            .field("conversation", &self.conversation)
            .finish_non_exhaustive()
    }
}
