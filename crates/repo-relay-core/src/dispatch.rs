//! # Delivery Dispatcher
//!
//! Runs one webhook through the routing pipeline:
//!
//! 1. Classify the payload by its event header
//! 2. Render the chat message
//! 3. Resolve subscribed conversations
//! 4. For redirect-eligible kinds, try direct messages first; only when the
//!    payload token is valid for at least one subscribed conversation
//! 5. Per conversation: validate the payload token, then deliver
//!
//! Nothing is retried. Per-conversation failures (token mismatch, chat
//! rejection) are logged and skipped; only classification, store and redirect
//! failures abort the request.

use crate::{
    events::{classify, EventError},
    formatting::MessageFormatter,
    redirect::{DirectMessageRedirector, RedirectError, RedirectOutcome},
    secret::SecretValidator,
    subscription::{SubscriptionError, SubscriptionStore},
    transport::ChatTransport,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Report Types
// ============================================================================

/// Why a webhook produced no delivery at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Push without commits, as emitted alongside releases.
    EmptyPush,
}

/// Per-conversation results of a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Conversations returned by the subscription store.
    pub resolved: usize,
    pub delivered: usize,
    /// Conversations skipped because the payload token did not match.
    pub rejected: usize,
    /// Conversations the chat transport failed to deliver to.
    pub failed: usize,
}

impl DeliverySummary {
    /// True when every resolved conversation received the message.
    pub fn is_complete(&self) -> bool {
        self.delivered == self.resolved
    }
}

/// Outcome of a processed webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchReport {
    Ignored { reason: IgnoreReason },
    Redirected { delivered: usize },
    Broadcast(DeliverySummary),
}

/// Request-level failures; the webhook is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    SubscriptionStore(#[from] SubscriptionError),

    #[error(transparent)]
    Redirect(#[from] RedirectError),
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes classified webhooks to chat conversations and assignees.
///
/// Shared across requests; holds no per-request state.
pub struct Dispatcher {
    store: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn ChatTransport>,
    validator: SecretValidator,
    formatter: MessageFormatter,
    redirector: Option<DirectMessageRedirector>,
}

impl Dispatcher {
    /// Create a dispatcher. Direct-message mode is on when `redirector` is set.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn ChatTransport>,
        validator: SecretValidator,
        formatter: MessageFormatter,
        redirector: Option<DirectMessageRedirector>,
    ) -> Self {
        Self {
            store,
            transport,
            validator,
            formatter,
            redirector,
        }
    }

    pub fn direct_messages_enabled(&self) -> bool {
        self.redirector.is_some()
    }

    /// Process one webhook delivery.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Event`] for an unsupported event header or an
    ///   undecodable body; nothing is sent
    /// - [`DispatchError::SubscriptionStore`] when the store cannot be read;
    ///   no conversation is delivered to
    /// - [`DispatchError::Redirect`] when the chat system fails hard during a
    ///   direct-message redirect
    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn handle(
        &self,
        event_type: &str,
        body: &[u8],
    ) -> Result<DispatchReport, DispatchError> {
        let Some(event) = classify(event_type, body)? else {
            return Ok(DispatchReport::Ignored {
                reason: IgnoreReason::EmptyPush,
            });
        };

        let repository = event.repository();
        let message = self.formatter.format(&event);
        let conversations = self.store.resolve(&repository).await?;

        if let (Some(redirector), Some(targets)) = (&self.redirector, event.redirect_targets()) {
            let authenticated = conversations.iter().any(|conversation| {
                self.validator
                    .validate(event.secret(), &repository, conversation)
                    .is_ok()
            });

            if authenticated {
                match redirector.redirect(&targets, &message).await? {
                    RedirectOutcome::Handled { delivered } => {
                        info!(
                            repository = %repository,
                            kind = %event.kind(),
                            delivered,
                            "Notification redirected to assignees"
                        );
                        return Ok(DispatchReport::Redirected { delivered });
                    }
                    RedirectOutcome::NotHandled(reason) => {
                        debug!(
                            repository = %repository,
                            reason = ?reason,
                            "Direct-message redirect not handled, broadcasting"
                        );
                    }
                }
            } else {
                warn!(
                    repository = %repository,
                    "Payload token matches no subscribed conversation; not sending direct messages"
                );
            }
        }

        let mut summary = DeliverySummary {
            resolved: conversations.len(),
            ..Default::default()
        };

        for conversation in &conversations {
            if let Err(e) = self
                .validator
                .validate(event.secret(), &repository, conversation)
            {
                warn!(
                    repository = %repository,
                    conversation = %conversation,
                    error = %e,
                    "Skipping conversation with mismatched secret"
                );
                summary.rejected += 1;
                continue;
            }

            match self.transport.send(conversation, &message).await {
                Ok(()) => {
                    debug!(conversation = %conversation, "Delivered notification");
                    summary.delivered += 1;
                }
                Err(e) => {
                    warn!(
                        repository = %repository,
                        conversation = %conversation,
                        error = %e,
                        "Failed to deliver notification"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(
            repository = %repository,
            kind = %event.kind(),
            resolved = summary.resolved,
            delivered = summary.delivered,
            rejected = summary.rejected,
            failed = summary.failed,
            "Webhook dispatched"
        );

        Ok(DispatchReport::Broadcast(summary))
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
