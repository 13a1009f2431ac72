//! # Direct-Message Redirector
//!
//! Delivers issue, comment and pull request notifications privately to the
//! assignees instead of broadcasting them to subscribed conversations.
//!
//! Recipients are the primary assignee plus every listed assignee, minus the
//! actor who triggered the event and minus duplicates. Each recipient is
//! mapped to a chat user through the [`UserDirectory`]; recipients without an
//! entry are skipped.
//!
//! The redirect only counts as [`RedirectOutcome::Handled`] when at least one
//! message went out and no mapped recipient was rejected. Any other outcome
//! leaves delivery to the conversation broadcast.

use crate::{
    events::payloads::User, transport::TransportError, ChatTransport, ChatUsername, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Inputs
// ============================================================================

/// Actor and assignees of a redirect-eligible event.
#[derive(Debug, Clone, Copy)]
pub struct RedirectTargets<'a> {
    pub sender: Option<&'a User>,
    pub assignee: Option<&'a User>,
    pub assignees: &'a [User],
}

/// Source-control username to chat username mapping.
///
/// Built once from configuration and immutable afterwards. Lookups ignore
/// case, matching how Gitea treats usernames.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    entries: HashMap<String, ChatUsername>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, ChatUsername)>,
    {
        let entries = entries
            .into_iter()
            .map(|(username, chat_user)| (username.to_lowercase(), chat_user))
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, username: &str) -> Option<&ChatUsername> {
        self.entries.get(&username.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of a redirect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// Every mapped recipient received the message; skip the broadcast.
    Handled { delivered: usize },

    /// Fall back to the conversation broadcast.
    NotHandled(NotHandledReason),
}

impl RedirectOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotHandledReason {
    /// No sender, no assignees, or an empty directory.
    Declined,

    /// Every assignee was the sender or a duplicate.
    NoRecipients,

    /// Nobody was reached, or the chat system rejected a mapped recipient.
    Incomplete {
        delivered: usize,
        unmapped: usize,
        rejected: usize,
    },
}

/// A hard transport failure aborted the redirect.
#[derive(Debug, thiserror::Error)]
#[error("Direct message delivery aborted: {source}")]
pub struct RedirectError {
    #[from]
    pub source: TransportError,
}

// ============================================================================
// Redirector
// ============================================================================

pub struct DirectMessageRedirector {
    directory: Arc<UserDirectory>,
    transport: Arc<dyn ChatTransport>,
}

impl DirectMessageRedirector {
    pub fn new(directory: Arc<UserDirectory>, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            directory,
            transport,
        }
    }

    /// Try to deliver `message` to the assignees in `targets`.
    ///
    /// # Errors
    ///
    /// Returns [`RedirectError`] on the first hard transport failure; the
    /// remaining recipients are not attempted.
    #[instrument(skip(self, targets, message))]
    pub async fn redirect(
        &self,
        targets: &RedirectTargets<'_>,
        message: &str,
    ) -> Result<RedirectOutcome, RedirectError> {
        let Some(sender) = targets.sender else {
            return Ok(RedirectOutcome::NotHandled(NotHandledReason::Declined));
        };
        if (targets.assignee.is_none() && targets.assignees.is_empty())
            || self.directory.is_empty()
        {
            return Ok(RedirectOutcome::NotHandled(NotHandledReason::Declined));
        }

        let candidates = recipients(sender, targets.assignee, targets.assignees);
        if candidates.is_empty() {
            debug!(sender = %sender.username(), "All assignees filtered out");
            return Ok(RedirectOutcome::NotHandled(NotHandledReason::NoRecipients));
        }

        let (mut delivered, mut unmapped, mut rejected) = (0, 0, 0);
        for user in candidates {
            let Some(chat_user) = self.directory.lookup(user.username()) else {
                debug!(username = %user.username(), "No chat user mapped for assignee");
                unmapped += 1;
                continue;
            };

            match self.transport.send_direct(chat_user, message).await {
                Ok(()) => {
                    delivered += 1;
                }
                Err(e) if e.is_hard() => return Err(RedirectError::from(e)),
                Err(e) => {
                    warn!(chat_user = %chat_user, error = %e, "Direct message rejected");
                    rejected += 1;
                }
            }
        }

        if delivered > 0 && rejected == 0 {
            info!(delivered, unmapped, "Delivered notification by direct message");
            Ok(RedirectOutcome::Handled { delivered })
        } else {
            Ok(RedirectOutcome::NotHandled(NotHandledReason::Incomplete {
                delivered,
                unmapped,
                rejected,
            }))
        }
    }
}

/// Users to notify: the primary assignee, then listed assignees, never the
/// sender and never the same id twice.
pub fn recipients<'a>(
    sender: &User,
    assignee: Option<&'a User>,
    assignees: &'a [User],
) -> Vec<&'a User> {
    let mut seen: HashSet<UserId> = HashSet::from([sender.user_id()]);
    assignee
        .into_iter()
        .chain(assignees)
        .filter(|user| seen.insert(user.user_id()))
        .collect()
}

#[cfg(test)]
#[path = "redirect_tests.rs"]
mod tests;
