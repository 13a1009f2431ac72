//! # Event Classifier
//!
//! Decodes a raw webhook body plus its declared event-type header into the
//! closed [`WebhookEvent`] union.
//!
//! Unsupported event types fail with [`EventError::UnrecognizedEventKind`];
//! bodies that do not decode fail with [`EventError::MalformedPayload`]. Both
//! are request-level and non-fatal: the caller logs and drops the request.

pub mod payloads;

use crate::{redirect::RedirectTargets, RepositoryName};
use payloads::{
    CreatePayload, DeletePayload, ForkPayload, IssueCommentPayload, IssuePayload,
    PullRequestPayload, PushPayload, ReleasePayload, RepositoryPayload,
};
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Headers that carry the event discriminator, in lookup order.
pub const EVENT_TYPE_HEADERS: [&str; 3] = ["x-gitea-event", "x-gogs-event", "x-github-event"];

// ============================================================================
// Event Kinds
// ============================================================================

/// The event kinds the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    Create,
    Delete,
    Fork,
    Issue,
    IssueComment,
    Repository,
    Release,
    PullRequest,
}

impl EventKind {
    /// Header value the source-control server sends for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Fork => "fork",
            Self::Issue => "issues",
            Self::IssueComment => "issue_comment",
            Self::Repository => "repository",
            Self::Release => "release",
            Self::PullRequest => "pull_request",
        }
    }

    /// Whether events of this kind may be redirected to assignees by direct message.
    pub fn supports_redirect(&self) -> bool {
        matches!(self, Self::Issue | Self::IssueComment | Self::PullRequest)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "push" => Ok(Self::Push),
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "fork" => Ok(Self::Fork),
            "issues" => Ok(Self::Issue),
            "issue_comment" => Ok(Self::IssueComment),
            "repository" => Ok(Self::Repository),
            "release" => Ok(Self::Release),
            "pull_request" => Ok(Self::PullRequest),
            _ => Err(EventError::UnrecognizedEventKind {
                event_type: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// Webhook Event
// ============================================================================

/// A decoded webhook event.
///
/// Created per inbound request and discarded once dispatch completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Push(PushPayload),
    Create(CreatePayload),
    Delete(DeletePayload),
    Fork(ForkPayload),
    Issue(IssuePayload),
    IssueComment(IssueCommentPayload),
    Repository(RepositoryPayload),
    Release(ReleasePayload),
    PullRequest(PullRequestPayload),
}

impl WebhookEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Push(_) => EventKind::Push,
            Self::Create(_) => EventKind::Create,
            Self::Delete(_) => EventKind::Delete,
            Self::Fork(_) => EventKind::Fork,
            Self::Issue(_) => EventKind::Issue,
            Self::IssueComment(_) => EventKind::IssueComment,
            Self::Repository(_) => EventKind::Repository,
            Self::Release(_) => EventKind::Release,
            Self::PullRequest(_) => EventKind::PullRequest,
        }
    }

    /// Repository whose subscribers receive this event.
    ///
    /// Fork events route on the original repository (`forkee`), not on the new fork.
    pub fn repository(&self) -> RepositoryName {
        let full_name = match self {
            Self::Push(e) => &e.repository.full_name,
            Self::Create(e) => &e.repository.full_name,
            Self::Delete(e) => &e.repository.full_name,
            Self::Fork(e) => &e.forkee.full_name,
            Self::Issue(e) => &e.repository.full_name,
            Self::IssueComment(e) => &e.repository.full_name,
            Self::Repository(e) => &e.repository.full_name,
            Self::Release(e) => &e.repository.full_name,
            Self::PullRequest(e) => &e.repository.full_name,
        };
        RepositoryName::new(full_name)
    }

    /// Token the sender embedded in the payload.
    pub fn secret(&self) -> &str {
        match self {
            Self::Push(e) => &e.secret,
            Self::Create(e) => &e.secret,
            Self::Delete(e) => &e.secret,
            Self::Fork(e) => &e.secret,
            Self::Issue(e) => &e.secret,
            Self::IssueComment(e) => &e.secret,
            Self::Repository(e) => &e.secret,
            Self::Release(e) => &e.secret,
            Self::PullRequest(e) => &e.secret,
        }
    }

    /// Actor and assignees for kinds that can be redirected by direct message.
    ///
    /// Returns `None` for every other kind.
    pub fn redirect_targets(&self) -> Option<RedirectTargets<'_>> {
        match self {
            Self::Issue(e) => Some(RedirectTargets {
                sender: e.sender.as_ref().or(e.issue.user.as_ref()),
                assignee: e.issue.assignee.as_ref(),
                assignees: &e.issue.assignees,
            }),
            Self::IssueComment(e) => Some(RedirectTargets {
                sender: e.comment.user.as_ref().or(e.sender.as_ref()),
                assignee: e.issue.assignee.as_ref(),
                assignees: &e.issue.assignees,
            }),
            Self::PullRequest(e) => Some(RedirectTargets {
                sender: e.sender.as_ref().or(e.pull_request.user.as_ref()),
                assignee: e.pull_request.assignee.as_ref(),
                assignees: &e.pull_request.assignees,
            }),
            Self::Push(_)
            | Self::Create(_)
            | Self::Delete(_)
            | Self::Fork(_)
            | Self::Repository(_)
            | Self::Release(_) => None,
        }
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Decode `body` according to `event_type`.
///
/// Returns `Ok(None)` for a push carrying no commits. Gitea emits such a push
/// when a release is created; it must not produce a chat message.
///
/// # Errors
///
/// - [`EventError::UnrecognizedEventKind`] when `event_type` is not supported
/// - [`EventError::MalformedPayload`] when `body` does not decode as that kind
pub fn classify(event_type: &str, body: &[u8]) -> Result<Option<WebhookEvent>, EventError> {
    let kind: EventKind = event_type.parse()?;

    let event = match kind {
        EventKind::Push => WebhookEvent::Push(decode(kind, body)?),
        EventKind::Create => WebhookEvent::Create(decode(kind, body)?),
        EventKind::Delete => WebhookEvent::Delete(decode(kind, body)?),
        EventKind::Fork => WebhookEvent::Fork(decode(kind, body)?),
        EventKind::Issue => WebhookEvent::Issue(decode(kind, body)?),
        EventKind::IssueComment => WebhookEvent::IssueComment(decode(kind, body)?),
        EventKind::Repository => WebhookEvent::Repository(decode(kind, body)?),
        EventKind::Release => WebhookEvent::Release(decode(kind, body)?),
        EventKind::PullRequest => WebhookEvent::PullRequest(decode(kind, body)?),
    };

    if let WebhookEvent::Push(push) = &event {
        if push.commits.is_empty() {
            debug!(
                repository = %push.repository.full_name,
                git_ref = %push.git_ref,
                "Ignoring push without commits"
            );
            return Ok(None);
        }
    }

    Ok(Some(event))
}

fn decode<T: DeserializeOwned>(kind: EventKind, body: &[u8]) -> Result<T, EventError> {
    serde_json::from_slice(body).map_err(|source| EventError::MalformedPayload { kind, source })
}

// ============================================================================
// Error Types
// ============================================================================

/// Request-level classification failures
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Unrecognized event kind: '{event_type}'")]
    UnrecognizedEventKind { event_type: String },

    #[error("Malformed {kind} payload: {source}")]
    MalformedPayload {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
