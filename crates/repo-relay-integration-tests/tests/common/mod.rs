//! Common test utilities for repo-relay integration tests
//!
//! This module provides:
//! - Hand-written test doubles for the chat transport and subscription store
//! - A router builder wiring the real dispatcher around those doubles
//! - Webhook payload builders

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use repo_relay_api::{create_router, AppState, OperatorAlerts, ServiceConfig};
use repo_relay_core::{
    adapters::InMemorySubscriptionStore, derive_token, ChatTransport, ChatUsername,
    ConversationId, DirectMessageRedirector, Dispatcher, MessageFormatter, RepositoryName,
    SecretValidator, SharedSecret, SubscriptionError, SubscriptionStore, TransportError,
    UserDirectory,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

pub const SHARED_SECRET: &str = "install-secret";

// ============================================================================
// Chat transport double
// ============================================================================

/// One message handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Conversation { to: String, body: String },
    Direct { to: String, body: String },
}

/// Records every message and optionally refuses some recipients.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    rejected: Mutex<HashSet<String>>,
    offline: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the chat system refuse messages to `recipient`.
    pub fn reject(&self, recipient: &str) {
        self.rejected.lock().unwrap().insert(recipient.to_string());
    }

    /// Make every call fail as if the chat system were unreachable.
    pub fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn conversation_messages(&self) -> Vec<(String, String)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Conversation { to, body } => Some((to, body)),
                Sent::Direct { .. } => None,
            })
            .collect()
    }

    pub fn direct_messages(&self) -> Vec<(String, String)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Direct { to, body } => Some((to, body)),
                Sent::Conversation { .. } => None,
            })
            .collect()
    }

    fn deliver(&self, recipient: &str, sent: Sent) -> Result<(), TransportError> {
        if *self.offline.lock().unwrap() {
            return Err(TransportError::Unavailable {
                message: "chat service offline".to_string(),
            });
        }
        if self.rejected.lock().unwrap().contains(recipient) {
            return Err(TransportError::Rejected {
                recipient: recipient.to_string(),
                message: "not allowed".to_string(),
            });
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, conversation: &ConversationId, message: &str) -> Result<(), TransportError> {
        self.deliver(
            conversation.as_str(),
            Sent::Conversation {
                to: conversation.to_string(),
                body: message.to_string(),
            },
        )
    }

    async fn send_direct(&self, user: &ChatUsername, message: &str) -> Result<(), TransportError> {
        self.deliver(
            user.as_str(),
            Sent::Direct {
                to: user.to_string(),
                body: message.to_string(),
            },
        )
    }
}

// ============================================================================
// Subscription store double
// ============================================================================

/// Store whose backend is always down
#[allow(dead_code)]
pub struct UnavailableStore;

#[async_trait]
impl SubscriptionStore for UnavailableStore {
    async fn resolve(
        &self,
        _repository: &RepositoryName,
    ) -> Result<Vec<ConversationId>, SubscriptionError> {
        Err(SubscriptionError::Unavailable {
            message: "database offline".to_string(),
        })
    }
}

// ============================================================================
// Router builder
// ============================================================================

/// Builds a router around the real dispatcher with test doubles at the edges.
#[allow(dead_code)]
pub struct TestRelay {
    pub config: ServiceConfig,
    pub store: Arc<dyn SubscriptionStore>,
    pub transport: Arc<RecordingTransport>,
    pub user_map: Vec<(&'static str, &'static str)>,
    pub direct_messages: bool,
    pub alerts: Option<&'static str>,
}

#[allow(dead_code)]
impl TestRelay {
    pub fn new(transport: Arc<RecordingTransport>) -> Self {
        Self {
            config: ServiceConfig::default(),
            store: Arc::new(InMemorySubscriptionStore::new()),
            transport,
            user_map: Vec::new(),
            direct_messages: false,
            alerts: None,
        }
    }

    /// Subscribe conversations to `repository` in a fresh in-memory store.
    pub fn subscriptions(mut self, repository: &str, conversations: &[&str]) -> Self {
        let repository = RepositoryName::new(repository);
        self.store = Arc::new(InMemorySubscriptionStore::with_subscriptions(
            conversations
                .iter()
                .map(|c| (repository.clone(), conversation(c))),
        ));
        self
    }

    pub fn store(mut self, store: Arc<dyn SubscriptionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn direct_messages(mut self, user_map: &[(&'static str, &'static str)]) -> Self {
        self.direct_messages = true;
        self.user_map = user_map.to_vec();
        self
    }

    pub fn alerts(mut self, conversation: &'static str) -> Self {
        self.alerts = Some(conversation);
        self
    }

    pub fn build(self) -> Router {
        let transport: Arc<dyn ChatTransport> = self.transport.clone();

        let redirector = self.direct_messages.then(|| {
            let directory = UserDirectory::from_entries(self.user_map.iter().map(|(from, to)| {
                (from.to_string(), ChatUsername::new(*to).unwrap())
            }));
            DirectMessageRedirector::new(Arc::new(directory), transport.clone())
        });

        let dispatcher = Dispatcher::new(
            self.store,
            transport.clone(),
            SecretValidator::new(SharedSecret::new(SHARED_SECRET)),
            MessageFormatter::new(Some("https://git.example.com")),
            redirector,
        );

        let alerts = self
            .alerts
            .map(|c| OperatorAlerts::new(transport.clone(), conversation(c)));

        create_router(AppState::new(self.config, Arc::new(dispatcher), alerts))
    }
}

// ============================================================================
// Payload builders
// ============================================================================

#[allow(dead_code)]
pub fn conversation(id: &str) -> ConversationId {
    ConversationId::new(id).unwrap()
}

/// Token a subscription would have been handed for `repository` in `conversation`.
#[allow(dead_code)]
pub fn token(repository: &str, conversation_id: &str) -> String {
    derive_token(
        &RepositoryName::new(repository),
        &conversation(conversation_id),
        &SharedSecret::new(SHARED_SECRET),
    )
    .to_string()
}

#[allow(dead_code)]
pub fn user(id: i64, login: &str) -> Value {
    json!({ "id": id, "login": login, "username": login, "full_name": "" })
}

#[allow(dead_code)]
pub fn push_payload(secret: &str, repository: &str, commit_count: usize) -> Value {
    let commits: Vec<_> = (1..=commit_count)
        .map(|i| {
            json!({
                "id": format!("{i:040}"),
                "message": format!("change {i}\n\nlonger description"),
                "url": format!("https://git.example.com/{repository}/commit/{i}"),
            })
        })
        .collect();
    json!({
        "secret": secret,
        "ref": "refs/heads/main",
        "commits": commits,
        "repository": { "id": 7, "name": "proj", "full_name": repository },
        "pusher": user(1, "alice"),
        "sender": user(1, "alice"),
    })
}

#[allow(dead_code)]
pub fn issue_payload(secret: &str, sender: (i64, &str), assignee: Option<(i64, &str)>) -> Value {
    let assignee_json = assignee.map(|(id, login)| user(id, login));
    let assignees: Vec<Value> = assignee_json.iter().cloned().collect();
    json!({
        "secret": secret,
        "action": "opened",
        "number": 12,
        "issue": {
            "id": 100,
            "number": 12,
            "title": "Crash on start",
            "html_url": "https://git.example.com/org/proj/issues/12",
            "user": user(sender.0, sender.1),
            "assignee": assignee_json,
            "assignees": assignees,
        },
        "repository": { "id": 7, "name": "proj", "full_name": "org/proj" },
        "sender": user(sender.0, sender.1),
    })
}

/// POST a webhook to the default endpoint with the Gitea event header.
#[allow(dead_code)]
pub fn webhook_request(event_type: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-gitea-event", event_type)
        .body(Body::from(payload.to_string()))
        .unwrap()
}
