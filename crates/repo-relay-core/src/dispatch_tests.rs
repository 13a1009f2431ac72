//! Tests for the delivery dispatcher.

use super::*;
use crate::{
    derive_token, subscription::MockSubscriptionStore, transport::MockChatTransport,
    ChatUsername, ConversationId, RepositoryName, SharedSecret, TransportError, UserDirectory,
};
use serde_json::json;

const SHARED_SECRET: &str = "install-secret";

fn conv(id: &str) -> ConversationId {
    ConversationId::new(id).unwrap()
}

fn token(repository: &str, conversation: &str) -> String {
    derive_token(
        &RepositoryName::new(repository),
        &conv(conversation),
        &SharedSecret::new(SHARED_SECRET),
    )
    .to_string()
}

fn user(id: i64, login: &str) -> serde_json::Value {
    json!({ "id": id, "login": login, "username": login, "full_name": "" })
}

fn push_body(secret: &str, commit_count: usize) -> Vec<u8> {
    let commits: Vec<_> = (1..=commit_count)
        .map(|i| {
            json!({
                "id": format!("{i:040}"),
                "message": format!("change {i}"),
                "url": format!("https://git.example.com/Org/Proj/commit/{i}"),
            })
        })
        .collect();
    json!({
        "secret": secret,
        "ref": "refs/heads/main",
        "commits": commits,
        "repository": { "id": 7, "name": "Proj", "full_name": "Org/Proj" },
        "pusher": user(1, "alice"),
        "sender": user(1, "alice"),
    })
    .to_string()
    .into_bytes()
}

fn issue_body(secret: &str, sender_id: i64, assignee: (i64, &str)) -> Vec<u8> {
    json!({
        "secret": secret,
        "action": "opened",
        "number": 12,
        "issue": {
            "id": 100,
            "number": 12,
            "title": "Crash on start",
            "html_url": "https://git.example.com/org/proj/issues/12",
            "user": user(sender_id, "alice"),
            "assignee": user(assignee.0, assignee.1),
            "assignees": [user(assignee.0, assignee.1)],
        },
        "repository": { "id": 7, "name": "proj", "full_name": "org/proj" },
        "sender": user(sender_id, "alice"),
    })
    .to_string()
    .into_bytes()
}

fn dispatcher(
    store: MockSubscriptionStore,
    transport: MockChatTransport,
    direct_messages: bool,
) -> Dispatcher {
    let transport: Arc<dyn ChatTransport> = Arc::new(transport);
    let redirector = direct_messages.then(|| {
        let directory = UserDirectory::from_entries([(
            "bob".to_string(),
            ChatUsername::new("bob_kb").unwrap(),
        )]);
        DirectMessageRedirector::new(Arc::new(directory), transport.clone())
    });
    Dispatcher::new(
        Arc::new(store),
        transport,
        SecretValidator::new(SharedSecret::new(SHARED_SECRET)),
        MessageFormatter::new(None),
        redirector,
    )
}

mod broadcast {
    use super::*;

    #[tokio::test]
    async fn test_push_delivers_only_to_conversation_with_valid_token() {
        let mut store = MockSubscriptionStore::new();
        store
            .expect_resolve()
            .withf(|repo| repo.as_str() == "org/proj")
            .times(1)
            .returning(|_| Ok(vec![conv("conv-A"), conv("conv-B")]));

        let mut transport = MockChatTransport::new();
        transport
            .expect_send()
            .withf(|to, msg| to.as_str() == "conv-A" && msg.contains("pushed 3 commits"))
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = dispatcher(store, transport, false);
        let body = push_body(&token("org/proj", "conv-A"), 3);

        let report = dispatcher.handle("push", &body).await.unwrap();

        assert_eq!(
            report,
            DispatchReport::Broadcast(DeliverySummary {
                resolved: 2,
                delivered: 1,
                rejected: 1,
                failed: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_no_subscribers_is_not_an_error() {
        let mut store = MockSubscriptionStore::new();
        store.expect_resolve().times(1).returning(|_| Ok(vec![]));
        let mut transport = MockChatTransport::new();
        transport.expect_send().never();

        let dispatcher = dispatcher(store, transport, false);
        let report = dispatcher
            .handle("push", &push_body("anything", 1))
            .await
            .unwrap();

        let DispatchReport::Broadcast(summary) = report else {
            panic!("expected broadcast, got {report:?}");
        };
        assert_eq!(summary.resolved, 0);
        assert!(summary.is_complete());
    }

    #[tokio::test]
    async fn test_transport_failure_does_not_stop_remaining_conversations() {
        let mut store = MockSubscriptionStore::new();
        store
            .expect_resolve()
            .returning(|_| Ok(vec![conv("conv-A"), conv("conv-B")]));

        let mut transport = MockChatTransport::new();
        transport.expect_send().times(1).returning(|to, _| {
            Err(TransportError::Rejected {
                recipient: to.to_string(),
                message: "not a member".to_string(),
            })
        });

        let dispatcher = dispatcher(store, transport, false);
        let body = push_body(&token("org/proj", "conv-A"), 1);

        let report = dispatcher.handle("push", &body).await.unwrap();

        let DispatchReport::Broadcast(summary) = report else {
            panic!("expected broadcast, got {report:?}");
        };
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rejected, 1);
        assert!(!summary.is_complete());
    }

    #[tokio::test]
    async fn test_empty_push_is_ignored_without_downstream_calls() {
        let mut store = MockSubscriptionStore::new();
        store.expect_resolve().never();
        let mut transport = MockChatTransport::new();
        transport.expect_send().never();

        let dispatcher = dispatcher(store, transport, false);
        let report = dispatcher
            .handle("push", &push_body("anything", 0))
            .await
            .unwrap();

        assert_eq!(
            report,
            DispatchReport::Ignored {
                reason: IgnoreReason::EmptyPush
            }
        );
    }
}

mod request_failures {
    use super::*;

    #[tokio::test]
    async fn test_unrecognized_event_kind_makes_no_calls() {
        let mut store = MockSubscriptionStore::new();
        store.expect_resolve().never();
        let mut transport = MockChatTransport::new();
        transport.expect_send().never();
        transport.expect_send_direct().never();

        let dispatcher = dispatcher(store, transport, true);
        let err = dispatcher.handle("wiki", b"{}").await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Event(EventError::UnrecognizedEventKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let mut store = MockSubscriptionStore::new();
        store.expect_resolve().never();
        let transport = MockChatTransport::new();

        let dispatcher = dispatcher(store, transport, false);
        let err = dispatcher.handle("push", b"not json").await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Event(EventError::MalformedPayload { .. })
        ));
    }

    #[tokio::test]
    async fn test_store_failure_drops_whole_webhook() {
        let mut store = MockSubscriptionStore::new();
        store.expect_resolve().times(1).returning(|_| {
            Err(SubscriptionError::Unavailable {
                message: "database offline".to_string(),
            })
        });
        let mut transport = MockChatTransport::new();
        transport.expect_send().never();

        let dispatcher = dispatcher(store, transport, false);
        let err = dispatcher
            .handle("push", &push_body("anything", 2))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::SubscriptionStore(_)));
    }
}

mod direct_messages {
    use super::*;

    #[tokio::test]
    async fn test_assigned_issue_is_redirected_without_broadcast() {
        let mut store = MockSubscriptionStore::new();
        store
            .expect_resolve()
            .times(1)
            .returning(|_| Ok(vec![conv("conv-A")]));

        let mut transport = MockChatTransport::new();
        transport
            .expect_send_direct()
            .withf(|to, msg| to.as_str() == "bob_kb" && msg.contains("opened issue #12"))
            .times(1)
            .returning(|_, _| Ok(()));
        transport.expect_send().never();

        let dispatcher = dispatcher(store, transport, true);
        let body = issue_body(&token("org/proj", "conv-A"), 1, (2, "bob"));

        let report = dispatcher.handle("issues", &body).await.unwrap();

        assert_eq!(report, DispatchReport::Redirected { delivered: 1 });
    }

    #[tokio::test]
    async fn test_self_assigned_issue_falls_back_to_broadcast() {
        let mut store = MockSubscriptionStore::new();
        store
            .expect_resolve()
            .times(1)
            .returning(|_| Ok(vec![conv("conv-A")]));

        let mut transport = MockChatTransport::new();
        transport.expect_send_direct().never();
        transport
            .expect_send()
            .withf(|to, _| to.as_str() == "conv-A")
            .times(1)
            .returning(|_, _| Ok(()));

        let dispatcher = dispatcher(store, transport, true);
        let body = issue_body(&token("org/proj", "conv-A"), 1, (1, "alice"));

        let report = dispatcher.handle("issues", &body).await.unwrap();

        assert!(matches!(
            report,
            DispatchReport::Broadcast(DeliverySummary { delivered: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_direct_messages_disabled_always_broadcasts() {
        let mut store = MockSubscriptionStore::new();
        store
            .expect_resolve()
            .times(1)
            .returning(|_| Ok(vec![conv("conv-A")]));

        let mut transport = MockChatTransport::new();
        transport.expect_send_direct().never();
        transport.expect_send().times(1).returning(|_, _| Ok(()));

        let dispatcher = dispatcher(store, transport, false);
        assert!(!dispatcher.direct_messages_enabled());

        let body = issue_body(&token("org/proj", "conv-A"), 1, (2, "bob"));
        let report = dispatcher.handle("issues", &body).await.unwrap();

        assert!(matches!(report, DispatchReport::Broadcast(_)));
    }

    #[tokio::test]
    async fn test_hard_transport_failure_aborts_request() {
        let mut store = MockSubscriptionStore::new();
        store
            .expect_resolve()
            .times(1)
            .returning(|_| Ok(vec![conv("conv-A")]));

        let mut transport = MockChatTransport::new();
        transport.expect_send_direct().times(1).returning(|_, _| {
            Err(TransportError::Unavailable {
                message: "keybase service down".to_string(),
            })
        });
        transport.expect_send().never();

        let dispatcher = dispatcher(store, transport, true);
        let body = issue_body(&token("org/proj", "conv-A"), 1, (2, "bob"));

        let err = dispatcher.handle("issues", &body).await.unwrap_err();

        assert!(matches!(err, DispatchError::Redirect(_)));
    }

    #[tokio::test]
    async fn test_unauthenticated_payload_is_not_redirected() {
        let mut store = MockSubscriptionStore::new();
        store
            .expect_resolve()
            .times(1)
            .returning(|_| Ok(vec![conv("conv-A")]));

        let mut transport = MockChatTransport::new();
        transport.expect_send_direct().never();
        transport.expect_send().never();

        let dispatcher = dispatcher(store, transport, true);
        let body = issue_body("forged-token", 1, (2, "bob"));

        let report = dispatcher.handle("issues", &body).await.unwrap();

        assert_eq!(
            report,
            DispatchReport::Broadcast(DeliverySummary {
                resolved: 1,
                delivered: 0,
                rejected: 1,
                failed: 0,
            })
        );
    }

    #[tokio::test]
    async fn test_store_failure_blocks_redirect() {
        let mut store = MockSubscriptionStore::new();
        store.expect_resolve().times(1).returning(|_| {
            Err(SubscriptionError::Unavailable {
                message: "database offline".to_string(),
            })
        });

        let mut transport = MockChatTransport::new();
        transport.expect_send_direct().never();

        let dispatcher = dispatcher(store, transport, true);
        let body = issue_body(&token("org/proj", "conv-A"), 1, (2, "bob"));

        let err = dispatcher.handle("issues", &body).await.unwrap_err();

        assert!(matches!(err, DispatchError::SubscriptionStore(_)));
    }
}
