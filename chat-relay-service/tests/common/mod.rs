//! Common test utilities for chat-relay-service integration tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chat_relay_service::config::BotConfig;
use chat_relay_service::services::{InMemoryChatLog, RelayService, SenderResolver, SessionConnector};
use chat_relay_service::startup::{build_router, AppState};
use secrecy::Secret;
use serde_json::Value;
use std::sync::{Arc, Once};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

pub const SECRET: &str = "test-secret";
pub const CONVERSATIONS_PATH: &str = "/v3/directline/conversations";

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,chat_relay_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Bot settings pointing at a mock Direct Line server with a short settle delay.
pub fn bot_config(service_url: &str) -> BotConfig {
    BotConfig {
        service_url: service_url.to_string(),
        direct_line_secret: Some(Secret::new(SECRET.to_string())),
        settle_delay: Duration::from_millis(10),
        request_timeout: Duration::from_secs(2),
        post_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

pub fn activities_path(conversation_id: &str) -> String {
    format!("{}/{}/activities", CONVERSATIONS_PATH, conversation_id)
}

/// Answer create-conversation with 201 and the given ids.
pub async fn mount_conversation(server: &MockServer, conversation_id: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path(CONVERSATIONS_PATH))
        .and(header("authorization", format!("Bearer {}", SECRET).as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "conversationId": conversation_id,
            "token": token,
            "expires_in": 1800
        })))
        .mount(server)
        .await;
}

/// Accept every posted activity with 200.
pub async fn mount_post_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path_regex(r"^/v3/directline/conversations/[^/]+/activities$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "act-1" })))
        .mount(server)
        .await;
}

/// Answer activity polls with a fixed set.
pub async fn mount_activities(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/v3/directline/conversations/[^/]+/activities$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub fn bot_activity(text: &str) -> Value {
    serde_json::json!({
        "type": "message",
        "id": "c1|0002",
        "timestamp": "2025-06-01T10:00:01Z",
        "from": { "id": "thm-bot", "name": "THM Bot" },
        "text": text
    })
}

pub fn user_activity(text: &str) -> Value {
    serde_json::json!({
        "type": "message",
        "id": "c1|0001",
        "timestamp": "2025-06-01T10:00:00Z",
        "from": { "id": "user123" },
        "text": text
    })
}

/// Router wired to a mock bot and an in-memory log.
pub struct TestApp {
    pub router: Router,
    pub connector: Arc<SessionConnector>,
    pub chat_log: Arc<InMemoryChatLog>,
}

impl TestApp {
    pub fn new(bot: BotConfig, chat_log: InMemoryChatLog) -> Self {
        Self::with_sender_resolver(bot, chat_log, SenderResolver::new(None))
    }

    pub fn with_sender_resolver(
        bot: BotConfig,
        chat_log: InMemoryChatLog,
        sender_resolver: SenderResolver,
    ) -> Self {
        init_tracing();

        let connector = Arc::new(SessionConnector::new(bot.clone()));
        let chat_log = Arc::new(chat_log);
        let relay = RelayService::new(connector.clone(), chat_log.clone(), &bot);

        let router = build_router(AppState {
            service_name: "chat-relay-service-test".to_string(),
            relay: Arc::new(relay),
            sender_resolver,
        });

        Self {
            router,
            connector,
            chat_log,
        }
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn post_chat(&self, body: &str) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("POST")
                .uri("/api/chat")
                .header("content-type", "application/json")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }
}
