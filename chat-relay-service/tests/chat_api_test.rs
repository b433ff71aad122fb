//! End-to-end tests of the HTTP surface with a mock bot and an in-memory log.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chat_relay_service::config::BotConfig;
use chat_relay_service::services::{InMemoryChatLog, SenderResolver, SessionState};
use common::*;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn unconfigured_bot_echoes_the_message() {
    let app = TestApp::new(BotConfig::default(), InMemoryChatLog::new());

    let (status, body) = app.post_chat(r#"{"message":"Stundenplan"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(
        body["message"],
        "Bot not correctly configured. Please set BOT_DIRECT_LINE_SECRET environment variable."
    );
    assert_eq!(body["bot_responses"][0]["text"], "Echo (bot not configured): Stundenplan");
    assert_eq!(body["bot_responses"][0]["type"], "message");

    let records = app.chat_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id, "unconfigured");
    assert_eq!(records[0].sender, "203.0.113.7");
    assert!(records[0].is_error);
}

#[tokio::test]
async fn blank_or_missing_message_is_rejected() {
    let app = TestApp::new(BotConfig::default(), InMemoryChatLog::new());

    for payload in [r#"{"message":"   "}"#, r#"{"message":""}"#, r#"{}"#] {
        let (status, body) = app.post_chat(payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {}", payload);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "No message provided");
        assert!(body.get("bot_responses").is_none());
    }

    assert!(app.chat_log.records().is_empty());
}

#[tokio::test]
async fn non_json_body_is_rejected() {
    let app = TestApp::new(BotConfig::default(), InMemoryChatLog::new());

    let (status, body) = app.post_chat("not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No JSON data received");
    assert!(app.chat_log.records().is_empty());
}

#[tokio::test]
async fn bot_replies_are_returned_and_logged() {
    let server = MockServer::start().await;
    mount_conversation(&server, "c1", "t1").await;
    mount_post_ok(&server).await;
    mount_activities(
        &server,
        json!({
            "activities": [user_activity("Hallo"), bot_activity("Hallo! Wie kann ich helfen?")],
            "watermark": "2"
        }),
    )
    .await;

    let app = TestApp::new(bot_config(&server.uri()), InMemoryChatLog::new());
    let (status, body) = app.post_chat(r#"{"message":"  Hallo  "}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Message sent successfully");
    assert_eq!(body["bot_responses"].as_array().unwrap().len(), 1);
    assert_eq!(body["bot_responses"][0]["text"], "Hallo! Wie kann ich helfen?");

    let records = app.chat_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id, "c1");
    assert_eq!(records[0].message, "Hallo");
    assert!(!records[0].is_error);
}

#[tokio::test]
async fn silent_bot_yields_info_fragment() {
    let server = MockServer::start().await;
    mount_conversation(&server, "c1", "t1").await;
    mount_post_ok(&server).await;
    mount_activities(&server, json!({ "activities": [], "watermark": "1" })).await;

    let app = TestApp::new(bot_config(&server.uri()), InMemoryChatLog::new());
    let (status, body) = app.post_chat(r#"{"message":"Hallo"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Message sent but no response received");
    assert_eq!(body["bot_responses"][0]["type"], "info");
}

#[tokio::test]
async fn rejected_credentials_are_reported_and_logged_as_error() {
    let server = MockServer::start().await;
    mount_conversation(&server, "c1", "t1").await;
    Mock::given(method("POST"))
        .and(path_regex(r"/activities$"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let app = TestApp::new(bot_config(&server.uri()), InMemoryChatLog::new());
    let (status, body) = app.post_chat(r#"{"message":"Hallo"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["bot_responses"][0]["type"], "error");
    assert!(body["bot_responses"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("Bot Error: "));

    let records = app.chat_log.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].is_error);
    // The conversation was dropped before the row was written.
    assert_eq!(records[0].session_id, "no-session");
    assert_eq!(app.connector.state().await, SessionState::Unstarted);
}

#[tokio::test]
async fn keyword_fallback_answers_when_bot_is_down() {
    let server = MockServer::start().await;
    mount_conversation(&server, "c1", "t1").await;
    Mock::given(method("POST"))
        .and(path_regex(r"/activities$"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut bot = bot_config(&server.uri());
    bot.keyword_fallback = true;
    let app = TestApp::new(bot, InMemoryChatLog::new());
    let (status, body) = app.post_chat(r#"{"message":"Wann ist die Rückmeldefrist?"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "partial_success");
    assert_eq!(body["bot_responses"][0]["type"], "error");
    assert!(body["bot_responses"][1]["text"]
        .as_str()
        .unwrap()
        .starts_with("Notbot: Die Rückmeldung"));
}

#[tokio::test]
async fn unreachable_bot_logs_no_session() {
    let app = TestApp::new(bot_config("http://127.0.0.1:1"), InMemoryChatLog::new());

    let (status, body) = app.post_chat(r#"{"message":"Hallo"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    let records = app.chat_log.records();
    assert_eq!(records[0].session_id, "no-session");
    assert!(records[0].is_error);
}

#[tokio::test]
async fn failing_log_does_not_affect_chat() {
    let app = TestApp::new(BotConfig::default(), InMemoryChatLog::failing());

    let (status, body) = app.post_chat(r#"{"message":"Hallo"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bot_responses"][0]["text"], "Echo (bot not configured): Hallo");
}

#[tokio::test]
async fn log_listing_returns_rows_in_insert_order() {
    let app = TestApp::new(BotConfig::default(), InMemoryChatLog::new());
    app.post_chat(r#"{"message":"eins"}"#).await;
    app.post_chat(r#"{"message":"zwei"}"#).await;

    let (status, body) = app.get("/api/get_execute_requests").await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["message"], "eins");
    assert_eq!(rows[1]["message"], "zwei");
    assert_eq!(rows[0]["is_error"], true);
}

#[tokio::test]
async fn test_action_writes_a_fixed_row() {
    let app = TestApp::new(BotConfig::default(), InMemoryChatLog::new());

    let (status, body) = app
        .request(
            Request::builder()
                .method("POST")
                .uri("/api/test-action")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "success", "message": "Test action triggered" }));
    assert_eq!(app.chat_log.records()[0].session_id, "test_session_123");
}

#[tokio::test]
async fn health_is_independent_of_the_log_store() {
    let app = TestApp::new(BotConfig::default(), InMemoryChatLog::failing());

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn index_page_renders_with_banner_when_unconfigured() {
    let app = TestApp::new(BotConfig::default(), InMemoryChatLog::new());

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Der Bot ist nicht konfiguriert"));
}

#[tokio::test]
async fn geo_lookup_only_runs_for_accepted_messages() {
    let geo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/json/203.0.113.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "regionName": "Hessen",
            "country": "Germany"
        })))
        .expect(1)
        .mount(&geo)
        .await;

    let app = TestApp::with_sender_resolver(
        BotConfig::default(),
        InMemoryChatLog::new(),
        SenderResolver::new(Some(format!("{}/json", geo.uri()))),
    );

    let (status, _) = app.post_chat(r#"{"message":"   "}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post_chat(r#"{"message":"Hallo"}"#).await;
    assert_eq!(status, StatusCode::OK);

    let records = app.chat_log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].sender, "203.0.113.7-Hessen-Germany");
}
