//! Read access to the chat log and the manual test hook.

use crate::models::{ChatLogRecord, NewChatLogEntry};
use crate::startup::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// All log rows. An unreachable store yields an empty list.
pub async fn get_execute_requests(State(state): State<AppState>) -> Json<Vec<ChatLogRecord>> {
    match state.relay.chat_log().list_all().await {
        Ok(records) => Json(records),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch chat messages");
            Json(Vec::new())
        }
    }
}

/// Write a fixed row, to check the log store end to end.
pub async fn test_action(State(state): State<AppState>) -> Json<Value> {
    state
        .relay
        .record(NewChatLogEntry {
            session_id: "test_session_123".to_string(),
            sender: "test_user".to_string(),
            message: "This is a test message from the test button.".to_string(),
            is_error: false,
        })
        .await;

    tracing::info!("Test action triggered");
    Json(json!({ "status": "success", "message": "Test action triggered" }))
}
