//! Audit log rows, one per relay attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored row of `chat_messages`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatLogRecord {
    pub id: i64,
    pub session_id: String,
    pub sender: String,
    pub message: String,
    pub is_error: bool,
    pub created_at: DateTime<Utc>,
}

/// Values for a new log row; `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatLogEntry {
    pub session_id: String,
    pub sender: String,
    pub message: String,
    pub is_error: bool,
}
