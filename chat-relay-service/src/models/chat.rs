//! Request/response shapes of the `/api/chat` endpoint.

use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatRequest {
    /// The trimmed message, or `None` when missing or blank.
    pub fn trimmed_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Message,
    Error,
    Info,
}

/// One entry of `bot_responses`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyFragment {
    pub text: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: FragmentKind,
}

impl ReplyFragment {
    /// A fragment stamped with the current time.
    pub fn now(kind: FragmentKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now().to_rfc3339(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatus {
    Success,
    Error,
    PartialSuccess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub status: RelayStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_responses: Option<Vec<ReplyFragment>>,
}

impl ChatResponse {
    pub fn new(status: RelayStatus, message: impl Into<String>, replies: Vec<ReplyFragment>) -> Self {
        Self {
            status,
            message: message.into(),
            bot_responses: Some(replies),
        }
    }

    /// Client error without any bot responses (bad or empty input).
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: RelayStatus::Error,
            message: message.into(),
            bot_responses: None,
        }
    }

    /// Server fault: error status with a single error fragment.
    pub fn server_error(detail: &str) -> Self {
        Self::new(
            RelayStatus::Error,
            format!("Server error: {}", detail),
            vec![ReplyFragment::now(
                FragmentKind::Error,
                format!("Server Error: {}", detail),
            )],
        )
    }

    pub fn replies(&self) -> &[ReplyFragment] {
        self.bot_responses.as_deref().unwrap_or_default()
    }
}
