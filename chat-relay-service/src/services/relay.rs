//! Boundary between the chat endpoint and the bot connector.
//!
//! Turns one inbound message into a [`ChatResponse`] and writes exactly one
//! log row for it, whatever the outcome.

use crate::config::BotConfig;
use crate::models::{ChatRequest, ChatResponse, FragmentKind, NewChatLogEntry, RelayStatus, ReplyFragment};
use crate::services::chat_log::ChatLog;
use crate::services::connector::{BotConnector, ConnectorError};
use crate::services::sender::SenderResolver;
use crate::services::{fallback, metrics};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Session id recorded when no conversation exists.
pub const NO_SESSION: &str = "no-session";
/// Session id recorded for echo-mode attempts.
pub const UNCONFIGURED_SESSION: &str = "unconfigured";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectedMessage {
    #[error("No message provided")]
    Empty,
}

/// What happened to one relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Replies(Vec<ReplyFragment>),
    ConnectorFailure(ConnectorError),
    /// No bot credential; the connector was never called.
    Unconfigured,
}

impl RelayOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Replies(r) if r.is_empty() => "no_reply",
            Self::Replies(_) => "replied",
            Self::ConnectorFailure(_) => "connector_failure",
            Self::Unconfigured => "unconfigured",
        }
    }

    fn is_error(&self) -> bool {
        !matches!(self, Self::Replies(_))
    }
}

pub struct RelayService {
    connector: Arc<dyn BotConnector>,
    chat_log: Arc<dyn ChatLog>,
    bot_configured: bool,
    sender_id: String,
    keyword_fallback: bool,
}

impl RelayService {
    pub fn new(connector: Arc<dyn BotConnector>, chat_log: Arc<dyn ChatLog>, bot: &BotConfig) -> Self {
        Self {
            connector,
            chat_log,
            bot_configured: bot.is_configured(),
            sender_id: bot.sender_id.clone(),
            keyword_fallback: bot.keyword_fallback,
        }
    }

    pub fn chat_log(&self) -> &Arc<dyn ChatLog> {
        &self.chat_log
    }

    pub fn bot_configured(&self) -> bool {
        self.bot_configured
    }

    /// Validate, relay, log and format one chat request.
    ///
    /// `client_ip` is turned into the log's sender attribution only once the
    /// message has been accepted.
    pub async fn handle(
        &self,
        request: &ChatRequest,
        sender_resolver: &SenderResolver,
        client_ip: &str,
    ) -> Result<ChatResponse, RejectedMessage> {
        let message = request.trimmed_message().ok_or(RejectedMessage::Empty)?;
        let sender = sender_resolver.resolve(client_ip).await;

        let session_before = self.connector.conversation_id().await;
        let outcome = self.relay(message).await;

        let session_id = match &outcome {
            RelayOutcome::Unconfigured => UNCONFIGURED_SESSION.to_string(),
            _ => self
                .connector
                .conversation_id()
                .await
                .or(session_before)
                .unwrap_or_else(|| NO_SESSION.to_string()),
        };

        metrics::record_relay_outcome(outcome.label());
        self.record(NewChatLogEntry {
            session_id,
            sender,
            message: message.to_string(),
            is_error: outcome.is_error(),
        })
        .await;

        Ok(self.respond(message, outcome))
    }

    /// Send `message` through the connector, or short-circuit when unconfigured.
    pub async fn relay(&self, message: &str) -> RelayOutcome {
        if !self.bot_configured {
            return RelayOutcome::Unconfigured;
        }

        match self.connector.relay(message, &self.sender_id).await {
            Ok(replies) => {
                info!(replies = replies.len(), "Message relayed");
                RelayOutcome::Replies(replies)
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Relay failed");
                metrics::record_connector_error(e.kind());
                RelayOutcome::ConnectorFailure(e)
            }
        }
    }

    /// Build the user-facing response for an outcome.
    pub fn respond(&self, message: &str, outcome: RelayOutcome) -> ChatResponse {
        match outcome {
            RelayOutcome::Replies(replies) if replies.is_empty() => ChatResponse::new(
                RelayStatus::Success,
                "Message sent but no response received",
                vec![ReplyFragment::now(
                    FragmentKind::Info,
                    "Message sent to bot, but no response received.",
                )],
            ),
            RelayOutcome::Replies(replies) => {
                ChatResponse::new(RelayStatus::Success, "Message sent successfully", replies)
            }
            RelayOutcome::ConnectorFailure(e) => {
                let mut replies = vec![ReplyFragment::now(
                    FragmentKind::Error,
                    format!("Bot Error: {}", e),
                )];
                let status = if self.keyword_fallback {
                    replies.push(ReplyFragment::now(
                        FragmentKind::Message,
                        fallback::canned_reply(message),
                    ));
                    RelayStatus::PartialSuccess
                } else {
                    RelayStatus::Error
                };
                ChatResponse::new(status, e.to_string(), replies)
            }
            RelayOutcome::Unconfigured => ChatResponse::new(
                RelayStatus::Error,
                "Bot not correctly configured. Please set BOT_DIRECT_LINE_SECRET environment variable.",
                vec![ReplyFragment::now(
                    FragmentKind::Message,
                    format!("Echo (bot not configured): {}", message),
                )],
            ),
        }
    }

    /// Write a log row; failures are reported and swallowed.
    pub async fn record(&self, entry: NewChatLogEntry) {
        if let Err(e) = self.chat_log.insert(&entry).await {
            metrics::record_log_write_failure();
            error!(error = %e, session_id = %entry.session_id, "Failed to write chat log entry");
        }
    }
}
