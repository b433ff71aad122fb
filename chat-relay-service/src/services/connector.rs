//! Direct Line session connector.
//!
//! Owns the single conversation the relay talks through: its id, the session
//! token handed out by the bot service and the watermark of the last poll.
//! All callers share one connector, so the session is process-wide. The
//! session lock is never held across a network call; concurrent relays
//! therefore race on the watermark the same way a single shared conversation
//! always has. Conversation creation is serialized separately so concurrent
//! first relays end up in the same conversation, and every post is polled on
//! the conversation it went to.

use crate::config::BotConfig;
use crate::models::{Activity, ActivitySet, Conversation, FragmentKind, ReplyFragment};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("Failed to start conversation with bot: {0}")]
    SessionStartFailed(String),

    #[error("Bot service rejected the credentials (HTTP {0})")]
    AuthFailed(u16),

    #[error("Bot service unavailable (HTTP {0})")]
    UpstreamUnavailable(u16),

    #[error("Bot returned error {0}")]
    UpstreamError(u16),

    #[error("Network error talking to bot service: {0}")]
    Network(String),

    #[error("No bot session: {0}")]
    NoSession(Box<ConnectorError>),

    #[error("Invalid response from bot service: {0}")]
    InvalidResponse(String),
}

impl ConnectorError {
    /// Map a non-success HTTP status from the bot service.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthFailed(status.as_u16()),
            code if status.is_server_error() => Self::UpstreamUnavailable(code),
            code => Self::UpstreamError(code),
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStartFailed(_) => "session_start_failed",
            Self::AuthFailed(_) => "auth_failed",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::UpstreamError(_) => "upstream_error",
            Self::Network(_) => "network",
            Self::NoSession(_) => "no_session",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::Network(format!("connection failed: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Conversation identity, credential and read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub conversation_id: Option<String>,
    pub token: Option<String>,
    pub watermark: Option<String>,
    /// Sender id used for the most recent post; replies from it are dropped.
    pub sender_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Active,
}

impl Session {
    pub fn state(&self) -> SessionState {
        if self.conversation_id.is_some() {
            SessionState::Active
        } else {
            SessionState::Unstarted
        }
    }

    /// Move the cursor forward. A missing or numerically older watermark
    /// leaves the current one in place.
    pub fn advance_watermark(&mut self, next: Option<String>) {
        let Some(next) = next else {
            return;
        };
        if let (Some(current), Ok(next_pos)) = (self.watermark.as_deref(), next.parse::<u64>()) {
            if let Ok(current_pos) = current.parse::<u64>() {
                if next_pos < current_pos {
                    return;
                }
            }
        }
        self.watermark = Some(next);
    }
}

/// The seam between the relay boundary and the bot service.
#[async_trait]
pub trait BotConnector: Send + Sync {
    /// Post `message` as `sender_id` and return the bot's replies.
    async fn relay(
        &self,
        message: &str,
        sender_id: &str,
    ) -> Result<Vec<ReplyFragment>, ConnectorError>;

    /// Current conversation id, if a session is active.
    async fn conversation_id(&self) -> Option<String>;
}

pub struct SessionConnector {
    client: Client,
    config: BotConfig,
    session: RwLock<Session>,
    create_lock: Mutex<()>,
}

impl SessionConnector {
    pub fn new(config: BotConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: BotConfig) -> Self {
        Self {
            client,
            config,
            session: RwLock::new(Session::default()),
            create_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the session state.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.session.read().await.state()
    }

    /// Drop the conversation so the next relay starts a new one.
    pub async fn reset(&self) {
        *self.session.write().await = Session::default();
    }

    fn conversations_url(&self) -> String {
        format!("{}/v3/directline/conversations", self.config.service_url)
    }

    fn activities_url(&self, conversation_id: &str) -> String {
        format!(
            "{}/v3/directline/conversations/{}/activities",
            self.config.service_url, conversation_id
        )
    }

    /// Start a conversation unless one is already active.
    #[instrument(skip(self))]
    pub async fn ensure_session(&self) -> Result<(), ConnectorError> {
        if self.session.read().await.conversation_id.is_some() {
            return Ok(());
        }

        let _creating = self.create_lock.lock().await;
        if self.session.read().await.conversation_id.is_some() {
            return Ok(());
        }

        let secret = self
            .config
            .direct_line_secret
            .as_ref()
            .map(|s| s.expose_secret().clone())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ConnectorError::SessionStartFailed("no Direct Line secret configured".to_string())
            })?;

        let response = self
            .client
            .post(self.conversations_url())
            .bearer_auth(&secret)
            .header("Content-Type", "application/json")
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Error starting conversation");
                ConnectorError::SessionStartFailed(ConnectorError::from(e).to_string())
            })?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Failed to start conversation");
            return Err(ConnectorError::SessionStartFailed(format!(
                "bot service answered HTTP {}",
                status.as_u16()
            )));
        }

        let conversation: Conversation = response.json().await.map_err(|e| {
            warn!(error = %e, "Unreadable create-conversation response");
            ConnectorError::SessionStartFailed(format!("unreadable response: {}", e))
        })?;

        let mut session = self.session.write().await;
        info!(conversation_id = %conversation.conversation_id, "Started conversation");
        *session = Session {
            conversation_id: Some(conversation.conversation_id),
            token: Some(conversation.token.unwrap_or(secret)),
            watermark: None,
            sender_id: None,
        };

        Ok(())
    }

    /// Post a message and collect the replies that arrived after the settle delay.
    #[instrument(skip(self, message), fields(message_len = message.len()))]
    pub async fn relay(
        &self,
        message: &str,
        sender_id: &str,
    ) -> Result<Vec<ReplyFragment>, ConnectorError> {
        self.ensure_session()
            .await
            .map_err(|e| ConnectorError::NoSession(Box::new(e)))?;

        let (conversation_id, token) = {
            let mut session = self.session.write().await;
            let Some(conversation_id) = session.conversation_id.clone() else {
                return Err(ConnectorError::NoSession(Box::new(
                    ConnectorError::SessionStartFailed("session was reset".to_string()),
                )));
            };
            session.sender_id = Some(sender_id.to_string());
            (conversation_id, session.token.clone().unwrap_or_default())
        };

        let activity = Activity::message(message, sender_id, &self.config.locale);
        let response = self
            .client
            .post(self.activities_url(&conversation_id))
            .bearer_auth(&token)
            .json(&activity)
            .timeout(self.config.post_timeout)
            .send()
            .await
            .map_err(|e| {
                let err = ConnectorError::from(e);
                warn!(error = %err, conversation_id = %conversation_id, "Error sending message");
                err
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, conversation_id = %conversation_id, "Failed to send message");
            return Err(self.upstream_failure(status, &conversation_id).await);
        }

        debug!(conversation_id = %conversation_id, "Message posted, waiting for bot to settle");
        tokio::time::sleep(self.config.settle_delay).await;

        self.poll(&conversation_id, &token, sender_id).await
    }

    /// Fetch activities newer than the stored watermark and keep the bot's messages.
    #[instrument(skip(self))]
    pub async fn drain(&self) -> Result<Vec<ReplyFragment>, ConnectorError> {
        let session = self.session.read().await.clone();
        let Some(conversation_id) = session.conversation_id else {
            return Ok(Vec::new());
        };
        let token = session.token.unwrap_or_default();
        let sender_id = session
            .sender_id
            .unwrap_or_else(|| self.config.sender_id.clone());

        self.poll(&conversation_id, &token, &sender_id).await
    }

    /// Poll one conversation. The watermark is only read from and written to
    /// the session while it still holds that conversation.
    async fn poll(
        &self,
        conversation_id: &str,
        token: &str,
        sender_id: &str,
    ) -> Result<Vec<ReplyFragment>, ConnectorError> {
        let watermark = {
            let session = self.session.read().await;
            if session.conversation_id.as_deref() == Some(conversation_id) {
                session.watermark.clone()
            } else {
                None
            }
        };

        let mut request = self
            .client
            .get(self.activities_url(conversation_id))
            .bearer_auth(token)
            .timeout(self.config.request_timeout);
        if let Some(watermark) = watermark.as_deref() {
            request = request.query(&[("watermark", watermark)]);
        }

        let response = request.send().await.map_err(|e| {
            let err = ConnectorError::from(e);
            warn!(error = %err, conversation_id = %conversation_id, "Error getting messages");
            err
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(status = %status, conversation_id = %conversation_id, "Failed to get messages");
            return Err(self.upstream_failure(status, conversation_id).await);
        }

        let set: ActivitySet = response
            .json()
            .await
            .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

        {
            let mut current = self.session.write().await;
            if current.conversation_id.as_deref() == Some(conversation_id) {
                current.advance_watermark(set.watermark.clone());
            }
        }

        let replies: Vec<ReplyFragment> = set
            .activities
            .into_iter()
            .filter(|a| a.is_message() && a.sender_id() != Some(sender_id))
            .map(|a| ReplyFragment {
                text: a.text.unwrap_or_default(),
                timestamp: a.timestamp.unwrap_or_default(),
                kind: FragmentKind::Message,
            })
            .collect();

        debug!(
            conversation_id = %conversation_id,
            replies = replies.len(),
            watermark = ?set.watermark,
            "Drained activities"
        );

        Ok(replies)
    }

    /// Map a failed status; rejected credentials drop `conversation_id` if it
    /// is still the active one.
    async fn upstream_failure(&self, status: StatusCode, conversation_id: &str) -> ConnectorError {
        let err = ConnectorError::from_status(status);
        if matches!(err, ConnectorError::AuthFailed(_)) && self.config.reset_on_auth_failure {
            let mut session = self.session.write().await;
            if session.conversation_id.as_deref() == Some(conversation_id) {
                warn!(conversation_id = %conversation_id, "Credentials rejected, dropping session so the next call starts over");
                *session = Session::default();
            }
        }
        err
    }
}

#[async_trait]
impl BotConnector for SessionConnector {
    async fn relay(
        &self,
        message: &str,
        sender_id: &str,
    ) -> Result<Vec<ReplyFragment>, ConnectorError> {
        SessionConnector::relay(self, message, sender_id).await
    }

    async fn conversation_id(&self) -> Option<String> {
        self.session.read().await.conversation_id.clone()
    }
}
