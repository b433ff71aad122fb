//! Append-only audit log of relay attempts.

use crate::config::DatabaseConfig;
use crate::models::{ChatLogRecord, NewChatLogEntry};
use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum ChatLogError {
    #[error("Log store unavailable: {0}")]
    Unavailable(String),

    #[error("Log write failed: {0}")]
    WriteFailed(String),

    #[error("Log read failed: {0}")]
    ReadFailed(String),
}

#[async_trait]
pub trait ChatLog: Send + Sync {
    async fn insert(&self, entry: &NewChatLogEntry) -> Result<(), ChatLogError>;
    async fn list_all(&self) -> Result<Vec<ChatLogRecord>, ChatLogError>;
    async fn health_check(&self) -> Result<(), ChatLogError>;
}

/// Postgres-backed log.
#[derive(Clone)]
pub struct PgChatLog {
    pool: PgPool,
}

impl PgChatLog {
    /// Build a lazily connecting pool. Nothing touches the network until the
    /// first query, so a wrong or missing password surfaces as failed writes.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .database(&config.name);
        if let Some(password) = &config.password {
            options = options.password(password.expose_secret());
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect_lazy_with(options);

        info!(host = %config.host, database = %config.name, "Chat log pool configured");

        Self { pool }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), ChatLogError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ChatLogError::Unavailable(format!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl ChatLog for PgChatLog {
    #[instrument(skip(self, entry), fields(session_id = %entry.session_id, is_error = entry.is_error))]
    async fn insert(&self, entry: &NewChatLogEntry) -> Result<(), ChatLogError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (session_id, sender, message, is_error)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&entry.session_id)
        .bind(&entry.sender)
        .bind(&entry.message)
        .bind(entry.is_error)
        .execute(&self.pool)
        .await
        .map_err(|e| ChatLogError::WriteFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<ChatLogRecord>, ChatLogError> {
        sqlx::query_as::<_, ChatLogRecord>(
            r#"
            SELECT id, session_id, sender, message, is_error, created_at
            FROM chat_messages
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ChatLogError::ReadFailed(e.to_string()))
    }

    async fn health_check(&self) -> Result<(), ChatLogError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| ChatLogError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// Process-local log for tests; the service itself always writes to Postgres.
#[derive(Default)]
pub struct InMemoryChatLog {
    records: Mutex<Vec<ChatLogRecord>>,
    fail_writes: bool,
}

impl InMemoryChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log whose writes always fail, for exercising report-and-continue paths.
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_writes: true,
        }
    }

    pub fn records(&self) -> Vec<ChatLogRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatLog for InMemoryChatLog {
    async fn insert(&self, entry: &NewChatLogEntry) -> Result<(), ChatLogError> {
        if self.fail_writes {
            return Err(ChatLogError::WriteFailed("in-memory log is read-only".to_string()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|_| ChatLogError::WriteFailed("log lock poisoned".to_string()))?;
        let id = records.len() as i64 + 1;
        records.push(ChatLogRecord {
            id,
            session_id: entry.session_id.clone(),
            sender: entry.sender.clone(),
            message: entry.message.clone(),
            is_error: entry.is_error,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ChatLogRecord>, ChatLogError> {
        Ok(self.records())
    }

    async fn health_check(&self) -> Result<(), ChatLogError> {
        if self.fail_writes {
            return Err(ChatLogError::Unavailable("in-memory log is read-only".to_string()));
        }
        Ok(())
    }
}
