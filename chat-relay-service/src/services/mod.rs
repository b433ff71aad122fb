//! Services module for chat-relay-service.

pub mod chat_log;
pub mod connector;
pub mod fallback;
pub mod metrics;
pub mod relay;
pub mod sender;

pub use chat_log::{ChatLog, ChatLogError, InMemoryChatLog, PgChatLog};
pub use connector::{BotConnector, ConnectorError, Session, SessionConnector, SessionState};
pub use metrics::{get_metrics, init_metrics};
pub use relay::{RejectedMessage, RelayOutcome, RelayService};
pub use sender::SenderResolver;
