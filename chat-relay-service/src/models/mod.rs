//! Domain and wire models for chat-relay-service.

pub mod activity;
pub mod chat;
pub mod chat_log;

pub use activity::{Activity, ActivitySet, ChannelAccount, Conversation, ACTIVITY_TYPE_MESSAGE};
pub use chat::{ChatRequest, ChatResponse, FragmentKind, RelayStatus, ReplyFragment};
pub use chat_log::{ChatLogRecord, NewChatLogEntry};
