//! HTTP handlers for chat-relay-service.

pub mod chat;
pub mod health;
pub mod log;
pub mod pages;

pub use chat::{chat_with_bot, handle_panic};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use log::{get_execute_requests, test_action};
pub use pages::{db_view, index};
