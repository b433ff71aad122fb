//! service-core: Shared infrastructure for the chat relay services.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
