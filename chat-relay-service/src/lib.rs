//! Chat Relay Service - forwards chat messages to a Direct Line bot and logs every exchange.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
