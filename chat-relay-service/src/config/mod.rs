//! Configuration module for chat-relay-service.

use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

pub const DEFAULT_BOT_SERVICE_URL: &str = "https://directline.botframework.com";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub geo: GeoConfig,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub service_url: String,
    /// Direct Line secret. `None` puts the relay into echo mode.
    pub direct_line_secret: Option<Secret<String>>,
    pub sender_id: String,
    pub locale: String,
    pub settle_delay: Duration,
    /// Timeout for creating a conversation and for polling activities.
    pub request_timeout: Duration,
    pub post_timeout: Duration,
    pub reset_on_auth_failure: bool,
    pub keyword_fallback: bool,
}

impl BotConfig {
    pub fn is_configured(&self) -> bool {
        self.direct_line_secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().is_empty())
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_BOT_SERVICE_URL.to_string(),
            direct_line_secret: None,
            sender_id: "user123".to_string(),
            locale: "de-DE".to_string(),
            settle_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(10),
            post_timeout: Duration::from_secs(15),
            reset_on_auth_failure: true,
            keyword_fallback: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub name: String,
    /// Missing password is not a startup error: log writes fail and are reported.
    pub password: Option<Secret<String>>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GeoConfig {
    /// Base URL of an ip-api compatible lookup, e.g. `http://ip-api.com/json`.
    pub lookup_url: Option<String>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = common.is_production();

        let direct_line_secret = env::var("BOT_DIRECT_LINE_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(Secret::new);

        let password = env::var("DB_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())
            .map(Secret::new);

        Ok(Self {
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "chat-relay-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            bot: BotConfig {
                service_url: env::var("BOT_SERVICE_URL")
                    .unwrap_or_else(|_| DEFAULT_BOT_SERVICE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                direct_line_secret,
                sender_id: env::var("BOT_SENDER_ID").unwrap_or_else(|_| "user123".to_string()),
                locale: env::var("BOT_LOCALE").unwrap_or_else(|_| "de-DE".to_string()),
                settle_delay: Duration::from_millis(parse_env("BOT_SETTLE_DELAY_MS", 1000)),
                request_timeout: Duration::from_secs(parse_env("BOT_REQUEST_TIMEOUT_SECS", 10)),
                post_timeout: Duration::from_secs(parse_env("BOT_POST_TIMEOUT_SECS", 15)),
                reset_on_auth_failure: parse_env("BOT_RESET_ON_AUTH_FAILURE", true),
                keyword_fallback: parse_env("BOT_KEYWORD_FALLBACK", false),
            },
            database: DatabaseConfig {
                host: get_env("DB_HOST", Some("localhost"), is_prod)?,
                port: parse_env("DB_PORT", 5432),
                user: get_env("DB_USER", Some("postgres"), is_prod)?,
                name: get_env("DB_NAME", Some("chat_requests"), is_prod)?,
                password,
                max_connections: parse_env("DB_MAX_CONNECTIONS", 5),
                run_migrations: parse_env("DB_RUN_MIGRATIONS", true),
            },
            geo: GeoConfig {
                lookup_url: env::var("GEO_LOOKUP_URL").ok().filter(|s| !s.is_empty()),
            },
            common,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn empty_secret_counts_as_unconfigured() {
        let bot = BotConfig {
            direct_line_secret: Some(Secret::new(String::new())),
            ..Default::default()
        };
        assert!(!bot.is_configured());

        let bot = BotConfig {
            direct_line_secret: Some(Secret::new("s3cret".to_string())),
            ..Default::default()
        };
        assert!(bot.is_configured());
    }

    #[test]
    #[serial]
    fn parse_env_falls_back_on_garbage() {
        env::set_var("CHAT_RELAY_TEST_DELAY", "not-a-number");
        assert_eq!(parse_env("CHAT_RELAY_TEST_DELAY", 1000u64), 1000);
        env::remove_var("CHAT_RELAY_TEST_DELAY");
    }

    #[test]
    #[serial]
    fn request_timeout_comes_from_its_own_variable() {
        env::set_var("BOT_REQUEST_TIMEOUT_SECS", "3");
        env::set_var("BOT_POST_TIMEOUT_SECS", "20");

        let config = RelayConfig::from_env().unwrap();

        env::remove_var("BOT_REQUEST_TIMEOUT_SECS");
        env::remove_var("BOT_POST_TIMEOUT_SECS");
        assert_eq!(config.bot.request_timeout, Duration::from_secs(3));
        assert_eq!(config.bot.post_timeout, Duration::from_secs(20));
    }
}
