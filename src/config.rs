use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Runtime configuration, loaded from the environment.
#[derive(Clone, Default)]
pub struct Config {
    /// Period between subscription check passes.
    pub poll_interval: Duration,
    /// Maximum number of due subscriptions handled per pass.
    pub due_batch_size: i64,
    pub db_url: String,
    pub db_path: String,
    pub logs_path: PathBuf,
    /// Base URL of the remote playlist API.
    pub api_url: String,
    /// OAuth token endpoint used for refresh-token exchanges.
    pub token_url: String,
    pub oauth_client_id: String,
    pub oauth_client_secret: String,
    /// Base URL of the web app, used in notification email links.
    pub app_base_url: String,
    pub from_email: String,
    /// Endpoint of the managed email delivery API.
    pub mail_endpoint: String,
    pub mail_api_key: String,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        Ok(Self {
            poll_interval: Duration::from_secs(parse_env("POLL_INTERVAL_SECS", 10)?),
            due_batch_size: parse_env("DUE_BATCH_SIZE", 10)?,
            db_url: env_or("DB_URL", "sqlite://data.db"),
            db_path: env_or("DB_PATH", "data.db"),
            logs_path: PathBuf::from(env_or("LOGS_PATH", "logs")),
            api_url: env_or("SPOTIFY_API_URL", "https://api.spotify.com"),
            token_url: env_or("SPOTIFY_TOKEN_URL", "https://accounts.spotify.com/api/token"),
            oauth_client_id: require_env("OAUTH_CLIENT_ID")?,
            oauth_client_secret: require_env("OAUTH_CLIENT_SECRET")?,
            app_base_url: env_or("APP_BASE_URL", "http://localhost:8080"),
            from_email: require_env("FROM_EMAIL")?,
            mail_endpoint: require_env("MAIL_ENDPOINT")?,
            mail_api_key: require_env("MAIL_API_KEY")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> Result<String, AppError> {
    std::env::var(key).map_err(|_| AppError::MissingConfig {
        key: key.to_string(),
    })
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|_| AppError::InvalidConfig {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
