//! Service configuration read from the environment (and `.env`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AUTH_JWT_SECRET must be set to a secure, unique value in production")]
    InsecureSecret,
    #[error("invalid HOST/PORT configuration: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Completion endpoint. When unset every chat request gets the fallback reply.
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            model: "mindcare-assistant".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    pub chat: ChatConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            environment: "development".to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            upload_dir: PathBuf::from("uploads/journal"),
            chat: ChatConfig::default(),
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let chat_defaults = ChatConfig::default();
        Self {
            host: env_non_empty("HOST").unwrap_or(defaults.host),
            port: env_non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            environment: env_non_empty("ENVIRONMENT").unwrap_or(defaults.environment),
            jwt_secret: env_non_empty("AUTH_JWT_SECRET").unwrap_or(defaults.jwt_secret),
            upload_dir: env_non_empty("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            chat: ChatConfig {
                api_url: env_non_empty("CHAT_API_URL"),
                api_key: env_non_empty("CHAT_API_KEY"),
                model: env_non_empty("CHAT_MODEL").unwrap_or(chat_defaults.model),
                timeout: env_non_empty("CHAT_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(chat_defaults.timeout),
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Production refuses to start with the default signing secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_production() && self.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::InsecureSecret);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }
}
