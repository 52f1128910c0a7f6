use std::env;
use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Base URL of the Supabase-compatible storage API.
    pub storage_url: String,
    pub storage_service_key: String,
    #[serde(default = "default_bucket")]
    pub storage_bucket: String,

    pub bot_token: Option<String>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header on webhook calls.
    pub bot_webhook_secret: Option<String>,
    /// When set, `/start <secret>` is required to register an admin chat.
    pub admin_registration_secret: Option<String>,

    pub admin_token: String,
    pub cron_secret: Option<String>,
    /// HS256 secret of buyer access tokens.
    pub jwt_secret: String,

    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_max_connections() -> u32 {
    10
}

fn default_listen_port() -> u16 {
    3000
}

fn default_bucket() -> String {
    "product-files".to_string()
}

fn default_log_file() -> String {
    "panel.log".to_string()
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required_env(key: &str) -> Result<String> {
    optional_env(key).with_context(|| format!("{} is not set", key))
}

impl PanelConfig {
    pub fn load() -> Result<Self> {
        let config_paths = ["/etc/stockroom/panel.toml", "./panel.toml"];

        for path in config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                return toml::from_str(&contents).with_context(|| format!("Invalid config file {}", path));
            }
        }

        tracing::info!("Loading config from environment");
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            max_connections: optional_env("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_connections),
            listen_port: optional_env("LISTEN_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(default_listen_port),
            storage_url: required_env("STORAGE_URL")?,
            storage_service_key: required_env("STORAGE_SERVICE_KEY")?,
            storage_bucket: optional_env("STORAGE_BUCKET").unwrap_or_else(default_bucket),
            bot_token: optional_env("BOT_TOKEN"),
            bot_webhook_secret: optional_env("BOT_WEBHOOK_SECRET"),
            admin_registration_secret: optional_env("ADMIN_REGISTRATION_SECRET"),
            admin_token: required_env("ADMIN_TOKEN")?,
            cron_secret: optional_env("CRON_SECRET"),
            jwt_secret: required_env("JWT_SECRET")?,
            log_file: optional_env("LOG_FILE").unwrap_or_else(default_log_file),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_defaults_fill_optional_fields() {
        let config: PanelConfig = toml::from_str(
            r#"
            database_url = "postgres://localhost/stockroom"
            storage_url = "https://p.supabase.co"
            storage_service_key = "service"
            admin_token = "admin"
            jwt_secret = "jwt"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_port, 3000);
        assert_eq!(config.storage_bucket, "product-files");
        assert!(config.bot_token.is_none());
        assert!(config.cron_secret.is_none());
    }
}
