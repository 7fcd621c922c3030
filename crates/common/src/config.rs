//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Notification policy configuration.
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Sweep scheduler configuration.
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Delivery provider configuration.
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Notification dispatch policy.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Window within which an identical notification to the same user
    /// is suppressed as a duplicate, in minutes.
    #[serde(default = "default_duplicate_window_minutes")]
    pub duplicate_window_minutes: i64,
    /// Minimum age of the last failure before a failed notification is
    /// retried, in minutes.
    #[serde(default = "default_retry_cooldown_minutes")]
    pub retry_cooldown_minutes: i64,
    /// Default maximum retry attempts per notification.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: i32,
    /// Retention period for terminal notifications, in days.
    #[serde(default = "default_cleanup_retention_days")]
    pub cleanup_retention_days: i64,
    /// Batch size for sweep passes.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            duplicate_window_minutes: default_duplicate_window_minutes(),
            retry_cooldown_minutes: default_retry_cooldown_minutes(),
            default_max_retries: default_max_retries(),
            cleanup_retention_days: default_cleanup_retention_days(),
            sweep_batch_size: default_sweep_batch_size(),
        }
    }
}

/// Sweep scheduler intervals, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Interval for dispatching due pending notifications.
    #[serde(default = "default_pending_interval_secs")]
    pub pending_interval_secs: u64,
    /// Interval for retrying failed notifications.
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    /// Interval for cancelling expired notifications.
    #[serde(default = "default_expiry_interval_secs")]
    pub expiry_interval_secs: u64,
    /// Interval for promoting scheduled campaigns.
    #[serde(default = "default_campaign_interval_secs")]
    pub campaign_interval_secs: u64,
    /// Interval for cleaning up old terminal records.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            pending_interval_secs: default_pending_interval_secs(),
            retry_interval_secs: default_retry_interval_secs(),
            expiry_interval_secs: default_expiry_interval_secs(),
            campaign_interval_secs: default_campaign_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Delivery provider configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    /// Request timeout for provider HTTP calls, in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    /// Email provider settings.
    #[serde(default)]
    pub email: Option<EmailProviderConfig>,
    /// SMS provider settings.
    #[serde(default)]
    pub sms: Option<SmsProviderConfig>,
    /// Push gateway settings.
    #[serde(default)]
    pub push: Option<PushProviderConfig>,
}

/// Email provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailProviderConfig {
    /// Provider kind: "sendgrid" or "mailgun".
    pub kind: String,
    /// Provider API key.
    pub api_key: String,
    /// Mailgun sending domain (unused for `SendGrid`).
    #[serde(default)]
    pub domain: Option<String>,
    /// From address for outgoing mail.
    pub from_address: String,
    /// From display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

/// SMS provider settings (Twilio-style REST API).
#[derive(Debug, Clone, Deserialize)]
pub struct SmsProviderConfig {
    /// Account SID.
    pub account_sid: String,
    /// API auth token.
    pub auth_token: String,
    /// Sender phone number.
    pub from_number: String,
}

/// Push gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PushProviderConfig {
    /// Gateway base URL.
    pub base_url: String,
    /// Gateway API key.
    pub api_key: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_duplicate_window_minutes() -> i64 {
    5
}

const fn default_retry_cooldown_minutes() -> i64 {
    5
}

const fn default_max_retries() -> i32 {
    3
}

const fn default_cleanup_retention_days() -> i64 {
    90
}

const fn default_sweep_batch_size() -> u64 {
    100
}

const fn default_pending_interval_secs() -> u64 {
    60
}

const fn default_retry_interval_secs() -> u64 {
    60
}

const fn default_expiry_interval_secs() -> u64 {
    300
}

const fn default_campaign_interval_secs() -> u64 {
    60
}

const fn default_cleanup_interval_secs() -> u64 {
    86400
}

const fn default_provider_timeout_secs() -> u64 {
    10
}

fn default_from_name() -> String {
    "Courier".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` file (if present), loaded into the process environment
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `COURIER_ENV`)
    /// 4. Environment variables with `COURIER_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("COURIER_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("COURIER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("COURIER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_defaults() {
        let config = NotificationConfig::default();
        assert_eq!(config.duplicate_window_minutes, 5);
        assert_eq!(config.retry_cooldown_minutes, 5);
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.cleanup_retention_days, 90);
    }

    #[test]
    fn test_sweep_defaults() {
        let config = SweepConfig::default();
        assert_eq!(config.pending_interval_secs, 60);
        assert_eq!(config.expiry_interval_secs, 300);
        assert_eq!(config.cleanup_interval_secs, 86400);
    }
}
