//! Order hub configuration

use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Order hub configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// HTTP + WebSocket port
    pub http_port: u16,
    /// PostgreSQL connection URL (None → in-memory store, development only)
    pub database_url: Option<String>,
    /// Default tracing level (overridden by RUST_LOG)
    pub log_level: String,
    /// Rolling file log directory
    pub log_dir: Option<String>,
    /// Per-connection outbound queue depth
    pub ws_outbound_capacity: usize,
    pub ws_ping_interval: Duration,
    pub ws_idle_timeout: Duration,
    /// 外送订单状态是否广播到整个餐厅房间
    pub delivery_status_to_restaurant: bool,
    /// Currency used when a catalog item carries none
    pub default_currency: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            http_port: 8080,
            database_url: None,
            log_level: "info".into(),
            log_dir: None,
            ws_outbound_capacity: 256,
            ws_ping_interval: Duration::from_secs(30),
            ws_idle_timeout: Duration::from_secs(120),
            delivery_status_to_restaurant: true,
            default_currency: "EUR".into(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let defaults = Self::default();
        let environment = std::env::var("ENVIRONMENT").unwrap_or(defaults.environment);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.is_empty());
        if database_url.is_none() && environment != "development" {
            return Err(format!("DATABASE_URL must be set in {environment} environment").into());
        }

        Ok(Self {
            http_port: parse_env("HTTP_PORT").unwrap_or(defaults.http_port),
            database_url,
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            ws_outbound_capacity: parse_env::<usize>("WS_OUTBOUND_CAPACITY")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.ws_outbound_capacity),
            ws_ping_interval: parse_env("WS_PING_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ws_ping_interval),
            ws_idle_timeout: parse_env("WS_IDLE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.ws_idle_timeout),
            delivery_status_to_restaurant: parse_bool_env("DELIVERY_STATUS_TO_RESTAURANT")
                .unwrap_or(defaults.delivery_status_to_restaurant),
            default_currency: std::env::var("DEFAULT_CURRENCY")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.default_currency),
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_bool_env(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
