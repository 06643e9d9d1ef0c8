//! Application configuration loaded from environment variables.

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `BUS_BOOTSTRAP` — message bus bootstrap address (default:
///   `"localhost:9092"`; advisory when the in-memory bus is wired)
/// - `DATABASE_URL` — Postgres connection string (default: `None`, uses
///   in-memory stores)
/// - `ORDER_GROUP_ID` / `RISK_GROUP_ID` / `PAYMENT_GROUP_ID` /
///   `NOTIFICATION_GROUP_ID` — consumer group per participant
/// - `SAGA_TIMEOUT_MS` — advisory event timeout (default: `15000`)
/// - `SAGA_MAX_RETRIES` — per-message retry budget (default: `3`)
/// - `CONSUMER_WORKERS` — workers per subscribed topic (default: `2`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub bus_bootstrap: String,
    pub database_url: Option<String>,
    pub order_group: String,
    pub risk_group: String,
    pub payment_group: String,
    pub notification_group: String,
    pub saga_timeout_ms: u64,
    pub saga_max_retries: u32,
    pub consumer_workers: usize,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000),
            log_level: env_or("RUST_LOG", "info"),
            bus_bootstrap: env_or("BUS_BOOTSTRAP", "localhost:9092"),
            database_url: std::env::var("DATABASE_URL").ok(),
            order_group: env_or("ORDER_GROUP_ID", "order-service"),
            risk_group: env_or("RISK_GROUP_ID", "risk-service"),
            payment_group: env_or("PAYMENT_GROUP_ID", "payment-service"),
            notification_group: env_or("NOTIFICATION_GROUP_ID", "notification-service"),
            saga_timeout_ms: env_parse("SAGA_TIMEOUT_MS", 15_000),
            saga_max_retries: env_parse("SAGA_MAX_RETRIES", 3),
            consumer_workers: env_parse("CONSUMER_WORKERS", 2),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            bus_bootstrap: "localhost:9092".to_string(),
            database_url: None,
            order_group: "order-service".to_string(),
            risk_group: "risk-service".to_string(),
            payment_group: "payment-service".to_string(),
            notification_group: "notification-service".to_string(),
            saga_timeout_ms: 15_000,
            saga_max_retries: 3,
            consumer_workers: 2,
        }
    }
}
