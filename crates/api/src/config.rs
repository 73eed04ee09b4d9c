use mdc_jobs::purge::MIN_RETENTION_DAYS;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
    /// Audit record retention sweeper configuration.
    pub retention: RetentionConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt: JwtConfig::from_env(),
            retention: RetentionConfig::from_env(),
        }
    }
}

/// Configuration for the background audit-record retention sweeper.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Whether the sweeper runs at all (default: on).
    pub enabled: bool,
    /// Records older than this many days are purged.
    pub days: i64,
    /// Hours between sweeps.
    pub sweep_hours: u64,
}

/// Default retention period in days.
const DEFAULT_RETENTION_DAYS: i64 = 365;

/// Default hours between retention sweeps.
const DEFAULT_SWEEP_HOURS: u64 = 24;

impl RetentionConfig {
    /// Load retention settings from environment variables.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `AUDIT_RETENTION_ENABLED`    | `true`  |
    /// | `AUDIT_RETENTION_DAYS`       | `365`   |
    /// | `AUDIT_RETENTION_SWEEP_HOURS`| `24`    |
    ///
    /// `AUDIT_RETENTION_DAYS` is clamped to the 30-day compliance minimum.
    pub fn from_env() -> Self {
        let enabled = std::env::var("AUDIT_RETENTION_ENABLED")
            .map(|v| !matches!(v.trim(), "false" | "0" | "off"))
            .unwrap_or(true);

        let days: i64 = std::env::var("AUDIT_RETENTION_DAYS")
            .unwrap_or_else(|_| DEFAULT_RETENTION_DAYS.to_string())
            .parse()
            .expect("AUDIT_RETENTION_DAYS must be a valid i64");
        let days = days.max(MIN_RETENTION_DAYS);

        let sweep_hours: u64 = std::env::var("AUDIT_RETENTION_SWEEP_HOURS")
            .unwrap_or_else(|_| DEFAULT_SWEEP_HOURS.to_string())
            .parse()
            .expect("AUDIT_RETENTION_SWEEP_HOURS must be a valid u64");

        Self { enabled, days, sweep_hours }
    }
}
