//! HTTP server settings.

use mockup_pipeline::config::env_parse;

use crate::auth::jwt::JwtConfig;

/// Origins the web client is served from in development. Always allowed.
const DEFAULT_CORS_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed to call the API.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Grace period for in-flight requests after a shutdown signal.
    pub shutdown_timeout_secs: u64,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// | Env Var                 | Default                            |
    /// |-------------------------|------------------------------------|
    /// | `HOST`                  | `0.0.0.0`                          |
    /// | `API_PORT`              | `4000`                             |
    /// | `CORS_ORIGINS`          | extra origins, comma-separated     |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                               |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                               |
    ///
    /// JWT settings come from [`JwtConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("API_PORT", 4000),
            cors_origins: merge_origins(&std::env::var("CORS_ORIGINS").unwrap_or_default()),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT_SECS", 30),
            jwt: JwtConfig::from_env(),
        }
    }
}

/// The development origins followed by `extra`'s comma-separated entries.
/// Trailing slashes are dropped and duplicates skipped.
pub fn merge_origins(extra: &str) -> Vec<String> {
    let mut origins: Vec<String> = DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect();
    for origin in extra.split(',').map(|o| o.trim().trim_end_matches('/')) {
        if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
            origins.push(origin.to_string());
        }
    }
    origins
}
