use std::path::PathBuf;
use std::time::Duration;

use mockup_core::generation::DEFAULT_GENERATION_TIMEOUT_SECS;
use mockup_gemini::api::{DEFAULT_API_BASE, DEFAULT_IMAGE_MODEL};

use crate::queue::RetryPolicy;

/// Generation worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string (required).
    pub database_url: String,
    /// Provider API key (required).
    pub gemini_api_key: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    /// Root directory for uploaded inputs and generated outputs.
    pub storage_root: PathBuf,
    /// Number of concurrent worker tasks (default: `2`).
    pub concurrency: usize,
    /// Timeout for a single provider call.
    pub provider_timeout: Duration,
    /// Wall-clock budget for one job, all provider calls included.
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                                   |
    /// |--------------------------|-------------------------------------------|
    /// | `DATABASE_URL`           | required                                  |
    /// | `GEMINI_API_KEY`         | required                                  |
    /// | `GEMINI_API_BASE`        | `https://generativelanguage.googleapis.com/v1beta` |
    /// | `GEMINI_IMAGE_MODEL`     | `gemini-3-pro-image-preview`              |
    /// | `STORAGE_ROOT`           | `./uploads`                               |
    /// | `WORKER_CONCURRENCY`     | `2`                                       |
    /// | `PROVIDER_TIMEOUT_SECS`  | `60`                                      |
    /// | `JOB_TIMEOUT_SECS`       | `300`                                     |
    /// | `POLL_INTERVAL_MS`       | `1000`                                    |
    /// | `QUEUE_MAX_ATTEMPTS`     | `3`                                       |
    /// | `QUEUE_BACKOFF_MS`       | `5000`                                    |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let gemini_api_key = std::env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY must be set");

        let gemini_api_base =
            std::env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.into());
        let gemini_model =
            std::env::var("GEMINI_IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.into());
        let storage_root: PathBuf = std::env::var("STORAGE_ROOT")
            .unwrap_or_else(|_| "./uploads".into())
            .into();

        let concurrency: usize = env_parse("WORKER_CONCURRENCY", 2);
        let provider_timeout_secs: u64 =
            env_parse("PROVIDER_TIMEOUT_SECS", DEFAULT_GENERATION_TIMEOUT_SECS);
        let job_timeout_secs: u64 = env_parse("JOB_TIMEOUT_SECS", 300);
        let poll_interval_ms: u64 = env_parse("POLL_INTERVAL_MS", 1000);

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: env_parse("QUEUE_MAX_ATTEMPTS", defaults.max_attempts),
            backoff_base: Duration::from_millis(env_parse(
                "QUEUE_BACKOFF_MS",
                defaults.backoff_base.as_millis() as u64,
            )),
            ..defaults
        };

        Self {
            database_url,
            gemini_api_key,
            gemini_api_base,
            gemini_model,
            storage_root,
            concurrency,
            provider_timeout: Duration::from_secs(provider_timeout_secs),
            job_timeout: Duration::from_secs(job_timeout_secs),
            poll_interval: Duration::from_millis(poll_interval_ms),
            retry,
        }
    }
}

/// Parse an optional variable, panicking on a present but malformed value.
pub fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_falls_back_to_default() {
        assert_eq!(env_parse::<u32>("MOCKUP_TEST_SURELY_UNSET_VAR", 7), 7);
    }
}
