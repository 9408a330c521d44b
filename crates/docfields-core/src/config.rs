use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_UNIT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub default_model: String,
    pub max_tokens: u32,
    pub concurrency: usize,
    pub unit_timeout_secs: u64,
    pub retry_attempts: u32,
    pub server_host: String,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            default_model: std::env::var("DOCFIELDS_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.into()),
            max_tokens: env_parse("DOCFIELDS_MAX_TOKENS").unwrap_or(DEFAULT_MAX_TOKENS),
            concurrency: env_parse("DOCFIELDS_CONCURRENCY").unwrap_or(1),
            unit_timeout_secs: env_parse("DOCFIELDS_UNIT_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_UNIT_TIMEOUT_SECS),
            retry_attempts: env_parse("DOCFIELDS_RETRY_ATTEMPTS").unwrap_or(0),
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env_parse("SERVER_PORT").unwrap_or(8080),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            concurrency: self.concurrency.max(1),
            unit_timeout: Duration::from_secs(self.unit_timeout_secs.max(1)),
            retry_attempts: self.retry_attempts,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            default_model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            concurrency: 1,
            unit_timeout_secs: DEFAULT_UNIT_TIMEOUT_SECS,
            retry_attempts: 0,
            server_host: "0.0.0.0".into(),
            server_port: 8080,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Per-run scheduling knobs for the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Units dispatched at once. `1` is strictly sequential.
    pub concurrency: usize,
    pub unit_timeout: Duration,
    /// Extra attempts for a unit whose extraction failed.
    pub retry_attempts: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            unit_timeout: Duration::from_secs(DEFAULT_UNIT_TIMEOUT_SECS),
            retry_attempts: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 4096);
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.pipeline_options(), PipelineOptions::default());
    }

    #[test]
    fn test_pipeline_options_are_clamped() {
        let config = AppConfig {
            concurrency: 0,
            unit_timeout_secs: 0,
            retry_attempts: 2,
            ..AppConfig::default()
        };
        let options = config.pipeline_options();
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.unit_timeout, Duration::from_secs(1));
        assert_eq!(options.retry_attempts, 2);
    }
}
