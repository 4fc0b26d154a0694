//! Environment-driven configuration
//!
//! Values come from the process environment, optionally seeded from a
//! `.env` file at startup.

use crate::error::TrackerError;
use crate::Result;
use std::env;
use std::time::Duration;

/// Retries above this are clamped; the gateway must never block a request
/// for long.
pub const MAX_LLM_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(8),
            max_retries: MAX_LLM_RETRIES,
            retry_backoff: Duration::from_millis(500),
            max_tokens: 600,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    /// Registering with this email yields a super admin account
    pub super_admin_email: Option<String>,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Build configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .or_else(|_| env::var("API_PORT"))
            .unwrap_or_else(|_| "8080".to_string());
        let port = parse_var("PORT", &port)?;

        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("POSTGRES_URL"))
            .ok()
            .filter(|url| !url.trim().is_empty());

        let defaults = LlmConfig::default();

        let timeout_secs: u64 = optional_var("LLM_TIMEOUT_SECS")?.unwrap_or(8);
        if timeout_secs == 0 || timeout_secs > 9 {
            return Err(TrackerError::Config(format!(
                "LLM_TIMEOUT_SECS must be between 1 and 9, got {}",
                timeout_secs
            )));
        }

        let max_retries: u32 = optional_var("LLM_MAX_RETRIES")?.unwrap_or(MAX_LLM_RETRIES);
        let backoff_ms: u64 = optional_var("LLM_RETRY_BACKOFF_MS")?.unwrap_or(500);

        let llm = LlmConfig {
            api_key: env::var("LLM_API_KEY")
                .or_else(|_| env::var("OPENAI_API_KEY"))
                .unwrap_or_default(),
            base_url: env::var("LLM_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: env::var("LLM_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(timeout_secs),
            max_retries: max_retries.min(MAX_LLM_RETRIES),
            retry_backoff: Duration::from_millis(backoff_ms),
            max_tokens: optional_var("LLM_MAX_TOKENS")?.unwrap_or(defaults.max_tokens),
            temperature: defaults.temperature,
        };

        let super_admin_email = env::var("SUPER_ADMIN_EMAIL")
            .ok()
            .filter(|email| !email.trim().is_empty());

        Ok(Self {
            port,
            database_url,
            super_admin_email,
            llm,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| TrackerError::Config(format!("{} has an invalid value: {}", name, raw)))
}

fn optional_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_var(name, &raw).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_defaults_are_bounded() {
        let cfg = LlmConfig::default();
        assert!(cfg.timeout.as_secs() < 10);
        assert!(cfg.max_retries <= MAX_LLM_RETRIES);
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        let parsed: Result<u16> = parse_var("PORT", "eighty");
        assert!(matches!(parsed, Err(TrackerError::Config(_))));
        let parsed: Result<u16> = parse_var("PORT", " 9000 ");
        assert_eq!(parsed.unwrap(), 9000);
    }
}
