//! Service client configuration.

use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::retry::RetryConfig;

/// Connection settings for the Upload and Status Services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// API base URL, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Bearer token sent with every request
    pub api_token: Option<String>,
    /// Request timeout (bounds a hung upload)
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration for submissions
    pub retry: RetryConfig,
}

impl ServiceConfig {
    /// Create a config for `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let base_url = normalize_base_url(&base_url.into())?;
        Ok(Self {
            base_url,
            api_token: None,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        })
    }

    /// Create config from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        let base_url = std::env::var("REEL_API_BASE_URL")
            .map_err(|_| ClientError::config("REEL_API_BASE_URL must be set"))?;

        let mut config = Self::new(base_url)?;
        config.api_token = std::env::var("REEL_API_TOKEN").ok().filter(|t| !t.is_empty());
        config.timeout = Duration::from_secs(
            std::env::var("REEL_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
        );
        config.connect_timeout = Duration::from_secs(
            std::env::var("REEL_HTTP_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        );
        config.retry = RetryConfig::from_env();

        Ok(config)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

fn normalize_base_url(raw: &str) -> ClientResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::config("API base URL cannot be empty"));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ClientError::config(format!("Invalid API base URL '{}': {}", trimmed, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url.as_str().trim_end_matches('/').to_string()),
        other => Err(ClientError::config(format!("Unsupported URL scheme: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = ServiceConfig::new("https://api.example.com/v1/").unwrap();
        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_rejects_invalid_urls() {
        assert!(matches!(ServiceConfig::new(""), Err(ClientError::Config(_))));
        assert!(matches!(ServiceConfig::new("not a url"), Err(ClientError::Config(_))));
        assert!(matches!(ServiceConfig::new("ftp://files.example.com"), Err(ClientError::Config(_))));
    }
}
