//! HTTP/HTTPS Connector for REST APIs
//!
//! ## Overview
//!
//! Both the Firebase Realtime Database and EmailJS speak plain JSON over
//! HTTPS, so one small client covers them. It wraps a `ureq` agent and adds
//! query-string authentication, statistics and retry.
//!
//! ## Implementation Choices
//!
//! - `ureq` keeps the dependency tree small and needs no async runtime of
//!   its own; calls are moved to `spawn_blocking`
//! - Response bodies are read to a string inside the blocking task, so
//!   nothing blocking escapes onto the async side
//! - Retries are per connector: readers retry, email senders do not
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use freshguard_connectors::http::{HttpConnector, HttpConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpConfig::new("https://freshguard-demo.firebaseio.com")
//!     .query_auth("auth", "database-secret")
//!     .timeout_secs(10);
//!
//! let http = HttpConnector::new(config)?;
//! let readings = http.get_json("/readings.json").await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::{lock, ConnectionStats};

/// HTTP-specific errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(String),

    /// Server returned error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// HTTP configuration
#[derive(Clone)]
pub struct HttpConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// User agent string
    pub user_agent: String,
}

/// Authentication methods
#[derive(Clone)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Credential passed as a query parameter (Firebase `?auth=`)
    Query {
        /// Parameter name
        name: String,
        /// Credential value
        value: String,
    },
}

impl HttpConfig {
    /// Create new configuration with base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            auth: AuthMethod::None,
            max_retries: 3,
            user_agent: format!("FreshGuard/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Send a credential as a query parameter on every request
    pub fn query_auth(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = AuthMethod::Query {
            name: name.into(),
            value: value.into(),
        };
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set how many times a failed request is retried
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}

/// What one blocking attempt produced
enum Attempt {
    Body(String),
    Status(u16, String),
    Transport(String),
}

/// HTTP connector using lightweight ureq client
pub struct HttpConnector {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl HttpConnector {
    /// Create new HTTP connector
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(HttpError::Config("Base URL must start with http:// or https://".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: Arc::new(Mutex::new(ConnectionStats::default())),
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Send GET request and parse the body as JSON
    ///
    /// An empty body parses as `null`.
    pub async fn get_json(&self, path: &str) -> Result<serde_json::Value, HttpError> {
        let request = self.build_request(self.agent.get(&self.url(path)));
        let text = self.execute_with_retry(request, None).await?;

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| HttpError::Serialization(e.to_string()))
    }

    /// Send POST request with a JSON body, returning the raw response text
    pub async fn post_json<T: Serialize>(&self, path: &str, data: &T) -> Result<String, HttpError> {
        let request = self.build_request(self.agent.post(&self.url(path)));

        let json = serde_json::to_string(data)
            .map_err(|e| HttpError::Serialization(e.to_string()))?;

        self.execute_with_retry(request, Some(json)).await
    }

    /// Get connection statistics
    pub fn stats(&self) -> ConnectionStats {
        lock(&self.stats).clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Build request with authentication and JSON headers
    fn build_request(&self, mut request: ureq::Request) -> ureq::Request {
        if let AuthMethod::Query { name, value } = &self.config.auth {
            request = request.query(name, value);
        }

        request
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
    }

    /// Run one request on the blocking pool
    async fn attempt(request: ureq::Request, body: Option<String>) -> Result<Attempt, HttpError> {
        tokio::task::spawn_blocking(move || {
            let response = match &body {
                Some(json) => request.send_string(json),
                None => request.call(),
            };

            match response {
                Ok(resp) => match resp.into_string() {
                    Ok(text) => Attempt::Body(text),
                    Err(e) => Attempt::Transport(e.to_string()),
                },
                Err(ureq::Error::Status(code, resp)) => {
                    Attempt::Status(code, resp.into_string().unwrap_or_default())
                }
                Err(ureq::Error::Transport(e)) => Attempt::Transport(e.to_string()),
            }
        })
        .await
        .map_err(|e| HttpError::Request(format!("blocking task failed: {}", e)))
    }

    /// Execute request with retry logic
    async fn execute_with_retry(
        &self,
        request: ureq::Request,
        body: Option<String>,
    ) -> Result<String, HttpError> {
        let sent = body.as_ref().map_or(0, String::len);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (1 << attempt));
                tokio::time::sleep(delay).await;
            }

            match Self::attempt(request.clone(), body.clone()).await? {
                Attempt::Body(text) => {
                    lock(&self.stats).record_success(sent, text.len());
                    return Ok(text);
                }
                Attempt::Status(status, message) if status >= 500 || status == 429 => {
                    log::debug!("{} returned {}, attempt {}", request.url(), status, attempt + 1);
                    last_error = Some(HttpError::ServerError { status, message });
                }
                Attempt::Status(status, message) => {
                    // Client error - don't retry
                    let error = HttpError::ServerError { status, message };
                    lock(&self.stats).record_failure(&error);
                    return Err(error);
                }
                Attempt::Transport(message) => {
                    log::debug!("{} unreachable: {}, attempt {}", request.url(), message, attempt + 1);
                    last_error = Some(HttpError::Request(message));
                }
            }
        }

        // All retries exhausted
        let error = last_error.unwrap_or_else(|| HttpError::Request("Unknown error".into()));
        lock(&self.stats).record_failure(&error);
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HttpConfig::new("https://example.firebaseio.com/")
            .query_auth("auth", "database-secret")
            .timeout_secs(60)
            .max_retries(0);

        assert_eq!(config.base_url, "https://example.firebaseio.com");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 0);

        match config.auth {
            AuthMethod::Query { name, value } => {
                assert_eq!(name, "auth");
                assert_eq!(value, "database-secret");
            }
            AuthMethod::None => panic!("Wrong auth method"),
        }
    }

    #[test]
    fn test_url_validation() {
        let result = HttpConnector::new(HttpConfig::new("not-a-url"));
        assert!(result.is_err());

        let result = HttpConnector::new(HttpConfig::new("https://valid.url"));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unreachable_host_exhausts_retries() {
        let http = HttpConnector::new(
            HttpConfig::new("http://127.0.0.1:9")
                .timeout_secs(1)
                .max_retries(1),
        )
        .unwrap();

        let result = http.get_json("/readings.json").await;

        assert!(matches!(result, Err(HttpError::Request(_))));
        let stats = http.stats();
        assert_eq!(stats.messages_failed, 1);
        assert!(stats.last_error.is_some());
    }
}
