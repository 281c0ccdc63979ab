//! Configuration for the HTTP remote store.

use crate::error::{RemoteError, RemoteResult};
use std::time::Duration;

/// Connection settings for a remote service.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Service root URL, including scheme (e.g. `https://redash.example.com`).
    pub base_url: String,
    /// User API key sent as `Authorization: Key <api_key>`.
    pub api_key: String,
    /// Per-request timeout handed to the HTTP client.
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Creates a configuration for the given service and key.
    ///
    /// Trailing slashes and whitespace are stripped from the URL.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url
                .trim()
                .trim_end_matches(['/', '\\'])
                .to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks that the URL has an HTTP scheme and a key is set.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Config`] naming the first problem found.
    pub fn validate(&self) -> RemoteResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(RemoteError::Config(format!(
                "base URL `{}` needs an http or https scheme",
                self.base_url
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(RemoteError::Config("API key is empty".into()));
        }
        Ok(())
    }

    /// Builds a URL under the service root.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Builds a URL under the API root.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Returns the authorization header value.
    pub fn authorization(&self) -> String {
        format!("Key {}", self.api_key)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::new("http://localhost:5000", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = RemoteConfig::new(" https://redash.example.com/ ", "secret")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url, "https://redash.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.authorization(), "Key secret");
    }

    #[test]
    fn validation() {
        assert!(RemoteConfig::new("https://redash.example.com", "k").validate().is_ok());
        assert!(matches!(
            RemoteConfig::new("redash.example.com", "k").validate(),
            Err(RemoteError::Config(_))
        ));
        assert!(RemoteConfig::default().validate().is_err());
    }

    #[test]
    fn urls() {
        let config = RemoteConfig::new("https://redash.example.com", "k");
        assert_eq!(
            config.api_url("queries/3"),
            "https://redash.example.com/api/queries/3"
        );
        assert_eq!(
            config.url("/dashboard/sales"),
            "https://redash.example.com/dashboard/sales"
        );
    }
}
