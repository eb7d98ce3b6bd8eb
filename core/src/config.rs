//! Client configuration.
//!
//! The base URL is a build-time constant; `TAILOR_API_BASE_URL` set while
//! compiling replaces it. `ClientConfig::from_env` additionally honours the
//! same variable (and a timeout) at runtime, which the integration tests and
//! local development against the mock server rely on.

use std::time::Duration;

use tracing::warn;

/// Backend base URL baked in at compile time.
pub const DEFAULT_BASE_URL: &str = match option_env!("TAILOR_API_BASE_URL") {
    Some(url) => url,
    None => "https://tailormaster-backwardobservations.koyeb.app/api/",
};

/// Storage key for the session token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub token_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token_key: AUTH_TOKEN_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `TAILOR_API_BASE_URL` and
    /// `TAILOR_API_TIMEOUT_SECS` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("TAILOR_API_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(raw) = std::env::var("TAILOR_API_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => config.timeout = Duration::from_secs(secs),
                Err(_) => warn!(value = %raw, "ignoring invalid TAILOR_API_TIMEOUT_SECS"),
            }
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_key(mut self, key: impl Into<String>) -> Self {
        self.token_key = key.into();
        self
    }

    /// Joins `endpoint` onto the base URL with exactly one slash between.
    pub fn url_for(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_auth_token_key() {
        let config = ClientConfig::default();
        assert_eq!(config.token_key, "auth_token");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(!config.base_url.is_empty());
    }

    #[test]
    fn url_for_normalizes_slashes() {
        let config = ClientConfig::default().with_base_url("http://localhost:3000/api/");
        assert_eq!(config.url_for("customer"), "http://localhost:3000/api/customer");
        assert_eq!(config.url_for("/order/7"), "http://localhost:3000/api/order/7");

        let config = config.with_base_url("http://localhost:3000/api");
        assert_eq!(
            config.url_for("customer/size/getByCustomer/3"),
            "http://localhost:3000/api/customer/size/getByCustomer/3"
        );
    }
}
