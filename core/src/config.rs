//! Client configuration.

use std::time::Duration;

use tracing::warn;

/// Root of the public Todoable API.
pub const DEFAULT_BASE_URL: &str = "http://todoable.teachable.tech/api";

/// Upper bound on a single HTTP round-trip.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the server keeps a token valid. The client trusts the
/// server-supplied `expires_at`; this value only appears in diagnostics.
pub const TOKEN_TTL: Duration = Duration::from_secs(20 * 60);

pub const BASE_URL_ENV: &str = "TODOABLE_BASE_URL";
pub const TIMEOUT_ENV: &str = "TODOABLE_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root without a trailing slash.
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `TODOABLE_BASE_URL` and `TODOABLE_TIMEOUT_SECS`, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(BASE_URL_ENV) {
            Some(url) if !url.trim().is_empty() => Self::new(url.trim()),
            _ => Self::default(),
        };

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!(
                    value = %raw,
                    "ignoring invalid {TIMEOUT_ENV}, using {}s",
                    config.timeout.as_secs()
                ),
            }
        }

        config
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}
