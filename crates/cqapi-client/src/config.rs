//! Client configuration.
//!
//! Loaded from a YAML file, with environment variables taking precedence:
//!
//! | Key | Environment | Default |
//! |-----|-------------|---------|
//! | `url` | `CQAPI_URL` | required |
//! | `token` | `CQAPI_TOKEN` | required |
//! | `dataset` | `CQAPI_DATASET` | none |
//! | `timeout_secs` | `CQAPI_TIMEOUT_SECS` | 5 |
//! | `poll_interval_ms` | `CQAPI_POLL_INTERVAL_MS` | 500 |
//! | `max_polls` | | 1200 |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default pause between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Default number of status polls before giving up.
pub const DEFAULT_MAX_POLLS: usize = 1200;

/// Connection settings for [`ConqueryClient`](crate::ConqueryClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base url of the service, without trailing slash.
    pub url: String,
    /// Bearer token.
    pub token: String,
    /// Dataset used when an operation is given none.
    pub dataset: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Pause between status polls.
    pub poll_interval: Duration,
    /// Status polls before giving up on a running query.
    pub max_polls: usize,
}

/// File shape; every key is optional so the environment can fill gaps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawConfig {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    dataset: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    max_polls: Option<usize>,
}

impl ClientConfig {
    /// Creates a new builder for ClientConfig.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Loads a YAML file, then applies environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses YAML text, then applies environment overrides.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = if contents.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        Self::resolve(raw)
    }

    /// Builds a config from environment variables alone.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(RawConfig::default())
    }

    fn resolve(mut raw: RawConfig) -> Result<Self, ConfigError> {
        if let Ok(url) = std::env::var("CQAPI_URL") {
            raw.url = Some(url);
        }
        if let Ok(token) = std::env::var("CQAPI_TOKEN") {
            raw.token = Some(token);
        }
        if let Ok(dataset) = std::env::var("CQAPI_DATASET") {
            raw.dataset = Some(dataset);
        }
        if let Some(secs) = env_number("CQAPI_TIMEOUT_SECS")? {
            raw.timeout_secs = Some(secs);
        }
        if let Some(millis) = env_number("CQAPI_POLL_INTERVAL_MS")? {
            raw.poll_interval_ms = Some(millis);
        }

        let mut builder = ClientConfig::builder()
            .with_url(raw.url.ok_or(ConfigError::MissingSetting("url"))?)
            .with_token(raw.token.ok_or(ConfigError::MissingSetting("token"))?);
        if let Some(dataset) = raw.dataset {
            builder = builder.with_dataset(dataset);
        }
        if let Some(secs) = raw.timeout_secs {
            builder = builder.with_timeout(Duration::from_secs(secs));
        }
        if let Some(millis) = raw.poll_interval_ms {
            builder = builder.with_poll_interval(Duration::from_millis(millis));
        }
        if let Some(max_polls) = raw.max_polls {
            builder = builder.with_max_polls(max_polls);
        }
        builder.build()
    }
}

fn env_number(key: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidSetting { key, value }),
        Err(_) => Ok(None),
    }
}

/// Builder for ClientConfig.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    url: Option<String>,
    token: Option<String>,
    dataset: Option<String>,
    timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    max_polls: Option<usize>,
}

impl ClientConfigBuilder {
    /// Sets the base url.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the default dataset.
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the pause between status polls.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = Some(poll_interval);
        self
    }

    /// Sets the number of status polls before giving up.
    pub fn with_max_polls(mut self, max_polls: usize) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Builds the ClientConfig.
    ///
    /// Fails if url or token is missing or the url is not http(s).
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let url = self.url.ok_or(ConfigError::MissingSetting("url"))?;
        let url = url.trim().trim_end_matches('/').to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidSetting { key: "url", value: url });
        }
        let token = self.token.ok_or(ConfigError::MissingSetting("token"))?;

        Ok(ClientConfig {
            url,
            token,
            dataset: self.dataset,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            max_polls: self.max_polls.unwrap_or(DEFAULT_MAX_POLLS).max(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const ENV_KEYS: [&str; 5] = [
        "CQAPI_URL",
        "CQAPI_TOKEN",
        "CQAPI_DATASET",
        "CQAPI_TIMEOUT_SECS",
        "CQAPI_POLL_INTERVAL_MS",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder()
            .with_url("http://localhost:8080/")
            .with_token("secret")
            .build()
            .unwrap();

        assert_eq!(config.url, "http://localhost:8080");
        assert_eq!(config.dataset, None);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.max_polls, DEFAULT_MAX_POLLS);
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let err = ClientConfig::builder()
            .with_url("localhost:8080")
            .with_token("secret")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { key: "url", .. }));
    }

    #[test]
    #[serial]
    fn test_load_yaml_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "url: https://cq.example.org\ntoken: abc\ndataset: dataset1\ntimeout_secs: 30\nmax_polls: 10"
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.url, "https://cq.example.org");
        assert_eq!(config.token, "abc");
        assert_eq!(config.dataset.as_deref(), Some("dataset1"));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_polls, 10);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        std::env::set_var("CQAPI_TOKEN", "from-env");
        std::env::set_var("CQAPI_POLL_INTERVAL_MS", "50");

        let config = ClientConfig::from_yaml_str("url: http://localhost:8080\ntoken: from-file").unwrap();
        clear_env();

        assert_eq!(config.token, "from-env");
        assert_eq!(config.poll_interval, Duration::from_millis(50));
    }

    #[test]
    #[serial]
    fn test_missing_token() {
        clear_env();
        let err = ClientConfig::from_yaml_str("url: http://localhost:8080").unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting("token")));
    }

    #[test]
    #[serial]
    fn test_invalid_env_number() {
        clear_env();
        std::env::set_var("CQAPI_URL", "http://localhost:8080");
        std::env::set_var("CQAPI_TOKEN", "t");
        std::env::set_var("CQAPI_TIMEOUT_SECS", "soon");

        let err = ClientConfig::from_env().unwrap_err();
        clear_env();

        assert!(matches!(err, ConfigError::InvalidSetting { key: "CQAPI_TIMEOUT_SECS", .. }));
    }

    #[test]
    #[serial]
    fn test_missing_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
