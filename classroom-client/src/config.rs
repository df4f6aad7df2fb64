use classroom_common::util::{NonPositiveDurationError, PositiveDuration};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "CLASSROOM_";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api/classroom";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid request timeout: {0}")]
    RequestTimeout(#[from] NonPositiveDurationError),
}

/// Settings read from `CLASSROOM_*` environment variables.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_owned()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            session_file: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if e.not_found() {
                debug!("No .dotenv file found");
            } else {
                return Err(e.into());
            }
        }

        envy::prefixed(ENV_PREFIX)
            .from_env()
            .map_err(ConfigError::from)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars)
            .map_err(ConfigError::from)
    }

    pub fn request_timeout(&self) -> Result<PositiveDuration, ConfigError> {
        Ok(PositiveDuration::from_secs(self.request_timeout_secs)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ClientConfig, DEFAULT_API_URL};
    use std::path::PathBuf;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = ClientConfig::from_vars(Vec::new()).unwrap();

        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout().unwrap().as_std().as_secs(), 15);
    }

    #[test]
    fn prefixed_variables_are_read() {
        let config = ClientConfig::from_vars(vars(&[
            ("CLASSROOM_API_URL", "https://example.com/api/classroom/"),
            ("CLASSROOM_SESSION_FILE", "/tmp/classroom-auth.json"),
            ("CLASSROOM_REQUEST_TIMEOUT_SECS", "3"),
            ("API_URL", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://example.com/api/classroom/");
        assert_eq!(
            config.session_file,
            Some(PathBuf::from("/tmp/classroom-auth.json"))
        );
        assert_eq!(config.request_timeout_secs, 3);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ClientConfig::from_vars(vars(&[("CLASSROOM_REQUEST_TIMEOUT_SECS", "0")])).unwrap();

        assert!(config.request_timeout().is_err());
    }
}
