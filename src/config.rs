use crate::api::DEFAULT_BASE_URL;
use std::env;
use std::time::Duration;

/// A configuration variable is missing or unparsable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Application configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    pub api_token: String,
    pub base_url: String,
    pub timeout: Duration,
    pub file_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_token = lookup("LAUNCHDARKLY_API_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(ConfigError::Missing {
                name: "LAUNCHDARKLY_API_TOKEN",
            })?;

        let timeout_secs: u64 = parse(&lookup, "LAUNCHDARKLY_TIMEOUT_SECS", 30, "a number of seconds")?;
        let file_concurrency: usize =
            parse(&lookup, "LDSYNC_FILE_CONCURRENCY", 4, "a positive number")?;
        if file_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "LDSYNC_FILE_CONCURRENCY",
                expected: "a positive number",
                value: "0".into(),
            });
        }

        Ok(Self {
            api_token,
            base_url: lookup("LAUNCHDARKLY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            file_concurrency,
        })
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected,
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_token_is_set() {
        let config = Config::from_lookup(lookup(&[("LAUNCHDARKLY_API_TOKEN", "api-123")])).unwrap();
        assert_eq!(config.api_token, "api-123");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.file_concurrency, 4);
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).err().unwrap();
        assert_eq!(
            err,
            ConfigError::Missing {
                name: "LAUNCHDARKLY_API_TOKEN"
            }
        );
        assert_eq!(err.to_string(), "LAUNCHDARKLY_API_TOKEN must be set");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("LAUNCHDARKLY_API_TOKEN", "api-123"),
            ("LAUNCHDARKLY_BASE_URL", "http://localhost:8080"),
            ("LAUNCHDARKLY_TIMEOUT_SECS", "5"),
            ("LDSYNC_FILE_CONCURRENCY", "1"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.file_concurrency, 1);
    }

    #[test]
    fn invalid_timeout_names_the_variable_and_value() {
        let err = Config::from_lookup(lookup(&[
            ("LAUNCHDARKLY_API_TOKEN", "api-123"),
            ("LAUNCHDARKLY_TIMEOUT_SECS", "soon"),
        ]))
        .err()
        .unwrap();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "LAUNCHDARKLY_TIMEOUT_SECS",
                expected: "a number of seconds",
                value: "soon".into(),
            }
        );
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("LAUNCHDARKLY_API_TOKEN", "api-123"),
            ("LDSYNC_FILE_CONCURRENCY", "0"),
        ]))
        .err()
        .unwrap();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "LDSYNC_FILE_CONCURRENCY",
                ..
            }
        ));
    }
}
