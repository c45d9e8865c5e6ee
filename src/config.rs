//! Environment-driven client configuration.
//!
//! # Environment Variables
//!
//! | Variable                | Default                            | Meaning                                   |
//! |-------------------------|------------------------------------|-------------------------------------------|
//! | `TASKBOARD_API_URL`     | `http://localhost:8080/api/tasks`  | Task collection endpoint                  |
//! | `TASKBOARD_TIMEOUT_MS`  | unset                              | Transport timeout; `0` or unset means none |
//! | `TASKBOARD_PREFERENCES` | `taskboard-preferences.json`       | Preference file path                      |
//! | `TASKBOARD_REFETCH`     | `always`                           | `always`, `success` or `never`            |
//! | `TASKBOARD_LATEST_WINS` | `false`                            | Serialize same-task mutations             |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::coordinator::{ConcurrencyPolicy, CoordinatorOptions, RefetchPolicy};

/// Default task collection endpoint.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/tasks";

/// Default preference file path.
pub const DEFAULT_PREFERENCES_PATH: &str = "taskboard-preferences.json";

const API_URL_VAR: &str = "TASKBOARD_API_URL";
const TIMEOUT_VAR: &str = "TASKBOARD_TIMEOUT_MS";
const PREFERENCES_VAR: &str = "TASKBOARD_PREFERENCES";
const REFETCH_VAR: &str = "TASKBOARD_REFETCH";
const LATEST_WINS_VAR: &str = "TASKBOARD_LATEST_WINS";

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration of the task client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Task collection endpoint.
    pub api_url: String,
    /// Transport timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Where preferences are persisted.
    pub preferences_path: PathBuf,
    /// Coordinator behavior.
    pub coordinator: CoordinatorOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: None,
            preferences_path: PathBuf::from(DEFAULT_PREFERENCES_PATH),
            coordinator: CoordinatorOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an invalid value. Missing
    /// variables use their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a configuration reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = match lookup(API_URL_VAR) {
            Some(url) => parse_api_url(&url)?,
            None => defaults.api_url,
        };
        let timeout = parse_var(&lookup, TIMEOUT_VAR, "a number of milliseconds", |raw| {
            raw.parse::<u64>().ok()
        })?
        .filter(|millis| *millis > 0)
        .map(Duration::from_millis);
        let preferences_path = lookup(PREFERENCES_VAR)
            .filter(|path| !path.trim().is_empty())
            .map_or(defaults.preferences_path, PathBuf::from);
        let refetch = parse_var(&lookup, REFETCH_VAR, "always, success or never", parse_refetch)?
            .unwrap_or_default();
        let concurrency = match parse_var(&lookup, LATEST_WINS_VAR, "true or false", parse_bool)? {
            Some(true) => ConcurrencyPolicy::LatestWins,
            Some(false) | None => ConcurrencyPolicy::Unserialized,
        };

        Ok(Self {
            api_url,
            timeout,
            preferences_path,
            coordinator: CoordinatorOptions {
                refetch,
                concurrency,
            },
        })
    }
}

// =============================================================================
// Variable Parsing
// =============================================================================

/// Reads `name` and parses it. Unset and blank variables yield `None`.
fn parse_var<F, T, P>(
    lookup: &F,
    name: &str,
    expected: &'static str,
    parse: P,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    P: FnOnce(&str) -> Option<T>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse(trimmed)
        .map(Some)
        .ok_or_else(|| ConfigError::InvalidValue {
            name: name.to_string(),
            expected,
            value: raw,
        })
}

fn parse_api_url(raw: &str) -> Result<String, ConfigError> {
    let url = raw.trim();
    let has_host = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .is_some_and(|rest| !rest.is_empty());
    if has_host {
        Ok(url.to_string())
    } else {
        Err(ConfigError::InvalidApiUrl(raw.to_string()))
    }
}

fn parse_refetch(raw: &str) -> Option<RefetchPolicy> {
    match raw.to_ascii_lowercase().as_str() {
        "always" => Some(RefetchPolicy::AfterSettlement),
        "success" => Some(RefetchPolicy::OnSuccess),
        "never" => Some(RefetchPolicy::Never),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("Invalid value for {name}: expected {expected} (got '{value}')")]
    InvalidValue {
        /// Variable name.
        name: String,
        /// Description of the accepted values.
        expected: &'static str,
        /// Actual value.
        value: String,
    },

    /// The endpoint is not an `http` or `https` URL.
    #[error("Invalid TASKBOARD_API_URL: expected an http(s) URL (got '{0}')")]
    InvalidApiUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[rstest]
    fn test_defaults_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url, "http://localhost:8080/api/tasks");
        assert_eq!(config.timeout, None);
    }

    #[rstest]
    fn test_all_variables_are_read() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("TASKBOARD_API_URL", "https://tasks.example.com/api/tasks"),
            ("TASKBOARD_TIMEOUT_MS", "2500"),
            ("TASKBOARD_PREFERENCES", "/tmp/prefs.json"),
            ("TASKBOARD_REFETCH", "Success"),
            ("TASKBOARD_LATEST_WINS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://tasks.example.com/api/tasks");
        assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.preferences_path, PathBuf::from("/tmp/prefs.json"));
        assert_eq!(config.coordinator.refetch, RefetchPolicy::OnSuccess);
        assert_eq!(config.coordinator.concurrency, ConcurrencyPolicy::LatestWins);
    }

    #[rstest]
    fn test_zero_timeout_means_none() {
        let config =
            ClientConfig::from_lookup(lookup_from(&[("TASKBOARD_TIMEOUT_MS", "0")])).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[rstest]
    #[case("TASKBOARD_TIMEOUT_MS", "soon")]
    #[case("TASKBOARD_REFETCH", "sometimes")]
    #[case("TASKBOARD_LATEST_WINS", "maybe")]
    fn test_invalid_values_are_rejected(#[case] name: &str, #[case] value: &str) {
        let error = ClientConfig::from_lookup(lookup_from(&[(name, value)])).unwrap_err();
        assert!(matches!(error, ConfigError::InvalidValue { name: ref reported, .. } if reported == name));
    }

    #[rstest]
    #[case("localhost:8080/api/tasks")]
    #[case("http://")]
    fn test_invalid_api_url_is_rejected(#[case] url: &str) {
        let error = ClientConfig::from_lookup(lookup_from(&[("TASKBOARD_API_URL", url)])).unwrap_err();
        assert_eq!(error, ConfigError::InvalidApiUrl(url.to_string()));
    }
}
