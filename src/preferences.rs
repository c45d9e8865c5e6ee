//! Persistence of user preferences.
//!
//! Two values are stored under fixed keys of a string key-value store:
//!
//! - `taskFilters`: the last applied [`FilterSpec`] as JSON
//! - `theme`: `"light"` or `"dark"`
//!
//! Stored values that cannot be read fall back to defaults without failing.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{FilterSpec, ParseEnumError};

/// Key of the stored filter specification.
pub const FILTERS_KEY: &str = "taskFilters";

/// Key of the stored theme.
pub const THEME_KEY: &str = "theme";

// =============================================================================
// Errors
// =============================================================================

/// Failure to persist a preference.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// Reading or writing the backing file failed.
    #[error("Preference file {path} could not be accessed: {source}")]
    Io {
        /// Backing file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A value could not be encoded.
    #[error("Preference could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

// =============================================================================
// Key-Value Stores
// =============================================================================

/// String key-value storage for preferences.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// Volatile key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<FxHashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Key-value store persisted as one JSON object of strings.
///
/// The file is read once when opened and rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Opens the store at `path`.
    ///
    /// A missing file starts empty, as does a file that is not a JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) => parse_object(&path, &contents),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(source) => return Err(PreferenceError::Io { path, source }),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_object(path: &Path, contents: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(contents) {
        Ok(Value::Object(values)) => values,
        Ok(_) | Err(_) => {
            tracing::debug!(path = %path.display(), "Ignoring unreadable preference file");
            Map::new()
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        let value = self.values.lock().get(key).cloned()?;
        Some(match value {
            Value::String(value) => value,
            other => other.to_string(),
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), Value::String(value.to_string()));
        let encoded = serde_json::to_string_pretty(&*values)?;
        drop(values);
        fs::write(&self.path, encoded).map_err(|source| PreferenceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

// =============================================================================
// Theme
// =============================================================================

/// Color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light theme.
    #[default]
    Light,
    /// Dark theme.
    Dark,
}

impl Theme {
    /// Returns the stored name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Returns the other theme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            _ => Err(ParseEnumError::new("theme", value)),
        }
    }
}

// =============================================================================
// Preferences
// =============================================================================

/// Typed access to the stored preferences.
#[derive(Debug)]
pub struct Preferences<S> {
    store: S,
}

impl<S: KeyValueStore> Preferences<S> {
    /// Wraps `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Loads the stored filter specification.
    ///
    /// Each stored field is merged over the defaults on its own, so one
    /// unreadable field does not discard the others.
    #[must_use]
    pub fn load_filters(&self) -> FilterSpec {
        let Some(raw) = self.store.get(FILTERS_KEY) else {
            return FilterSpec::default();
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(fields)) => merge_filters(&fields),
            Ok(_) | Err(_) => {
                tracing::debug!(value = %raw, "Ignoring malformed stored filters");
                FilterSpec::default()
            }
        }
    }

    /// Stores `filters`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot persist the value.
    pub fn save_filters(&self, filters: &FilterSpec) -> Result<(), PreferenceError> {
        let encoded = serde_json::to_string(filters)?;
        self.store.set(FILTERS_KEY, &encoded)
    }

    /// Loads the stored theme, light by default.
    #[must_use]
    pub fn load_theme(&self) -> Theme {
        self.store
            .get(THEME_KEY)
            .and_then(|raw| {
                raw.parse::<Theme>()
                    .inspect_err(|_| tracing::debug!(value = %raw, "Ignoring malformed stored theme"))
                    .ok()
            })
            .unwrap_or_default()
    }

    /// Stores `theme`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot persist the value.
    pub fn save_theme(&self, theme: Theme) -> Result<(), PreferenceError> {
        self.store.set(THEME_KEY, theme.as_str())
    }

    /// Switches the stored theme and returns the new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot persist the value.
    pub fn toggle_theme(&self) -> Result<Theme, PreferenceError> {
        let theme = self.load_theme().toggled();
        self.save_theme(theme)?;
        Ok(theme)
    }
}

fn merge_filters(fields: &Map<String, Value>) -> FilterSpec {
    fn field<T: serde::de::DeserializeOwned + Default>(
        fields: &Map<String, Value>,
        name: &str,
    ) -> T {
        fields
            .get(name)
            .and_then(|value| {
                T::deserialize(value)
                    .inspect_err(|_| tracing::debug!(field = name, "Ignoring malformed stored filter"))
                    .ok()
            })
            .unwrap_or_default()
    }

    FilterSpec {
        completion: field(fields, "completion"),
        priority: field(fields, "priority"),
        sort: field(fields, "sort"),
    }
}
