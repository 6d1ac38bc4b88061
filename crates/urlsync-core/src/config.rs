#![forbid(unsafe_code)]

//! Engine configuration.
//!
//! A [`SyncConfig`] is fixed for the lifetime of an engine. It can be built
//! in code or, with the `config-file` feature, loaded from TOML or JSON:
//!
//! ```toml
//! prefix = "t_"
//! fields = ["page", "flag"]
//! history = "push"
//! debounce_ms = 300
//! mode = "fragment"
//! wildcard = "prefixed-only"
//! ```
//!
//! ```rust,ignore
//! let config = SyncConfig::from_toml_file("urlsync.toml")?;
//! ```

#[cfg(feature = "config-file")]
use std::path::Path;

#[cfg(feature = "config-file")]
use serde::{Deserialize, Serialize};

use std::time::Duration;

use urlsync_backend::HistoryMode;

use crate::location::AddressingMode;
use crate::projector::WildcardKeys;

/// Characters that would break a key out of its query pair.
const RESERVED_KEY_CHARS: &[char] = &['&', '=', '#'];
/// Field names must stay flat.
const NESTING_CHARS: &[char] = &['.', '[', ']'];

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-file", serde(default))]
pub struct SyncConfig {
    /// Prepended to every managed key when writing.
    pub prefix: String,

    /// Allow-listed field names. Empty manages every key.
    pub fields: Vec<String>,

    /// Whether writes overwrite the current entry or push a new one.
    pub history: HistoryMode,

    /// Quiet period before a scheduled write lands.
    pub debounce_ms: u64,

    /// Where the query text lives.
    pub mode: AddressingMode,

    /// Which keys a wildcard read includes when a prefix is set.
    pub wildcard: WildcardKeys,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            fields: Vec::new(),
            history: HistoryMode::Replace,
            debounce_ms: 200,
            mode: AddressingMode::Query,
            wildcard: WildcardKeys::All,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: HistoryMode) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: AddressingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_wildcard(mut self, wildcard: WildcardKeys) -> Self {
        self.wildcard = wildcard;
        self
    }

    /// Debounce interval as a [`Duration`].
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Load from a TOML string.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(s)
            .map_err(ConfigError::Toml)?
            .validated()
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config-file")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<Self>(s)
            .map_err(ConfigError::Json)?
            .validated()
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Return `self` if [`validate`](Self::validate) finds nothing.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Check field names and prefix. An empty list means the config is valid.
    ///
    /// The engine accepts invalid configs; this is for loaders and callers
    /// that want to reject them early.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.prefix.contains(RESERVED_KEY_CHARS) {
            errors.push(format!(
                "prefix must not contain '&', '=' or '#', got {:?}",
                self.prefix
            ));
        }

        for (i, field) in self.fields.iter().enumerate() {
            if field.is_empty() {
                errors.push(format!("fields[{i}] must not be empty"));
                continue;
            }
            if field.contains(NESTING_CHARS) {
                errors.push(format!(
                    "fields[{i}] must be flat (no '.', '[' or ']'), got {field:?}"
                ));
            }
            if field.contains(RESERVED_KEY_CHARS) {
                errors.push(format!(
                    "fields[{i}] must not contain '&', '=' or '#', got {field:?}"
                ));
            }
            if self.fields[..i].contains(field) {
                errors.push(format!("fields[{i}] duplicates {field:?}"));
            }
        }

        errors
    }
}

/// Why a [`SyncConfig`] could not be loaded.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io(std::io::Error),
    #[cfg(feature = "config-file")]
    Toml(toml::de::Error),
    #[cfg(feature = "config-file")]
    Json(serde_json::Error),
    /// The document parsed but describes an unusable engine; one message per
    /// offending option.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read urlsync config: {e}"),
            #[cfg(feature = "config-file")]
            Self::Toml(e) => write!(f, "urlsync config is not valid TOML: {e}"),
            #[cfg(feature = "config-file")]
            Self::Json(e) => write!(f, "urlsync config is not valid JSON: {e}"),
            Self::Validation(errors) => {
                write!(f, "invalid urlsync config: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config-file")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config-file")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
