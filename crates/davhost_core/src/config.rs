//! Bootstrap configuration for a DAV host process.
//!
//! # Responsibility
//! - Read the JSON bootstrap file.
//! - Normalize and validate every field before anything is opened.
//!
//! # Invariants
//! - A loaded config always has a non-empty base uri ending in `/`.
//! - `apps_roots`, `db_path` and `log_dir` are absolute paths.
//! - `log_level` is one of trace|debug|info|warn|error.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URI: &str = "/remote.php/dav/";

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Validated bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapConfig {
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
    pub apps_roots: Vec<PathBuf>,
    pub db_path: PathBuf,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

impl BootstrapConfig {
    /// Reads, parses and validates the config file at `path`.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&source)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(source: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(source)
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()
    }

    /// Normalizes fields in place and rejects invalid values.
    ///
    /// # Errors
    /// - `InvalidField` naming the first offending field.
    pub fn validate(mut self) -> ConfigResult<Self> {
        self.base_uri = normalize_base_uri(&self.base_uri)?;
        if self.apps_roots.is_empty() {
            return Err(ConfigError::invalid(
                "apps_roots",
                "at least one apps root is required",
            ));
        }
        for root in &self.apps_roots {
            require_absolute("apps_roots", root)?;
        }
        require_absolute("db_path", &self.db_path)?;
        if let Some(log_dir) = &self.log_dir {
            require_absolute("log_dir", log_dir)?;
        }
        self.log_level = self
            .log_level
            .as_deref()
            .map(normalize_config_level)
            .transpose()?;
        Ok(self)
    }

    /// Configured level, or the build-mode default.
    pub fn effective_log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }
}

fn default_base_uri() -> String {
    DEFAULT_BASE_URI.to_string()
}

fn normalize_base_uri(value: &str) -> ConfigResult<String> {
    let trimmed = value.trim();
    if !trimmed.starts_with('/') {
        return Err(ConfigError::invalid(
            "base_uri",
            format!("must start with `/`, got `{trimmed}`"),
        ));
    }
    if trimmed.ends_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/"))
    }
}

fn normalize_config_level(value: &str) -> ConfigResult<String> {
    match value.trim().to_ascii_lowercase().as_str() {
        level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
        "warning" => Ok("warn".to_string()),
        other => Err(ConfigError::invalid(
            "log_level",
            format!("unsupported level `{other}`; expected trace|debug|info|warn|error"),
        )),
    }
}

fn require_absolute(field: &'static str, path: &Path) -> ConfigResult<()> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::invalid(field, "path must not be empty"));
    }
    if !path.is_absolute() {
        return Err(ConfigError::invalid(
            field,
            format!("must be an absolute path, got `{}`", path.display()),
        ));
    }
    Ok(())
}

/// Config loading errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(String),
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(message) => write!(f, "config is not valid JSON: {message}"),
            Self::InvalidField { field, message } => write!(f, "config field `{field}` {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(_) | Self::InvalidField { .. } => None,
        }
    }
}
