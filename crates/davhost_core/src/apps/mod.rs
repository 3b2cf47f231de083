//! Installed-app collaborators consumed by the extension registry.
//!
//! # Responsibility
//! - Define how the registry learns which apps are installed.
//! - Define how one app's manifest is located and loaded.
//!
//! # Invariants
//! - `installed_apps()` order is deterministic within one process run.
//! - `app_manifest()` returns `Ok(None)` for apps whose location cannot be
//!   resolved; that is a skip, not an error.

use crate::db::DbError;
use crate::extension::manifest::{Manifest, ManifestError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod app_store;
pub mod filesystem;

pub use app_store::{AppRecord, SqliteAppStore};
pub use filesystem::FilesystemAppSource;

pub type AppSourceResult<T> = Result<T, AppSourceError>;

/// Lists installed apps in host-defined order.
pub trait InstalledApps {
    fn installed_apps(&self) -> AppSourceResult<Vec<String>>;
}

/// Loads the manifest of one installed app.
pub trait AppManifestSource {
    fn app_manifest(&self, app_id: &str) -> AppSourceResult<Option<Manifest>>;
}

/// Fixed installed-app list, reported in construction order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAppList {
    apps: Vec<String>,
}

impl StaticAppList {
    pub fn new<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            apps: apps.into_iter().map(Into::into).collect(),
        }
    }
}

impl InstalledApps for StaticAppList {
    fn installed_apps(&self) -> AppSourceResult<Vec<String>> {
        Ok(self.apps.clone())
    }
}

/// App listing and manifest loading errors.
#[derive(Debug)]
pub enum AppSourceError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Manifest {
        app_id: String,
        path: PathBuf,
        source: ManifestError,
    },
    InvalidAppId(String),
    AppNotFound(String),
    Store(DbError),
    InvalidData(String),
}

impl Display for AppSourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read `{}`: {source}", path.display()),
            Self::Manifest {
                app_id,
                path,
                source,
            } => write!(
                f,
                "manifest of app `{app_id}` at `{}` is unreadable: {source}",
                path.display()
            ),
            Self::InvalidAppId(value) => write!(f, "app id is invalid: {value}"),
            Self::AppNotFound(value) => write!(f, "app not installed: {value}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted app data: {message}"),
        }
    }
}

impl Error for AppSourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Manifest { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            Self::InvalidAppId(_) | Self::AppNotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for AppSourceError {
    fn from(value: DbError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for AppSourceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(DbError::Sqlite(value))
    }
}

/// Returns whether `value` is a usable app id.
///
/// App ids double as directory names, so separators and dot segments are
/// rejected.
pub fn is_valid_app_id(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
