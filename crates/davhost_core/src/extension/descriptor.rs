//! Extension descriptor value types.
//!
//! # Responsibility
//! - Name the two extension kinds a DAV server can mount.
//! - Carry one declared extension from an app manifest to the factory.
//!
//! # Invariants
//! - `identifier` is trimmed, non-empty and a well-formed type path.
//! - A leading `\` is stripped, so `\Dav\Foo` and `Dav\Foo` name the same type.
//! - Descriptors never own extension instances.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static TYPE_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:(?:\\|::|\.)[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid type path regex")
});

/// Extension category mounted on the DAV server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    /// Request/response processing hook.
    Plugin,
    /// Resource container mounted into the server tree.
    Collection,
}

impl ExtensionKind {
    /// Stable lowercase name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plugin => "plugin",
            Self::Collection => "collection",
        }
    }

    /// Manifest section key below `sabre`.
    pub fn section_key(self) -> &'static str {
        match self {
            Self::Plugin => "plugins",
            Self::Collection => "collections",
        }
    }

    /// Manifest item key below the section.
    pub fn item_key(self) -> &'static str {
        self.as_str()
    }
}

impl Display for ExtensionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extension declared by an installed app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionDescriptor {
    pub kind: ExtensionKind,
    /// Container key or catalog type name, already normalized.
    pub identifier: String,
    /// Declaring app id, kept for diagnostics only.
    pub source_app: String,
}

impl ExtensionDescriptor {
    /// Builds a descriptor after normalizing and validating `identifier`.
    pub fn new(
        kind: ExtensionKind,
        identifier: &str,
        source_app: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        let identifier = normalize_identifier(identifier)?;
        Ok(Self {
            kind,
            identifier,
            source_app: source_app.into(),
        })
    }
}

impl Display for ExtensionDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} `{}` (app `{}`)",
            self.kind, self.identifier, self.source_app
        )
    }
}

/// Normalizes one declared identifier into its canonical lookup key.
///
/// # Errors
/// - `EmptyIdentifier` when the value is blank.
/// - `MalformedIdentifier` when the value is not a type path.
pub fn normalize_identifier(value: &str) -> Result<String, DescriptorError> {
    let trimmed = value.trim();
    let stripped = trimmed.strip_prefix('\\').unwrap_or(trimmed);
    if stripped.is_empty() {
        return Err(DescriptorError::EmptyIdentifier);
    }
    if !TYPE_PATH_RE.is_match(stripped) {
        return Err(DescriptorError::MalformedIdentifier(trimmed.to_string()));
    }
    Ok(stripped.to_string())
}

/// Descriptor construction errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    EmptyIdentifier,
    MalformedIdentifier(String),
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyIdentifier => write!(f, "extension identifier must not be empty"),
            Self::MalformedIdentifier(value) => {
                write!(f, "extension identifier is not a type path: {value}")
            }
        }
    }
}

impl Error for DescriptorError {}
