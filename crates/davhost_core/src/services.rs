//! Host-facing collaborators of the DAV app.
//!
//! # Responsibility
//! - Define the capability, contacts and sync contracts the host provides.
//! - Describe the DAV app's own capability document.
//!
//! # Invariants
//! - A `CapabilitySet` merges providers in registration order; later
//!   providers win on top-level key clashes.

use log::warn;
use serde_json::{json, Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Failure reported by a host service collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "service `{}` failed: {}", self.service, self.message)
    }
}

impl Error for ServiceError {}

/// Contributes one fragment of the host's capability document.
pub trait CapabilityProvider: Send + Sync {
    fn capabilities(&self) -> Value;
}

/// Host side that collects capability providers.
pub trait CapabilityRegistry {
    fn register_capability(&mut self, provider: Arc<dyn CapabilityProvider>);
}

/// Capabilities advertised by the DAV app.
#[derive(Debug, Default, Clone, Copy)]
pub struct DavCapabilities;

impl CapabilityProvider for DavCapabilities {
    fn capabilities(&self) -> Value {
        json!({ "dav": { "chunking": "1.0" } })
    }
}

/// In-memory `CapabilityRegistry`.
#[derive(Default)]
pub struct CapabilitySet {
    providers: Vec<Arc<dyn CapabilityProvider>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Merged capability document as one JSON object.
    ///
    /// Fragments that are not JSON objects are skipped with a warning.
    pub fn document(&self) -> Value {
        let mut merged = Map::new();
        for provider in &self.providers {
            match provider.capabilities() {
                Value::Object(fragment) => merged.extend(fragment),
                other => warn!(
                    "event=capabilities_merge module=services status=skip reason=not_an_object kind={}",
                    json_kind(&other)
                ),
            }
        }
        Value::Object(merged)
    }
}

impl CapabilityRegistry for CapabilitySet {
    fn register_capability(&mut self, provider: Arc<dyn CapabilityProvider>) {
        self.providers.push(provider);
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builds absolute links into the host.
pub trait UrlGenerator: Send + Sync {
    /// Absolute url for a host-relative `path`.
    fn absolute_url(&self, path: &str) -> String;
}

/// Address book exposed to the host's contacts search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBookLink {
    pub key: String,
    pub display_name: String,
    pub url: String,
}

/// Host contacts manager the DAV app registers address books with.
pub trait ContactsRegistry {
    fn register_address_book(&mut self, user_id: &str, address_book: AddressBookLink);
}

/// Exposes a user's DAV address books to the host contacts manager.
pub trait ContactsManager: Send + Sync {
    fn setup_contacts_provider(
        &self,
        contacts: &mut dyn ContactsRegistry,
        user_id: &str,
        urls: &dyn UrlGenerator,
    ) -> Result<(), ServiceError>;
}

/// Mirrors host user accounts into the system address book.
pub trait SyncService: Send + Sync {
    fn update_user(&self, user_id: &str) -> Result<(), ServiceError>;
    fn delete_user(&self, user_id: &str) -> Result<(), ServiceError>;
}
