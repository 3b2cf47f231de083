//! Core of a DAV host: installed-app extension registry and bootstrap.
//!
//! Apps declare DAV plugins and collections in their manifests. This crate
//! discovers those declarations and mounts the built extensions on a server.
//! It also wires the lifecycle hooks the DAV app reacts to and hands the host
//! its capability, contacts and sync collaborators.

pub mod application;
pub mod apps;
pub mod config;
pub mod db;
pub mod events;
pub mod extension;
pub mod logging;
pub mod server;
pub mod services;

pub use application::{DavApplication, DavServices};
pub use apps::{
    AppManifestSource, AppSourceError, AppSourceResult, FilesystemAppSource, InstalledApps,
    SqliteAppStore, StaticAppList,
};
pub use config::{BootstrapConfig, ConfigError};
pub use events::hooks::{BirthdayService, HookError, HookManager, HookSubscriptions};
pub use events::{EventBus, EventTopic, LifecycleEvent, SubscriptionId};
pub use extension::descriptor::{ExtensionDescriptor, ExtensionKind};
pub use extension::factory::{
    ContainerError, ExtensionFactory, ExtensionLoadError, Service, ServiceBindings,
    ServiceContainer, TypeCatalog,
};
pub use extension::manifest::{extract_identifiers, Manifest, ManifestError, ManifestNode};
pub use extension::registry::{ExtensionRegistry, RegistryError, RegistryResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use server::{DavCollection, DavPlugin, DavServer, Server};
pub use services::{
    AddressBookLink, CapabilityProvider, CapabilityRegistry, CapabilitySet, ContactsManager,
    ContactsRegistry, DavCapabilities, ServiceError, SyncService, UrlGenerator,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
