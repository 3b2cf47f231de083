//! Extension instantiation from declared identifiers.
//!
//! # Responsibility
//! - Query the service container for injected extensions.
//! - Fall back to explicitly registered default-constructible types.
//! - Report the kind and identifier of anything that cannot be built.
//!
//! # Invariants
//! - Container bindings win over same-named catalog types.
//! - Only `ContainerError::Unregistered` triggers the catalog fallback; a
//!   construction failure is never masked.
//! - A resolved instance always matches the requested kind.

use crate::extension::descriptor::{normalize_identifier, ExtensionDescriptor, ExtensionKind};
use crate::server::{DavCollection, DavPlugin};
use log::debug;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Extension instance produced by the container or the catalog.
pub enum Service {
    Plugin(Box<dyn DavPlugin>),
    Collection(Box<dyn DavCollection>),
}

impl Service {
    pub fn kind(&self) -> ExtensionKind {
        match self {
            Self::Plugin(_) => ExtensionKind::Plugin,
            Self::Collection(_) => ExtensionKind::Collection,
        }
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plugin(plugin) => f.debug_tuple("Plugin").field(&plugin.plugin_name()).finish(),
            Self::Collection(collection) => f
                .debug_tuple("Collection")
                .field(&collection.collection_name())
                .finish(),
        }
    }
}

/// Container lookup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// No binding exists for the identifier.
    Unregistered(String),
    /// A binding exists but failed to build its instance.
    Construction { identifier: String, message: String },
}

impl Display for ContainerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unregistered(identifier) => {
                write!(f, "no container binding for `{identifier}`")
            }
            Self::Construction {
                identifier,
                message,
            } => write!(f, "container failed to build `{identifier}`: {message}"),
        }
    }
}

impl Error for ContainerError {}

/// Dependency-injection lookup used before direct construction.
pub trait ServiceContainer {
    fn query(&self, identifier: &str) -> Result<Service, ContainerError>;
}

type Binding = Box<dyn Fn() -> Result<Service, String> + Send + Sync>;

/// In-process container keyed by normalized identifier.
///
/// Each binding builds a fresh instance per query, so collaborators can be
/// captured by the closure at startup.
#[derive(Default)]
pub struct ServiceBindings {
    bindings: BTreeMap<String, Binding>,
}

impl ServiceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a plugin builder under `identifier`.
    ///
    /// # Errors
    /// - `DuplicateIdentifier` when any builder is already bound there.
    pub fn bind_plugin<P, F>(&mut self, identifier: &str, build: F) -> Result<(), CatalogError>
    where
        P: DavPlugin + 'static,
        F: Fn() -> Result<P, String> + Send + Sync + 'static,
    {
        self.insert(
            identifier,
            Box::new(move || build().map(|plugin| Service::Plugin(Box::new(plugin)))),
        )
    }

    /// Binds a collection builder under `identifier`.
    ///
    /// # Errors
    /// - `DuplicateIdentifier` when any builder is already bound there.
    pub fn bind_collection<C, F>(&mut self, identifier: &str, build: F) -> Result<(), CatalogError>
    where
        C: DavCollection + 'static,
        F: Fn() -> Result<C, String> + Send + Sync + 'static,
    {
        self.insert(
            identifier,
            Box::new(move || build().map(|collection| Service::Collection(Box::new(collection)))),
        )
    }

    fn insert(&mut self, identifier: &str, binding: Binding) -> Result<(), CatalogError> {
        let key = catalog_key(identifier)?;
        match self.bindings.entry(key) {
            Entry::Occupied(slot) => Err(CatalogError::DuplicateIdentifier(slot.key().clone())),
            Entry::Vacant(slot) => {
                slot.insert(binding);
                Ok(())
            }
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        normalize_identifier(identifier)
            .map(|key| self.bindings.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl ServiceContainer for ServiceBindings {
    fn query(&self, identifier: &str) -> Result<Service, ContainerError> {
        let Some(binding) = normalize_identifier(identifier)
            .ok()
            .and_then(|key| self.bindings.get(&key))
        else {
            return Err(ContainerError::Unregistered(identifier.to_string()));
        };
        binding().map_err(|message| ContainerError::Construction {
            identifier: identifier.to_string(),
            message,
        })
    }
}

fn construct_plugin<T: DavPlugin + Default + 'static>() -> Box<dyn DavPlugin> {
    Box::new(T::default())
}

fn construct_collection<T: DavCollection + Default + 'static>() -> Box<dyn DavCollection> {
    Box::new(T::default())
}

/// Explicit catalog of default-constructible extension types.
///
/// Registering a type here is the opt-in marker that it may be built without
/// container-managed collaborators.
#[derive(Default)]
pub struct TypeCatalog {
    plugins: BTreeMap<String, fn() -> Box<dyn DavPlugin>>,
    collections: BTreeMap<String, fn() -> Box<dyn DavCollection>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plugin<T>(&mut self, identifier: &str) -> Result<(), CatalogError>
    where
        T: DavPlugin + Default + 'static,
    {
        let key = catalog_key(identifier)?;
        if self.plugins.contains_key(&key) {
            return Err(CatalogError::DuplicateIdentifier(key));
        }
        self.plugins.insert(key, construct_plugin::<T>);
        Ok(())
    }

    pub fn register_collection<T>(&mut self, identifier: &str) -> Result<(), CatalogError>
    where
        T: DavCollection + Default + 'static,
    {
        let key = catalog_key(identifier)?;
        if self.collections.contains_key(&key) {
            return Err(CatalogError::DuplicateIdentifier(key));
        }
        self.collections.insert(key, construct_collection::<T>);
        Ok(())
    }

    /// Default-constructs the type registered under `identifier` for `kind`.
    pub fn construct(&self, kind: ExtensionKind, identifier: &str) -> Option<Service> {
        let key = normalize_identifier(identifier).ok()?;
        match kind {
            ExtensionKind::Plugin => self.plugins.get(&key).map(|build| Service::Plugin(build())),
            ExtensionKind::Collection => self
                .collections
                .get(&key)
                .map(|build| Service::Collection(build())),
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len() + self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty() && self.collections.is_empty()
    }
}

fn catalog_key(identifier: &str) -> Result<String, CatalogError> {
    normalize_identifier(identifier)
        .map_err(|_| CatalogError::InvalidIdentifier(identifier.to_string()))
}

/// Catalog and binding registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    InvalidIdentifier(String),
    DuplicateIdentifier(String),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(value) => {
                write!(f, "extension type identifier is invalid: {value}")
            }
            Self::DuplicateIdentifier(value) => {
                write!(f, "extension type already registered: {value}")
            }
        }
    }
}

impl Error for CatalogError {}

/// Fatal extension loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionLoadError {
    /// Neither a container binding nor a catalog type exists.
    Unresolvable {
        kind: ExtensionKind,
        identifier: String,
        app_id: String,
    },
    /// The container binding failed while building the instance.
    Construction {
        kind: ExtensionKind,
        identifier: String,
        app_id: String,
        message: String,
    },
    /// The container built a different extension kind than declared.
    KindMismatch {
        kind: ExtensionKind,
        identifier: String,
        app_id: String,
        actual: ExtensionKind,
    },
}

impl ExtensionLoadError {
    pub fn kind(&self) -> ExtensionKind {
        match self {
            Self::Unresolvable { kind, .. }
            | Self::Construction { kind, .. }
            | Self::KindMismatch { kind, .. } => *kind,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Unresolvable { identifier, .. }
            | Self::Construction { identifier, .. }
            | Self::KindMismatch { identifier, .. } => identifier,
        }
    }

    pub fn app_id(&self) -> &str {
        match self {
            Self::Unresolvable { app_id, .. }
            | Self::Construction { app_id, .. }
            | Self::KindMismatch { app_id, .. } => app_id,
        }
    }

    /// Stable code used in `error_code=` log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unresolvable { .. } => "extension_unresolvable",
            Self::Construction { .. } => "extension_construction_failed",
            Self::KindMismatch { .. } => "extension_kind_mismatch",
        }
    }
}

impl Display for ExtensionLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolvable {
                kind,
                identifier,
                app_id,
            } => write!(
                f,
                "dav {kind} `{identifier}` declared by app `{app_id}` is unknown and could not be loaded"
            ),
            Self::Construction {
                kind,
                identifier,
                app_id,
                message,
            } => write!(
                f,
                "dav {kind} `{identifier}` declared by app `{app_id}` failed to build: {message}"
            ),
            Self::KindMismatch {
                kind,
                identifier,
                app_id,
                actual,
            } => write!(
                f,
                "dav {kind} `{identifier}` declared by app `{app_id}` resolved to a {actual}"
            ),
        }
    }
}

impl Error for ExtensionLoadError {}

/// Resolves descriptors into mountable instances.
pub struct ExtensionFactory<'a> {
    container: &'a dyn ServiceContainer,
    catalog: &'a TypeCatalog,
}

impl<'a> ExtensionFactory<'a> {
    pub fn new(container: &'a dyn ServiceContainer, catalog: &'a TypeCatalog) -> Self {
        Self { container, catalog }
    }

    /// Resolves one descriptor: container first, catalog on `Unregistered`.
    pub fn resolve(&self, descriptor: &ExtensionDescriptor) -> Result<Service, ExtensionLoadError> {
        let kind = descriptor.kind;
        let identifier = descriptor.identifier.as_str();

        match self.container.query(identifier) {
            Ok(service) if service.kind() == kind => {
                debug!(
                    "event=extension_resolve module=extension status=ok source=container kind={} identifier={}",
                    kind, identifier
                );
                Ok(service)
            }
            Ok(service) => Err(ExtensionLoadError::KindMismatch {
                kind,
                identifier: identifier.to_string(),
                app_id: descriptor.source_app.clone(),
                actual: service.kind(),
            }),
            Err(ContainerError::Unregistered(_)) => {
                let service = self.catalog.construct(kind, identifier).ok_or_else(|| {
                    ExtensionLoadError::Unresolvable {
                        kind,
                        identifier: identifier.to_string(),
                        app_id: descriptor.source_app.clone(),
                    }
                })?;
                debug!(
                    "event=extension_resolve module=extension status=ok source=catalog kind={} identifier={}",
                    kind, identifier
                );
                Ok(service)
            }
            Err(ContainerError::Construction { message, .. }) => {
                Err(ExtensionLoadError::Construction {
                    kind,
                    identifier: identifier.to_string(),
                    app_id: descriptor.source_app.clone(),
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CatalogError, ContainerError, ExtensionFactory, ExtensionLoadError, Service,
        ServiceBindings, ServiceContainer, TypeCatalog,
    };
    use crate::extension::descriptor::{ExtensionDescriptor, ExtensionKind};
    use crate::server::{DavCollection, DavPlugin};

    #[derive(Default)]
    struct CatalogPlugin;

    impl DavPlugin for CatalogPlugin {
        fn plugin_name(&self) -> &str {
            "catalog"
        }
    }

    struct InjectedPlugin {
        name: String,
    }

    impl DavPlugin for InjectedPlugin {
        fn plugin_name(&self) -> &str {
            &self.name
        }
    }

    #[derive(Default)]
    struct RootCollection;

    impl DavCollection for RootCollection {
        fn collection_name(&self) -> &str {
            "root"
        }
    }

    fn plugin(identifier: &str) -> ExtensionDescriptor {
        ExtensionDescriptor::new(ExtensionKind::Plugin, identifier, "calendar")
            .expect("descriptor")
    }

    fn plugin_name(service: Service) -> String {
        match service {
            Service::Plugin(plugin) => plugin.plugin_name().to_string(),
            Service::Collection(_) => panic!("expected plugin"),
        }
    }

    #[test]
    fn bindings_report_unregistered_and_construction_failures_separately() {
        let mut bindings = ServiceBindings::new();
        bindings
            .bind_plugin::<InjectedPlugin, _>("Dav\\Broken", || Err("db offline".to_string()))
            .expect("bind");

        let err = bindings.query("Dav\\Missing").expect_err("missing binding");
        assert_eq!(err, ContainerError::Unregistered("Dav\\Missing".to_string()));

        let err = bindings.query("Dav\\Broken").expect_err("broken binding");
        assert!(matches!(err, ContainerError::Construction { .. }));
    }

    #[test]
    fn bindings_normalize_leading_backslash() {
        let mut bindings = ServiceBindings::new();
        bindings
            .bind_plugin("\\Dav\\Injected", || {
                Ok(InjectedPlugin {
                    name: "injected".to_string(),
                })
            })
            .expect("bind");
        assert!(bindings.contains("Dav\\Injected"));
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn bindings_reject_duplicate_identifier_across_kinds() {
        let mut bindings = ServiceBindings::new();
        bindings
            .bind_plugin("Dav\\Shared", || {
                Ok(InjectedPlugin {
                    name: "first".to_string(),
                })
            })
            .expect("first binding");

        let err = bindings
            .bind_plugin("\\Dav\\Shared", || {
                Ok(InjectedPlugin {
                    name: "second".to_string(),
                })
            })
            .expect_err("same plugin identifier must fail");
        assert_eq!(
            err,
            CatalogError::DuplicateIdentifier("Dav\\Shared".to_string())
        );
        let err = bindings
            .bind_collection("Dav\\Shared", || Ok(RootCollection))
            .expect_err("collection under a bound identifier must fail");
        assert!(matches!(err, CatalogError::DuplicateIdentifier(_)));

        match bindings.query("Dav\\Shared").expect("original binding kept") {
            Service::Plugin(plugin) => assert_eq!(plugin.plugin_name(), "first"),
            Service::Collection(_) => panic!("expected plugin"),
        }
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn catalog_rejects_duplicate_and_invalid_identifiers() {
        let mut catalog = TypeCatalog::new();
        catalog
            .register_plugin::<CatalogPlugin>("Dav\\CatalogPlugin")
            .expect("first registration");
        let err = catalog
            .register_plugin::<CatalogPlugin>("\\Dav\\CatalogPlugin")
            .expect_err("duplicate must fail");
        assert_eq!(
            err,
            CatalogError::DuplicateIdentifier("Dav\\CatalogPlugin".to_string())
        );

        let err = catalog
            .register_collection::<RootCollection>("not a type")
            .expect_err("invalid must fail");
        assert!(matches!(err, CatalogError::InvalidIdentifier(_)));
    }

    #[test]
    fn catalog_construct_is_kind_scoped() {
        let mut catalog = TypeCatalog::new();
        catalog
            .register_collection::<RootCollection>("Dav\\Root")
            .expect("register");
        assert!(catalog
            .construct(ExtensionKind::Plugin, "Dav\\Root")
            .is_none());
        assert!(matches!(
            catalog.construct(ExtensionKind::Collection, "Dav\\Root"),
            Some(Service::Collection(_))
        ));
    }

    #[test]
    fn container_binding_takes_precedence_over_catalog() {
        let mut bindings = ServiceBindings::new();
        bindings
            .bind_plugin("Dav\\Shared", || {
                Ok(InjectedPlugin {
                    name: "from-container".to_string(),
                })
            })
            .expect("bind");
        let mut catalog = TypeCatalog::new();
        catalog
            .register_plugin::<CatalogPlugin>("Dav\\Shared")
            .expect("register");

        let factory = ExtensionFactory::new(&bindings, &catalog);
        let service = factory.resolve(&plugin("Dav\\Shared")).expect("resolve");
        assert_eq!(plugin_name(service), "from-container");
    }

    #[test]
    fn construction_error_is_not_masked_by_catalog() {
        let mut bindings = ServiceBindings::new();
        bindings
            .bind_plugin::<InjectedPlugin, _>("Dav\\Shared", || Err("missing secret".to_string()))
            .expect("bind");
        let mut catalog = TypeCatalog::new();
        catalog
            .register_plugin::<CatalogPlugin>("Dav\\Shared")
            .expect("register");

        let factory = ExtensionFactory::new(&bindings, &catalog);
        let err = factory
            .resolve(&plugin("Dav\\Shared"))
            .expect_err("construction failure must surface");
        assert_eq!(
            err,
            ExtensionLoadError::Construction {
                kind: ExtensionKind::Plugin,
                identifier: "Dav\\Shared".to_string(),
                app_id: "calendar".to_string(),
                message: "missing secret".to_string(),
            }
        );
    }

    #[test]
    fn kind_mismatch_is_fatal() {
        let mut bindings = ServiceBindings::new();
        bindings
            .bind_collection("Dav\\Root", || Ok(RootCollection))
            .expect("bind");
        let catalog = TypeCatalog::new();

        let factory = ExtensionFactory::new(&bindings, &catalog);
        let err = factory
            .resolve(&plugin("Dav\\Root"))
            .expect_err("collection is not a plugin");
        assert!(matches!(
            err,
            ExtensionLoadError::KindMismatch {
                actual: ExtensionKind::Collection,
                ..
            }
        ));
        assert!(err.to_string().contains("resolved to a collection"));
    }
}
