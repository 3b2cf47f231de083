//! Installed-app extension registry.
//!
//! # Responsibility
//! - Walk installed apps, read their manifests and mount every declared
//!   plugin and collection on a DAV server.
//! - Offer a dry-run scan that lists descriptors without building anything.
//!
//! # Invariants
//! - Apps are visited in the order `InstalledApps` reports them.
//! - Within one app all plugins are handled before any collection, each in
//!   declaration order.
//! - The first failure aborts the walk; extensions already mounted stay.
//! - An app whose location cannot be resolved is skipped.

use crate::apps::{AppManifestSource, AppSourceError, InstalledApps};
use crate::extension::descriptor::{ExtensionDescriptor, ExtensionKind};
use crate::extension::factory::{ExtensionFactory, ExtensionLoadError, Service};
use crate::extension::manifest::{extract_identifiers, Manifest};
use crate::server::DavServer;
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Plugins first, then collections.
const REGISTRATION_ORDER: [ExtensionKind; 2] = [ExtensionKind::Plugin, ExtensionKind::Collection];

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Fatal registry errors.
#[derive(Debug)]
pub enum RegistryError {
    /// The installed-app list itself could not be read.
    AppList(AppSourceError),
    /// One declared extension could not be loaded.
    Extension(ExtensionLoadError),
}

impl RegistryError {
    /// Stable code used in `error_code=` log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AppList(_) => "app_list_failed",
            Self::Extension(err) => err.error_code(),
        }
    }
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AppList(err) => write!(f, "failed to list installed apps: {err}"),
            Self::Extension(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AppList(err) => Some(err),
            Self::Extension(err) => Some(err),
        }
    }
}

impl From<ExtensionLoadError> for RegistryError {
    fn from(value: ExtensionLoadError) -> Self {
        Self::Extension(value)
    }
}

/// Registers app-declared extensions on a server.
pub struct ExtensionRegistry<'a> {
    manifests: &'a dyn AppManifestSource,
    factory: ExtensionFactory<'a>,
}

impl<'a> ExtensionRegistry<'a> {
    pub fn new(manifests: &'a dyn AppManifestSource, factory: ExtensionFactory<'a>) -> Self {
        Self { manifests, factory }
    }

    /// Resolves and mounts every extension declared by installed apps.
    ///
    /// # Errors
    /// - `AppList` when the installed-app list cannot be read.
    /// - `Extension` for the first declaration that cannot be resolved.
    pub fn populate(
        &self,
        server: &mut dyn DavServer,
        installed_apps: &dyn InstalledApps,
    ) -> RegistryResult<()> {
        info!("event=registry_populate module=extension status=start");
        let mut plugins = 0usize;
        let mut collections = 0usize;

        let result = self.walk(installed_apps, |descriptor| {
            match self.factory.resolve(&descriptor)? {
                Service::Plugin(plugin) => {
                    server.add_plugin(plugin);
                    plugins += 1;
                }
                Service::Collection(collection) => {
                    server.add_collection(collection);
                    collections += 1;
                }
            }
            debug!(
                "event=extension_register module=extension status=ok app_id={} kind={} identifier={}",
                descriptor.source_app, descriptor.kind, descriptor.identifier
            );
            Ok(())
        });

        match &result {
            Ok(()) => info!(
                "event=registry_populate module=extension status=ok plugins={} collections={}",
                plugins, collections
            ),
            Err(err) => error!(
                "event=registry_populate module=extension status=error error_code={} plugins={} collections={} error={}",
                err.error_code(),
                plugins,
                collections,
                err
            ),
        }
        result
    }

    /// Lists descriptors in the order `populate` would register them.
    ///
    /// Nothing is constructed, so unknown identifiers are not detected here.
    pub fn scan(
        &self,
        installed_apps: &dyn InstalledApps,
    ) -> RegistryResult<Vec<ExtensionDescriptor>> {
        let mut descriptors = Vec::new();
        self.walk(installed_apps, |descriptor| {
            descriptors.push(descriptor);
            Ok(())
        })?;
        info!(
            "event=registry_scan module=extension status=ok descriptors={}",
            descriptors.len()
        );
        Ok(descriptors)
    }

    fn walk<F>(&self, installed_apps: &dyn InstalledApps, mut visit: F) -> RegistryResult<()>
    where
        F: FnMut(ExtensionDescriptor) -> RegistryResult<()>,
    {
        let app_ids = installed_apps
            .installed_apps()
            .map_err(RegistryError::AppList)?;

        for app_id in &app_ids {
            let Some(manifest) = self.load_manifest(app_id) else {
                continue;
            };
            for kind in REGISTRATION_ORDER {
                for identifier in extract_identifiers(&manifest, kind) {
                    visit(descriptor_for(kind, &identifier, app_id)?)?;
                }
            }
            debug!(
                "event=app_scan module=extension status=ok app_id={}",
                app_id
            );
        }
        Ok(())
    }

    fn load_manifest(&self, app_id: &str) -> Option<Manifest> {
        match self.manifests.app_manifest(app_id) {
            Ok(Some(manifest)) => Some(manifest),
            Ok(None) => {
                debug!(
                    "event=app_scan module=extension status=skip app_id={} reason=path_unresolvable",
                    app_id
                );
                None
            }
            Err(err) => {
                warn!(
                    "event=app_scan module=extension status=skip app_id={} reason=manifest_unreadable error={}",
                    app_id, err
                );
                None
            }
        }
    }
}

/// Malformed identifiers are reported as unresolvable declarations.
fn descriptor_for(
    kind: ExtensionKind,
    identifier: &str,
    app_id: &str,
) -> Result<ExtensionDescriptor, ExtensionLoadError> {
    ExtensionDescriptor::new(kind, identifier, app_id).map_err(|_| {
        ExtensionLoadError::Unresolvable {
            kind,
            identifier: identifier.trim().to_string(),
            app_id: app_id.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{ExtensionRegistry, RegistryError};
    use crate::apps::{AppManifestSource, AppSourceError, AppSourceResult, StaticAppList};
    use crate::extension::descriptor::ExtensionKind;
    use crate::extension::factory::{
        ExtensionFactory, ExtensionLoadError, ServiceBindings, TypeCatalog,
    };
    use crate::extension::manifest::{Manifest, ManifestError};
    use crate::server::{DavPlugin, Server};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct AuthPlugin;

    impl DavPlugin for AuthPlugin {
        fn plugin_name(&self) -> &str {
            "auth"
        }
    }

    #[derive(Default)]
    struct InMemoryManifests {
        manifests: BTreeMap<String, Option<String>>,
    }

    impl InMemoryManifests {
        fn with_json(mut self, app_id: &str, json: &str) -> Self {
            self.manifests
                .insert(app_id.to_string(), Some(json.to_string()));
            self
        }

        fn with_broken(mut self, app_id: &str) -> Self {
            self.manifests.insert(app_id.to_string(), None);
            self
        }
    }

    impl AppManifestSource for InMemoryManifests {
        fn app_manifest(&self, app_id: &str) -> AppSourceResult<Option<Manifest>> {
            match self.manifests.get(app_id) {
                None => Ok(None),
                Some(Some(json)) => Manifest::from_json_str(json)
                    .map(Some)
                    .map_err(|source| AppSourceError::Manifest {
                        app_id: app_id.to_string(),
                        path: PathBuf::from("info.json"),
                        source,
                    }),
                Some(None) => Err(AppSourceError::Manifest {
                    app_id: app_id.to_string(),
                    path: PathBuf::from("info.xml"),
                    source: ManifestError::MissingRootElement,
                }),
            }
        }
    }

    fn registry<'a>(
        manifests: &'a InMemoryManifests,
        bindings: &'a ServiceBindings,
        catalog: &'a TypeCatalog,
    ) -> ExtensionRegistry<'a> {
        ExtensionRegistry::new(manifests, ExtensionFactory::new(bindings, catalog))
    }

    #[test]
    fn scan_lists_plugins_before_collections_per_app() {
        let manifests = InMemoryManifests::default()
            .with_json(
                "files",
                r#"{"sabre": {"collections": {"collection": "Files\\Root"},
                              "plugins": {"plugin": ["Files\\Lock", "Files\\Props"]}}}"#,
            )
            .with_json(
                "contacts",
                r#"{"sabre": {"plugins": {"plugin": "Contacts\\Sync"}}}"#,
            );
        let bindings = ServiceBindings::new();
        let catalog = TypeCatalog::new();
        let registry = registry(&manifests, &bindings, &catalog);

        let descriptors = registry
            .scan(&StaticAppList::new(["files", "ghost", "contacts"]))
            .expect("scan");
        let summary: Vec<String> = descriptors.iter().map(ToString::to_string).collect();
        assert_eq!(
            summary,
            vec![
                "plugin `Files\\Lock` (app `files`)",
                "plugin `Files\\Props` (app `files`)",
                "collection `Files\\Root` (app `files`)",
                "plugin `Contacts\\Sync` (app `contacts`)",
            ]
        );
    }

    #[test]
    fn unreadable_manifest_is_skipped() {
        let manifests = InMemoryManifests::default()
            .with_broken("broken")
            .with_json("auth", r#"{"sabre": {"plugins": {"plugin": "Dav\\Auth"}}}"#);
        let bindings = ServiceBindings::new();
        let mut catalog = TypeCatalog::new();
        catalog
            .register_plugin::<AuthPlugin>("Dav\\Auth")
            .expect("register");
        let registry = registry(&manifests, &bindings, &catalog);

        let mut server = Server::new("/dav/");
        registry
            .populate(&mut server, &StaticAppList::new(["broken", "auth"]))
            .expect("populate");
        assert_eq!(server.plugin_names(), vec!["auth"]);
    }

    #[test]
    fn malformed_identifier_is_reported_as_unresolvable() {
        let manifests = InMemoryManifests::default().with_json(
            "odd",
            r#"{"sabre": {"collections": {"collection": "not a type"}}}"#,
        );
        let bindings = ServiceBindings::new();
        let catalog = TypeCatalog::new();
        let registry = registry(&manifests, &bindings, &catalog);

        let err = registry
            .scan(&StaticAppList::new(["odd"]))
            .expect_err("malformed identifier must fail");
        match err {
            RegistryError::Extension(ExtensionLoadError::Unresolvable {
                kind,
                identifier,
                app_id,
            }) => {
                assert_eq!(kind, ExtensionKind::Collection);
                assert_eq!(identifier, "not a type");
                assert_eq!(app_id, "odd");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn error_code_follows_the_wrapped_error() {
        let err = RegistryError::AppList(AppSourceError::InvalidData("bad row".to_string()));
        assert_eq!(err.error_code(), "app_list_failed");

        let err = RegistryError::from(ExtensionLoadError::Unresolvable {
            kind: ExtensionKind::Plugin,
            identifier: "Dav\\Missing".to_string(),
            app_id: "calendar".to_string(),
        });
        assert_eq!(err.error_code(), "extension_unresolvable");
        assert!(err.to_string().contains("dav plugin `Dav\\Missing`"));
    }
}
