//! DAV application bootstrap.
//!
//! # Responsibility
//! - Hold the collaborators needed to build a DAV server.
//! - Build and populate a server, and wire lifecycle hooks onto a bus.
//! - Hand capabilities, contacts setup and the sync service to the host.
//!
//! # Invariants
//! - Collaborators are passed in explicitly; nothing is looked up globally.
//! - `HookManager::setup` runs at most once per application, even when
//!   `register_hooks` is called for several buses.
//! - Hooks are subscribed at most once per bus.

use crate::apps::{AppManifestSource, InstalledApps};
use crate::events::hooks::{
    subscribe_hooks, BirthdayService, HookError, HookManager, HookSubscriptions,
};
use crate::events::EventBus;
use crate::extension::descriptor::ExtensionDescriptor;
use crate::extension::factory::{ExtensionFactory, ServiceContainer, TypeCatalog};
use crate::extension::registry::{ExtensionRegistry, RegistryResult};
use crate::server::Server;
use crate::services::{
    CapabilityRegistry, ContactsManager, ContactsRegistry, DavCapabilities, ServiceError,
    SyncService, UrlGenerator,
};
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Shared service collaborators of a `DavApplication`.
#[derive(Clone)]
pub struct DavServices {
    pub hooks: Arc<dyn HookManager>,
    pub birthdays: Arc<dyn BirthdayService>,
    pub contacts: Arc<dyn ContactsManager>,
    pub urls: Arc<dyn UrlGenerator>,
    pub sync: Arc<dyn SyncService>,
}

/// Bootstrap entry point for one DAV host.
pub struct DavApplication<'a> {
    installed_apps: &'a dyn InstalledApps,
    manifests: &'a dyn AppManifestSource,
    container: &'a dyn ServiceContainer,
    catalog: &'a TypeCatalog,
    services: DavServices,
    hooks_ready: OnceCell<()>,
    hooked_buses: Mutex<BTreeMap<Uuid, HookSubscriptions>>,
}

impl<'a> DavApplication<'a> {
    pub fn new(
        installed_apps: &'a dyn InstalledApps,
        manifests: &'a dyn AppManifestSource,
        container: &'a dyn ServiceContainer,
        catalog: &'a TypeCatalog,
        services: DavServices,
    ) -> Self {
        Self {
            installed_apps,
            manifests,
            container,
            catalog,
            services,
            hooks_ready: OnceCell::new(),
            hooked_buses: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn registry(&self) -> ExtensionRegistry<'_> {
        ExtensionRegistry::new(
            self.manifests,
            ExtensionFactory::new(self.container, self.catalog),
        )
    }

    /// Builds a server at `base_uri` with every installed extension mounted.
    ///
    /// # Errors
    /// - Propagates the first registry failure; no partial server is returned.
    pub fn create_server(&self, base_uri: &str) -> RegistryResult<Server> {
        let mut server = Server::new(base_uri);
        self.registry().populate(&mut server, self.installed_apps)?;
        info!(
            "event=server_create module=application status=ok base_uri={} plugins={} collections={}",
            base_uri,
            server.plugins().len(),
            server.collections().len()
        );
        Ok(server)
    }

    /// Lists installed extension declarations without constructing them.
    pub fn scan_extensions(&self) -> RegistryResult<Vec<ExtensionDescriptor>> {
        self.registry().scan(self.installed_apps)
    }

    /// Runs hook setup once, then subscribes the hook collaborators on `bus`.
    ///
    /// A bus that was already wired by this application keeps its existing
    /// subscriptions, which are returned again.
    ///
    /// # Errors
    /// - Returns the `setup` failure; nothing is subscribed in that case.
    pub fn register_hooks(&self, bus: &mut EventBus) -> Result<HookSubscriptions, HookError> {
        self.hooks_ready
            .get_or_try_init(|| self.services.hooks.setup())?;

        let mut hooked = self
            .hooked_buses
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = hooked.get(&bus.id()) {
            debug!(
                "event=hooks_register module=application status=skip reason=already_subscribed bus={}",
                bus.id()
            );
            return Ok(existing.clone());
        }

        let subscriptions = subscribe_hooks(
            bus,
            Arc::clone(&self.services.hooks),
            Arc::clone(&self.services.birthdays),
        );
        hooked.insert(bus.id(), subscriptions.clone());
        info!(
            "event=hooks_register module=application status=ok bus={}",
            bus.id()
        );
        Ok(subscriptions)
    }

    /// Registers the DAV capability document with the host.
    pub fn register_capabilities(&self, registry: &mut dyn CapabilityRegistry) {
        registry.register_capability(Arc::new(DavCapabilities));
        debug!("event=capabilities_register module=application status=ok");
    }

    /// Exposes `user_id`'s address books to the host contacts manager.
    ///
    /// # Errors
    /// - Returns the contacts manager failure unchanged.
    pub fn setup_contacts_provider(
        &self,
        contacts: &mut dyn ContactsRegistry,
        user_id: &str,
    ) -> Result<(), ServiceError> {
        let result = self.services.contacts.setup_contacts_provider(
            contacts,
            user_id,
            self.services.urls.as_ref(),
        );
        match &result {
            Ok(()) => debug!(
                "event=contacts_setup module=application status=ok user_id={}",
                user_id
            ),
            Err(err) => warn!(
                "event=contacts_setup module=application status=error user_id={} error={}",
                user_id, err
            ),
        }
        result
    }

    pub fn sync_service(&self) -> Arc<dyn SyncService> {
        Arc::clone(&self.services.sync)
    }
}
