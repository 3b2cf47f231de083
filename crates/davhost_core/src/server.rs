//! DAV server mount points.
//!
//! # Responsibility
//! - Define the capability traits extensions must satisfy to be mounted.
//! - Provide the mount table a protocol engine reads plugins/collections from.
//!
//! # Invariants
//! - Mount order equals registration order; plugin precedence depends on it.
//! - The server owns every mounted extension; nothing else keeps a handle.
//!
//! Request processing is not part of this crate.

/// Request/response processing hook mounted on the server.
pub trait DavPlugin: Send + Sync {
    /// Stable plugin name used for diagnostics and lookups.
    fn plugin_name(&self) -> &str;
}

/// Resource container mounted into the server tree.
pub trait DavCollection: Send + Sync {
    /// Path segment this collection is mounted under.
    fn collection_name(&self) -> &str;
}

/// Mount points exposed by a DAV server.
pub trait DavServer {
    fn add_plugin(&mut self, plugin: Box<dyn DavPlugin>);
    fn add_collection(&mut self, collection: Box<dyn DavCollection>);
}

/// Mount table for one DAV server instance.
pub struct Server {
    base_uri: String,
    plugins: Vec<Box<dyn DavPlugin>>,
    collections: Vec<Box<dyn DavCollection>>,
}

impl Server {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            plugins: Vec::new(),
            collections: Vec::new(),
        }
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Mounted plugins in registration order.
    pub fn plugins(&self) -> &[Box<dyn DavPlugin>] {
        &self.plugins
    }

    /// Mounted collections in registration order.
    pub fn collections(&self) -> &[Box<dyn DavCollection>] {
        &self.collections
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(|plugin| plugin.plugin_name()).collect()
    }

    pub fn collection_names(&self) -> Vec<&str> {
        self.collections
            .iter()
            .map(|collection| collection.collection_name())
            .collect()
    }

    /// Finds the first mounted plugin with `name`.
    pub fn plugin(&self, name: &str) -> Option<&dyn DavPlugin> {
        self.plugins
            .iter()
            .find(|plugin| plugin.plugin_name() == name)
            .map(|plugin| plugin.as_ref())
    }
}

impl DavServer for Server {
    fn add_plugin(&mut self, plugin: Box<dyn DavPlugin>) {
        self.plugins.push(plugin);
    }

    fn add_collection(&mut self, collection: Box<dyn DavCollection>) {
        self.collections.push(collection);
    }
}
