//! Filesystem-backed app location and manifest loading.
//!
//! # Responsibility
//! - Locate an app directory across ordered apps roots.
//! - Read `appinfo/info.xml`, falling back to `appinfo/info.json`.
//!
//! # Invariants
//! - The first root containing the app directory wins.
//! - A located app without any manifest file contributes an empty manifest.
//! - Invalid app ids are never joined onto a root path.

use crate::apps::{is_valid_app_id, AppManifestSource, AppSourceError, AppSourceResult};
use crate::extension::manifest::{Manifest, ManifestError};
use log::debug;
use std::path::{Path, PathBuf};

const APPINFO_DIR: &str = "appinfo";
const INFO_XML: &str = "info.xml";
const INFO_JSON: &str = "info.json";

/// Resolves apps below one or more apps roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemAppSource {
    roots: Vec<PathBuf>,
}

impl FilesystemAppSource {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Returns the app directory, or `None` when no root contains it.
    pub fn locate_app(&self, app_id: &str) -> Option<PathBuf> {
        if !is_valid_app_id(app_id) {
            return None;
        }
        self.roots
            .iter()
            .map(|root| root.join(app_id))
            .find(|candidate| candidate.is_dir())
    }
}

impl AppManifestSource for FilesystemAppSource {
    fn app_manifest(&self, app_id: &str) -> AppSourceResult<Option<Manifest>> {
        let Some(app_dir) = self.locate_app(app_id) else {
            debug!(
                "event=app_locate module=apps status=skip app_id={} reason=path_unresolvable",
                app_id
            );
            return Ok(None);
        };

        let appinfo_dir = app_dir.join(APPINFO_DIR);
        let xml_path = appinfo_dir.join(INFO_XML);
        if xml_path.is_file() {
            let source = read_manifest_file(&xml_path)?;
            return Manifest::from_xml_str(&source)
                .map(Some)
                .map_err(|err| manifest_error(app_id, xml_path, err));
        }

        let json_path = appinfo_dir.join(INFO_JSON);
        if json_path.is_file() {
            let source = read_manifest_file(&json_path)?;
            return Manifest::from_json_str(&source)
                .map(Some)
                .map_err(|err| manifest_error(app_id, json_path, err));
        }

        debug!(
            "event=manifest_load module=apps status=skip app_id={} reason=no_manifest",
            app_id
        );
        Ok(Some(Manifest::empty()))
    }
}

fn read_manifest_file(path: &Path) -> AppSourceResult<String> {
    std::fs::read_to_string(path).map_err(|source| AppSourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn manifest_error(app_id: &str, path: PathBuf, source: ManifestError) -> AppSourceError {
    AppSourceError::Manifest {
        app_id: app_id.to_string(),
        path,
        source,
    }
}
