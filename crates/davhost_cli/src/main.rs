//! Extension scan entry point.
//!
//! # Responsibility
//! - Load a bootstrap config and list every extension installed apps declare.
//! - Never construct extensions; this is a read-only inspection tool.

use clap::Parser;
use davhost_core::{
    db, init_logging, BirthdayService, BootstrapConfig, ContactsManager, ContactsRegistry,
    DavApplication, DavServices, FilesystemAppSource, HookError, HookManager, ServiceBindings,
    ServiceError, SqliteAppStore, SyncService, TypeCatalog, UrlGenerator,
};
use log::error;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// List the DAV plugins and collections declared by installed apps.
#[derive(Parser, Debug)]
#[command(name = "davhost_cli", version, about)]
struct Cli {
    /// Bootstrap config file (JSON)
    config: PathBuf,
}

/// Collaborators for a scan; none of them is reached without a server.
struct InertServices;

impl HookManager for InertServices {
    fn setup(&self) -> Result<(), HookError> {
        Ok(())
    }

    fn first_login(&self, _user_id: &str) -> Result<(), HookError> {
        Ok(())
    }
}

impl BirthdayService for InertServices {
    fn on_card_changed(
        &self,
        _address_book_id: i64,
        _card_uri: &str,
        _card_data: &str,
    ) -> Result<(), HookError> {
        Ok(())
    }

    fn on_card_deleted(&self, _address_book_id: i64, _card_uri: &str) -> Result<(), HookError> {
        Ok(())
    }
}

impl ContactsManager for InertServices {
    fn setup_contacts_provider(
        &self,
        _contacts: &mut dyn ContactsRegistry,
        _user_id: &str,
        _urls: &dyn UrlGenerator,
    ) -> Result<(), ServiceError> {
        Ok(())
    }
}

impl UrlGenerator for InertServices {
    fn absolute_url(&self, path: &str) -> String {
        path.to_string()
    }
}

impl SyncService for InertServices {
    fn update_user(&self, _user_id: &str) -> Result<(), ServiceError> {
        Ok(())
    }

    fn delete_user(&self, _user_id: &str) -> Result<(), ServiceError> {
        Ok(())
    }
}

fn inert_services() -> DavServices {
    let inert = Arc::new(InertServices);
    DavServices {
        hooks: inert.clone(),
        birthdays: inert.clone(),
        contacts: inert.clone(),
        urls: inert.clone(),
        sync: inert,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli.config) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_scan module=cli status=error error={}", err);
            eprintln!("davhost_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    let config = BootstrapConfig::load(config_path)?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(config.effective_log_level(), &log_dir.to_string_lossy())?;
    }

    let conn = db::open_db(&config.db_path)?;
    let store = SqliteAppStore::new(&conn);
    let manifests = FilesystemAppSource::new(config.apps_roots.iter().cloned());
    let bindings = ServiceBindings::new();
    let catalog = TypeCatalog::new();
    let app = DavApplication::new(&store, &manifests, &bindings, &catalog, inert_services());

    let descriptors = app.scan_extensions()?;
    Ok(descriptors
        .iter()
        .map(|descriptor| {
            format!(
                "{} {} {}",
                descriptor.source_app, descriptor.kind, descriptor.identifier
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{run, Cli};
    use clap::error::ErrorKind;
    use clap::{CommandFactory, Parser};
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_single_config_path() {
        let cli = Cli::try_parse_from(["davhost_cli", "/etc/davhost.json"]).expect("parse");
        assert_eq!(cli.config, PathBuf::from("/etc/davhost.json"));
    }

    #[test]
    fn rejects_missing_or_extra_arguments() {
        let err = Cli::try_parse_from(["davhost_cli"]).expect_err("missing config");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["davhost_cli", "a.json", "b.json"]).expect_err("extra");
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn run_lists_declared_extensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let apps_root = dir.path().join("apps");
        let appinfo = apps_root.join("dav").join("appinfo");
        fs::create_dir_all(&appinfo).expect("appinfo dir");
        fs::write(
            appinfo.join("info.json"),
            r#"{"sabre": {"plugins": {"plugin": "Dav\\Auth"}}}"#,
        )
        .expect("info.json");

        let db_path = dir.path().join("apps.db");
        {
            let conn = davhost_core::db::open_db(&db_path).expect("open db");
            davhost_core::SqliteAppStore::new(&conn)
                .install("dav", "1.0.0")
                .expect("install");
        }

        let config_path = dir.path().join("davhost.json");
        let config = serde_json::json!({
            "apps_roots": [apps_root],
            "db_path": db_path,
        });
        fs::write(&config_path, config.to_string()).expect("config");

        let lines = run(&config_path).expect("scan");
        assert_eq!(lines, vec!["dav plugin Dav\\Auth"]);
    }
}
