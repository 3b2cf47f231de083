//! SQLite-backed installed-app store.
//!
//! # Responsibility
//! - Persist which apps are installed, at which version, and whether enabled.
//! - Report enabled apps to the extension registry in installation order.
//!
//! # Invariants
//! - `app_id` is unique and passes `is_valid_app_id`.
//! - Installation order is the row insertion order and survives reinstalls
//!   of an already-present app.

use crate::apps::{is_valid_app_id, AppSourceError, AppSourceResult, InstalledApps};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};

const APP_SELECT_SQL: &str = "SELECT
    app_id,
    installed_version,
    enabled,
    installed_at,
    updated_at
FROM apps";

/// One persisted app row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRecord {
    pub app_id: String,
    pub installed_version: String,
    pub enabled: bool,
    /// Unix epoch milliseconds.
    pub installed_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

/// App store over a migrated connection.
pub struct SqliteAppStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAppStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Records `app_id` as installed at `version` and enables it.
    ///
    /// Re-installing keeps the original installation slot.
    pub fn install(&self, app_id: &str, version: &str) -> AppSourceResult<()> {
        let app_id = checked_app_id(app_id)?;
        let version = version.trim();
        if version.is_empty() {
            return Err(AppSourceError::InvalidData(format!(
                "installed version of `{app_id}` must not be empty"
            )));
        }

        self.conn.execute(
            "INSERT INTO apps (app_id, installed_version, enabled)
             VALUES (?1, ?2, 1)
             ON CONFLICT(app_id) DO UPDATE SET
                installed_version = excluded.installed_version,
                enabled = 1,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![app_id, version],
        )?;
        info!(
            "event=app_install module=apps status=ok app_id={} version={}",
            app_id, version
        );
        Ok(())
    }

    /// Enables or disables an installed app.
    pub fn set_enabled(&self, app_id: &str, enabled: bool) -> AppSourceResult<()> {
        let app_id = checked_app_id(app_id)?;
        let changed = self.conn.execute(
            "UPDATE apps
             SET
                enabled = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE app_id = ?2;",
            params![i64::from(enabled), app_id],
        )?;
        if changed == 0 {
            return Err(AppSourceError::AppNotFound(app_id.to_string()));
        }
        Ok(())
    }

    /// Removes an app record.
    pub fn uninstall(&self, app_id: &str) -> AppSourceResult<()> {
        let app_id = checked_app_id(app_id)?;
        let changed = self
            .conn
            .execute("DELETE FROM apps WHERE app_id = ?1;", [app_id])?;
        if changed == 0 {
            return Err(AppSourceError::AppNotFound(app_id.to_string()));
        }
        info!(
            "event=app_uninstall module=apps status=ok app_id={}",
            app_id
        );
        Ok(())
    }

    pub fn get(&self, app_id: &str) -> AppSourceResult<Option<AppRecord>> {
        let app_id = checked_app_id(app_id)?;
        let raw = self
            .conn
            .query_row(
                &format!("{APP_SELECT_SQL} WHERE app_id = ?1;"),
                [app_id],
                read_raw_row,
            )
            .optional()?;
        raw.map(parse_app_row).transpose()
    }

    /// Lists every app row, enabled or not, in installation order.
    pub fn list(&self) -> AppSourceResult<Vec<AppRecord>> {
        self.query_records(&format!("{APP_SELECT_SQL} ORDER BY rowid ASC;"))
    }

    fn query_records(&self, sql: &str) -> AppSourceResult<Vec<AppRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_app_row(read_raw_row(row)?)?);
        }
        Ok(records)
    }
}

impl InstalledApps for SqliteAppStore<'_> {
    fn installed_apps(&self) -> AppSourceResult<Vec<String>> {
        let sql = format!("{APP_SELECT_SQL} WHERE enabled = 1 ORDER BY rowid ASC;");
        let records = self.query_records(&sql)?;
        Ok(records.into_iter().map(|record| record.app_id).collect())
    }
}

struct RawAppRow {
    app_id: String,
    installed_version: String,
    enabled: i64,
    installed_at: i64,
    updated_at: i64,
}

fn read_raw_row(row: &Row<'_>) -> rusqlite::Result<RawAppRow> {
    Ok(RawAppRow {
        app_id: row.get("app_id")?,
        installed_version: row.get("installed_version")?,
        enabled: row.get("enabled")?,
        installed_at: row.get("installed_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_app_row(raw: RawAppRow) -> AppSourceResult<AppRecord> {
    if !is_valid_app_id(&raw.app_id) {
        return Err(AppSourceError::InvalidData(format!(
            "invalid app id `{}` in apps.app_id",
            raw.app_id
        )));
    }
    let enabled = match raw.enabled {
        0 => false,
        1 => true,
        other => {
            return Err(AppSourceError::InvalidData(format!(
                "invalid enabled value `{other}` in apps.enabled"
            )));
        }
    };
    Ok(AppRecord {
        app_id: raw.app_id,
        installed_version: raw.installed_version,
        enabled,
        installed_at: raw.installed_at,
        updated_at: raw.updated_at,
    })
}

fn checked_app_id(app_id: &str) -> AppSourceResult<&str> {
    let trimmed = app_id.trim();
    if !is_valid_app_id(trimmed) {
        return Err(AppSourceError::InvalidAppId(app_id.to_string()));
    }
    Ok(trimmed)
}
