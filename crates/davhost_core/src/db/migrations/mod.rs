//! App store schema migrations.
//!
//! # Responsibility
//! - List the `apps` table migrations in the order they must run.
//! - Bring a connection from its recorded version up to `latest_version()`.
//!
//! # Invariants
//! - Versions are contiguous and start at 1.
//! - All pending migrations run in one transaction; a failure leaves the
//!   recorded version untouched.
//! - The recorded version lives in `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "apps",
        sql: include_str!("0001_apps.sql"),
    },
    Migration {
        version: 2,
        name: "app_enabled",
        sql: include_str!("0002_app_enabled.sql"),
    },
];

/// Highest schema version this build can open.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies every migration newer than the connection's recorded version.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database is newer than this build.
/// - `Migration` naming the first script that failed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = recorded_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from)
        .collect();
    if pending.is_empty() {
        debug!(
            "event=db_migrate module=db status=skip version={} reason=up_to_date",
            from
        );
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        debug!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} applied={}",
        from,
        latest,
        pending.len()
    );
    Ok(())
}

fn recorded_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}
