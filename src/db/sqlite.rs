use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use super::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered schema changes. Each one only adds tables or columns; existing
/// rows are never rewritten.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "records",
        sql: include_str!("../../resources/migrations/001_records.sql"),
    },
    Migration {
        version: 2,
        name: "medications",
        sql: include_str!("../../resources/migrations/002_medications.sql"),
    },
    Migration {
        version: 3,
        name: "medication_logs",
        sql: include_str!("../../resources/migrations/003_medication_logs.sql"),
    },
    Migration {
        version: 4,
        name: "user_settings",
        sql: include_str!("../../resources/migrations/004_user_settings.sql"),
    },
];

/// Open (creating if needed) the store at `path` and bring its schema up
/// to date. Missing parent directories are created.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    prepare(&conn)?;
    Ok(conn)
}

/// Fresh in-memory store, used by tests and previews.
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> Result<(), DatabaseError> {
    // Cascading attachment and log deletes rely on foreign keys.
    conn.execute_batch("PRAGMA journal_mode=DELETE; PRAGMA foreign_keys=ON;")?;
    run_migrations(conn)
}

/// Apply every migration newer than the stored schema version, each in its
/// own transaction.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current = schema_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let failed = |e: rusqlite::Error| DatabaseError::MigrationFailed {
            version: migration.version,
            reason: e.to_string(),
        };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.commit().map_err(failed)?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Schema migration applied"
        );
    }
    Ok(())
}

/// Highest applied migration, 0 for a brand-new file.
pub fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let has_table = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if !has_table {
        return Ok(0);
    }
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Number of user tables, excluding SQLite internals.
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
