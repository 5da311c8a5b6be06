//! Shared SQLite handle, schema and migrations.
//!
//! One connection serves every store; the mutex serializes conflicting
//! writes so the transactional contracts of [`crate::store`] hold under
//! concurrent callers. The schema version lives in SQLite's `user_version`
//! pragma, but migrations never trust it alone: each step also checks that
//! its tables and columns actually exist, and re-runs when they do not.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version. Version 1 is the original track/point/config
/// schema; version 2 added the folder hierarchy and the explicit point
/// order column.
pub const SCHEMA_VERSION: i32 = 2;

/// Cloneable handle to the application database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path`, bringing the schema up to
    /// date before returning.
    pub fn open(path: &str) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// In-memory database, primarily for tests.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` while holding the connection lock.
    pub(crate) fn with<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        f(&mut guard)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock means a panic mid-operation; propagating the
        // panic is the only sound option for a storage handle.
        self.conn.lock().unwrap()
    }
}

// ============================================================================
// Migrations
// ============================================================================

/// Bring the schema to [`SCHEMA_VERSION`].
///
/// Each step is idempotent and guarded by an object-presence check in
/// addition to the version number, so a database whose `user_version` was
/// bumped without the DDL actually running is detected and repaired.
pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    let version = user_version(conn)?;

    if version < 1 || !table_exists(conn, "tracks")? {
        apply_v1(conn)?;
    }
    if version < 2 || !table_exists(conn, "track_folders")? || !column_exists(conn, "track_points", "seq")? {
        if version >= 2 {
            log::warn!(
                "schema reports version {} but folder tables are missing; re-running migration",
                version
            );
        }
        apply_v2(conn)?;
    }

    if version != SCHEMA_VERSION {
        set_user_version(conn, SCHEMA_VERSION)?;
        log::info!("database schema at version {}", SCHEMA_VERSION);
    }

    Ok(())
}

/// Base schema: tracks, their flattened points, and config profiles.
fn apply_v1(conn: &Connection) -> Result<()> {
    log::info!("running migration: base schema (v1)");
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            color TEXT NOT NULL DEFAULT '#0000FF',
            line_style TEXT NOT NULL DEFAULT 'SOLID',
            visible INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS track_points (
            track_id TEXT NOT NULL,
            segment_index INTEGER NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            elevation REAL,
            time INTEGER,
            FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_track_points_track
        ON track_points(track_id, segment_index);

        -- Profile name -> serialized Config blob
        CREATE TABLE IF NOT EXISTS config (
            profile TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Folder hierarchy plus the explicit point order column.
fn apply_v2(conn: &Connection) -> Result<()> {
    log::info!("running migration: folders and point order (v2)");
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS folders (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            parent_id TEXT
        );

        CREATE TABLE IF NOT EXISTS track_folders (
            track_id TEXT NOT NULL,
            folder_id TEXT NOT NULL,
            PRIMARY KEY (track_id, folder_id)
        );

        CREATE INDEX IF NOT EXISTS idx_folders_parent ON folders(parent_id);
        CREATE INDEX IF NOT EXISTS idx_track_folders_folder ON track_folders(folder_id);
        "#,
    )?;

    if !column_exists(conn, "track_points", "seq")? {
        // Pre-v2 rows keep their rowid order; retrieval tie-breaks on rowid
        // so their original insertion order is preserved.
        conn.execute(
            "ALTER TABLE track_points ADD COLUMN seq INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_track_points_order
         ON track_points(track_id, segment_index, seq);",
    )?;
    Ok(())
}

fn user_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn set_user_version(conn: &Connection, version: i32) -> Result<()> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?",
            table
        ),
        [column],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_is_at_current_version() {
        let db = Database::in_memory().unwrap();
        db.with(|conn| {
            assert_eq!(user_version(conn).unwrap(), SCHEMA_VERSION);
            assert!(table_exists(conn, "tracks").unwrap());
            assert!(table_exists(conn, "track_points").unwrap());
            assert!(table_exists(conn, "folders").unwrap());
            assert!(table_exists(conn, "track_folders").unwrap());
            assert!(table_exists(conn, "config").unwrap());
            assert!(column_exists(conn, "track_points", "seq").unwrap());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.with(|conn| {
            migrate(conn)?;
            migrate(conn)?;
            assert_eq!(user_version(conn).unwrap(), SCHEMA_VERSION);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_self_check_repairs_lying_version_number() {
        // A database that claims v2 but never ran the v2 DDL.
        let conn = Connection::open_in_memory().unwrap();
        apply_v1(&conn).unwrap();
        set_user_version(&conn, SCHEMA_VERSION).unwrap();
        assert!(!table_exists(&conn, "track_folders").unwrap());

        migrate(&conn).unwrap();
        assert!(table_exists(&conn, "track_folders").unwrap());
        assert!(column_exists(&conn, "track_points", "seq").unwrap());
    }
}
