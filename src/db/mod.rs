// Database module

pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use anyhow::Result;

use crate::constants::{APP_DB_DIR, DB_BUSY_TIMEOUT_MS, DB_FILENAME};
use crate::playlists;

/// Open or create a database at the given path
pub fn open_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Cannot create database directory {}: {}. Check directory permissions.",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let conn = Connection::open(db_path)?;

    // WAL for better read concurrency on file-backed stores
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    prepare(&conn)?;

    log::debug!("Opened database at {}", db_path.display());
    Ok(conn)
}

/// Open a private in-memory database (tests, throwaway sessions)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

/// Pragmas, migrations and the system playlists every other component relies on.
fn prepare(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(&format!("PRAGMA busy_timeout = {};", DB_BUSY_TIMEOUT_MS))?;

    migrations::run_migrations(conn)?;
    playlists::ensure_system_playlists(conn)?;
    Ok(())
}

/// Get the database path inside an app data folder
pub fn get_db_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DB_FILENAME)
}

/// Default database location: ~/.vidshelf/vidshelf.db
pub fn default_db_path() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(get_db_path(&home.home_dir().join(APP_DB_DIR)))
}

/// Bytes currently used by the database pages.
pub fn storage_bytes(conn: &Connection) -> Result<u64> {
    let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
    let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
    Ok((page_count.max(0) as u64) * (page_size.max(0) as u64))
}

/// Human-readable storage usage, or "Unknown" when the store can't report it.
pub fn storage_size(conn: &Connection) -> String {
    match storage_bytes(conn) {
        Ok(bytes) => format_size(bytes),
        Err(e) => {
            log::warn!("Failed to read storage size: {}", e);
            "Unknown".to_string()
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let value = bytes as f64;
    if value < KB {
        format!("{} B", bytes)
    } else if value < MB {
        format!("{:.2} KB", value / KB)
    } else if value < GB {
        format!("{:.2} MB", value / MB)
    } else {
        format!("{:.2} GB", value / GB)
    }
}
