// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.

use rusqlite::Connection;
use anyhow::Result;

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Canonical video records (one row per URL)
    CREATE TABLE videos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        url TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        custom_title TEXT,
        thumbnail TEXT,
        duration REAL,
        last_watched TEXT NOT NULL,
        watch_count INTEGER NOT NULL DEFAULT 0,
        last_count_update TEXT,
        preferred_quality TEXT,
        subtitles TEXT NOT NULL DEFAULT '[]',
        tags TEXT NOT NULL DEFAULT '[]',
        category TEXT,
        is_favorite INTEGER NOT NULL DEFAULT 0
    );

    -- Playlists embed full video snapshots as a JSON array
    CREATE TABLE playlists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT,
        videos TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        category TEXT,
        is_default INTEGER NOT NULL DEFAULT 0,
        is_favorites INTEGER NOT NULL DEFAULT 0,
        is_recent INTEGER NOT NULL DEFAULT 0
    );

    -- Per-profile settings
    CREATE TABLE settings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        theme TEXT NOT NULL DEFAULT 'system'
            CHECK (theme IN ('light', 'dark', 'system')),
        background_color TEXT,
        background_image TEXT,
        history_limit INTEGER NOT NULL DEFAULT 500,
        video_quality TEXT NOT NULL DEFAULT 'auto'
            CHECK (video_quality IN ('480p', '720p', '1080p', 'auto')),
        buffer_size TEXT NOT NULL DEFAULT 'medium'
            CHECK (buffer_size IN ('low', 'medium', 'high')),
        autoplay INTEGER NOT NULL DEFAULT 1,
        default_playlist_id INTEGER,
        cinema_mode INTEGER NOT NULL DEFAULT 0,
        audio_only_mode INTEGER NOT NULL DEFAULT 0,
        ui_color TEXT,
        ui_layout TEXT CHECK (ui_layout IN ('default', 'compact', 'comfortable'))
    );

    -- Profiles
    CREATE TABLE profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        avatar TEXT,
        created_at TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        settings_id INTEGER
    );

    -- Per-profile, per-day watch counters
    CREATE TABLE watch_stats (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        profile_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        total_watch_time REAL NOT NULL DEFAULT 0,
        video_count INTEGER NOT NULL DEFAULT 0,
        categories TEXT NOT NULL DEFAULT '{}',
        most_watched_tags TEXT NOT NULL DEFAULT '{}',
        UNIQUE(profile_id, date)
    );

    -- Indexes for common queries
    CREATE INDEX idx_videos_last_watched ON videos(last_watched);
    CREATE INDEX idx_videos_category ON videos(category);
    CREATE INDEX idx_videos_watch_count ON videos(watch_count);
    CREATE INDEX idx_playlists_created_at ON playlists(created_at);
    CREATE INDEX idx_playlists_updated_at ON playlists(updated_at);
    CREATE INDEX idx_playlists_category ON playlists(category);
    CREATE INDEX idx_playlists_is_default ON playlists(is_default);
    CREATE INDEX idx_profiles_name ON profiles(name);
    CREATE INDEX idx_profiles_is_active ON profiles(is_active);
    CREATE INDEX idx_watch_stats_profile ON watch_stats(profile_id);
    CREATE INDEX idx_watch_stats_date ON watch_stats(date);

    -- Singletons: one Favorites, one Recent, one active profile
    CREATE UNIQUE INDEX idx_playlists_single_favorites ON playlists(is_favorites) WHERE is_favorites = 1;
    CREATE UNIQUE INDEX idx_playlists_single_recent ON playlists(is_recent) WHERE is_recent = 1;
    CREATE UNIQUE INDEX idx_profiles_single_active ON profiles(is_active) WHERE is_active = 1;
    "#,
];

/// Get current schema version from database
pub fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row(
        "PRAGMA user_version",
        [],
        |row| row.get(0)
    )?;
    Ok(version)
}

/// Latest schema version this build knows about
pub fn target_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Run all pending migrations (crash-safe)
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    let target_version = target_version();

    // Refuse to open a DB created by a newer VidShelf build
    if current_version > target_version {
        anyhow::bail!(
            "Database schema version {} is newer than this build supports (max {}). Please upgrade VidShelf.",
            current_version,
            target_version
        );
    }

    if current_version == target_version {
        return Ok(());
    }

    // Apply pending migrations one-by-one, each with its version bump in one transaction
    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as u32;
        if migration_version <= current_version {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration)?;
        tx.execute_batch(&format!("PRAGMA user_version = {}", migration_version))?;
        tx.commit()?;

        log::info!("Applied migration {}", migration_version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_migration_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('videos','playlists','settings','profiles','watch_stats')",
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(count, 5, "All 5 collections should exist");
        assert_eq!(get_schema_version(&conn).unwrap(), target_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), target_version());
    }

    #[test]
    fn test_refuses_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        let err = run_migrations(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than this build"));
    }

    #[test]
    fn test_single_active_profile_enforced_by_index() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO profiles (name, created_at, is_active) VALUES ('a', '2026-01-01T00:00:00.000Z', 1)",
            [],
        ).unwrap();
        let second = conn.execute(
            "INSERT INTO profiles (name, created_at, is_active) VALUES ('b', '2026-01-01T00:00:00.000Z', 1)",
            [],
        );
        assert!(second.is_err(), "Second active profile must be rejected");
    }
}
