//! Whole-database export, import and reset.
//!
//! The export document is a single JSON object with five arrays (`videos`,
//! `playlists`, `settings`, `profiles`, `watchStats`). Import parses the whole
//! document before touching the database, then applies it in one transaction:
//! rows are written by id, and a row that collides with an existing one on a
//! business key (video URL, a system playlist flag, a profile's stats day)
//! replaces it. Missing sections are skipped, so partial and older exports
//! load as far as they go.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_PROFILE_NAME;
use crate::db::schema::{self, Playlist, Profile, Settings, SystemPlaylist, Video, WatchStats};
use crate::error::{Result, VidShelfError};
use crate::playlists;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub videos: Option<Vec<Video>>,
    #[serde(default)]
    pub playlists: Option<Vec<Playlist>>,
    #[serde(default)]
    pub settings: Option<Vec<Settings>>,
    #[serde(default)]
    pub profiles: Option<Vec<Profile>>,
    #[serde(default)]
    pub watch_stats: Option<Vec<WatchStats>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub videos: usize,
    pub playlists: usize,
    pub settings: usize,
    pub profiles: usize,
    pub watch_stats: usize,
    pub active_profile_id: Option<i64>,
}

pub fn snapshot(conn: &Connection) -> Result<Snapshot> {
    Ok(Snapshot {
        videos: Some(schema::list_videos(conn, None)?),
        playlists: Some(schema::list_playlists(conn)?),
        settings: Some(schema::list_settings(conn)?),
        profiles: Some(schema::list_profiles(conn)?),
        watch_stats: Some(schema::list_all_watch_stats(conn)?),
    })
}

/// Pretty-printed JSON of every table.
pub fn export_data(conn: &Connection) -> Result<String> {
    let json = serde_json::to_string_pretty(&snapshot(conn)?)?;
    Ok(json)
}

/// Parse an export document without touching the database.
pub fn parse_snapshot(json: &str) -> Result<Snapshot> {
    serde_json::from_str(json).map_err(|e| VidShelfError::InvalidImport(e.to_string()))
}

fn next_id(conn: &Connection, table: &str) -> Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(id), 0) + 1 FROM {}", table);
    let id = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(id)
}

/// Apply an export document. Nothing is written if the JSON is malformed, and
/// a storage failure part way through rolls the whole import back.
pub fn import_data(conn: &Connection, json: &str, now: &DateTime<Utc>) -> Result<ImportSummary> {
    let snapshot = parse_snapshot(json)?;
    import_snapshot(conn, snapshot, now)
}

pub fn import_snapshot(conn: &Connection, snapshot: Snapshot, now: &DateTime<Utc>) -> Result<ImportSummary> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = ImportSummary::default();

    // INSERT OR REPLACE drops rows that collide on url, system flags or (profile, day)
    let mut replaced = Vec::new();
    for mut video in snapshot.videos.unwrap_or_default() {
        if video.url.trim().is_empty() {
            log::warn!("Skipping imported video {} with no URL", video.id);
            continue;
        }
        if video.id <= 0 {
            match schema::get_video_by_url(&tx, &video.url)? {
                Some(existing) => video.id = existing.id,
                None => video.id = next_id(&tx, "videos")?,
            }
        }
        if video.title.is_empty() {
            video.title = video.url.clone();
        }
        if let Some(local) = schema::get_video_by_url(&tx, &video.url)? {
            if local.id != video.id {
                replaced.push((local.id, video.clone()));
            }
        }
        schema::put_video(&tx, &video)?;
        summary.videos += 1;
    }

    for mut playlist in snapshot.playlists.unwrap_or_default() {
        if playlist.id <= 0 {
            playlist.id = next_id(&tx, "playlists")?;
        }
        schema::put_playlist(&tx, &playlist)?;
        summary.playlists += 1;
    }

    for mut settings in snapshot.settings.unwrap_or_default() {
        if settings.id <= 0 {
            settings.id = next_id(&tx, "settings")?;
        }
        schema::put_settings(&tx, &settings)?;
        summary.settings += 1;
    }

    let mut imported_profiles = Vec::new();
    let mut snapshot_active = None;
    for mut profile in snapshot.profiles.unwrap_or_default() {
        if profile.id <= 0 {
            profile.id = next_id(&tx, "profiles")?;
        }
        if profile.is_active && snapshot_active.is_none() {
            snapshot_active = Some(profile.id);
        }
        // Activation is settled once every profile is in
        profile.is_active = false;
        schema::put_profile(&tx, &profile)?;
        imported_profiles.push(profile.id);
        summary.profiles += 1;
    }

    for mut stats in snapshot.watch_stats.unwrap_or_default() {
        if stats.id <= 0 {
            stats.id = next_id(&tx, "watch_stats")?;
        }
        schema::put_watch_stats(&tx, &stats)?;
        summary.watch_stats += 1;
    }

    // Local playlists still embed the rows the snapshot displaced by URL
    for (old_id, video) in &replaced {
        playlists::repoint_video_snapshots(&tx, *old_id, video, now)?;
    }

    summary.active_profile_id = settle_active_profile(&tx, snapshot_active, &imported_profiles, now)?;

    playlists::get_or_create_system_playlist(&tx, SystemPlaylist::Favorites, now)?;
    playlists::get_or_create_system_playlist(&tx, SystemPlaylist::Recent, now)?;
    tx.commit()?;

    log::info!(
        "Imported {} videos, {} playlists, {} settings, {} profiles, {} stats rows",
        summary.videos,
        summary.playlists,
        summary.settings,
        summary.profiles,
        summary.watch_stats
    );
    Ok(summary)
}

/// Leave exactly one active profile: the snapshot's, else whichever survived
/// the import active, else the first imported one, else the oldest on record,
/// else a fresh default profile.
fn settle_active_profile(
    conn: &Connection,
    snapshot_active: Option<i64>,
    imported: &[i64],
    now: &DateTime<Utc>,
) -> Result<Option<i64>> {
    if let Some(id) = snapshot_active {
        schema::deactivate_all_profiles(conn)?;
        schema::set_profile_active(conn, id)?;
        return Ok(Some(id));
    }
    if let Some(active) = schema::get_active_profile(conn)? {
        return Ok(Some(active.id));
    }

    let fallback = match imported.first() {
        Some(&id) => Some(id),
        None => schema::list_profiles(conn)?.first().map(|p| p.id),
    };
    if let Some(id) = fallback {
        schema::set_profile_active(conn, id)?;
        return Ok(Some(id));
    }

    let settings_id = schema::insert_settings(conn, &Settings::default())?;
    let id = schema::insert_profile(conn, DEFAULT_PROFILE_NAME, None, now, true, Some(settings_id))?;
    log::info!("Import left no profiles, created '{}' ({})", DEFAULT_PROFILE_NAME, id);
    Ok(Some(id))
}

/// Empty every table in one transaction. The system playlists come back empty;
/// creating a profile afterwards is up to the caller.
pub fn clear_all_data(conn: &Connection, now: &DateTime<Utc>) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "DELETE FROM videos;
         DELETE FROM playlists;
         DELETE FROM settings;
         DELETE FROM profiles;
         DELETE FROM watch_stats;",
    )?;
    playlists::get_or_create_system_playlist(&tx, SystemPlaylist::Favorites, now)?;
    playlists::get_or_create_system_playlist(&tx, SystemPlaylist::Recent, now)?;
    tx.commit()?;

    log::warn!("Cleared all data");
    Ok(())
}
