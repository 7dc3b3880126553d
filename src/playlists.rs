// Playlist manager
// Playlists hold embedded copies of canonical videos. The Recent and Favorites
// playlists are owned by the store: they always exist and cannot be deleted.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::Connection;

use crate::constants::{RECENT_PLAYLIST_LIMIT, UNTITLED_PLAYLIST_NAME};
use crate::db::schema::{self, NewPlaylist, Playlist, SystemPlaylist, Video};
use crate::error::{Result, VidShelfError};
use crate::videos::{self, normalize_tags, HistoryOutcome, VideoCandidate};

/// Editable playlist fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PlaylistPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub category: Option<Option<String>>,
}

/// A video removed from a playlist, and where it used to sit.
#[derive(Debug, Clone)]
pub struct Removal {
    pub playlist: Playlist,
    pub video_id: i64,
    pub index: usize,
}

/// Return the unique system playlist of `kind`, creating it if absent.
/// Runs inside the caller's transaction.
pub fn get_or_create_system_playlist(
    conn: &Connection,
    kind: SystemPlaylist,
    now: &DateTime<Utc>,
) -> Result<Playlist> {
    if let Some(existing) = schema::find_system_playlist(conn, kind)? {
        return Ok(existing);
    }

    let id = schema::insert_playlist(conn, &kind.new_playlist(), now)?;
    log::info!("Created system playlist {:?} ({})", kind, id);
    schema::get_playlist(conn, id)?
        .ok_or(VidShelfError::PlaylistNotFound(id))
}

/// Make sure both system playlists exist. Idempotent.
pub fn ensure_system_playlists(conn: &Connection) -> Result<()> {
    let now = Utc::now();
    let tx = conn.unchecked_transaction()?;
    get_or_create_system_playlist(&tx, SystemPlaylist::Favorites, &now)?;
    get_or_create_system_playlist(&tx, SystemPlaylist::Recent, &now)?;
    tx.commit()?;
    Ok(())
}

/// Move `video` to the front of the Recent playlist, dropping older copies of
/// the same URL and keeping at most `RECENT_PLAYLIST_LIMIT` entries.
/// Runs inside the caller's transaction.
pub fn push_recent(conn: &Connection, video: &Video, now: &DateTime<Utc>) -> Result<Playlist> {
    let mut recent = get_or_create_system_playlist(conn, SystemPlaylist::Recent, now)?;

    let mut videos = Vec::with_capacity(RECENT_PLAYLIST_LIMIT);
    videos.push(video.clone());
    videos.extend(recent.videos.into_iter().filter(|v| v.url != video.url));
    videos.truncate(RECENT_PLAYLIST_LIMIT);

    schema::update_playlist_videos(conn, recent.id, &videos, now)?;
    recent.videos = videos;
    recent.updated_at = *now;
    Ok(recent)
}

pub fn add_video_to_recent_playlist(conn: &Connection, video: &Video, now: &DateTime<Utc>) -> Result<Playlist> {
    let tx = conn.unchecked_transaction()?;
    let recent = push_recent(&tx, video, now)?;
    tx.commit()?;
    Ok(recent)
}

/// Create a user playlist. System flags can't be set this way.
pub fn create_playlist(conn: &Connection, playlist: NewPlaylist, now: &DateTime<Utc>) -> Result<i64> {
    let name = playlist.name.trim();
    let new_playlist = NewPlaylist {
        name: if name.is_empty() { UNTITLED_PLAYLIST_NAME.to_string() } else { name.to_string() },
        description: playlist.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        tags: normalize_tags(&playlist.tags),
        category: playlist.category,
        is_default: false,
        is_favorites: false,
        is_recent: false,
    };
    let id = schema::insert_playlist(conn, &new_playlist, now)?;
    log::info!("Created playlist '{}' ({})", new_playlist.name, id);
    Ok(id)
}

pub fn update_playlist(
    conn: &Connection,
    id: i64,
    patch: PlaylistPatch,
    now: &DateTime<Utc>,
) -> Result<Option<Playlist>> {
    let Some(mut playlist) = schema::get_playlist(conn, id)? else {
        return Ok(None);
    };

    if let Some(name) = patch.name {
        let name = name.trim();
        playlist.name = if name.is_empty() { UNTITLED_PLAYLIST_NAME.to_string() } else { name.to_string() };
    }
    if let Some(description) = patch.description {
        playlist.description = description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
    }
    if let Some(tags) = patch.tags {
        playlist.tags = normalize_tags(&tags);
    }
    if let Some(category) = patch.category {
        playlist.category = category;
    }

    schema::update_playlist_details(conn, &playlist, now)?;
    playlist.updated_at = *now;
    Ok(Some(playlist))
}

/// Append a snapshot unless the playlist already has that URL.
/// Runs inside the caller's transaction. Returns whether it was appended.
pub fn append_snapshot(conn: &Connection, playlist_id: i64, video: &Video, now: &DateTime<Utc>) -> Result<bool> {
    let playlist = schema::get_playlist(conn, playlist_id)?
        .ok_or(VidShelfError::PlaylistNotFound(playlist_id))?;

    if playlist.videos.iter().any(|v| v.url == video.url) {
        return Ok(false);
    }

    let mut videos = playlist.videos;
    videos.push(video.clone());
    schema::update_playlist_videos(conn, playlist_id, &videos, now)?;
    Ok(true)
}

#[derive(Debug, Clone)]
pub struct PlaylistAddition {
    pub video: Video,
    pub appended: bool,
    pub ingested: Option<HistoryOutcome>,
}

/// Record the video as watched and append it to a playlist unless that URL is
/// already there. `None` when the playlist doesn't exist.
pub fn add_video_to_playlist(
    conn: &Connection,
    playlist_id: i64,
    candidate: VideoCandidate,
    now: &DateTime<Utc>,
) -> Result<Option<PlaylistAddition>> {
    let tx = conn.unchecked_transaction()?;
    if schema::get_playlist(&tx, playlist_id)?.is_none() {
        return Ok(None);
    }

    let url = candidate.url.trim().to_string();
    let ingested = videos::ingest(&tx, candidate, now)?;
    let video = match &ingested {
        Some(outcome) => outcome.video.clone(),
        None => schema::get_video_by_url(&tx, &url)?.ok_or(VidShelfError::NoActiveProfile)?,
    };
    // Ingestion may have rewritten this playlist's snapshots already
    let appended = append_snapshot(&tx, playlist_id, &video, now)?;
    tx.commit()?;

    Ok(Some(PlaylistAddition { video, appended, ingested }))
}

/// Drop every snapshot with `url` from one playlist. Returns whether any were removed.
pub fn remove_url_from_playlist(conn: &Connection, playlist_id: i64, url: &str, now: &DateTime<Utc>) -> Result<bool> {
    let Some(playlist) = schema::get_playlist(conn, playlist_id)? else {
        return Ok(false);
    };
    let before = playlist.videos.len();
    let videos: Vec<Video> = playlist.videos.into_iter().filter(|v| v.url != url).collect();
    if videos.len() == before {
        return Ok(false);
    }
    schema::update_playlist_videos(conn, playlist_id, &videos, now)?;
    Ok(true)
}

/// Move the video at `from` to `to`. Returns `None` if the playlist doesn't exist.
pub fn reorder(
    conn: &Connection,
    playlist_id: i64,
    from: usize,
    to: usize,
    now: &DateTime<Utc>,
) -> Result<Option<Playlist>> {
    let tx = conn.unchecked_transaction()?;
    let Some(mut playlist) = schema::get_playlist(&tx, playlist_id)? else {
        return Ok(None);
    };

    let len = playlist.videos.len();
    for index in [from, to] {
        if index >= len {
            return Err(VidShelfError::InvalidIndex { index, len });
        }
    }

    if from != to {
        let moved = playlist.videos.remove(from);
        playlist.videos.insert(to, moved);
        schema::update_playlist_videos(&tx, playlist_id, &playlist.videos, now)?;
        playlist.updated_at = *now;
    }
    tx.commit()?;
    Ok(Some(playlist))
}

/// Remove `video_id` from one playlist. `None` when either is missing.
pub fn remove_video(
    conn: &Connection,
    playlist_id: i64,
    video_id: i64,
    now: &DateTime<Utc>,
) -> Result<Option<Removal>> {
    let tx = conn.unchecked_transaction()?;
    let Some(mut playlist) = schema::get_playlist(&tx, playlist_id)? else {
        return Ok(None);
    };
    let Some(index) = playlist.position_of(video_id) else {
        return Ok(None);
    };

    playlist.videos.retain(|v| v.id != video_id);
    schema::update_playlist_videos(&tx, playlist_id, &playlist.videos, now)?;
    tx.commit()?;

    playlist.updated_at = *now;
    Ok(Some(Removal { playlist, video_id, index }))
}

/// Persist a uniformly random permutation (Fisher-Yates via `SliceRandom`).
pub fn shuffle<R: Rng + ?Sized>(
    conn: &Connection,
    playlist_id: i64,
    rng: &mut R,
    now: &DateTime<Utc>,
) -> Result<Option<Playlist>> {
    let tx = conn.unchecked_transaction()?;
    let Some(mut playlist) = schema::get_playlist(&tx, playlist_id)? else {
        return Ok(None);
    };

    playlist.videos.shuffle(rng);
    schema::update_playlist_videos(&tx, playlist_id, &playlist.videos, now)?;
    tx.commit()?;

    playlist.updated_at = *now;
    Ok(Some(playlist))
}

/// Delete a user playlist. System playlists are refused; a missing id returns `false`.
pub fn delete_playlist(conn: &Connection, playlist_id: i64) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let Some(playlist) = schema::get_playlist(&tx, playlist_id)? else {
        return Ok(false);
    };
    if playlist.is_system() {
        log::warn!("Refusing to delete system playlist '{}' ({})", playlist.name, playlist_id);
        return Err(VidShelfError::SystemPlaylist(playlist_id));
    }

    schema::delete_playlist_row(&tx, playlist_id)?;
    schema::clear_default_playlist_refs(&tx, playlist_id)?;
    tx.commit()?;

    log::info!("Deleted playlist '{}' ({})", playlist.name, playlist_id);
    Ok(true)
}

/// Mark one playlist as the default (or none) and record it in the active profile's settings.
pub fn set_default_playlist(conn: &Connection, playlist_id: Option<i64>) -> Result<bool> {
    let tx = conn.unchecked_transaction()?;
    if let Some(id) = playlist_id {
        if schema::get_playlist(&tx, id)?.is_none() {
            return Ok(false);
        }
    }

    schema::set_default_playlist_flag(&tx, playlist_id)?;
    if let Some(mut settings) = crate::profiles::active_settings(&tx)? {
        settings.default_playlist_id = playlist_id;
        schema::update_settings(&tx, &settings)?;
    }
    tx.commit()?;
    Ok(true)
}

/// Replace every embedded copy of `video` with the canonical row.
/// Runs inside the caller's transaction. Returns the ids of playlists touched.
pub fn sync_video_snapshots(conn: &Connection, video: &Video, now: &DateTime<Utc>) -> Result<Vec<i64>> {
    let mut touched = Vec::new();
    for mut playlist in schema::list_playlists(conn)? {
        let mut changed = false;
        for snapshot in playlist.videos.iter_mut().filter(|v| v.id == video.id) {
            if snapshot != video {
                *snapshot = video.clone();
                changed = true;
            }
        }
        if changed {
            schema::update_playlist_videos(conn, playlist.id, &playlist.videos, now)?;
            touched.push(playlist.id);
        }
    }
    Ok(touched)
}

/// Filter the given video ids out of every playlist.
/// Runs inside the caller's transaction. Returns the ids of playlists touched.
pub fn remove_videos_everywhere(conn: &Connection, video_ids: &[i64], now: &DateTime<Utc>) -> Result<Vec<i64>> {
    let mut touched = Vec::new();
    if video_ids.is_empty() {
        return Ok(touched);
    }
    for mut playlist in schema::list_playlists(conn)? {
        let before = playlist.videos.len();
        playlist.videos.retain(|v| !video_ids.contains(&v.id));
        if playlist.videos.len() != before {
            schema::update_playlist_videos(conn, playlist.id, &playlist.videos, now)?;
            touched.push(playlist.id);
        }
    }
    Ok(touched)
}

/// Replace every snapshot of `old_id` with `video`, dropping the old entry where
/// the playlist already holds `video`. Runs inside the caller's transaction.
pub fn repoint_video_snapshots(conn: &Connection, old_id: i64, video: &Video, now: &DateTime<Utc>) -> Result<Vec<i64>> {
    let mut touched = Vec::new();
    for mut playlist in schema::list_playlists(conn)? {
        if playlist.position_of(old_id).is_none() {
            continue;
        }
        if playlist.position_of(video.id).is_some() {
            playlist.videos.retain(|v| v.id != old_id);
        } else {
            for snapshot in playlist.videos.iter_mut().filter(|v| v.id == old_id) {
                *snapshot = video.clone();
            }
        }
        schema::update_playlist_videos(conn, playlist.id, &playlist.videos, now)?;
        touched.push(playlist.id);
    }
    Ok(touched)
}
