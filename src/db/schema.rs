// Database schema types and query helpers

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{
    DEFAULT_HISTORY_LIMIT, FAVORITES_PLAYLIST_DESCRIPTION, FAVORITES_PLAYLIST_NAME,
    RECENT_PLAYLIST_DESCRIPTION, RECENT_PLAYLIST_NAME,
};
use crate::error::Result;

// ----- Column codecs -----

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so they sort lexically.
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn get_json<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Accept `null` wherever a collection or flag is expected (older exports omit or null them).
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Stats dates are day-granular; older exports carry a full timestamp.
fn stats_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(serde::de::Error::custom)
}

// ----- Video -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtitle {
    #[serde(default)]
    pub id: Option<i64>,
    pub label: String,
    pub language: String,
    pub url: String,
    pub format: SubtitleFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    #[serde(default)]
    pub id: i64,
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub custom_title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_watched: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub watch_count: i64,
    /// When `watch_count` was last incremented (drives the cooldown)
    #[serde(default)]
    pub last_watch_count_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub preferred_quality: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtitles: Vec<Subtitle>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_favorite: bool,
}

impl Video {
    /// User override wins over the source-derived title.
    pub fn display_title(&self) -> &str {
        match self.custom_title.as_deref() {
            Some(custom) if !custom.trim().is_empty() => custom,
            _ => &self.title,
        }
    }
}

pub(crate) const VIDEO_COLUMNS: &str =
    "id, url, title, custom_title, thumbnail, duration, last_watched, watch_count,
     last_count_update, preferred_quality, subtitles, tags, category, is_favorite";

pub(crate) fn map_video(row: &Row) -> rusqlite::Result<Video> {
    Ok(Video {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        custom_title: row.get(3)?,
        thumbnail: row.get(4)?,
        duration: row.get(5)?,
        last_watched: get_ts(row, 6)?,
        watch_count: row.get(7)?,
        last_watch_count_update: get_opt_ts(row, 8)?,
        preferred_quality: row.get(9)?,
        subtitles: get_json(row, 10)?,
        tags: get_json(row, 11)?,
        category: row.get(12)?,
        is_favorite: row.get(13)?,
    })
}

/// Insert a new video row; the stored id is assigned by SQLite.
pub fn insert_video(conn: &Connection, video: &Video) -> Result<i64> {
    conn.execute(
        "INSERT INTO videos (url, title, custom_title, thumbnail, duration, last_watched, watch_count,
                             last_count_update, preferred_quality, subtitles, tags, category, is_favorite)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            video.url,
            video.title,
            video.custom_title,
            video.thumbnail,
            video.duration,
            format_ts(&video.last_watched),
            video.watch_count,
            video.last_watch_count_update.as_ref().map(format_ts),
            video.preferred_quality,
            serde_json::to_string(&video.subtitles)?,
            serde_json::to_string(&video.tags)?,
            video.category,
            video.is_favorite,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert or overwrite a video row keeping its id (import path).
pub fn put_video(conn: &Connection, video: &Video) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO videos (id, url, title, custom_title, thumbnail, duration, last_watched,
                                        watch_count, last_count_update, preferred_quality, subtitles,
                                        tags, category, is_favorite)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            video.id,
            video.url,
            video.title,
            video.custom_title,
            video.thumbnail,
            video.duration,
            format_ts(&video.last_watched),
            video.watch_count,
            video.last_watch_count_update.as_ref().map(format_ts),
            video.preferred_quality,
            serde_json::to_string(&video.subtitles)?,
            serde_json::to_string(&video.tags)?,
            video.category,
            video.is_favorite,
        ],
    )?;
    Ok(())
}

/// Overwrite every mutable column of an existing video. Returns rows changed.
pub fn update_video(conn: &Connection, video: &Video) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE videos SET url = ?1, title = ?2, custom_title = ?3, thumbnail = ?4, duration = ?5,
                           last_watched = ?6, watch_count = ?7, last_count_update = ?8,
                           preferred_quality = ?9, subtitles = ?10, tags = ?11, category = ?12,
                           is_favorite = ?13
         WHERE id = ?14",
        params![
            video.url,
            video.title,
            video.custom_title,
            video.thumbnail,
            video.duration,
            format_ts(&video.last_watched),
            video.watch_count,
            video.last_watch_count_update.as_ref().map(format_ts),
            video.preferred_quality,
            serde_json::to_string(&video.subtitles)?,
            serde_json::to_string(&video.tags)?,
            video.category,
            video.is_favorite,
            video.id,
        ],
    )?;
    Ok(changed)
}

pub fn get_video(conn: &Connection, id: i64) -> Result<Option<Video>> {
    let sql = format!("SELECT {} FROM videos WHERE id = ?1", VIDEO_COLUMNS);
    let result = conn.query_row(&sql, params![id], map_video).optional()?;
    Ok(result)
}

pub fn get_video_by_url(conn: &Connection, url: &str) -> Result<Option<Video>> {
    let sql = format!("SELECT {} FROM videos WHERE url = ?1", VIDEO_COLUMNS);
    let result = conn.query_row(&sql, params![url], map_video).optional()?;
    Ok(result)
}

/// Videos ordered most recently watched first. `None` returns every row.
pub fn list_videos(conn: &Connection, limit: Option<i64>) -> Result<Vec<Video>> {
    let sql = format!(
        "SELECT {} FROM videos ORDER BY last_watched DESC, id DESC LIMIT ?1",
        VIDEO_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let videos = stmt
        .query_map(params![limit.unwrap_or(-1)], map_video)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(videos)
}

pub fn count_videos(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))?;
    Ok(count)
}

/// Ids of the `n` least recently watched videos other than `keep`.
pub fn oldest_video_ids(conn: &Connection, n: i64, keep: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM videos WHERE id != ?2 ORDER BY last_watched ASC, id ASC LIMIT ?1"
    )?;
    let ids = stmt
        .query_map(params![n, keep], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

pub fn set_video_favorite(conn: &Connection, id: i64, is_favorite: bool) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE videos SET is_favorite = ?1 WHERE id = ?2",
        params![is_favorite, id],
    )?;
    Ok(changed)
}

pub fn delete_video_row(conn: &Connection, id: i64) -> Result<usize> {
    let changed = conn.execute("DELETE FROM videos WHERE id = ?1", params![id])?;
    Ok(changed)
}

// ----- Playlist -----

/// The two playlists the store owns and never lets a user delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPlaylist {
    Recent,
    Favorites,
}

impl SystemPlaylist {
    fn flag_column(&self) -> &'static str {
        match self {
            SystemPlaylist::Recent => "is_recent",
            SystemPlaylist::Favorites => "is_favorites",
        }
    }

    pub fn new_playlist(&self) -> NewPlaylist {
        match self {
            SystemPlaylist::Recent => NewPlaylist {
                name: RECENT_PLAYLIST_NAME.to_string(),
                description: Some(RECENT_PLAYLIST_DESCRIPTION.to_string()),
                is_default: true,
                is_recent: true,
                ..NewPlaylist::default()
            },
            SystemPlaylist::Favorites => NewPlaylist {
                name: FAVORITES_PLAYLIST_NAME.to_string(),
                description: Some(FAVORITES_PLAYLIST_DESCRIPTION.to_string()),
                is_favorites: true,
                ..NewPlaylist::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Embedded copies of canonical videos, in play order
    #[serde(default, deserialize_with = "null_as_default")]
    pub videos: Vec<Video>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_default: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_favorites: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_recent: bool,
}

impl Playlist {
    pub fn is_system(&self) -> bool {
        self.is_favorites || self.is_recent
    }

    pub fn position_of(&self, video_id: i64) -> Option<usize> {
        self.videos.iter().position(|v| v.id == video_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewPlaylist {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub is_default: bool,
    pub is_favorites: bool,
    pub is_recent: bool,
}

const PLAYLIST_COLUMNS: &str =
    "id, name, description, videos, created_at, updated_at, tags, category,
     is_default, is_favorites, is_recent";

fn map_playlist(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        videos: get_json(row, 3)?,
        created_at: get_ts(row, 4)?,
        updated_at: get_ts(row, 5)?,
        tags: get_json(row, 6)?,
        category: row.get(7)?,
        is_default: row.get(8)?,
        is_favorites: row.get(9)?,
        is_recent: row.get(10)?,
    })
}

pub fn insert_playlist(conn: &Connection, playlist: &NewPlaylist, now: &DateTime<Utc>) -> Result<i64> {
    let ts = format_ts(now);
    conn.execute(
        "INSERT INTO playlists (name, description, videos, created_at, updated_at, tags, category,
                                is_default, is_favorites, is_recent)
         VALUES (?1, ?2, '[]', ?3, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            playlist.name,
            playlist.description,
            ts,
            serde_json::to_string(&playlist.tags)?,
            playlist.category,
            playlist.is_default,
            playlist.is_favorites,
            playlist.is_recent,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert or overwrite a playlist row keeping its id (import path).
pub fn put_playlist(conn: &Connection, playlist: &Playlist) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO playlists (id, name, description, videos, created_at, updated_at, tags,
                                           category, is_default, is_favorites, is_recent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            playlist.id,
            playlist.name,
            playlist.description,
            serde_json::to_string(&playlist.videos)?,
            format_ts(&playlist.created_at),
            format_ts(&playlist.updated_at),
            serde_json::to_string(&playlist.tags)?,
            playlist.category,
            playlist.is_default,
            playlist.is_favorites,
            playlist.is_recent,
        ],
    )?;
    Ok(())
}

pub fn get_playlist(conn: &Connection, id: i64) -> Result<Option<Playlist>> {
    let sql = format!("SELECT {} FROM playlists WHERE id = ?1", PLAYLIST_COLUMNS);
    let result = conn.query_row(&sql, params![id], map_playlist).optional()?;
    Ok(result)
}

pub fn find_system_playlist(conn: &Connection, kind: SystemPlaylist) -> Result<Option<Playlist>> {
    let sql = format!(
        "SELECT {} FROM playlists WHERE {} = 1 ORDER BY id LIMIT 1",
        PLAYLIST_COLUMNS,
        kind.flag_column()
    );
    let result = conn.query_row(&sql, [], map_playlist).optional()?;
    Ok(result)
}

pub fn find_default_playlist(conn: &Connection) -> Result<Option<Playlist>> {
    let sql = format!(
        "SELECT {} FROM playlists WHERE is_default = 1 ORDER BY id LIMIT 1",
        PLAYLIST_COLUMNS
    );
    let result = conn.query_row(&sql, [], map_playlist).optional()?;
    Ok(result)
}

/// System playlists first (Recent, Favorites), then user playlists oldest first.
pub fn list_playlists(conn: &Connection) -> Result<Vec<Playlist>> {
    let sql = format!(
        "SELECT {} FROM playlists
         ORDER BY is_recent DESC, is_favorites DESC, created_at ASC, id ASC",
        PLAYLIST_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let playlists = stmt
        .query_map([], map_playlist)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(playlists)
}

pub fn update_playlist_videos(
    conn: &Connection,
    id: i64,
    videos: &[Video],
    now: &DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE playlists SET videos = ?1, updated_at = ?2 WHERE id = ?3",
        params![serde_json::to_string(videos)?, format_ts(now), id],
    )?;
    Ok(changed)
}

pub fn update_playlist_details(
    conn: &Connection,
    playlist: &Playlist,
    now: &DateTime<Utc>,
) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE playlists SET name = ?1, description = ?2, tags = ?3, category = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            playlist.name,
            playlist.description,
            serde_json::to_string(&playlist.tags)?,
            playlist.category,
            format_ts(now),
            playlist.id,
        ],
    )?;
    Ok(changed)
}

pub fn set_default_playlist_flag(conn: &Connection, id: Option<i64>) -> Result<()> {
    conn.execute("UPDATE playlists SET is_default = 0 WHERE is_default = 1", [])?;
    if let Some(id) = id {
        conn.execute("UPDATE playlists SET is_default = 1 WHERE id = ?1", params![id])?;
    }
    Ok(())
}

pub fn delete_playlist_row(conn: &Connection, id: i64) -> Result<usize> {
    let changed = conn.execute("DELETE FROM playlists WHERE id = ?1", params![id])?;
    Ok(changed)
}

// ----- Settings -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "system" => Some(Theme::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoQuality {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl VideoQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoQuality::P480 => "480p",
            VideoQuality::P720 => "720p",
            VideoQuality::P1080 => "1080p",
            VideoQuality::Auto => "auto",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "480p" => Some(VideoQuality::P480),
            "720p" => Some(VideoQuality::P720),
            "1080p" => Some(VideoQuality::P1080),
            "auto" => Some(VideoQuality::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferSize {
    Low,
    #[default]
    Medium,
    High,
}

impl BufferSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            BufferSize::Low => "low",
            BufferSize::Medium => "medium",
            BufferSize::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(BufferSize::Low),
            "medium" => Some(BufferSize::Medium),
            "high" => Some(BufferSize::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiLayout {
    Default,
    Compact,
    Comfortable,
}

impl UiLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiLayout::Default => "default",
            UiLayout::Compact => "compact",
            UiLayout::Comfortable => "comfortable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "default" => Some(UiLayout::Default),
            "compact" => Some(UiLayout::Compact),
            "comfortable" => Some(UiLayout::Comfortable),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub background_image: Option<String>,
    /// Max video rows retained in history
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
    #[serde(default)]
    pub video_quality: VideoQuality,
    #[serde(default)]
    pub buffer_size: BufferSize,
    #[serde(default = "default_true")]
    pub autoplay: bool,
    #[serde(default)]
    pub default_playlist_id: Option<i64>,
    #[serde(default)]
    pub cinema_mode: bool,
    #[serde(default)]
    pub audio_only_mode: bool,
    #[serde(default)]
    pub ui_color: Option<String>,
    #[serde(default)]
    pub ui_layout: Option<UiLayout>,
}

fn default_history_limit() -> i64 {
    DEFAULT_HISTORY_LIMIT
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id: 0,
            theme: Theme::System,
            background_color: None,
            background_image: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            video_quality: VideoQuality::Auto,
            buffer_size: BufferSize::Medium,
            autoplay: true,
            default_playlist_id: None,
            cinema_mode: false,
            audio_only_mode: false,
            ui_color: None,
            ui_layout: None,
        }
    }
}

const SETTINGS_COLUMNS: &str =
    "id, theme, background_color, background_image, history_limit, video_quality, buffer_size,
     autoplay, default_playlist_id, cinema_mode, audio_only_mode, ui_color, ui_layout";

fn map_settings(row: &Row) -> rusqlite::Result<Settings> {
    let theme: String = row.get(1)?;
    let quality: String = row.get(5)?;
    let buffer: String = row.get(6)?;
    let layout: Option<String> = row.get(12)?;
    Ok(Settings {
        id: row.get(0)?,
        theme: Theme::parse(&theme).unwrap_or_default(),
        background_color: row.get(2)?,
        background_image: row.get(3)?,
        history_limit: row.get(4)?,
        video_quality: VideoQuality::parse(&quality).unwrap_or_default(),
        buffer_size: BufferSize::parse(&buffer).unwrap_or_default(),
        autoplay: row.get(7)?,
        default_playlist_id: row.get(8)?,
        cinema_mode: row.get(9)?,
        audio_only_mode: row.get(10)?,
        ui_color: row.get(11)?,
        ui_layout: layout.as_deref().and_then(UiLayout::parse),
    })
}

pub fn insert_settings(conn: &Connection, settings: &Settings) -> Result<i64> {
    conn.execute(
        "INSERT INTO settings (theme, background_color, background_image, history_limit, video_quality,
                               buffer_size, autoplay, default_playlist_id, cinema_mode, audio_only_mode,
                               ui_color, ui_layout)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            settings.theme.as_str(),
            settings.background_color,
            settings.background_image,
            settings.history_limit,
            settings.video_quality.as_str(),
            settings.buffer_size.as_str(),
            settings.autoplay,
            settings.default_playlist_id,
            settings.cinema_mode,
            settings.audio_only_mode,
            settings.ui_color,
            settings.ui_layout.map(|l| l.as_str()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert or overwrite a settings row keeping its id (import path).
pub fn put_settings(conn: &Connection, settings: &Settings) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (id, theme, background_color, background_image, history_limit,
                                          video_quality, buffer_size, autoplay, default_playlist_id,
                                          cinema_mode, audio_only_mode, ui_color, ui_layout)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            settings.id,
            settings.theme.as_str(),
            settings.background_color,
            settings.background_image,
            settings.history_limit,
            settings.video_quality.as_str(),
            settings.buffer_size.as_str(),
            settings.autoplay,
            settings.default_playlist_id,
            settings.cinema_mode,
            settings.audio_only_mode,
            settings.ui_color,
            settings.ui_layout.map(|l| l.as_str()),
        ],
    )?;
    Ok(())
}

pub fn update_settings(conn: &Connection, settings: &Settings) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE settings SET theme = ?1, background_color = ?2, background_image = ?3,
                             history_limit = ?4, video_quality = ?5, buffer_size = ?6, autoplay = ?7,
                             default_playlist_id = ?8, cinema_mode = ?9, audio_only_mode = ?10,
                             ui_color = ?11, ui_layout = ?12
         WHERE id = ?13",
        params![
            settings.theme.as_str(),
            settings.background_color,
            settings.background_image,
            settings.history_limit,
            settings.video_quality.as_str(),
            settings.buffer_size.as_str(),
            settings.autoplay,
            settings.default_playlist_id,
            settings.cinema_mode,
            settings.audio_only_mode,
            settings.ui_color,
            settings.ui_layout.map(|l| l.as_str()),
            settings.id,
        ],
    )?;
    Ok(changed)
}

pub fn get_settings(conn: &Connection, id: i64) -> Result<Option<Settings>> {
    let sql = format!("SELECT {} FROM settings WHERE id = ?1", SETTINGS_COLUMNS);
    let result = conn.query_row(&sql, params![id], map_settings).optional()?;
    Ok(result)
}

pub fn list_settings(conn: &Connection) -> Result<Vec<Settings>> {
    let sql = format!("SELECT {} FROM settings ORDER BY id", SETTINGS_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_settings)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Drop any settings reference to a playlist that no longer exists.
pub fn clear_default_playlist_refs(conn: &Connection, playlist_id: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE settings SET default_playlist_id = NULL WHERE default_playlist_id = ?1",
        params![playlist_id],
    )?;
    Ok(changed)
}

pub fn delete_settings_row(conn: &Connection, id: i64) -> Result<usize> {
    let changed = conn.execute("DELETE FROM settings WHERE id = ?1", params![id])?;
    Ok(changed)
}

// ----- Profile -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    /// URL or data: URI
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_active: bool,
    #[serde(default)]
    pub settings_id: Option<i64>,
}

const PROFILE_COLUMNS: &str = "id, name, avatar, created_at, is_active, settings_id";

fn map_profile(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        name: row.get(1)?,
        avatar: row.get(2)?,
        created_at: get_ts(row, 3)?,
        is_active: row.get(4)?,
        settings_id: row.get(5)?,
    })
}

pub fn insert_profile(
    conn: &Connection,
    name: &str,
    avatar: Option<&str>,
    created_at: &DateTime<Utc>,
    is_active: bool,
    settings_id: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO profiles (name, avatar, created_at, is_active, settings_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, avatar, format_ts(created_at), is_active, settings_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert or overwrite a profile row keeping its id (import path).
pub fn put_profile(conn: &Connection, profile: &Profile) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO profiles (id, name, avatar, created_at, is_active, settings_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            profile.id,
            profile.name,
            profile.avatar,
            format_ts(&profile.created_at),
            profile.is_active,
            profile.settings_id,
        ],
    )?;
    Ok(())
}

pub fn get_profile(conn: &Connection, id: i64) -> Result<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
    let result = conn.query_row(&sql, params![id], map_profile).optional()?;
    Ok(result)
}

pub fn get_active_profile(conn: &Connection) -> Result<Option<Profile>> {
    let sql = format!("SELECT {} FROM profiles WHERE is_active = 1 LIMIT 1", PROFILE_COLUMNS);
    let result = conn.query_row(&sql, [], map_profile).optional()?;
    Ok(result)
}

/// Profiles oldest first.
pub fn list_profiles(conn: &Connection) -> Result<Vec<Profile>> {
    let sql = format!("SELECT {} FROM profiles ORDER BY created_at ASC, id ASC", PROFILE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_profile)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_active_profiles(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM profiles WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn deactivate_all_profiles(conn: &Connection) -> Result<usize> {
    let changed = conn.execute("UPDATE profiles SET is_active = 0 WHERE is_active = 1", [])?;
    Ok(changed)
}

pub fn set_profile_active(conn: &Connection, id: i64) -> Result<usize> {
    let changed = conn.execute("UPDATE profiles SET is_active = 1 WHERE id = ?1", params![id])?;
    Ok(changed)
}

pub fn update_profile_details(conn: &Connection, id: i64, name: &str, avatar: Option<&str>) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE profiles SET name = ?1, avatar = ?2 WHERE id = ?3",
        params![name, avatar, id],
    )?;
    Ok(changed)
}

pub fn set_profile_settings(conn: &Connection, id: i64, settings_id: i64) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE profiles SET settings_id = ?1 WHERE id = ?2",
        params![settings_id, id],
    )?;
    Ok(changed)
}

pub fn delete_profile_row(conn: &Connection, id: i64) -> Result<usize> {
    let changed = conn.execute("DELETE FROM profiles WHERE id = ?1", params![id])?;
    Ok(changed)
}

// ----- Watch Stats -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStats {
    #[serde(default)]
    pub id: i64,
    pub profile_id: i64,
    #[serde(deserialize_with = "stats_date")]
    pub date: NaiveDate,
    /// Seconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_watch_time: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub video_count: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub categories: BTreeMap<String, i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub most_watched_tags: BTreeMap<String, i64>,
}

impl WatchStats {
    pub fn empty(profile_id: i64, date: NaiveDate) -> Self {
        Self {
            id: 0,
            profile_id,
            date,
            total_watch_time: 0.0,
            video_count: 0,
            categories: BTreeMap::new(),
            most_watched_tags: BTreeMap::new(),
        }
    }
}

const WATCH_STATS_COLUMNS: &str =
    "id, profile_id, date, total_watch_time, video_count, categories, most_watched_tags";

fn map_watch_stats(row: &Row) -> rusqlite::Result<WatchStats> {
    Ok(WatchStats {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        date: get_date(row, 2)?,
        total_watch_time: row.get(3)?,
        video_count: row.get(4)?,
        categories: get_json(row, 5)?,
        most_watched_tags: get_json(row, 6)?,
    })
}

pub fn get_watch_stats_for_day(conn: &Connection, profile_id: i64, date: &NaiveDate) -> Result<Option<WatchStats>> {
    let sql = format!(
        "SELECT {} FROM watch_stats WHERE profile_id = ?1 AND date = ?2",
        WATCH_STATS_COLUMNS
    );
    let result = conn
        .query_row(&sql, params![profile_id, format_date(date)], map_watch_stats)
        .optional()?;
    Ok(result)
}

pub fn insert_watch_stats(conn: &Connection, stats: &WatchStats) -> Result<i64> {
    conn.execute(
        "INSERT INTO watch_stats (profile_id, date, total_watch_time, video_count, categories, most_watched_tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            stats.profile_id,
            format_date(&stats.date),
            stats.total_watch_time,
            stats.video_count,
            serde_json::to_string(&stats.categories)?,
            serde_json::to_string(&stats.most_watched_tags)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert or overwrite a stats row keeping its id (import path).
pub fn put_watch_stats(conn: &Connection, stats: &WatchStats) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO watch_stats (id, profile_id, date, total_watch_time, video_count,
                                             categories, most_watched_tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            stats.id,
            stats.profile_id,
            format_date(&stats.date),
            stats.total_watch_time,
            stats.video_count,
            serde_json::to_string(&stats.categories)?,
            serde_json::to_string(&stats.most_watched_tags)?,
        ],
    )?;
    Ok(())
}

pub fn update_watch_stats(conn: &Connection, stats: &WatchStats) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE watch_stats SET total_watch_time = ?1, video_count = ?2, categories = ?3,
                                most_watched_tags = ?4
         WHERE id = ?5",
        params![
            stats.total_watch_time,
            stats.video_count,
            serde_json::to_string(&stats.categories)?,
            serde_json::to_string(&stats.most_watched_tags)?,
            stats.id,
        ],
    )?;
    Ok(changed)
}

/// Rows for one profile with `from <= date <= to`, oldest first.
pub fn list_watch_stats_range(
    conn: &Connection,
    profile_id: i64,
    from: &NaiveDate,
    to: &NaiveDate,
) -> Result<Vec<WatchStats>> {
    let sql = format!(
        "SELECT {} FROM watch_stats
         WHERE profile_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC",
        WATCH_STATS_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![profile_id, format_date(from), format_date(to)], map_watch_stats)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_watch_stats_for_profile(conn: &Connection, profile_id: i64) -> Result<Vec<WatchStats>> {
    let sql = format!(
        "SELECT {} FROM watch_stats WHERE profile_id = ?1 ORDER BY date ASC",
        WATCH_STATS_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![profile_id], map_watch_stats)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_all_watch_stats(conn: &Connection) -> Result<Vec<WatchStats>> {
    let sql = format!("SELECT {} FROM watch_stats ORDER BY id", WATCH_STATS_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_watch_stats)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_watch_stats_for_profile(conn: &Connection, profile_id: i64) -> Result<usize> {
    let changed = conn.execute("DELETE FROM watch_stats WHERE profile_id = ?1", params![profile_id])?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::migrations::run_migrations(&conn).unwrap();
        conn
    }

    fn sample_video(url: &str) -> Video {
        Video {
            id: 0,
            url: url.to_string(),
            title: "Sample".to_string(),
            custom_title: None,
            thumbnail: None,
            duration: Some(42.5),
            last_watched: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            watch_count: 1,
            last_watch_count_update: None,
            preferred_quality: Some("720p".to_string()),
            subtitles: vec![Subtitle {
                id: Some(1),
                label: "English".to_string(),
                language: "en".to_string(),
                url: "https://x/en.vtt".to_string(),
                format: SubtitleFormat::Vtt,
            }],
            tags: vec!["music".to_string()],
            category: Some("Live".to_string()),
            is_favorite: false,
        }
    }

    #[test]
    fn test_video_row_preserves_json_columns() {
        let conn = setup_db();
        let id = insert_video(&conn, &sample_video("https://x/a.mp4")).unwrap();

        let stored = get_video(&conn, id).unwrap().unwrap();
        assert_eq!(stored.subtitles.len(), 1);
        assert_eq!(stored.subtitles[0].format, SubtitleFormat::Vtt);
        assert_eq!(stored.tags, vec!["music".to_string()]);
        assert_eq!(stored.last_watched, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_duplicate_url_rejected() {
        let conn = setup_db();
        insert_video(&conn, &sample_video("https://x/a.mp4")).unwrap();
        assert!(insert_video(&conn, &sample_video("https://x/a.mp4")).is_err());
    }

    #[test]
    fn test_display_title_prefers_custom() {
        let mut video = sample_video("https://x/a.mp4");
        assert_eq!(video.display_title(), "Sample");
        video.custom_title = Some("Mine".to_string());
        assert_eq!(video.display_title(), "Mine");
        video.custom_title = Some("   ".to_string());
        assert_eq!(video.display_title(), "Sample");
    }

    #[test]
    fn test_second_favorites_playlist_rejected() {
        let conn = setup_db();
        let now = Utc::now();
        insert_playlist(&conn, &SystemPlaylist::Favorites.new_playlist(), &now).unwrap();
        assert!(insert_playlist(&conn, &SystemPlaylist::Favorites.new_playlist(), &now).is_err());
    }

    #[test]
    fn test_settings_defaults_round_trip_through_row() {
        let conn = setup_db();
        let id = insert_settings(&conn, &Settings::default()).unwrap();
        let stored = get_settings(&conn, id).unwrap().unwrap();
        assert_eq!(stored.theme, Theme::System);
        assert_eq!(stored.history_limit, 500);
        assert_eq!(stored.video_quality, VideoQuality::Auto);
        assert_eq!(stored.buffer_size, BufferSize::Medium);
        assert!(stored.autoplay);
        assert!(!stored.cinema_mode);
        assert!(!stored.audio_only_mode);
    }

    #[test]
    fn test_legacy_json_shapes_accepted() {
        // Older exports: null tags, missing flags, full timestamp for a stats day
        let video: Video = serde_json::from_str(
            r#"{"id": 3, "url": "https://x/v.mp4", "title": "T", "tags": null, "lastWatched": "2026-01-02T03:04:05.000Z"}"#,
        ).unwrap();
        assert!(video.tags.is_empty());
        assert!(!video.is_favorite);

        let stats: WatchStats = serde_json::from_str(
            r#"{"profileId": 1, "date": "2026-01-02T22:00:00.000Z", "totalWatchTime": 60, "videoCount": 1}"#,
        ).unwrap();
        assert_eq!(stats.date, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        assert!(stats.categories.is_empty());
    }

    #[test]
    fn test_stats_unique_per_profile_day() {
        let conn = setup_db();
        let day = NaiveDate::from_ymd_opt(2026, 5, 5).unwrap();
        insert_watch_stats(&conn, &WatchStats::empty(1, day)).unwrap();
        assert!(insert_watch_stats(&conn, &WatchStats::empty(1, day)).is_err());
        insert_watch_stats(&conn, &WatchStats::empty(2, day)).unwrap();
    }
}
