// Video record manager
// One canonical row per URL. Every edit to a canonical row is re-synchronised
// into the playlist snapshots that embed it within the same transaction.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use crate::constants::{DEFAULT_HISTORY_LIMIT, WATCH_COUNT_COOLDOWN_SECS};
use crate::db::schema::{self, Subtitle, SystemPlaylist, Video, VIDEO_COLUMNS};
use crate::error::{Result, VidShelfError};
use crate::{playlists, profiles, stats};

/// What a caller knows about a video it is about to play. Only `url` is required;
/// any field left `None` keeps the stored value on replay.
#[derive(Debug, Clone, Default)]
pub struct VideoCandidate {
    pub url: String,
    pub title: Option<String>,
    pub custom_title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub preferred_quality: Option<String>,
    pub subtitles: Option<Vec<Subtitle>>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub is_favorite: Option<bool>,
}

impl VideoCandidate {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl From<&Video> for VideoCandidate {
    fn from(video: &Video) -> Self {
        Self {
            url: video.url.clone(),
            title: Some(video.title.clone()),
            custom_title: video.custom_title.clone(),
            thumbnail: video.thumbnail.clone(),
            duration: video.duration,
            preferred_quality: video.preferred_quality.clone(),
            subtitles: Some(video.subtitles.clone()),
            tags: Some(video.tags.clone()),
            category: video.category.clone(),
            is_favorite: Some(video.is_favorite),
        }
    }
}

/// Result of one `add_to_history` call.
#[derive(Debug, Clone)]
pub struct HistoryOutcome {
    pub video: Video,
    pub created: bool,
    pub evicted: Vec<i64>,
    pub touched_playlists: Vec<i64>,
}

/// A canonical edit and the playlists whose snapshots were rewritten.
#[derive(Debug, Clone)]
pub struct VideoEdit {
    pub video: Video,
    pub touched_playlists: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct FavoriteToggle {
    pub is_favorite: bool,
    pub video: Option<Video>,
    pub ingested: Option<HistoryOutcome>,
    pub touched_playlists: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub category: Option<String>,
    /// Matches videos carrying any of these tags
    pub tags: Vec<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

/// Trim, drop empties and de-duplicate, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

fn assign_subtitle_ids(subtitles: &mut [Subtitle]) {
    let mut next = subtitles.iter().filter_map(|s| s.id).max().unwrap_or(0) + 1;
    for subtitle in subtitles.iter_mut().filter(|s| s.id.is_none()) {
        subtitle.id = Some(next);
        next += 1;
    }
}

fn cooldown_elapsed(video: &Video, now: &DateTime<Utc>) -> bool {
    if video.watch_count == 0 {
        return true;
    }
    match video.last_watch_count_update {
        Some(last) => *now - last >= Duration::seconds(WATCH_COUNT_COOLDOWN_SECS),
        None => true,
    }
}

fn merge_candidate(video: &mut Video, candidate: VideoCandidate) {
    if let Some(title) = candidate.title.filter(|t| !t.trim().is_empty()) {
        video.title = title;
    }
    if candidate.custom_title.is_some() {
        video.custom_title = candidate.custom_title;
    }
    if candidate.thumbnail.is_some() {
        video.thumbnail = candidate.thumbnail;
    }
    if candidate.duration.is_some() {
        video.duration = candidate.duration;
    }
    if candidate.preferred_quality.is_some() {
        video.preferred_quality = candidate.preferred_quality;
    }
    if let Some(subtitles) = candidate.subtitles {
        video.subtitles = subtitles;
    }
    if let Some(tags) = candidate.tags {
        video.tags = normalize_tags(&tags);
    }
    if candidate.category.is_some() {
        video.category = candidate.category;
    }
    if let Some(is_favorite) = candidate.is_favorite {
        video.is_favorite = is_favorite;
    }
    assign_subtitle_ids(&mut video.subtitles);
}

fn new_video(candidate: VideoCandidate, now: &DateTime<Utc>) -> Video {
    let title = candidate
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| candidate.url.clone());
    let mut video = Video {
        id: 0,
        url: candidate.url.clone(),
        title,
        custom_title: None,
        thumbnail: None,
        duration: None,
        last_watched: *now,
        watch_count: 1,
        last_watch_count_update: Some(*now),
        preferred_quality: None,
        subtitles: Vec::new(),
        tags: Vec::new(),
        category: None,
        is_favorite: false,
    };
    merge_candidate(&mut video, candidate);
    video
}

/// Record a watch inside the caller's transaction.
pub fn ingest(conn: &Connection, candidate: VideoCandidate, now: &DateTime<Utc>) -> Result<Option<HistoryOutcome>> {
    let url = candidate.url.trim().to_string();
    if url.is_empty() {
        return Err(VidShelfError::Other("Video URL is empty".to_string()));
    }
    let candidate = VideoCandidate { url, ..candidate };

    let Some(profile) = schema::get_active_profile(conn)? else {
        log::debug!("No active profile, not recording {}", candidate.url);
        return Ok(None);
    };

    let mut touched = Vec::new();
    let (video, created) = match schema::get_video_by_url(conn, &candidate.url)? {
        Some(mut video) => {
            merge_candidate(&mut video, candidate);
            if cooldown_elapsed(&video, now) {
                video.watch_count += 1;
                video.last_watch_count_update = Some(*now);
            }
            video.last_watched = *now;
            schema::update_video(conn, &video)?;
            touched.extend(playlists::sync_video_snapshots(conn, &video, now)?);
            (video, false)
        }
        None => {
            let mut video = new_video(candidate, now);
            video.id = schema::insert_video(conn, &video)?;
            log::debug!("Added video {} ({})", video.url, video.id);
            (video, true)
        }
    };

    let recent = playlists::push_recent(conn, &video, now)?;
    if !touched.contains(&recent.id) {
        touched.push(recent.id);
    }
    stats::record_watch(conn, profile.id, &video, now)?;

    let mut evicted = Vec::new();
    if created {
        let limit = profiles::active_settings(conn)?
            .map(|s| s.history_limit)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .max(1);
        let count = schema::count_videos(conn)?;
        if count > limit {
            evicted = schema::oldest_video_ids(conn, count - limit, video.id)?;
            for id in &evicted {
                schema::delete_video_row(conn, *id)?;
            }
            for id in playlists::remove_videos_everywhere(conn, &evicted, now)? {
                if !touched.contains(&id) {
                    touched.push(id);
                }
            }
            log::info!("History over limit {}: evicted {} videos", limit, evicted.len());
        }
    }

    Ok(Some(HistoryOutcome {
        video,
        created,
        evicted,
        touched_playlists: touched,
    }))
}

/// The canonical "a video was watched" entry point. Returns `None` when no
/// profile is active.
pub fn add_to_history(conn: &Connection, candidate: VideoCandidate, now: &DateTime<Utc>) -> Result<Option<HistoryOutcome>> {
    let tx = conn.unchecked_transaction()?;
    let outcome = ingest(&tx, candidate, now)?;
    tx.commit()?;
    Ok(outcome)
}

/// Apply `edit` to the canonical row and rewrite every embedded snapshot.
/// All video edits go through here.
pub fn mutate_video<F>(conn: &Connection, id: i64, now: &DateTime<Utc>, edit: F) -> Result<Option<VideoEdit>>
where
    F: FnOnce(&mut Video),
{
    let tx = conn.unchecked_transaction()?;
    let Some(mut video) = schema::get_video(&tx, id)? else {
        return Ok(None);
    };

    let before = video.clone();
    edit(&mut video);
    video.id = before.id;
    video.url = before.url.clone();
    if video == before {
        return Ok(Some(VideoEdit { video, touched_playlists: Vec::new() }));
    }

    schema::update_video(&tx, &video)?;
    let touched_playlists = playlists::sync_video_snapshots(&tx, &video, now)?;
    tx.commit()?;

    Ok(Some(VideoEdit { video, touched_playlists }))
}

/// Set or clear (blank) the user title override.
pub fn update_video_title(conn: &Connection, id: i64, title: &str, now: &DateTime<Utc>) -> Result<Option<VideoEdit>> {
    let title = title.trim();
    mutate_video(conn, id, now, |video| {
        video.custom_title = if title.is_empty() { None } else { Some(title.to_string()) };
    })
}

pub fn update_video_tags(conn: &Connection, id: i64, tags: &[String], now: &DateTime<Utc>) -> Result<Option<VideoEdit>> {
    let tags = normalize_tags(tags);
    mutate_video(conn, id, now, |video| video.tags = tags)
}

pub fn update_video_category(
    conn: &Connection,
    id: i64,
    category: Option<&str>,
    now: &DateTime<Utc>,
) -> Result<Option<VideoEdit>> {
    let category = category.map(str::trim).filter(|c| !c.is_empty()).map(str::to_string);
    mutate_video(conn, id, now, |video| video.category = category)
}

pub fn update_video_quality(
    conn: &Connection,
    id: i64,
    quality: Option<&str>,
    now: &DateTime<Utc>,
) -> Result<Option<VideoEdit>> {
    let quality = quality.map(str::to_string);
    mutate_video(conn, id, now, |video| video.preferred_quality = quality)
}

pub fn add_subtitle(conn: &Connection, id: i64, subtitle: Subtitle, now: &DateTime<Utc>) -> Result<Option<VideoEdit>> {
    mutate_video(conn, id, now, |video| {
        let mut subtitle = subtitle;
        subtitle.id = None;
        video.subtitles.push(subtitle);
        assign_subtitle_ids(&mut video.subtitles);
    })
}

pub fn remove_subtitle(conn: &Connection, id: i64, subtitle_id: i64, now: &DateTime<Utc>) -> Result<Option<VideoEdit>> {
    mutate_video(conn, id, now, |video| {
        video.subtitles.retain(|s| s.id != Some(subtitle_id));
    })
}

/// Flip favorite membership for the video at `candidate.url`.
pub fn toggle_video_favorite(
    conn: &Connection,
    candidate: VideoCandidate,
    now: &DateTime<Utc>,
) -> Result<FavoriteToggle> {
    let tx = conn.unchecked_transaction()?;
    let favorites = playlists::get_or_create_system_playlist(&tx, SystemPlaylist::Favorites, now)?;
    let url = candidate.url.trim().to_string();
    let mut touched = Vec::new();

    if favorites.videos.iter().any(|v| v.url == url) {
        if playlists::remove_url_from_playlist(&tx, favorites.id, &url, now)? {
            touched.push(favorites.id);
        }
        let video = match schema::get_video_by_url(&tx, &url)? {
            Some(mut video) => {
                video.is_favorite = false;
                schema::set_video_favorite(&tx, video.id, false)?;
                touched.extend(playlists::sync_video_snapshots(&tx, &video, now)?);
                Some(video)
            }
            None => None,
        };
        tx.commit()?;
        touched.dedup();
        return Ok(FavoriteToggle { is_favorite: false, video, ingested: None, touched_playlists: touched });
    }

    // Favoriting counts as a watch; without an active profile an existing row is still flagged
    let (mut video, ingested) = match ingest(&tx, VideoCandidate { url: url.clone(), ..candidate }, now)? {
        Some(outcome) => {
            touched.extend(outcome.touched_playlists.iter().copied());
            (outcome.video.clone(), Some(outcome))
        }
        None => {
            let video = schema::get_video_by_url(&tx, &url)?.ok_or(VidShelfError::NoActiveProfile)?;
            (video, None)
        }
    };

    video.is_favorite = true;
    schema::set_video_favorite(&tx, video.id, true)?;
    for id in playlists::sync_video_snapshots(&tx, &video, now)? {
        if !touched.contains(&id) {
            touched.push(id);
        }
    }
    if playlists::append_snapshot(&tx, favorites.id, &video, now)? && !touched.contains(&favorites.id) {
        touched.push(favorites.id);
    }
    tx.commit()?;

    Ok(FavoriteToggle { is_favorite: true, video: Some(video), ingested, touched_playlists: touched })
}

/// Delete a canonical video and every snapshot of it. `None` if it didn't exist.
pub fn delete_video(conn: &Connection, id: i64, now: &DateTime<Utc>) -> Result<Option<Vec<i64>>> {
    let tx = conn.unchecked_transaction()?;
    if schema::delete_video_row(&tx, id)? == 0 {
        return Ok(None);
    }
    let touched = playlists::remove_videos_everywhere(&tx, &[id], now)?;
    tx.commit()?;
    log::info!("Deleted video {} (removed from {} playlists)", id, touched.len());
    Ok(Some(touched))
}

pub fn get_history(conn: &Connection, limit: Option<i64>) -> Result<Vec<Video>> {
    schema::list_videos(conn, limit)
}

pub fn is_video_in_favorites(conn: &Connection, url: &str) -> Result<bool> {
    let now = Utc::now();
    let favorites = playlists::get_or_create_system_playlist(conn, SystemPlaylist::Favorites, &now)?;
    Ok(favorites.videos.iter().any(|v| v.url == url))
}

pub fn get_favorite_videos(conn: &Connection) -> Result<Vec<Video>> {
    let now = Utc::now();
    let favorites = playlists::get_or_create_system_playlist(conn, SystemPlaylist::Favorites, &now)?;
    Ok(favorites.videos)
}

fn like_pattern(query: &str) -> String {
    let escaped = query
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Case-insensitive substring search over title, custom title, url, category and
/// tags, newest first.
pub fn search_videos(conn: &Connection, query: &str, filters: &SearchFilters) -> Result<Vec<Video>> {
    let query = query.trim();
    let sql = format!(
        "SELECT {} FROM videos
         WHERE (?1 = '' OR lower(title) LIKE ?2 ESCAPE '\\'
                OR lower(coalesce(custom_title, '')) LIKE ?2 ESCAPE '\\'
                OR lower(url) LIKE ?2 ESCAPE '\\'
                OR lower(coalesce(category, '')) LIKE ?2 ESCAPE '\\'
                OR EXISTS (SELECT 1 FROM json_each(videos.tags)
                           WHERE lower(json_each.value) LIKE ?2 ESCAPE '\\'))
           AND (?3 IS NULL OR category = ?3)
           AND (?4 IS NULL OR last_watched >= ?4)
           AND (?5 IS NULL OR last_watched <= ?5)
         ORDER BY last_watched DESC, id DESC",
        VIDEO_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let videos = stmt
        .query_map(
            params![
                query,
                like_pattern(query),
                filters.category,
                filters.date_from.as_ref().map(schema::format_ts),
                filters.date_to.as_ref().map(schema::format_ts),
            ],
            schema::map_video,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if filters.tags.is_empty() {
        return Ok(videos);
    }
    Ok(videos
        .into_iter()
        .filter(|v| v.tags.iter().any(|t| filters.tags.contains(t)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{NewPlaylist, SubtitleFormat};
    use chrono::TimeZone;

    fn setup_db() -> Connection {
        let conn = crate::db::open_in_memory().unwrap();
        profiles::create_profile(&conn, "Tester", None, &t0()).unwrap();
        conn
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    fn watch(conn: &Connection, url: &str, secs: i64) -> HistoryOutcome {
        add_to_history(conn, VideoCandidate::new(url), &at(secs)).unwrap().unwrap()
    }

    #[test]
    fn test_no_active_profile_is_noop() {
        let conn = crate::db::open_in_memory().unwrap();
        let outcome = add_to_history(&conn, VideoCandidate::new("https://x/a.mp4"), &t0()).unwrap();
        assert!(outcome.is_none());
        assert_eq!(schema::count_videos(&conn).unwrap(), 0);
    }

    #[test]
    fn test_same_url_stays_unique() {
        let conn = setup_db();
        let first = watch(&conn, "https://x/a.mp4", 0);
        let again = watch(&conn, "https://x/a.mp4", 60);
        assert!(first.created);
        assert!(!again.created);
        assert_eq!(first.video.id, again.video.id);
        assert_eq!(schema::count_videos(&conn).unwrap(), 1);
        assert_eq!(first.video.title, "https://x/a.mp4");
    }

    #[test]
    fn test_watch_count_cooldown() {
        let conn = setup_db();
        assert_eq!(watch(&conn, "https://x/a.mp4", 0).video.watch_count, 1);
        assert_eq!(watch(&conn, "https://x/a.mp4", 3).video.watch_count, 1);
        assert_eq!(watch(&conn, "https://x/a.mp4", 9).video.watch_count, 1);
        // Cooldown measured from the last increment, not the last call
        assert_eq!(watch(&conn, "https://x/a.mp4", 11).video.watch_count, 2);
        assert_eq!(watch(&conn, "https://x/a.mp4", 22).video.watch_count, 3);
    }

    #[test]
    fn test_cooldown_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.db");
        {
            let conn = crate::db::open_db(&path).unwrap();
            profiles::create_profile(&conn, "Tester", None, &t0()).unwrap();
            watch(&conn, "https://x/a.mp4", 0);
        }
        let conn = crate::db::open_db(&path).unwrap();
        assert_eq!(watch(&conn, "https://x/a.mp4", 5).video.watch_count, 1);
    }

    #[test]
    fn test_replay_merges_explicit_fields_only() {
        let conn = setup_db();
        let mut candidate = VideoCandidate::new("https://x/a.mp4");
        candidate.title = Some("Original".to_string());
        candidate.category = Some("Music".to_string());
        candidate.tags = Some(vec![" live ".to_string(), "live".to_string(), "".to_string()]);
        add_to_history(&conn, candidate, &t0()).unwrap();

        let mut replay = VideoCandidate::new("https://x/a.mp4");
        replay.duration = Some(120.0);
        let video = add_to_history(&conn, replay, &at(30)).unwrap().unwrap().video;

        assert_eq!(video.title, "Original");
        assert_eq!(video.category.as_deref(), Some("Music"));
        assert_eq!(video.tags, vec!["live".to_string()]);
        assert_eq!(video.duration, Some(120.0));
        assert_eq!(video.last_watched, at(30));
    }

    #[test]
    fn test_history_eviction_keeps_most_recent_and_cascades() {
        let conn = setup_db();
        let mut settings = profiles::active_settings(&conn).unwrap().unwrap();
        settings.history_limit = 3;
        schema::update_settings(&conn, &settings).unwrap();

        let first = watch(&conn, "https://x/1.mp4", 0);
        let pid = playlists::create_playlist(&conn, NewPlaylist { name: "Keep".to_string(), ..NewPlaylist::default() }, &t0()).unwrap();
        playlists::append_snapshot(&conn, pid, &first.video, &t0()).unwrap();

        watch(&conn, "https://x/2.mp4", 10);
        watch(&conn, "https://x/3.mp4", 20);
        let outcome = watch(&conn, "https://x/4.mp4", 30);
        watch(&conn, "https://x/5.mp4", 40);

        assert_eq!(outcome.evicted, vec![first.video.id]);
        let urls: Vec<String> = get_history(&conn, None).unwrap().into_iter().map(|v| v.url).collect();
        assert_eq!(urls, vec!["https://x/5.mp4", "https://x/4.mp4", "https://x/3.mp4"]);

        // Evicted videos leave every playlist, Recent included
        assert!(schema::get_playlist(&conn, pid).unwrap().unwrap().videos.is_empty());
        let recent = schema::find_system_playlist(&conn, SystemPlaylist::Recent).unwrap().unwrap();
        assert_eq!(recent.videos.len(), 3);
    }

    #[test]
    fn test_eviction_skips_new_video_even_when_it_is_oldest() {
        let conn = setup_db();
        let mut settings = profiles::active_settings(&conn).unwrap().unwrap();
        settings.history_limit = 2;
        schema::update_settings(&conn, &settings).unwrap();

        let a = watch(&conn, "https://x/a.mp4", 86_400);
        watch(&conn, "https://x/b.mp4", 2 * 86_400);
        // Clock behind the stored rows
        let outcome = watch(&conn, "https://x/c.mp4", 0);

        assert_eq!(outcome.evicted, vec![a.video.id]);
        assert_eq!(schema::count_videos(&conn).unwrap(), 2);
        assert!(schema::get_video_by_url(&conn, "https://x/c.mp4").unwrap().is_some());
        assert!(schema::get_video_by_url(&conn, "https://x/a.mp4").unwrap().is_none());
    }

    #[test]
    fn test_edit_propagates_to_every_snapshot() {
        let conn = setup_db();
        let video = watch(&conn, "https://x/a.mp4", 0).video;
        let pid = playlists::create_playlist(&conn, NewPlaylist { name: "Mine".to_string(), ..NewPlaylist::default() }, &t0()).unwrap();
        playlists::append_snapshot(&conn, pid, &video, &t0()).unwrap();

        let edit = update_video_title(&conn, video.id, "  Better  ", &at(5)).unwrap().unwrap();
        assert_eq!(edit.video.display_title(), "Better");
        assert_eq!(edit.touched_playlists.len(), 2);

        let mine = schema::get_playlist(&conn, pid).unwrap().unwrap();
        assert_eq!(mine.videos[0].display_title(), "Better");
        let recent = schema::find_system_playlist(&conn, SystemPlaylist::Recent).unwrap().unwrap();
        assert_eq!(recent.videos[0].display_title(), "Better");

        update_video_quality(&conn, video.id, Some("1080p"), &at(6)).unwrap();
        let mine = schema::get_playlist(&conn, pid).unwrap().unwrap();
        assert_eq!(mine.videos[0].preferred_quality.as_deref(), Some("1080p"));

        assert!(update_video_title(&conn, 999, "x", &at(7)).unwrap().is_none());
    }

    #[test]
    fn test_subtitles_get_ids_and_can_be_removed() {
        let conn = setup_db();
        let video = watch(&conn, "https://x/a.mp4", 0).video;
        let subtitle = |lang: &str| Subtitle {
            id: None,
            label: lang.to_uppercase(),
            language: lang.to_string(),
            url: format!("https://x/{}.vtt", lang),
            format: SubtitleFormat::Vtt,
        };

        add_subtitle(&conn, video.id, subtitle("en"), &at(1)).unwrap();
        let edit = add_subtitle(&conn, video.id, subtitle("fr"), &at(2)).unwrap().unwrap();
        let ids: Vec<Option<i64>> = edit.video.subtitles.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);

        let edit = remove_subtitle(&conn, video.id, 1, &at(3)).unwrap().unwrap();
        assert_eq!(edit.video.subtitles.len(), 1);
        assert_eq!(edit.video.subtitles[0].language, "fr");
    }

    #[test]
    fn test_toggle_favorite_round_trip() {
        let conn = setup_db();
        let on = toggle_video_favorite(&conn, VideoCandidate::new("https://x/fav.mp4"), &t0()).unwrap();
        assert!(on.is_favorite);
        assert!(on.ingested.is_some());
        assert!(is_video_in_favorites(&conn, "https://x/fav.mp4").unwrap());
        let favorites = get_favorite_videos(&conn).unwrap();
        assert_eq!(favorites.len(), 1);
        assert!(favorites[0].is_favorite);

        let off = toggle_video_favorite(&conn, VideoCandidate::new("https://x/fav.mp4"), &at(1)).unwrap();
        assert!(!off.is_favorite);
        assert!(get_favorite_videos(&conn).unwrap().is_empty());
        let video = schema::get_video_by_url(&conn, "https://x/fav.mp4").unwrap().unwrap();
        assert!(!video.is_favorite);
    }

    #[test]
    fn test_favoriting_existing_video_records_a_watch() {
        let conn = setup_db();
        watch(&conn, "https://x/a.mp4", 0);
        watch(&conn, "https://x/b.mp4", 5);

        let mut candidate = VideoCandidate::new("https://x/a.mp4");
        candidate.title = Some("Now Titled".to_string());
        let on = toggle_video_favorite(&conn, candidate, &at(60)).unwrap();
        let ingested = on.ingested.unwrap();
        assert!(!ingested.created);

        let video = schema::get_video_by_url(&conn, "https://x/a.mp4").unwrap().unwrap();
        assert_eq!(video.watch_count, 2);
        assert_eq!(video.title, "Now Titled");
        assert!(video.is_favorite);

        let recent = schema::find_system_playlist(&conn, SystemPlaylist::Recent).unwrap().unwrap();
        assert_eq!(recent.videos[0].url, "https://x/a.mp4");
        assert!(recent.videos[0].is_favorite);
        let profile = schema::get_active_profile(&conn).unwrap().unwrap();
        assert_eq!(stats::profile_video_count(&conn, profile.id).unwrap(), 3);
    }

    #[test]
    fn test_delete_video_cascades() {
        let conn = setup_db();
        let video = watch(&conn, "https://x/a.mp4", 0).video;
        toggle_video_favorite(&conn, VideoCandidate::new("https://x/a.mp4"), &at(1)).unwrap();

        let touched = delete_video(&conn, video.id, &at(2)).unwrap().unwrap();
        assert_eq!(touched.len(), 2);
        assert!(schema::get_video(&conn, video.id).unwrap().is_none());
        for playlist in schema::list_playlists(&conn).unwrap() {
            assert!(playlist.position_of(video.id).is_none());
        }
        assert!(delete_video(&conn, video.id, &at(3)).unwrap().is_none());
    }

    #[test]
    fn test_search_matches_fields_and_filters() {
        let conn = setup_db();
        let mut a = VideoCandidate::new("https://x/cats.mp4");
        a.title = Some("Funny Cats".to_string());
        a.tags = Some(vec!["animals".to_string()]);
        a.category = Some("Comedy".to_string());
        add_to_history(&conn, a, &at(0)).unwrap();

        let mut b = VideoCandidate::new("https://x/talk.mp4");
        b.title = Some("A talk about 100% coverage".to_string());
        b.tags = Some(vec!["tech".to_string()]);
        add_to_history(&conn, b, &at(10)).unwrap();

        let hits = |q: &str, f: &SearchFilters| -> Vec<String> {
            search_videos(&conn, q, f).unwrap().into_iter().map(|v| v.url).collect()
        };
        let none = SearchFilters::default();

        assert_eq!(hits("CATS", &none), vec!["https://x/cats.mp4"]);
        assert_eq!(hits("animal", &none), vec!["https://x/cats.mp4"]);
        assert_eq!(hits("100%", &none), vec!["https://x/talk.mp4"]);
        assert_eq!(hits("", &none), vec!["https://x/talk.mp4", "https://x/cats.mp4"]);

        let comedy = SearchFilters { category: Some("Comedy".to_string()), ..SearchFilters::default() };
        assert_eq!(hits("", &comedy), vec!["https://x/cats.mp4"]);

        let tagged = SearchFilters { tags: vec!["tech".to_string(), "other".to_string()], ..SearchFilters::default() };
        assert_eq!(hits("", &tagged), vec!["https://x/talk.mp4"]);

        let later = SearchFilters { date_from: Some(at(5)), ..SearchFilters::default() };
        assert_eq!(hits("", &later), vec!["https://x/talk.mp4"]);
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![" a".to_string(), "b".to_string(), "a".to_string(), " ".to_string()];
        assert_eq!(normalize_tags(&tags), vec!["a".to_string(), "b".to_string()]);
    }
}
