// VidShelf - History Commands
// Watching, favoriting, editing and deleting canonical videos

use chrono::{DateTime, Utc};

use super::{follow_cursor, playing_playlist, VideoStore};
use crate::db::schema::{self, Subtitle, Video};
use crate::error::Result;
use crate::events::ChangeEvent;
use crate::videos::{self, HistoryOutcome, SearchFilters, VideoCandidate, VideoEdit};

impl VideoStore {
    /// Record that a video was watched. `None` when no profile is active.
    pub fn add_to_history(&self, candidate: VideoCandidate) -> Result<Option<Video>> {
        self.add_to_history_at(candidate, Utc::now())
    }

    pub fn add_to_history_at(&self, candidate: VideoCandidate, now: DateTime<Utc>) -> Result<Option<Video>> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let before = playing_playlist(conn, cursor)?;
            let outcome = videos::add_to_history(conn, candidate, &now)?;
            if let Some(outcome) = &outcome {
                cursor.refresh_video(&outcome.video);
                follow_cursor(conn, cursor, before.as_ref(), &outcome.touched_playlists, &outcome.evicted)?;
            }
            Ok(outcome)
        });

        let outcome = self.report("add video to history", result)?;
        Ok(outcome.map(|outcome| {
            self.publish_history(&outcome);
            outcome.video
        }))
    }

    pub(crate) fn publish_history(&self, outcome: &HistoryOutcome) {
        let video_id = outcome.video.id;
        self.bus.publish(if outcome.created {
            ChangeEvent::VideoAdded { video_id }
        } else {
            ChangeEvent::VideoUpdated { video_id }
        });
        if !outcome.evicted.is_empty() {
            self.bus.publish(ChangeEvent::HistoryEvicted { video_ids: outcome.evicted.clone() });
        }
        self.publish_playlists_updated(&outcome.touched_playlists);
    }

    /// Flip favorite state for the URL. Returns the new state.
    pub fn toggle_video_favorite(&self, candidate: VideoCandidate) -> Result<bool> {
        self.toggle_video_favorite_at(candidate, Utc::now())
    }

    pub fn toggle_video_favorite_at(&self, candidate: VideoCandidate, now: DateTime<Utc>) -> Result<bool> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let before = playing_playlist(conn, cursor)?;
            let toggle = videos::toggle_video_favorite(conn, candidate, &now)?;
            if let Some(video) = &toggle.video {
                cursor.refresh_video(video);
            }
            let evicted = toggle.ingested.as_ref().map(|o| o.evicted.clone()).unwrap_or_default();
            follow_cursor(conn, cursor, before.as_ref(), &toggle.touched_playlists, &evicted)?;
            Ok(toggle)
        });

        let toggle = self.report("toggle favorite", result)?;
        if let Some(ingested) = &toggle.ingested {
            self.publish_history(ingested);
        }
        if let Some(video) = &toggle.video {
            self.bus.publish(ChangeEvent::VideoUpdated { video_id: video.id });
        }
        self.publish_playlists_updated(&toggle.touched_playlists);
        Ok(toggle.is_favorite)
    }

    /// Delete a video and remove it from every playlist. `false` if it didn't exist.
    pub fn delete_video(&self, id: i64) -> Result<bool> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let before = playing_playlist(conn, cursor)?;
            let touched = videos::delete_video(conn, id, &Utc::now())?;
            if let Some(touched) = &touched {
                follow_cursor(conn, cursor, before.as_ref(), touched, &[id])?;
            }
            Ok(touched)
        });

        let Some(touched) = self.report("delete video", result)? else {
            return Ok(false);
        };
        self.bus.publish(ChangeEvent::VideoDeleted { video_id: id });
        self.publish_playlists_updated(&touched);
        Ok(true)
    }

    fn apply_edit(
        &self,
        action: &str,
        edit: impl FnOnce(&rusqlite::Connection) -> Result<Option<VideoEdit>>,
    ) -> Result<Option<Video>> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let edit = edit(conn)?;
            if let Some(edit) = &edit {
                cursor.refresh_video(&edit.video);
                follow_cursor(conn, cursor, None, &edit.touched_playlists, &[])?;
            }
            Ok(edit)
        });

        let Some(edit) = self.report(action, result)? else {
            return Ok(None);
        };
        self.bus.publish(ChangeEvent::VideoUpdated { video_id: edit.video.id });
        self.publish_playlists_updated(&edit.touched_playlists);
        Ok(Some(edit.video))
    }

    /// Set the custom title; a blank title falls back to the source title.
    pub fn update_video_title(&self, id: i64, title: &str) -> Result<Option<Video>> {
        self.apply_edit("update video title", |conn| videos::update_video_title(conn, id, title, &Utc::now()))
    }

    pub fn update_video_tags(&self, id: i64, tags: &[String]) -> Result<Option<Video>> {
        self.apply_edit("update video tags", |conn| videos::update_video_tags(conn, id, tags, &Utc::now()))
    }

    pub fn update_video_category(&self, id: i64, category: Option<&str>) -> Result<Option<Video>> {
        self.apply_edit("update video category", |conn| {
            videos::update_video_category(conn, id, category, &Utc::now())
        })
    }

    pub fn update_video_quality(&self, id: i64, quality: Option<&str>) -> Result<Option<Video>> {
        self.apply_edit("update video quality", |conn| {
            videos::update_video_quality(conn, id, quality, &Utc::now())
        })
    }

    pub fn add_subtitle(&self, id: i64, subtitle: Subtitle) -> Result<Option<Video>> {
        self.apply_edit("add subtitle", |conn| videos::add_subtitle(conn, id, subtitle, &Utc::now()))
    }

    pub fn remove_subtitle(&self, id: i64, subtitle_id: i64) -> Result<Option<Video>> {
        self.apply_edit("remove subtitle", |conn| {
            videos::remove_subtitle(conn, id, subtitle_id, &Utc::now())
        })
    }

    pub fn get_video(&self, id: i64) -> Result<Option<Video>> {
        self.with_conn(|conn| schema::get_video(conn, id))
    }

    pub fn get_video_by_url(&self, url: &str) -> Result<Option<Video>> {
        self.with_conn(|conn| schema::get_video_by_url(conn, url))
    }

    /// Most recently watched first.
    pub fn get_history(&self, limit: Option<i64>) -> Vec<Video> {
        self.read_or_default("history", |conn| videos::get_history(conn, limit))
    }

    pub fn search_videos(&self, query: &str, filters: &SearchFilters) -> Vec<Video> {
        self.read_or_default("search results", |conn| videos::search_videos(conn, query, filters))
    }

    pub fn is_video_in_favorites(&self, url: &str) -> bool {
        self.read_or_default("favorites", |conn| videos::is_video_in_favorites(conn, url))
    }

    pub fn get_favorite_videos(&self) -> Vec<Video> {
        self.read_or_default("favorites", videos::get_favorite_videos)
    }
}
