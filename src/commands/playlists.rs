// VidShelf - Playlist Commands
// Playlist CRUD, ordering and the playback cursor that follows it

use chrono::Utc;
use rand::Rng;

use super::{follow_cursor, playing_playlist, VideoStore};
use crate::db::schema::{self, NewPlaylist, Playlist, SystemPlaylist, Video};
use crate::error::{Result, VidShelfError};
use crate::events::ChangeEvent;
use crate::playlists::{self, PlaylistPatch};
use crate::videos::VideoCandidate;

impl VideoStore {
    pub fn create_playlist(&self, playlist: NewPlaylist) -> Result<Playlist> {
        let result = self.with_conn(|conn| {
            let id = playlists::create_playlist(conn, playlist, &Utc::now())?;
            schema::get_playlist(conn, id)?.ok_or(VidShelfError::PlaylistNotFound(id))
        });
        let playlist = self.report("create playlist", result)?;
        self.bus.publish(ChangeEvent::PlaylistCreated { playlist_id: playlist.id });
        Ok(playlist)
    }

    pub fn update_playlist(&self, id: i64, patch: PlaylistPatch) -> Result<Option<Playlist>> {
        let result = self.with_conn(|conn| playlists::update_playlist(conn, id, patch, &Utc::now()));
        let updated = self.report("update playlist", result)?;
        if updated.is_some() {
            self.bus.publish(ChangeEvent::PlaylistUpdated { playlist_id: id });
        }
        Ok(updated)
    }

    pub fn get_playlist(&self, id: i64) -> Result<Option<Playlist>> {
        self.with_conn(|conn| schema::get_playlist(conn, id))
    }

    /// System playlists first, then user playlists oldest first.
    pub fn list_playlists(&self) -> Vec<Playlist> {
        self.read_or_default("playlists", schema::list_playlists)
    }

    pub fn get_recent_playlist(&self) -> Result<Playlist> {
        self.with_conn(|conn| {
            playlists::get_or_create_system_playlist(conn, SystemPlaylist::Recent, &Utc::now())
        })
    }

    pub fn get_favorites_playlist(&self) -> Result<Playlist> {
        self.with_conn(|conn| {
            playlists::get_or_create_system_playlist(conn, SystemPlaylist::Favorites, &Utc::now())
        })
    }

    /// Record the video and append it unless the playlist already has its URL.
    /// `Ok(false)` if the playlist doesn't exist or already held the URL.
    pub fn add_video_to_playlist(&self, playlist_id: i64, candidate: VideoCandidate) -> Result<bool> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let before = playing_playlist(conn, cursor)?;
            let addition = playlists::add_video_to_playlist(conn, playlist_id, candidate, &Utc::now())?;
            if let Some(addition) = &addition {
                let mut touched = vec![playlist_id];
                let mut evicted = Vec::new();
                if let Some(outcome) = &addition.ingested {
                    touched.extend(outcome.touched_playlists.iter().copied());
                    evicted = outcome.evicted.clone();
                }
                cursor.refresh_video(&addition.video);
                follow_cursor(conn, cursor, before.as_ref(), &touched, &evicted)?;
            }
            Ok(addition)
        });

        let Some(addition) = self.report("add video to playlist", result)? else {
            return Ok(false);
        };
        if let Some(outcome) = &addition.ingested {
            self.publish_history(outcome);
        }
        if addition.appended {
            self.bus.publish(ChangeEvent::PlaylistUpdated { playlist_id });
        }
        Ok(addition.appended)
    }

    /// Move the video at `from` to `to`. `Ok(false)` if the playlist doesn't exist.
    pub fn reorder_playlist(&self, playlist_id: i64, from: usize, to: usize) -> Result<bool> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let playlist = playlists::reorder(conn, playlist_id, from, to, &Utc::now())?;
            if let Some(playlist) = &playlist {
                cursor.after_reorder(playlist);
            }
            Ok(playlist.is_some())
        });

        let reordered = self.report("reorder playlist", result)?;
        if reordered {
            self.bus.publish(ChangeEvent::PlaylistUpdated { playlist_id });
        }
        Ok(reordered)
    }

    pub fn remove_video_from_playlist(&self, playlist_id: i64, video_id: i64) -> Result<bool> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let removal = playlists::remove_video(conn, playlist_id, video_id, &Utc::now())?;
            if let Some(removal) = &removal {
                cursor.after_removal(&removal.playlist, removal.video_id, removal.index);
            }
            Ok(removal.is_some())
        });

        let removed = self.report("remove video from playlist", result)?;
        if removed {
            self.bus.publish(ChangeEvent::PlaylistUpdated { playlist_id });
        }
        Ok(removed)
    }

    pub fn shuffle_playlist(&self, playlist_id: i64) -> Result<bool> {
        self.shuffle_playlist_with(playlist_id, &mut rand::thread_rng())
    }

    /// Shuffle with a caller-supplied RNG (seeded in tests).
    pub fn shuffle_playlist_with<R: Rng + ?Sized>(&self, playlist_id: i64, rng: &mut R) -> Result<bool> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let playlist = playlists::shuffle(conn, playlist_id, rng, &Utc::now())?;
            if let Some(playlist) = &playlist {
                cursor.after_shuffle(playlist);
            }
            Ok(playlist.is_some())
        });

        let shuffled = self.report("shuffle playlist", result)?;
        if shuffled {
            self.bus.publish(ChangeEvent::PlaylistUpdated { playlist_id });
        }
        Ok(shuffled)
    }

    /// Delete a user playlist. Fails with `SystemPlaylist` for Recent/Favorites.
    pub fn delete_playlist(&self, playlist_id: i64) -> Result<bool> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let deleted = playlists::delete_playlist(conn, playlist_id)?;
            if deleted {
                cursor.after_playlist_deleted(playlist_id);
            }
            Ok(deleted)
        });

        let deleted = self.report("delete playlist", result)?;
        if deleted {
            self.bus.publish(ChangeEvent::PlaylistDeleted { playlist_id });
        }
        Ok(deleted)
    }

    pub fn set_default_playlist(&self, playlist_id: Option<i64>) -> Result<bool> {
        let result = self.with_conn(|conn| {
            let previous = schema::find_default_playlist(conn)?.map(|p| p.id);
            let settings_id = crate::profiles::active_settings(conn)?.map(|s| s.id);
            let changed = playlists::set_default_playlist(conn, playlist_id)?;
            Ok(changed.then_some((previous, settings_id)))
        });

        let Some((previous, settings_id)) = self.report("set default playlist", result)? else {
            return Ok(false);
        };
        let mut touched: Vec<i64> = previous.into_iter().collect();
        if let Some(id) = playlist_id.filter(|id| !touched.contains(id)) {
            touched.push(id);
        }
        self.publish_playlists_updated(&touched);
        if let Some(settings_id) = settings_id {
            self.bus.publish(ChangeEvent::SettingsUpdated { settings_id });
        }
        Ok(true)
    }

    pub fn get_default_playlist(&self) -> Result<Option<Playlist>> {
        self.with_conn(schema::find_default_playlist)
    }

    /// Start playing `playlist_id` at `index`.
    pub fn play(&self, playlist_id: i64, index: usize) -> Result<Video> {
        self.with_conn_and_cursor(|conn, cursor| {
            let playlist = schema::get_playlist(conn, playlist_id)?
                .ok_or(VidShelfError::PlaylistNotFound(playlist_id))?;
            cursor.play(&playlist, index).cloned()
        })
    }

    pub fn play_next(&self) -> Result<Option<Video>> {
        self.with_conn_and_cursor(|conn, cursor| {
            let Some(playlist) = playing_playlist(conn, cursor)? else {
                return Ok(None);
            };
            Ok(cursor.next(&playlist).cloned())
        })
    }

    pub fn play_previous(&self) -> Result<Option<Video>> {
        self.with_conn_and_cursor(|conn, cursor| {
            let Some(playlist) = playing_playlist(conn, cursor)? else {
                return Ok(None);
            };
            Ok(cursor.previous(&playlist).cloned())
        })
    }

    pub fn stop_playback(&self) -> Result<()> {
        self.lock_cursor()?.stop();
        Ok(())
    }

    pub fn now_playing(&self) -> Option<Video> {
        self.lock_cursor().ok().and_then(|cursor| cursor.current().cloned())
    }

    /// Playlist and index the cursor points at, if playing from a playlist.
    pub fn playback_position(&self) -> Option<(i64, usize)> {
        let cursor = self.lock_cursor().ok()?;
        cursor.playlist_id().map(|id| (id, cursor.index()))
    }
}
