// Playback cursor
// Tracks which playlist is playing and where, so playlist edits keep pointing at
// the same logical video rather than the same numeric index.

use crate::db::schema::{Playlist, Video};
use crate::error::{Result, VidShelfError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackCursor {
    playlist_id: Option<i64>,
    index: usize,
    current: Option<Video>,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playlist_id(&self) -> Option<i64> {
        self.playlist_id
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Video> {
        self.current.as_ref()
    }

    pub fn is_playing_from(&self, playlist_id: i64) -> bool {
        self.playlist_id == Some(playlist_id)
    }

    /// Start playing `playlist` at `index`.
    pub fn play(&mut self, playlist: &Playlist, index: usize) -> Result<&Video> {
        let video = playlist.videos.get(index).ok_or(VidShelfError::InvalidIndex {
            index,
            len: playlist.videos.len(),
        })?;
        self.playlist_id = Some(playlist.id);
        self.index = index;
        let current = self.current.insert(video.clone());
        Ok(&*current)
    }

    /// Play a single video outside of any playlist.
    pub fn play_video(&mut self, video: Video) {
        self.playlist_id = None;
        self.index = 0;
        self.current = Some(video);
    }

    pub fn next(&mut self, playlist: &Playlist) -> Option<&Video> {
        if !self.is_playing_from(playlist.id) || self.index + 1 >= playlist.videos.len() {
            return None;
        }
        self.index += 1;
        self.current = playlist.videos.get(self.index).cloned();
        self.current.as_ref()
    }

    pub fn previous(&mut self, playlist: &Playlist) -> Option<&Video> {
        if !self.is_playing_from(playlist.id) || self.index == 0 {
            return None;
        }
        self.index -= 1;
        self.current = playlist.videos.get(self.index).cloned();
        self.current.as_ref()
    }

    pub fn stop(&mut self) {
        *self = Self::default();
    }

    /// Follow the playing video to its new position after a reorder. A rewrite
    /// that dropped it (Recent truncation) restarts at 0.
    pub fn after_reorder(&mut self, playlist: &Playlist) {
        self.relocate(playlist);
    }

    /// Keep playback continuous after `removed_id` left the playlist from `removed_index`.
    pub fn after_removal(&mut self, playlist: &Playlist, removed_id: i64, removed_index: usize) {
        if !self.is_playing_from(playlist.id) {
            return;
        }

        let was_current = self.current.as_ref().map(|v| v.id) == Some(removed_id);
        if was_current {
            if playlist.videos.is_empty() {
                self.stop();
            } else {
                self.index = removed_index.min(playlist.videos.len() - 1);
                self.current = playlist.videos.get(self.index).cloned();
            }
            return;
        }

        match self.current_position(playlist) {
            Some(position) => {
                self.index = position;
                self.current = playlist.videos.get(position).cloned();
            }
            None if self.current.is_none() && !playlist.videos.is_empty() => self.index = 0,
            None => {}
        }
    }

    /// After a shuffle, continue from the playing video's new slot or restart at 0.
    pub fn after_shuffle(&mut self, playlist: &Playlist) {
        self.relocate(playlist);
    }

    fn relocate(&mut self, playlist: &Playlist) {
        if !self.is_playing_from(playlist.id) {
            return;
        }
        match self.current_position(playlist) {
            Some(position) => {
                self.index = position;
                self.current = playlist.videos.get(position).cloned();
            }
            None if playlist.videos.is_empty() => self.stop(),
            None => {
                self.index = 0;
                self.current = playlist.videos.first().cloned();
            }
        }
    }

    /// Follow several videos leaving at once (video deletion, history eviction).
    /// `before` is the playing playlist as it was, `after` as it is now.
    pub fn after_videos_removed(&mut self, before: Option<&Playlist>, after: Option<&Playlist>, removed: &[i64]) {
        let Some(current_id) = self.current.as_ref().map(|v| v.id) else {
            return;
        };
        let Some(playlist_id) = self.playlist_id else {
            if removed.contains(&current_id) {
                self.stop();
            }
            return;
        };
        let Some(after) = after.filter(|p| p.id == playlist_id) else {
            self.stop();
            return;
        };

        if !removed.contains(&current_id) {
            self.after_reorder(after);
            return;
        }
        // Slot the current video would occupy once everything ahead of it is gone
        let old_index = before
            .and_then(|b| b.position_of(current_id).map(|i| (b, i)))
            .map(|(b, i)| i - b.videos[..i].iter().filter(|v| removed.contains(&v.id)).count())
            .unwrap_or(self.index);
        self.after_removal(after, current_id, old_index);
    }

    pub fn after_playlist_deleted(&mut self, playlist_id: i64) {
        if self.is_playing_from(playlist_id) {
            self.stop();
        }
    }

    /// Pick up canonical edits to the playing video.
    pub fn refresh_video(&mut self, video: &Video) {
        if let Some(current) = self.current.as_mut() {
            if current.id == video.id {
                *current = video.clone();
            }
        }
    }

    fn current_position(&self, playlist: &Playlist) -> Option<usize> {
        let current = self.current.as_ref()?;
        playlist.position_of(current.id)
    }
}
