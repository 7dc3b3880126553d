// VidShelf - Commands Module
// The data-access API the UI calls, organized by domain. Every method locks the
// store's single connection, so read-modify-write sequences never interleave.

pub mod history;
pub mod playlists;
pub mod profiles;
pub mod stats;
pub mod data;

#[cfg(test)]
mod tests;

pub use data::StoreInfo;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast::Receiver;

use crate::db::{self, schema};
use crate::db::schema::Playlist;
use crate::error::{Result, VidShelfError};
use crate::events::{ChangeBus, ChangeEvent};
use crate::playback::PlaybackCursor;

/// An open video library. Construct one per database and share it by reference
/// (or `Arc`) with every view that needs it.
pub struct VideoStore {
    conn: Mutex<Option<Connection>>,
    cursor: Mutex<PlaybackCursor>,
    bus: ChangeBus,
    path: Option<PathBuf>,
}

impl VideoStore {
    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
            cursor: Mutex::new(PlaybackCursor::new()),
            bus: ChangeBus::new(),
            path,
        }
    }

    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = db::open_db(path)?;
        log::info!("Opened video store at {}", path.display());
        Ok(Self::from_connection(conn, Some(path.to_path_buf())))
    }

    /// Open the per-user database at `~/.vidshelf/vidshelf.db`.
    pub fn open_default() -> Result<Self> {
        let path = db::default_db_path()?;
        Self::open(&path)
    }

    /// A private store that disappears when dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        Ok(Self::from_connection(conn, None))
    }

    /// Release the connection. Every later call fails with `StoreClosed`.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock_conn()?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| VidShelfError::Database(e))?;
            log::debug!("Closed video store");
        }
        self.lock_cursor()?.stop();
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Change notifications, published after each mutation commits.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|e| VidShelfError::Other(format!("Store lock poisoned: {}", e)))
    }

    fn lock_cursor(&self) -> Result<MutexGuard<'_, PlaybackCursor>> {
        self.cursor
            .lock()
            .map_err(|e| VidShelfError::Other(format!("Playback lock poisoned: {}", e)))
    }

    /// Run `f` against the open connection.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock_conn()?;
        let conn = guard.as_ref().ok_or(VidShelfError::StoreClosed)?;
        f(conn)
    }

    /// Run `f` with the connection and playback cursor both held.
    /// Lock order is always connection, then cursor.
    fn with_conn_and_cursor<T>(
        &self,
        f: impl FnOnce(&Connection, &mut PlaybackCursor) -> Result<T>,
    ) -> Result<T> {
        let guard = self.lock_conn()?;
        let conn = guard.as_ref().ok_or(VidShelfError::StoreClosed)?;
        let mut cursor = self.lock_cursor()?;
        f(conn, &mut cursor)
    }

    /// Reads that feed rendering degrade to an empty value instead of failing.
    fn read_or_default<T: Default>(&self, what: &str, f: impl FnOnce(&Connection) -> Result<T>) -> T {
        match self.with_conn(f) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Failed to read {}: {}", what, e);
                T::default()
            }
        }
    }

    /// Log a failed mutation with context and hand the error back.
    fn report<T>(&self, action: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            log::error!("Failed to {}: {}", action, e);
        }
        result
    }

    fn publish_playlists_updated(&self, ids: &[i64]) {
        self.bus.publish_all(
            ids.iter().map(|&playlist_id| ChangeEvent::PlaylistUpdated { playlist_id }),
        );
    }
}

/// The playlist the cursor is playing from, as currently stored.
fn playing_playlist(conn: &Connection, cursor: &PlaybackCursor) -> Result<Option<Playlist>> {
    match cursor.playlist_id() {
        Some(id) => schema::get_playlist(conn, id),
        None => Ok(None),
    }
}

/// Re-point the cursor after the `touched` playlists were rewritten and the
/// `removed` videos dropped. `before` is the playing playlist prior to the change.
fn follow_cursor(
    conn: &Connection,
    cursor: &mut PlaybackCursor,
    before: Option<&Playlist>,
    touched: &[i64],
    removed: &[i64],
) -> Result<()> {
    match cursor.playlist_id() {
        Some(id) if touched.contains(&id) => {
            let after = schema::get_playlist(conn, id)?;
            match after {
                Some(playlist) if removed.is_empty() => cursor.after_reorder(&playlist),
                Some(playlist) => cursor.after_videos_removed(before, Some(&playlist), removed),
                None => cursor.after_playlist_deleted(id),
            }
        }
        Some(_) => {}
        None => cursor.after_videos_removed(None, None, removed),
    }
    Ok(())
}
