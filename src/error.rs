// VidShelf Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidShelfError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Video not found: {0}")]
    VideoNotFound(i64),

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(i64),

    #[error("Profile not found: {0}")]
    ProfileNotFound(i64),

    #[error("Cannot delete system playlist: {0}")]
    SystemPlaylist(i64),

    #[error("No active profile")]
    NoActiveProfile,

    #[error("Store is closed")]
    StoreClosed,

    #[error("Index out of range: {index} (playlist has {len} videos)")]
    InvalidIndex { index: usize, len: usize },

    #[error("Invalid import: {0}")]
    InvalidImport(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for VidShelfError {
    fn from(err: anyhow::Error) -> Self {
        VidShelfError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, VidShelfError>;
