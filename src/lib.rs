// VidShelf - Library Entry Point
// Local video library: history, playlists, profiles and watch statistics kept
// consistent in one embedded SQLite database.

pub mod constants;
pub mod error;
pub mod db;
pub mod events;
pub mod playback;
pub mod videos;
pub mod playlists;
pub mod profiles;
pub mod stats;
pub mod backup;
pub mod commands;

pub use commands::{StoreInfo, VideoStore};
pub use db::schema::{
    BufferSize, NewPlaylist, Playlist, Profile, Settings, Subtitle, SubtitleFormat, Theme,
    UiLayout, Video, VideoQuality, WatchStats,
};
pub use error::{Result, VidShelfError};
pub use events::{ChangeBus, ChangeEvent};
pub use playlists::PlaylistPatch;
pub use profiles::SettingsPatch;
pub use stats::RankedCount;
pub use videos::{SearchFilters, VideoCandidate};
