// VidShelf Constants
// Defaults for new profiles and the persistence rules that depend on them.

// Paths
pub const APP_DB_DIR: &str = ".vidshelf";
pub const DB_FILENAME: &str = "vidshelf.db";

// Busy timeout applied to every connection (ms)
pub const DB_BUSY_TIMEOUT_MS: u32 = 5000;

// History
pub const DEFAULT_HISTORY_LIMIT: i64 = 500;
pub const WATCH_COUNT_COOLDOWN_SECS: i64 = 10;

// Playlists
pub const RECENT_PLAYLIST_LIMIT: usize = 30;
pub const FAVORITES_PLAYLIST_NAME: &str = "Favorites";
pub const FAVORITES_PLAYLIST_DESCRIPTION: &str = "Favorite videos - cannot be deleted";
pub const RECENT_PLAYLIST_NAME: &str = "Recent";
pub const RECENT_PLAYLIST_DESCRIPTION: &str = "Recently played videos";
pub const UNTITLED_PLAYLIST_NAME: &str = "Untitled Playlist";

// Profiles
pub const DEFAULT_PROFILE_NAME: &str = "Default Profile";

// Watch statistics
pub const DEFAULT_WATCH_TIME_SECS: f64 = 300.0; // used when duration is unknown
pub const DEFAULT_STATS_WINDOW_DAYS: i64 = 7;
pub const AGGREGATE_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_TOP_CATEGORIES: usize = 5;
pub const DEFAULT_TOP_TAGS: usize = 10;

// Change notification channel capacity
pub const CHANGE_BUS_CAPACITY: usize = 256;
