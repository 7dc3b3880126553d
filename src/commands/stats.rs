// VidShelf - Stats Commands
// Read-only; failures degrade to empty results

use chrono::Utc;

use super::VideoStore;
use crate::constants::{AGGREGATE_WINDOW_DAYS, DEFAULT_TOP_CATEGORIES, DEFAULT_TOP_TAGS};
use crate::db::schema::WatchStats;
use crate::stats::{self, RankedCount};

impl VideoStore {
    /// Daily rows for the last `days` days, today included.
    pub fn get_watch_stats(&self, profile_id: i64, days: i64) -> Vec<WatchStats> {
        self.read_or_default("watch stats", |conn| stats::query(conn, profile_id, days, &Utc::now()))
    }

    /// Top categories over the last 30 days. `None` uses the default of 5.
    pub fn get_most_watched_categories(&self, profile_id: i64, limit: Option<usize>) -> Vec<RankedCount> {
        let limit = limit.unwrap_or(DEFAULT_TOP_CATEGORIES);
        self.read_or_default("top categories", |conn| {
            stats::most_watched_categories(conn, profile_id, AGGREGATE_WINDOW_DAYS, limit, &Utc::now())
        })
    }

    /// Top tags over the last 30 days. `None` uses the default of 10.
    pub fn get_most_watched_tags(&self, profile_id: i64, limit: Option<usize>) -> Vec<RankedCount> {
        let limit = limit.unwrap_or(DEFAULT_TOP_TAGS);
        self.read_or_default("top tags", |conn| {
            stats::most_watched_tags(conn, profile_id, AGGREGATE_WINDOW_DAYS, limit, &Utc::now())
        })
    }

    /// Seconds watched over the last `days` days.
    pub fn get_total_watch_time(&self, profile_id: i64, days: i64) -> f64 {
        self.read_or_default("total watch time", |conn| {
            stats::total_watch_time(conn, profile_id, days, &Utc::now())
        })
    }
}
