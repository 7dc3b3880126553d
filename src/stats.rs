// Watch statistics
// One row per (profile, UTC day). Counters are only ever incremented from
// history ingestion; queries read whole-day windows ending today.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::constants::DEFAULT_WATCH_TIME_SECS;
use crate::db::schema::{self, Video, WatchStats};
use crate::error::Result;

/// A category or tag with how many watches it collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCount {
    pub name: String,
    pub count: i64,
}

fn today(now: &DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Fold one watch into today's row for `profile_id`, creating it if needed.
/// Runs inside the caller's transaction.
pub fn record_watch(conn: &Connection, profile_id: i64, video: &Video, now: &DateTime<Utc>) -> Result<WatchStats> {
    let date = today(now);
    let existing = schema::get_watch_stats_for_day(conn, profile_id, &date)?;
    let is_new = existing.is_none();
    let mut stats = existing.unwrap_or_else(|| WatchStats::empty(profile_id, date));

    stats.video_count += 1;
    stats.total_watch_time += video.duration.filter(|d| *d > 0.0).unwrap_or(DEFAULT_WATCH_TIME_SECS);
    if let Some(category) = video.category.as_deref().filter(|c| !c.is_empty()) {
        *stats.categories.entry(category.to_string()).or_insert(0) += 1;
    }
    for tag in &video.tags {
        *stats.most_watched_tags.entry(tag.clone()).or_insert(0) += 1;
    }

    if is_new {
        stats.id = schema::insert_watch_stats(conn, &stats)?;
    } else {
        schema::update_watch_stats(conn, &stats)?;
    }
    Ok(stats)
}

/// Rows for `profile_id` dated within `[today - days, today]`, oldest first.
pub fn query(conn: &Connection, profile_id: i64, days: i64, now: &DateTime<Utc>) -> Result<Vec<WatchStats>> {
    let to = today(now);
    let from = to - Duration::days(days.max(0));
    schema::list_watch_stats_range(conn, profile_id, &from, &to)
}

pub fn total_watch_time(conn: &Connection, profile_id: i64, days: i64, now: &DateTime<Utc>) -> Result<f64> {
    let rows = query(conn, profile_id, days, now)?;
    Ok(rows.iter().map(|s| s.total_watch_time).sum())
}

/// Total videos watched by a profile across every recorded day.
pub fn profile_video_count(conn: &Connection, profile_id: i64) -> Result<i64> {
    let rows = schema::list_watch_stats_for_profile(conn, profile_id)?;
    Ok(rows.iter().map(|s| s.video_count).sum())
}

fn rank(totals: BTreeMap<String, i64>, limit: usize) -> Vec<RankedCount> {
    let mut ranked: Vec<RankedCount> = totals
        .into_iter()
        .map(|(name, count)| RankedCount { name, count })
        .collect();
    // BTreeMap order is by name, so a stable sort keeps ties alphabetical
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

fn sum_counts<'a>(maps: impl Iterator<Item = &'a BTreeMap<String, i64>>) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for map in maps {
        for (name, count) in map {
            *totals.entry(name.clone()).or_insert(0) += count;
        }
    }
    totals
}

pub fn most_watched_categories(
    conn: &Connection,
    profile_id: i64,
    window_days: i64,
    limit: usize,
    now: &DateTime<Utc>,
) -> Result<Vec<RankedCount>> {
    let rows = query(conn, profile_id, window_days, now)?;
    Ok(rank(sum_counts(rows.iter().map(|s| &s.categories)), limit))
}

pub fn most_watched_tags(
    conn: &Connection,
    profile_id: i64,
    window_days: i64,
    limit: usize,
    now: &DateTime<Utc>,
) -> Result<Vec<RankedCount>> {
    let rows = query(conn, profile_id, window_days, now)?;
    Ok(rank(sum_counts(rows.iter().map(|s| &s.most_watched_tags)), limit))
}
