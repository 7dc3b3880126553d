// End-to-end scenarios through the VideoStore API

use super::*;
use crate::db::schema::{NewPlaylist, SystemPlaylist};
use crate::videos::VideoCandidate;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tempfile::TempDir;

fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

fn store_with_profile() -> VideoStore {
    let store = VideoStore::open_in_memory().unwrap();
    store.create_profile("Tester", None).unwrap();
    store
}

fn watch(store: &VideoStore, url: &str, secs: i64) -> crate::db::schema::Video {
    store.add_to_history_at(VideoCandidate::new(url), t(secs)).unwrap().unwrap()
}

fn playlist_with(store: &VideoStore, name: &str, urls: &[&str]) -> i64 {
    let playlist = store
        .create_playlist(NewPlaylist { name: name.to_string(), ..NewPlaylist::default() })
        .unwrap();
    for url in urls {
        store.add_video_to_playlist(playlist.id, VideoCandidate::new(*url)).unwrap();
    }
    playlist.id
}

fn urls_of(store: &VideoStore, playlist_id: i64) -> Vec<String> {
    store.get_playlist(playlist_id).unwrap().unwrap().videos.into_iter().map(|v| v.url).collect()
}

// ---------------------------------------------------------------
// Profiles and watch-count cooldown
// ---------------------------------------------------------------
#[test]
fn test_profiles_then_cooldown_scenario() {
    let store = VideoStore::open_in_memory().unwrap();
    let a = store.create_profile("A", None).unwrap();
    assert!(store.get_profile(a).unwrap().unwrap().is_active);
    let b = store.create_profile("B", None).unwrap();
    assert!(!store.get_profile(a).unwrap().unwrap().is_active);
    assert_eq!(store.get_active_profile().unwrap().unwrap().id, b);

    let url = "https://x/video.mp4";
    assert_eq!(watch(&store, url, 0).watch_count, 1);
    assert_eq!(watch(&store, url, 1).watch_count, 1);
    assert_eq!(watch(&store, url, 12).watch_count, 2);
    assert_eq!(store.get_history(None).len(), 1);
}

#[test]
fn test_single_active_profile_through_any_sequence() {
    let store = VideoStore::open_in_memory().unwrap();
    let ids: Vec<i64> = (0..4).map(|i| store.create_profile(&format!("P{}", i), None).unwrap()).collect();
    store.switch_profile(ids[1]).unwrap();
    store.delete_profile(ids[1]).unwrap();
    store.switch_profile(ids[3]).unwrap();
    store.delete_profile(ids[0]).unwrap();
    assert!(store.switch_profile(ids[1]).is_err());

    let active: Vec<i64> = store.list_profiles().into_iter().filter(|p| p.is_active).map(|p| p.id).collect();
    assert_eq!(active, vec![ids[3]]);

    store.delete_profile(ids[3]).unwrap();
    store.delete_profile(ids[2]).unwrap();
    assert!(store.get_active_profile().unwrap().is_none());
    assert!(store.ensure_default_profile().unwrap().is_some());
    assert_eq!(store.list_profiles().len(), 1);
}

#[test]
fn test_no_active_profile_records_nothing() {
    let store = VideoStore::open_in_memory().unwrap();
    assert!(store.add_to_history(VideoCandidate::new("https://x/a.mp4")).unwrap().is_none());
    assert!(store.get_history(None).is_empty());
}

// ---------------------------------------------------------------
// Favorites and system playlists
// ---------------------------------------------------------------
#[test]
fn test_favorite_toggle_scenario() {
    let store = store_with_profile();
    let url = "https://x/fav.mp4";

    assert!(store.toggle_video_favorite(VideoCandidate::new(url)).unwrap());
    let favorites = store.get_favorites_playlist().unwrap();
    assert_eq!(favorites.videos.iter().filter(|v| v.url == url).count(), 1);
    assert!(store.is_video_in_favorites(url));

    assert!(!store.toggle_video_favorite(VideoCandidate::new(url)).unwrap());
    assert!(store.get_favorites_playlist().unwrap().videos.is_empty());
    assert!(!store.get_video_by_url(url).unwrap().unwrap().is_favorite);
}

#[test]
fn test_recent_playlist_cannot_be_deleted() {
    let store = store_with_profile();
    let recent = store.get_recent_playlist().unwrap();

    let err = store.delete_playlist(recent.id).unwrap_err();
    assert!(matches!(err, VidShelfError::SystemPlaylist(id) if id == recent.id));
    assert_eq!(store.get_recent_playlist().unwrap().id, recent.id);
}

#[test]
fn test_system_playlists_never_duplicate() {
    let store = store_with_profile();
    let first = store.get_recent_playlist().unwrap().id;
    for _ in 0..10 {
        assert_eq!(store.get_recent_playlist().unwrap().id, first);
        store.get_favorites_playlist().unwrap();
    }
    let system: Vec<_> = store.list_playlists().into_iter().filter(|p| p.is_system()).collect();
    assert_eq!(system.len(), 2);
}

#[test]
fn test_recent_holds_thirty_most_recent() {
    let store = store_with_profile();
    for i in 0..40 {
        watch(&store, &format!("https://x/{}.mp4", i), i * 20);
    }
    let recent = store.get_recent_playlist().unwrap();
    let expected: Vec<String> = (10..40).rev().map(|i| format!("https://x/{}.mp4", i)).collect();
    let actual: Vec<String> = recent.videos.into_iter().map(|v| v.url).collect();
    assert_eq!(actual, expected);
}

// ---------------------------------------------------------------
// Cascades
// ---------------------------------------------------------------
#[test]
fn test_delete_video_leaves_no_snapshot_anywhere() {
    let store = store_with_profile();
    let a = playlist_with(&store, "A", &["https://x/1.mp4", "https://x/2.mp4"]);
    let b = playlist_with(&store, "B", &["https://x/2.mp4"]);
    store.toggle_video_favorite(VideoCandidate::new("https://x/2.mp4")).unwrap();
    let video = store.get_video_by_url("https://x/2.mp4").unwrap().unwrap();

    assert!(store.delete_video(video.id).unwrap());
    for playlist in store.list_playlists() {
        assert!(playlist.position_of(video.id).is_none(), "stale copy in {}", playlist.name);
    }
    assert_eq!(urls_of(&store, a), vec!["https://x/1.mp4"]);
    assert!(urls_of(&store, b).is_empty());
    assert!(!store.delete_video(video.id).unwrap());
}

#[test]
fn test_delete_profile_removes_settings_and_stats() {
    let store = store_with_profile();
    let doomed = store.create_profile("Doomed", None).unwrap();
    watch(&store, "https://x/a.mp4", 0);
    let settings_id = store.get_profile(doomed).unwrap().unwrap().settings_id.unwrap();
    assert_eq!(store.get_profile_video_stats(doomed), 1);

    assert!(store.delete_profile(doomed).unwrap());
    store.with_conn(|conn| {
        assert!(schema::get_settings(conn, settings_id)?.is_none());
        assert!(schema::list_watch_stats_for_profile(conn, doomed)?.is_empty());
        Ok(())
    }).unwrap();
    assert_eq!(store.get_profile_video_stats(doomed), 0);
}

#[test]
fn test_history_limit_evicts_oldest() {
    let store = store_with_profile();
    store
        .update_settings(crate::profiles::SettingsPatch { history_limit: Some(5), ..Default::default() })
        .unwrap();
    let mut rx = store.subscribe();

    for i in 0..8 {
        watch(&store, &format!("https://x/{}.mp4", i), i * 20);
    }
    let kept: Vec<String> = store.get_history(None).into_iter().map(|v| v.url).collect();
    let expected: Vec<String> = (3..8).rev().map(|i| format!("https://x/{}.mp4", i)).collect();
    assert_eq!(kept, expected);

    let mut evicted = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ChangeEvent::HistoryEvicted { video_ids } = event {
            evicted.extend(video_ids);
        }
    }
    assert_eq!(evicted.len(), 3);
}

// ---------------------------------------------------------------
// Snapshot propagation and playback cursor
// ---------------------------------------------------------------
#[test]
fn test_title_edit_reaches_all_playlists_and_now_playing() {
    let store = store_with_profile();
    let pid = playlist_with(&store, "Mix", &["https://x/a.mp4", "https://x/b.mp4"]);
    let video = store.play(pid, 1).unwrap();

    store.update_video_title(video.id, "Renamed").unwrap().unwrap();
    for playlist in store.list_playlists() {
        for snapshot in playlist.videos.iter().filter(|v| v.id == video.id) {
            assert_eq!(snapshot.display_title(), "Renamed");
        }
    }
    assert_eq!(store.now_playing().unwrap().display_title(), "Renamed");
    assert!(store.update_video_title(9999, "x").unwrap().is_none());
}

#[test]
fn test_reorder_keeps_playing_video() {
    let store = store_with_profile();
    let pid = playlist_with(&store, "Mix", &["https://x/a.mp4", "https://x/b.mp4", "https://x/c.mp4"]);
    store.play(pid, 0).unwrap();

    assert!(store.reorder_playlist(pid, 0, 2).unwrap());
    assert_eq!(store.playback_position(), Some((pid, 2)));
    assert_eq!(store.now_playing().unwrap().url, "https://x/a.mp4");

    assert!(matches!(
        store.reorder_playlist(pid, 0, 3),
        Err(VidShelfError::InvalidIndex { index: 3, len: 3 })
    ));
    assert!(!store.reorder_playlist(9999, 0, 1).unwrap());
}

#[test]
fn test_remove_playing_video_advances() {
    let store = store_with_profile();
    let pid = playlist_with(&store, "Mix", &["https://x/a.mp4", "https://x/b.mp4"]);
    let playing = store.play(pid, 1).unwrap();

    assert!(store.remove_video_from_playlist(pid, playing.id).unwrap());
    assert_eq!(store.playback_position(), Some((pid, 0)));
    assert_eq!(store.now_playing().unwrap().url, "https://x/a.mp4");

    let last = store.now_playing().unwrap();
    store.remove_video_from_playlist(pid, last.id).unwrap();
    assert!(store.now_playing().is_none());
    assert!(store.playback_position().is_none());
}

#[test]
fn test_shuffle_follows_playing_video() {
    let store = store_with_profile();
    let urls: Vec<String> = (0..10).map(|i| format!("https://x/{}.mp4", i)).collect();
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let pid = playlist_with(&store, "Big", &refs);
    let playing = store.play(pid, 4).unwrap();

    let mut rng = StdRng::seed_from_u64(99);
    assert!(store.shuffle_playlist_with(pid, &mut rng).unwrap());

    let mut shuffled = urls_of(&store, pid);
    let (_, index) = store.playback_position().unwrap();
    assert_eq!(shuffled[index], playing.url);
    shuffled.sort();
    let mut original = urls.clone();
    original.sort();
    assert_eq!(shuffled, original);
}

#[test]
fn test_next_previous_and_delete_playlist_stops() {
    let store = store_with_profile();
    let pid = playlist_with(&store, "Mix", &["https://x/a.mp4", "https://x/b.mp4"]);
    store.play(pid, 0).unwrap();

    assert_eq!(store.play_next().unwrap().unwrap().url, "https://x/b.mp4");
    assert!(store.play_next().unwrap().is_none());
    assert_eq!(store.play_previous().unwrap().unwrap().url, "https://x/a.mp4");

    assert!(store.delete_playlist(pid).unwrap());
    assert!(store.now_playing().is_none());
    assert!(!store.delete_playlist(pid).unwrap());
}

#[test]
fn test_default_playlist_tracks_settings() {
    let store = store_with_profile();
    let pid = playlist_with(&store, "Start here", &[]);

    assert!(store.set_default_playlist(Some(pid)).unwrap());
    assert_eq!(store.get_default_playlist().unwrap().unwrap().id, pid);
    assert_eq!(store.get_active_profile_settings().unwrap().unwrap().default_playlist_id, Some(pid));

    store.delete_playlist(pid).unwrap();
    assert_eq!(store.get_active_profile_settings().unwrap().unwrap().default_playlist_id, None);
    assert!(!store.set_default_playlist(Some(pid)).unwrap());
}

// ---------------------------------------------------------------
// Stats through the facade
// ---------------------------------------------------------------
#[test]
fn test_stats_are_profile_scoped() {
    let store = store_with_profile();
    let first = store.get_active_profile().unwrap().unwrap().id;
    let mut candidate = VideoCandidate::new("https://x/a.mp4");
    candidate.category = Some("Music".to_string());
    candidate.tags = Some(vec!["live".to_string()]);
    candidate.duration = Some(100.0);
    store.add_to_history(candidate).unwrap();

    let second = store.create_profile("Other", None).unwrap();
    assert!(store.get_watch_stats(second, 7).is_empty());
    assert_eq!(store.get_total_watch_time(second, 7), 0.0);

    assert_eq!(store.get_watch_stats(first, 7).len(), 1);
    assert_eq!(store.get_total_watch_time(first, 7), 100.0);
    assert_eq!(store.get_most_watched_categories(first, None)[0].name, "Music");
    assert_eq!(store.get_most_watched_tags(first, Some(1))[0].name, "live");
}

// ---------------------------------------------------------------
// Import / export / reset
// ---------------------------------------------------------------
#[test]
fn test_round_trip_through_file() {
    let tmp = TempDir::new().unwrap();
    let source = VideoStore::open(&tmp.path().join("source.db")).unwrap();
    source.create_profile("A", None).unwrap();
    source.create_profile("B", None).unwrap();
    playlist_with(&source, "Mix", &["https://x/a.mp4", "https://x/b.mp4"]);
    source.toggle_video_favorite(VideoCandidate::new("https://x/b.mp4")).unwrap();

    let export_path = tmp.path().join("export.json");
    source.export_to_file(&export_path).unwrap();

    let target = VideoStore::open(&tmp.path().join("target.db")).unwrap();
    let mut rx = target.subscribe();
    assert!(target.import_from_file(&export_path).unwrap());
    assert_eq!(rx.try_recv().unwrap(), ChangeEvent::DataImported);

    assert_eq!(target.export_data().unwrap(), source.export_data().unwrap());
    let active: Vec<_> = target.list_profiles().into_iter().filter(|p| p.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "B");
}

#[test]
fn test_malformed_import_returns_false() {
    let store = store_with_profile();
    watch(&store, "https://x/a.mp4", 0);
    let before = store.export_data().unwrap();

    assert!(!store.import_data("{ not json"));
    assert!(!store.import_data(r#"{"profiles": "nope"}"#));
    assert_eq!(store.export_data().unwrap(), before);
}

#[test]
fn test_clear_all_data_then_default_profile() {
    let store = store_with_profile();
    let pid = playlist_with(&store, "Mix", &["https://x/a.mp4"]);
    store.play(pid, 0).unwrap();

    store.clear_all_data().unwrap();
    assert!(store.get_history(None).is_empty());
    assert!(store.list_profiles().is_empty());
    assert!(store.now_playing().is_none());
    assert_eq!(store.list_playlists().len(), 2);

    store.ensure_default_profile().unwrap();
    assert_eq!(store.get_active_profile().unwrap().unwrap().name, crate::constants::DEFAULT_PROFILE_NAME);
}

// ---------------------------------------------------------------
// Lifecycle and concurrency
// ---------------------------------------------------------------
#[test]
fn test_closed_store_rejects_calls() {
    let tmp = TempDir::new().unwrap();
    let store = VideoStore::open(&tmp.path().join("v.db")).unwrap();
    assert_ne!(store.storage_size(), "Unknown");
    assert!(store.store_info().unwrap().path.is_some());

    store.close().unwrap();
    assert!(!store.is_open());
    assert!(matches!(store.get_recent_playlist(), Err(VidShelfError::StoreClosed)));
    assert!(matches!(store.create_profile("x", None), Err(VidShelfError::StoreClosed)));
    assert!(store.get_history(None).is_empty());
    assert_eq!(store.storage_size(), "Unknown");
    assert!(!store.import_data("{}"));
}

#[test]
fn test_concurrent_mutations_keep_invariants() {
    let store = Arc::new(store_with_profile());
    let pid = playlist_with(&store, "Shared", &["https://x/seed.mp4"]);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..10 {
                    let url = format!("https://x/{}-{}.mp4", worker, i);
                    store.add_video_to_playlist(pid, VideoCandidate::new(url.clone())).unwrap();
                    store.toggle_video_favorite(VideoCandidate::new(url)).unwrap();
                    store.get_recent_playlist().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // No lost updates on the shared playlist, no duplicate URLs or system playlists
    assert_eq!(urls_of(&store, pid).len(), 41);
    assert_eq!(store.get_history(None).len(), 41);
    assert_eq!(store.get_favorites_playlist().unwrap().videos.len(), 40);
    store.with_conn(|conn| {
        for kind in [SystemPlaylist::Recent, SystemPlaylist::Favorites] {
            assert!(schema::find_system_playlist(conn, kind)?.is_some());
        }
        let system: i64 = conn.query_row(
            "SELECT COUNT(*) FROM playlists WHERE is_recent = 1 OR is_favorites = 1",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(system, 2);
        Ok(())
    }).unwrap();
}
