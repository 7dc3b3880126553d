// VidShelf CLI binary

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use anyhow::Result;

use vidshelf_lib::constants::{DEFAULT_HISTORY_LIMIT, DEFAULT_STATS_WINDOW_DAYS};
use vidshelf_lib::{NewPlaylist, SearchFilters, Video, VideoCandidate, VideoStore};

#[derive(Parser)]
#[command(name = "vidshelf")]
#[command(about = "VidShelf - A local library for the videos you watch", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (defaults to ~/.vidshelf/vidshelf.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record that a video was watched
    Watch {
        url: String,
        #[arg(long)]
        title: Option<String>,
        /// Duration in seconds
        #[arg(long)]
        duration: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List watch history, most recent first
    History {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Search titles, URLs, categories and tags
    Search {
        query: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Toggle a video's favorite state
    Favorite { url: String },

    /// Delete a video from history and every playlist
    DeleteVideo { id: i64 },

    /// Set a custom title (empty restores the original)
    Rename { id: i64, title: String },

    /// Manage playlists
    Playlist {
        #[command(subcommand)]
        command: PlaylistCommands,
    },

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Watch statistics for the active profile
    Stats {
        #[arg(long, default_value_t = DEFAULT_STATS_WINDOW_DAYS)]
        days: i64,
    },

    /// Export everything to a JSON file
    Export { path: PathBuf },

    /// Import a JSON export
    Import { path: PathBuf },

    /// Delete all data and start over with a default profile
    Reset {
        /// Required; this cannot be undone
        #[arg(long)]
        yes: bool,
    },

    /// Show database location and counts
    Info,
}

#[derive(Subcommand)]
enum PlaylistCommands {
    /// List all playlists
    List,
    /// Show a playlist's videos
    Show { id: i64 },
    /// Create a playlist
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Add a video by URL
    Add { id: i64, url: String },
    /// Remove a video by id
    Remove { id: i64, video_id: i64 },
    /// Move the video at FROM to TO (0-based)
    Move { id: i64, from: usize, to: usize },
    /// Shuffle a playlist
    Shuffle { id: i64 },
    /// Delete a user playlist
    Delete { id: i64 },
    /// Set (or clear with no id) the default playlist
    Default { id: Option<i64> },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// List profiles
    List,
    /// Create a profile and switch to it
    Create {
        name: String,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Switch the active profile
    Switch { id: i64 },
    /// Delete a profile with its settings and stats
    Delete { id: i64 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut clog = colog::default_builder();
    clog.filter(
        None,
        if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn },
    );
    clog.init();

    let store = match &cli.db {
        Some(path) => VideoStore::open(path)?,
        None => VideoStore::open_default()?,
    };
    if let Some(id) = store.ensure_default_profile()? {
        log::info!("Created default profile {}", id);
    }

    match cli.command {
        Commands::Watch { url, title, duration, category, tags } => {
            cmd_watch(&store, url, title, duration, category, tags)
        }
        Commands::History { limit } => cmd_history(&store, limit),
        Commands::Search { query, category, tags } => cmd_search(&store, &query, category, tags),
        Commands::Favorite { url } => cmd_favorite(&store, url),
        Commands::DeleteVideo { id } => cmd_delete_video(&store, id),
        Commands::Rename { id, title } => cmd_rename(&store, id, &title),
        Commands::Playlist { command } => cmd_playlist(&store, command),
        Commands::Profile { command } => cmd_profile(&store, command),
        Commands::Stats { days } => cmd_stats(&store, days),
        Commands::Export { path } => {
            store.export_to_file(&path)?;
            println!("Exported to {}", path.display());
            Ok(())
        }
        Commands::Import { path } => {
            if !store.import_from_file(&path)? {
                anyhow::bail!("{} is not a valid VidShelf export", path.display());
            }
            println!("Imported {}", path.display());
            Ok(())
        }
        Commands::Reset { yes } => cmd_reset(&store, yes),
        Commands::Info => cmd_info(&store),
    }
}

fn cmd_watch(
    store: &VideoStore,
    url: String,
    title: Option<String>,
    duration: Option<f64>,
    category: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    let mut candidate = VideoCandidate::new(url);
    candidate.title = title;
    candidate.duration = duration;
    candidate.category = category;
    if !tags.is_empty() {
        candidate.tags = Some(tags);
    }

    let video = store
        .add_to_history(candidate)?
        .ok_or_else(|| anyhow::anyhow!("No active profile. Use 'vidshelf profile create <name>'."))?;
    println!("#{} {} (watched {} times)", video.id, video.display_title(), video.watch_count);
    Ok(())
}

fn print_videos(videos: &[Video]) {
    println!("{:>5}  {:>6}  {:>16}  {}", "ID", "Count", "Last watched", "Title");
    println!("{}", "-".repeat(70));
    for video in videos {
        let star = if video.is_favorite { " *" } else { "" };
        println!(
            "{:>5}  {:>6}  {:>16}  {}{}",
            video.id,
            video.watch_count,
            video.last_watched.format("%Y-%m-%d %H:%M"),
            truncate(video.display_title(), 40),
            star
        );
    }
}

fn cmd_history(store: &VideoStore, limit: i64) -> Result<()> {
    let videos = store.get_history(Some(limit.clamp(1, DEFAULT_HISTORY_LIMIT)));
    if videos.is_empty() {
        println!("No history yet. Use 'vidshelf watch <url>' to add a video.");
        return Ok(());
    }
    print_videos(&videos);
    Ok(())
}

fn cmd_search(store: &VideoStore, query: &str, category: Option<String>, tags: Vec<String>) -> Result<()> {
    let filters = SearchFilters { category, tags, ..SearchFilters::default() };
    let videos = store.search_videos(query, &filters);
    if videos.is_empty() {
        println!("No videos match '{}'", query);
        return Ok(());
    }
    print_videos(&videos);
    Ok(())
}

fn cmd_favorite(store: &VideoStore, url: String) -> Result<()> {
    if store.toggle_video_favorite(VideoCandidate::new(url.clone()))? {
        println!("Added {} to Favorites", url);
    } else {
        println!("Removed {} from Favorites", url);
    }
    Ok(())
}

fn cmd_delete_video(store: &VideoStore, id: i64) -> Result<()> {
    if !store.delete_video(id)? {
        anyhow::bail!("Video {} not found", id);
    }
    println!("Deleted video {}", id);
    Ok(())
}

fn cmd_rename(store: &VideoStore, id: i64, title: &str) -> Result<()> {
    let video = store
        .update_video_title(id, title)?
        .ok_or_else(|| anyhow::anyhow!("Video {} not found", id))?;
    println!("#{} is now '{}'", video.id, video.display_title());
    Ok(())
}

fn cmd_playlist(store: &VideoStore, command: PlaylistCommands) -> Result<()> {
    match command {
        PlaylistCommands::List => {
            println!("{:>5}  {:>6}  {}", "ID", "Videos", "Name");
            println!("{}", "-".repeat(40));
            for playlist in store.list_playlists() {
                let mut flags = Vec::new();
                if playlist.is_system() {
                    flags.push("system");
                }
                if playlist.is_default {
                    flags.push("default");
                }
                let flags = if flags.is_empty() { String::new() } else { format!(" [{}]", flags.join(", ")) };
                println!("{:>5}  {:>6}  {}{}", playlist.id, playlist.videos.len(), playlist.name, flags);
            }
        }
        PlaylistCommands::Show { id } => {
            let playlist = store
                .get_playlist(id)?
                .ok_or_else(|| anyhow::anyhow!("Playlist {} not found", id))?;
            println!("Playlist #{}: {}", playlist.id, playlist.name);
            if let Some(description) = &playlist.description {
                println!("{}", description);
            }
            println!();
            for (index, video) in playlist.videos.iter().enumerate() {
                println!("{:>3}. #{} {}", index, video.id, truncate(video.display_title(), 60));
            }
        }
        PlaylistCommands::Create { name, description, category } => {
            let playlist = store.create_playlist(NewPlaylist {
                name,
                description,
                category,
                ..NewPlaylist::default()
            })?;
            println!("Created playlist #{} '{}'", playlist.id, playlist.name);
        }
        PlaylistCommands::Add { id, url } => {
            if store.add_video_to_playlist(id, VideoCandidate::new(url.clone()))? {
                println!("Added {} to playlist {}", url, id);
            } else {
                println!("Playlist {} not found or already contains {}", id, url);
            }
        }
        PlaylistCommands::Remove { id, video_id } => {
            if !store.remove_video_from_playlist(id, video_id)? {
                anyhow::bail!("Video {} is not in playlist {}", video_id, id);
            }
            println!("Removed video {} from playlist {}", video_id, id);
        }
        PlaylistCommands::Move { id, from, to } => {
            if !store.reorder_playlist(id, from, to)? {
                anyhow::bail!("Playlist {} not found", id);
            }
            println!("Moved {} -> {}", from, to);
        }
        PlaylistCommands::Shuffle { id } => {
            if !store.shuffle_playlist(id)? {
                anyhow::bail!("Playlist {} not found", id);
            }
            println!("Shuffled playlist {}", id);
        }
        PlaylistCommands::Delete { id } => {
            if !store.delete_playlist(id)? {
                anyhow::bail!("Playlist {} not found", id);
            }
            println!("Deleted playlist {}", id);
        }
        PlaylistCommands::Default { id } => {
            if !store.set_default_playlist(id)? {
                anyhow::bail!("Playlist {} not found", id.unwrap_or_default());
            }
            match id {
                Some(id) => println!("Default playlist is now {}", id),
                None => println!("Cleared default playlist"),
            }
        }
    }
    Ok(())
}

fn cmd_profile(store: &VideoStore, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::List => {
            for profile in store.list_profiles() {
                let marker = if profile.is_active { "*" } else { " " };
                println!(
                    "{} {:>4}  {}  (since {})",
                    marker,
                    profile.id,
                    profile.name,
                    profile.created_at.format("%Y-%m-%d")
                );
            }
        }
        ProfileCommands::Create { name, avatar } => {
            let id = store.create_profile(&name, avatar.as_deref())?;
            println!("Created profile #{} and switched to it", id);
        }
        ProfileCommands::Switch { id } => {
            let profile = store.switch_profile(id)?;
            println!("Switched to '{}'", profile.name);
        }
        ProfileCommands::Delete { id } => {
            if !store.delete_profile(id)? {
                anyhow::bail!("Profile {} not found", id);
            }
            println!("Deleted profile {}", id);
            if let Some(new_id) = store.ensure_default_profile()? {
                println!("No profiles left, created default profile #{}", new_id);
            }
        }
    }
    Ok(())
}

fn cmd_stats(store: &VideoStore, days: i64) -> Result<()> {
    let profile = store
        .get_active_profile()?
        .ok_or_else(|| anyhow::anyhow!("No active profile"))?;
    let rows = store.get_watch_stats(profile.id, days);

    println!("Profile: {} (last {} days)", profile.name, days);
    println!();
    println!("  Videos watched: {}", rows.iter().map(|s| s.video_count).sum::<i64>());
    println!("  Watch time:     {}", format_duration(store.get_total_watch_time(profile.id, days)));
    println!("  All time:       {} videos", store.get_profile_video_stats(profile.id));

    let categories = store.get_most_watched_categories(profile.id, None);
    if !categories.is_empty() {
        println!();
        println!("Top categories:");
        for entry in categories {
            println!("  {:<20} {}", entry.name, entry.count);
        }
    }
    let tags = store.get_most_watched_tags(profile.id, None);
    if !tags.is_empty() {
        println!();
        println!("Top tags:");
        for entry in tags {
            println!("  {:<20} {}", entry.name, entry.count);
        }
    }
    Ok(())
}

fn cmd_reset(store: &VideoStore, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete everything without --yes");
    }
    store.clear_all_data()?;
    store.ensure_default_profile()?;
    println!("All data cleared");
    Ok(())
}

fn cmd_info(store: &VideoStore) -> Result<()> {
    let info = store.store_info()?;
    println!("Database:       {}", info.path.as_deref().unwrap_or("(in memory)"));
    println!("Schema version: {}", info.schema_version);
    println!("Videos:         {}", info.videos);
    println!("Playlists:      {}", info.playlists);
    println!("Profiles:       {}", info.profiles);
    println!("Active profile: {}", info.active_profile.as_deref().unwrap_or("-"));
    println!("Storage used:   {}", info.storage_size);
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

/// Format seconds as H:MM:SS
fn format_duration(secs: f64) -> String {
    let total = secs.max(0.0).round() as i64;
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;
    format!("{}:{:02}:{:02}", hours, mins, secs)
}
