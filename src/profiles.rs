// Profile manager
// Exactly one profile is active whenever any profile exists. Settings and watch
// stats belong to a profile; videos and playlists are shared by all of them.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::constants::DEFAULT_PROFILE_NAME;
use crate::db::schema::{self, BufferSize, Profile, Settings, Theme, UiLayout, VideoQuality};
use crate::error::{Result, VidShelfError};

/// Editable settings fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub theme: Option<Theme>,
    pub background_color: Option<Option<String>>,
    pub background_image: Option<Option<String>>,
    pub history_limit: Option<i64>,
    pub video_quality: Option<VideoQuality>,
    pub buffer_size: Option<BufferSize>,
    pub autoplay: Option<bool>,
    pub cinema_mode: Option<bool>,
    pub audio_only_mode: Option<bool>,
    pub ui_color: Option<Option<String>>,
    pub ui_layout: Option<Option<UiLayout>>,
}

impl SettingsPatch {
    fn apply(self, settings: &mut Settings) {
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        if let Some(color) = self.background_color {
            settings.background_color = color;
        }
        if let Some(image) = self.background_image {
            settings.background_image = image;
        }
        if let Some(limit) = self.history_limit {
            settings.history_limit = limit.max(1);
        }
        if let Some(quality) = self.video_quality {
            settings.video_quality = quality;
        }
        if let Some(buffer) = self.buffer_size {
            settings.buffer_size = buffer;
        }
        if let Some(autoplay) = self.autoplay {
            settings.autoplay = autoplay;
        }
        if let Some(cinema) = self.cinema_mode {
            settings.cinema_mode = cinema;
        }
        if let Some(audio_only) = self.audio_only_mode {
            settings.audio_only_mode = audio_only;
        }
        if let Some(color) = self.ui_color {
            settings.ui_color = color;
        }
        if let Some(layout) = self.ui_layout {
            settings.ui_layout = layout;
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileDeletion {
    pub profile: Profile,
    /// Profile that became active because the deleted one was
    pub promoted: Option<i64>,
}

fn clean_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_PROFILE_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Settings linked to the active profile, without creating anything.
pub fn active_settings(conn: &Connection) -> Result<Option<Settings>> {
    let Some(profile) = schema::get_active_profile(conn)? else {
        return Ok(None);
    };
    match profile.settings_id {
        Some(id) => schema::get_settings(conn, id),
        None => Ok(None),
    }
}

/// Create a profile with default settings and make it the active one.
pub fn create_profile(conn: &Connection, name: &str, avatar: Option<&str>, now: &DateTime<Utc>) -> Result<i64> {
    let name = clean_name(name);
    let tx = conn.unchecked_transaction()?;
    schema::deactivate_all_profiles(&tx)?;
    let settings_id = schema::insert_settings(&tx, &Settings::default())?;
    let id = schema::insert_profile(&tx, &name, avatar, now, true, Some(settings_id))?;
    tx.commit()?;

    log::info!("Created profile '{}' ({})", name, id);
    Ok(id)
}

/// Make `id` the only active profile.
pub fn switch_profile(conn: &Connection, id: i64) -> Result<Profile> {
    let tx = conn.unchecked_transaction()?;
    let Some(mut profile) = schema::get_profile(&tx, id)? else {
        log::warn!("Cannot switch to missing profile {}", id);
        return Err(VidShelfError::ProfileNotFound(id));
    };
    schema::deactivate_all_profiles(&tx)?;
    schema::set_profile_active(&tx, id)?;
    tx.commit()?;

    profile.is_active = true;
    log::info!("Switched to profile '{}' ({})", profile.name, id);
    Ok(profile)
}

/// Delete a profile with its settings and stats. If it was active, the oldest
/// survivor takes over. With no survivors the caller creates a new profile.
pub fn delete_profile(conn: &Connection, id: i64) -> Result<Option<ProfileDeletion>> {
    let tx = conn.unchecked_transaction()?;
    let Some(profile) = schema::get_profile(&tx, id)? else {
        return Ok(None);
    };

    if let Some(settings_id) = profile.settings_id {
        schema::delete_settings_row(&tx, settings_id)?;
    }
    let stats_removed = schema::delete_watch_stats_for_profile(&tx, id)?;
    schema::delete_profile_row(&tx, id)?;

    let mut promoted = None;
    if profile.is_active {
        if let Some(next) = schema::list_profiles(&tx)?.into_iter().next() {
            schema::set_profile_active(&tx, next.id)?;
            promoted = Some(next.id);
        }
    }
    tx.commit()?;

    log::info!(
        "Deleted profile '{}' ({}) with {} stats rows",
        profile.name,
        id,
        stats_removed
    );
    Ok(Some(ProfileDeletion { profile, promoted }))
}

pub fn get_active_profile(conn: &Connection) -> Result<Option<Profile>> {
    schema::get_active_profile(conn)
}

pub fn get_profile(conn: &Connection, id: i64) -> Result<Option<Profile>> {
    schema::get_profile(conn, id)
}

pub fn list_profiles(conn: &Connection) -> Result<Vec<Profile>> {
    schema::list_profiles(conn)
}

/// Rename and/or change the avatar. `Some(None)` clears the avatar.
pub fn update_profile(
    conn: &Connection,
    id: i64,
    name: Option<&str>,
    avatar: Option<Option<&str>>,
) -> Result<Option<Profile>> {
    let Some(mut profile) = schema::get_profile(conn, id)? else {
        return Ok(None);
    };
    if let Some(name) = name {
        profile.name = clean_name(name);
    }
    if let Some(avatar) = avatar {
        profile.avatar = avatar.map(str::to_string);
    }
    schema::update_profile_details(conn, id, &profile.name, profile.avatar.as_deref())?;
    Ok(Some(profile))
}

/// Active profile's settings, creating and linking defaults when missing.
/// `None` only when no profile is active.
pub fn get_active_profile_settings(conn: &Connection) -> Result<Option<Settings>> {
    let tx = conn.unchecked_transaction()?;
    let Some(profile) = schema::get_active_profile(&tx)? else {
        return Ok(None);
    };

    if let Some(settings_id) = profile.settings_id {
        if let Some(settings) = schema::get_settings(&tx, settings_id)? {
            return Ok(Some(settings));
        }
    }

    let mut settings = Settings::default();
    settings.id = schema::insert_settings(&tx, &settings)?;
    schema::set_profile_settings(&tx, profile.id, settings.id)?;
    tx.commit()?;

    log::info!("Created default settings for profile {}", profile.id);
    Ok(Some(settings))
}

pub fn update_settings(conn: &Connection, patch: SettingsPatch) -> Result<Option<Settings>> {
    let Some(mut settings) = get_active_profile_settings(conn)? else {
        return Ok(None);
    };
    patch.apply(&mut settings);
    schema::update_settings(conn, &settings)?;
    Ok(Some(settings))
}

pub fn toggle_cinema_mode(conn: &Connection) -> Result<Option<Settings>> {
    let Some(current) = get_active_profile_settings(conn)? else {
        return Ok(None);
    };
    update_settings(conn, SettingsPatch { cinema_mode: Some(!current.cinema_mode), ..SettingsPatch::default() })
}

pub fn toggle_audio_only_mode(conn: &Connection) -> Result<Option<Settings>> {
    let Some(current) = get_active_profile_settings(conn)? else {
        return Ok(None);
    };
    update_settings(conn, SettingsPatch { audio_only_mode: Some(!current.audio_only_mode), ..SettingsPatch::default() })
}

/// Create "Default Profile" when the database has no profiles at all.
pub fn ensure_default_profile(conn: &Connection, now: &DateTime<Utc>) -> Result<Option<i64>> {
    if !schema::list_profiles(conn)?.is_empty() {
        return Ok(None);
    }
    create_profile(conn, DEFAULT_PROFILE_NAME, None, now).map(Some)
}
