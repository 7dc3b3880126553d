// VidShelf - Profile Commands
// Profiles, the active-profile switch and per-profile settings

use chrono::Utc;

use super::VideoStore;
use crate::db::schema::{Profile, Settings};
use crate::error::Result;
use crate::events::ChangeEvent;
use crate::profiles::{self, SettingsPatch};
use crate::stats;

impl VideoStore {
    /// Create a profile and make it active. Returns its id.
    pub fn create_profile(&self, name: &str, avatar: Option<&str>) -> Result<i64> {
        let result = self.with_conn(|conn| profiles::create_profile(conn, name, avatar, &Utc::now()));
        let id = self.report("create profile", result)?;
        self.bus.publish(ChangeEvent::ProfileCreated { profile_id: id });
        self.bus.publish(ChangeEvent::ProfileSwitched { profile_id: id });
        Ok(id)
    }

    /// Fails with `ProfileNotFound` for an unknown id.
    pub fn switch_profile(&self, id: i64) -> Result<Profile> {
        let result = self.with_conn(|conn| profiles::switch_profile(conn, id));
        let profile = self.report("switch profile", result)?;
        self.bus.publish(ChangeEvent::ProfileSwitched { profile_id: id });
        Ok(profile)
    }

    /// Delete a profile with its settings and stats. `false` if it didn't exist.
    pub fn delete_profile(&self, id: i64) -> Result<bool> {
        let result = self.with_conn(|conn| profiles::delete_profile(conn, id));
        let Some(deletion) = self.report("delete profile", result)? else {
            return Ok(false);
        };
        self.bus.publish(ChangeEvent::ProfileDeleted { profile_id: id });
        if let Some(promoted) = deletion.promoted {
            self.bus.publish(ChangeEvent::ProfileSwitched { profile_id: promoted });
        }
        Ok(true)
    }

    pub fn get_active_profile(&self) -> Result<Option<Profile>> {
        self.with_conn(profiles::get_active_profile)
    }

    pub fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        self.with_conn(|conn| profiles::get_profile(conn, id))
    }

    pub fn list_profiles(&self) -> Vec<Profile> {
        self.read_or_default("profiles", profiles::list_profiles)
    }

    pub fn update_profile(&self, id: i64, name: Option<&str>, avatar: Option<Option<&str>>) -> Result<Option<Profile>> {
        let result = self.with_conn(|conn| profiles::update_profile(conn, id, name, avatar));
        let updated = self.report("update profile", result)?;
        if updated.is_some() {
            self.bus.publish(ChangeEvent::ProfileUpdated { profile_id: id });
        }
        Ok(updated)
    }

    /// Create "Default Profile" if the database has none. Returns the new id.
    pub fn ensure_default_profile(&self) -> Result<Option<i64>> {
        let result = self.with_conn(|conn| profiles::ensure_default_profile(conn, &Utc::now()));
        let created = self.report("create default profile", result)?;
        if let Some(id) = created {
            self.bus.publish(ChangeEvent::ProfileCreated { profile_id: id });
            self.bus.publish(ChangeEvent::ProfileSwitched { profile_id: id });
        }
        Ok(created)
    }

    pub fn get_active_profile_settings(&self) -> Result<Option<Settings>> {
        self.with_conn(profiles::get_active_profile_settings)
    }

    pub fn update_settings(&self, patch: SettingsPatch) -> Result<Option<Settings>> {
        let result = self.with_conn(|conn| profiles::update_settings(conn, patch));
        let settings = self.report("update settings", result)?;
        self.publish_settings(settings.as_ref());
        Ok(settings)
    }

    /// Returns the new cinema mode state, `None` without an active profile.
    pub fn toggle_cinema_mode(&self) -> Result<Option<bool>> {
        let result = self.with_conn(profiles::toggle_cinema_mode);
        let settings = self.report("toggle cinema mode", result)?;
        self.publish_settings(settings.as_ref());
        Ok(settings.map(|s| s.cinema_mode))
    }

    pub fn toggle_audio_only_mode(&self) -> Result<Option<bool>> {
        let result = self.with_conn(profiles::toggle_audio_only_mode);
        let settings = self.report("toggle audio-only mode", result)?;
        self.publish_settings(settings.as_ref());
        Ok(settings.map(|s| s.audio_only_mode))
    }

    fn publish_settings(&self, settings: Option<&Settings>) {
        if let Some(settings) = settings {
            self.bus.publish(ChangeEvent::SettingsUpdated { settings_id: settings.id });
        }
    }

    /// Total videos a profile has watched.
    pub fn get_profile_video_stats(&self, profile_id: i64) -> i64 {
        self.read_or_default("profile video stats", |conn| stats::profile_video_count(conn, profile_id))
    }
}
