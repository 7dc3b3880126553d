// VidShelf - Data Commands
// Export, import, reset and storage diagnostics

use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use super::VideoStore;
use crate::backup;
use crate::db::{self, migrations, schema};
use crate::error::Result;
use crate::events::ChangeEvent;

/// Summary shown by `vidshelf info`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    pub path: Option<String>,
    pub schema_version: u32,
    pub videos: i64,
    pub playlists: usize,
    pub profiles: usize,
    pub active_profile: Option<String>,
    pub storage_size: String,
}

impl VideoStore {
    /// Pretty-printed JSON of every table.
    pub fn export_data(&self) -> Result<String> {
        let result = self.with_conn(backup::export_data);
        self.report("export data", result)
    }

    pub fn export_to_file(&self, path: &Path) -> Result<()> {
        let json = self.export_data()?;
        let result: Result<()> = std::fs::write(path, json).map_err(Into::into);
        self.report("write export file", result)?;
        log::info!("Exported data to {}", path.display());
        Ok(())
    }

    /// Load an export document. Malformed input or a failed write returns
    /// `false` and leaves the store as it was.
    pub fn import_data(&self, json: &str) -> bool {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            let summary = backup::import_data(conn, json, &Utc::now())?;
            cursor.stop();
            Ok(summary)
        });
        match self.report("import data", result) {
            Ok(_) => {
                self.bus.publish(ChangeEvent::DataImported);
                true
            }
            Err(_) => false,
        }
    }

    pub fn import_from_file(&self, path: &Path) -> Result<bool> {
        let json = std::fs::read_to_string(path)?;
        Ok(self.import_data(&json))
    }

    /// Empty every table. The caller creates a fresh profile afterwards
    /// (see `ensure_default_profile`).
    pub fn clear_all_data(&self) -> Result<()> {
        let result = self.with_conn_and_cursor(|conn, cursor| {
            backup::clear_all_data(conn, &Utc::now())?;
            cursor.stop();
            Ok(())
        });
        self.report("clear all data", result)?;
        self.bus.publish(ChangeEvent::DataCleared);
        Ok(())
    }

    /// Human-readable database size, or "Unknown".
    pub fn storage_size(&self) -> String {
        self.with_conn(|conn| Ok(db::storage_size(conn)))
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    pub fn store_info(&self) -> Result<StoreInfo> {
        let path = self.path().map(|p| p.display().to_string());
        self.with_conn(|conn| {
            Ok(StoreInfo {
                path,
                schema_version: migrations::get_schema_version(conn)?,
                videos: schema::count_videos(conn)?,
                playlists: schema::list_playlists(conn)?.len(),
                profiles: schema::list_profiles(conn)?.len(),
                active_profile: schema::get_active_profile(conn)?.map(|p| p.name),
                storage_size: db::storage_size(conn),
            })
        })
    }
}
