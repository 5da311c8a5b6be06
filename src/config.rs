//! Configuration profiles.
//!
//! Config values are stored as JSON blobs keyed by profile name. Exactly
//! one profile, [`ACTIVE_PROFILE`], drives the running application; its
//! current value is observable through [`ActiveConfig`]. Other names are
//! user-created presets.
//!
//! Single-writer semantics: only [`ConfigStore::save_config`] and
//! [`ConfigStore::switch_profile`] update the active signal; everyone else
//! holds a read handle.

use std::sync::{Arc, RwLock};

use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::error::Result;
use crate::platform::ConfigOverlay;
use crate::types::Config;

/// Name of the distinguished profile whose value the application uses.
pub const ACTIVE_PROFILE: &str = "config";

/// Cloneable read handle over the active configuration.
#[derive(Clone)]
pub struct ActiveConfig {
    inner: Arc<RwLock<Config>>,
}

impl ActiveConfig {
    /// Snapshot of the current active config.
    pub fn get(&self) -> Config {
        self.inner.read().unwrap().clone()
    }
}

/// Profile-keyed configuration storage.
pub struct ConfigStore {
    db: Database,
    active: Arc<RwLock<Config>>,
    overlay: Option<Box<dyn ConfigOverlay + Send + Sync>>,
}

impl ConfigStore {
    /// Create the store, seed the active profile row if absent, and load it
    /// into the active signal.
    pub fn new(db: Database) -> Result<Self> {
        Self::with_overlay_opt(db, None)
    }

    /// Like [`ConfigStore::new`], with an environment overlay source for
    /// the active profile.
    pub fn with_overlay(
        db: Database,
        overlay: Box<dyn ConfigOverlay + Send + Sync>,
    ) -> Result<Self> {
        Self::with_overlay_opt(db, Some(overlay))
    }

    fn with_overlay_opt(
        db: Database,
        overlay: Option<Box<dyn ConfigOverlay + Send + Sync>>,
    ) -> Result<Self> {
        let store = Self {
            db,
            active: Arc::new(RwLock::new(Config::default())),
            overlay,
        };
        // Seed the active profile so it is always enumerable.
        if store.read_blob(ACTIVE_PROFILE)?.is_none() {
            store.write_blob(&Config::default(), ACTIVE_PROFILE)?;
        }
        let config = store.load_config(ACTIVE_PROFILE);
        *store.active.write().unwrap() = config;
        Ok(store)
    }

    /// Read handle for the active configuration.
    pub fn active(&self) -> ActiveConfig {
        ActiveConfig {
            inner: Arc::clone(&self.active),
        }
    }

    /// Load a profile's config. Absent or corrupt blobs yield defaults;
    /// corruption is logged, never surfaced.
    ///
    /// For the active profile only, an environment overlay (when wired and
    /// present) fully replaces the stored value.
    pub fn load_config(&self, profile: &str) -> Config {
        let mut config = match self.read_blob(profile) {
            Ok(Some(blob)) => match serde_json::from_str(&blob) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("corrupt config blob for profile '{}': {}", profile, e);
                    Config::default()
                }
            },
            Ok(None) => Config::default(),
            Err(e) => {
                log::warn!("failed to read config profile '{}': {}", profile, e);
                Config::default()
            }
        };

        if profile == ACTIVE_PROFILE {
            if let Some(overlay) = self.overlay.as_ref().and_then(|o| o.read_overlay()) {
                config = overlay;
            }
        }

        config
    }

    /// Serialize and upsert `config` under `profile`. Saving the active
    /// profile also updates the active signal.
    pub fn save_config(&self, config: &Config, profile: &str) -> Result<()> {
        self.write_blob(config, profile)?;
        if profile == ACTIVE_PROFILE {
            *self.active.write().unwrap() = config.clone();
        }
        Ok(())
    }

    /// Make `profile`'s stored config the active one by re-saving it under
    /// [`ACTIVE_PROFILE`]. The source profile is left untouched.
    pub fn switch_profile(&self, profile: &str) -> Result<()> {
        let config = self.load_config(profile);
        self.save_config(&config, ACTIVE_PROFILE)?;
        log::info!("switched active config to profile '{}'", profile);
        Ok(())
    }

    /// All stored profile names, sorted.
    pub fn get_all_profiles(&self) -> Result<Vec<String>> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare("SELECT profile FROM config ORDER BY profile")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
    }

    /// Delete a stored profile. The active profile can never be deleted;
    /// asking to is a logged no-op.
    pub fn delete_profile(&self, profile: &str) -> Result<()> {
        if profile == ACTIVE_PROFILE {
            log::warn!("refusing to delete the active config profile");
            return Ok(());
        }
        self.db.with(|conn| {
            conn.execute("DELETE FROM config WHERE profile = ?", [profile])?;
            Ok(())
        })
    }

    fn read_blob(&self, profile: &str) -> Result<Option<String>> {
        self.db.with(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM config WHERE profile = ?",
                    [profile],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn write_blob(&self, config: &Config, profile: &str) -> Result<()> {
        let blob = serde_json::to_string(config).unwrap_or_else(|_| "{}".to_string());
        self.db.with(|conn| {
            conn.execute(
                "INSERT INTO config (profile, value) VALUES (?, ?)
                 ON CONFLICT(profile) DO UPDATE SET value = excluded.value",
                params![profile, blob],
            )?;
            Ok(())
        })
    }
}
