use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::Database;
use crate::remote::{self, RemoteClient};

const APP_NAME: &str = "studio-sync";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote project backend, including `/api/v1`.
    pub remote_url: String,
    /// Bearer key for the remote backend (from STUDIO_SYNC_API_KEY)
    pub api_key: Option<String>,
    /// Signed-in identity whose bucket artifacts upload to
    pub owner_id: Option<String>,
    /// Seconds between sign-in and the automatic sync of pending projects
    pub sync_delay_secs: u64,
    /// Overrides the platform data directory
    pub database_path: Option<PathBuf>,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_url: remote::DEFAULT_URL.to_string(),
            api_key: None,
            owner_id: None,
            sync_delay_secs: 60,
            database_path: None,
            port: 3000,
        }
    }
}

impl Config {
    /// Load the config file, then apply environment overrides.
    /// Falls back to defaults if the file is missing or unreadable.
    pub fn load() -> Self {
        let config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())
    }

    fn try_load() -> Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config = serde_json::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Apply `STUDIO_SYNC_*` overrides read through `lookup`.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("STUDIO_SYNC_REMOTE_URL") {
            self.remote_url = url;
        }
        if let Some(key) = lookup("STUDIO_SYNC_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(owner) = lookup("STUDIO_SYNC_OWNER_ID") {
            self.owner_id = Some(owner);
        }
        match lookup("STUDIO_SYNC_DELAY_SECS").map(|s| s.parse::<u64>()) {
            Some(Ok(secs)) => self.sync_delay_secs = secs,
            Some(Err(e)) => tracing::warn!("Ignoring STUDIO_SYNC_DELAY_SECS: {}", e),
            None => {}
        }
        if let Some(path) = lookup("STUDIO_SYNC_DB") {
            self.database_path = Some(PathBuf::from(path));
        }
        self
    }

    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn sync_delay(&self) -> Duration {
        Duration::from_secs(self.sync_delay_secs)
    }

    /// Open and migrate the configured database.
    pub fn open_database(&self) -> Result<Database> {
        let db = match &self.database_path {
            Some(path) => Database::open(path.clone())?,
            None => Database::open_default()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn remote_client(&self) -> RemoteClient {
        RemoteClient::new(self.remote_url.clone(), self.api_key.clone())
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
