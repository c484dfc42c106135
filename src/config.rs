//! Application configuration management.
//!
//! This module handles loading and saving the client configuration,
//! which covers the backend base URL and the keychain service name used
//! for token persistence.
//!
//! Configuration is stored at `~/.config/neuromon-client/config.json`.
//! Environment variables (optionally from a `.env` file) override the
//! stored values: `NEUROMON_API_URL`, `NEUROMON_KEYRING_SERVICE`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "neuromon-client";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default backend base URL
const DEFAULT_API_BASE_URL: &str = "https://api.neuromon.health";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub keyring_service: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            keyring_service: APP_NAME.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("NEUROMON_API_URL") {
            if !url.is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(service) = std::env::var("NEUROMON_KEYRING_SERVICE") {
            if !service.is_empty() {
                self.keyring_service = service;
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}
