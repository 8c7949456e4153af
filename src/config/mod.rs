//! Configuration management for srvmods
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/srvmods/config.toml
//! - Data: ~/.local/share/srvmods/

mod paths;

pub use paths::Paths;

use crate::games::GameLayout;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Game root folder; takes precedence over the one stored in the registry
    pub game_folder: Option<String>,

    /// Override for the registry snapshot location
    pub registry_file_override: Option<String>,

    /// Confirm before destructive actions
    pub confirm_destructive: bool,

    /// Rebuild the in-game campaign list when applying mods
    pub manage_campaigns: bool,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game_folder: None,
            registry_file_override: None,
            confirm_destructive: true,
            manage_campaigns: false,
            paths: Paths::new(),
        }
    }
}

impl Config {
    /// Resolve the registry snapshot file (override or default XDG path)
    pub fn registry_file(&self) -> PathBuf {
        self.registry_file_override
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.registry_file())
    }

    /// Configured game folder, if any
    pub fn game_folder(&self) -> Option<PathBuf> {
        self.game_folder
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Game layout with user settings applied
    pub fn game_layout(&self) -> GameLayout {
        GameLayout {
            manage_campaigns: self.manage_campaigns,
            ..GameLayout::default()
        }
    }

    /// Ensure required directories exist, including overrides.
    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths
            .ensure_dirs()
            .context("Failed to create default application directories")?;
        if let Some(parent) = self.registry_file().parent() {
            fs::create_dir_all(parent).context("Failed to create registry directory")?;
        }
        Ok(())
    }

    /// Load configuration from disk or create default
    pub fn load() -> Result<Self> {
        Self::load_with(Paths::new())
    }

    /// Load configuration using the given paths
    pub fn load_with(paths: Paths) -> Result<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            let config = Config {
                paths: paths.clone(),
                ..Config::default()
            };
            config.save()?;
            config
        };

        config.paths = paths;
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let config_path = self.paths.config_file();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_root(dir.path());

        let config = Config::load_with(paths.clone()).unwrap();
        assert!(paths.config_file().exists());
        assert!(config.confirm_destructive);
        assert!(!config.manage_campaigns);
        assert_eq!(config.registry_file(), paths.registry_file());
    }

    #[test]
    fn saved_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_root(dir.path());

        let mut config = Config::load_with(paths.clone()).unwrap();
        config.game_folder = Some("/games/Septaroad Voyager".to_string());
        config.manage_campaigns = true;
        config.save().unwrap();

        let reloaded = Config::load_with(paths).unwrap();
        assert_eq!(reloaded.game_folder(), Some(PathBuf::from("/games/Septaroad Voyager")));
        assert!(reloaded.game_layout().manage_campaigns);
    }

    #[test]
    fn blank_game_folder_is_ignored() {
        let config = Config {
            game_folder: Some("   ".to_string()),
            paths: Paths::with_root(std::path::Path::new("/tmp/unused")),
            ..Config::default()
        };
        assert_eq!(config.game_folder(), None);
    }
}
