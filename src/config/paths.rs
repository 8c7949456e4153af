//! XDG-compliant path management

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Manages all application paths using XDG base directory specification
#[derive(Debug, Clone)]
pub struct Paths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Create a new Paths instance
    pub fn new() -> Self {
        let dirs = ProjectDirs::from("", "", "srvmods")
            .expect("Failed to determine project directories");
        Self {
            config_dir: dirs.config_dir().to_path_buf(),
            data_dir: dirs.data_dir().to_path_buf(),
        }
    }

    /// Keep everything under a single root (used for portable setups and tests)
    pub fn with_root(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/srvmods/
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Main config file: ~/.config/srvmods/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    // ========== Data Paths ==========

    /// Data directory: ~/.local/share/srvmods/
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Registry snapshot: ~/.local/share/srvmods/registry.json
    pub fn registry_file(&self) -> PathBuf {
        self.data_dir().join("registry.json")
    }

    /// Game file change log: ~/.local/share/srvmods/filechanges.log
    pub fn change_log_file(&self) -> PathBuf {
        self.data_dir().join("filechanges.log")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        Ok(())
    }
}
