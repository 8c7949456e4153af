//! Game layout and installation detection
//!
//! Every file name, folder, INI section and key the registry touches lives in
//! [`GameLayout`], which is handed to the registry at construction.

mod process;

pub use process::is_game_running;

use crate::error::{ModError, ModResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Steam App ID for Septaroad Voyager
pub const STEAM_APP_ID: &str = "2091620";

/// Where the game keeps its files and which INI entries make a mod visible
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLayout {
    /// Process name used to detect a running game
    pub process_name: String,

    /// Folder name under `steamapps/common`
    pub steam_folder_name: String,

    /// Relative to game root
    pub executable_64: PathBuf,
    pub executable_32: PathBuf,

    /// Relative to game root; holds the engine and mutator files
    pub config_dir: PathBuf,

    pub engine_file: String,
    pub engine_path_section: String,
    pub content_path_key: String,
    pub script_path_key: String,
    pub localization_path_key: String,

    pub mutator_file: String,
    pub mutator_section: String,
    pub mutator_key: String,

    /// Relative to game root; holds the campaign-bearing localization file
    pub localization_dir: PathBuf,
    pub campaign_file: String,
    pub campaign_section: String,
    /// Campaigns shipped with the game, kept when the list is rebuilt
    pub base_campaign_prefixes: Vec<String>,
    /// Rebuild the campaign list on apply
    pub manage_campaigns: bool,

    /// Relative to game root
    pub standalone_mods_dir: PathBuf,
    /// Prefix for standalone mod paths written to the engine file
    pub standalone_ini_prefix: String,

    /// Relative to game root
    pub external_mods_dir: PathBuf,
    /// Prefix for externally-synced mod paths written to the engine file
    pub external_ini_prefix: String,

    /// Metadata file inside every mod folder
    pub metadata_file: String,
}

impl Default for GameLayout {
    fn default() -> Self {
        Self {
            process_name: "Septaroad Voyager".to_string(),
            steam_folder_name: "Septaroad Voyager".to_string(),
            executable_64: PathBuf::from("Binaries/Win64/SRVGame.exe"),
            executable_32: PathBuf::from("Binaries/Win32/SRVGame.exe"),
            config_dir: PathBuf::from("SRVGame/Config"),
            engine_file: "SRVEngine.ini".to_string(),
            engine_path_section: "Core.System".to_string(),
            content_path_key: "Paths".to_string(),
            script_path_key: "ScriptPaths".to_string(),
            localization_path_key: "LocalizationPaths".to_string(),
            mutator_file: "SRVMods.ini".to_string(),
            mutator_section: "SRVGame.RPGTacMutatorLoader".to_string(),
            mutator_key: "MutatorsLoaded".to_string(),
            localization_dir: PathBuf::from("SRVGame/Localization/INT"),
            campaign_file: "SRVGame.int".to_string(),
            campaign_section: "RPGTacCampaignLoader".to_string(),
            base_campaign_prefixes: vec!["Main".to_string(), "SRV".to_string()],
            manage_campaigns: false,
            standalone_mods_dir: PathBuf::from("RPGTacGame/Mods"),
            standalone_ini_prefix: r"..\..\RPGTacGame\Mods".to_string(),
            external_mods_dir: PathBuf::from(format!("../../workshop/content/{}", STEAM_APP_ID)),
            external_ini_prefix: format!(r"..\..\..\..\workshop\content\{}", STEAM_APP_ID),
            metadata_file: "mod.json".to_string(),
        }
    }
}

impl GameLayout {
    pub fn engine_config_path(&self, game_root: &Path) -> PathBuf {
        game_root.join(&self.config_dir).join(&self.engine_file)
    }

    pub fn mutator_config_path(&self, game_root: &Path) -> PathBuf {
        game_root.join(&self.config_dir).join(&self.mutator_file)
    }

    pub fn campaign_config_path(&self, game_root: &Path) -> PathBuf {
        game_root.join(&self.localization_dir).join(&self.campaign_file)
    }

    pub fn standalone_mods_folder(&self, game_root: &Path) -> PathBuf {
        game_root.join(&self.standalone_mods_dir)
    }

    pub fn external_mods_folder(&self, game_root: &Path) -> PathBuf {
        game_root.join(&self.external_mods_dir)
    }

    pub fn executable_path(&self, game_root: &Path, use_64_bit: bool) -> PathBuf {
        if use_64_bit {
            game_root.join(&self.executable_64)
        } else {
            game_root.join(&self.executable_32)
        }
    }

    /// Join an INI path prefix and a mod folder name with the game's separator
    pub fn ini_path(prefix: &str, folder_name: &str) -> String {
        format!("{}\\{}", prefix.trim_end_matches('\\'), folder_name)
    }

    /// Check whether `path` is the root folder of the game
    pub fn is_game_folder(&self, path: &Path) -> bool {
        path.is_dir()
            && self.mutator_config_path(path).is_file()
            && self.engine_config_path(path).is_file()
            && self.executable_path(path, true).is_file()
            && self.executable_path(path, false).is_file()
    }

    /// Walk up from `path` (at most `recurse` parents) looking for the game root
    pub fn find_game_folder(&self, path: &Path, recurse: usize) -> Option<PathBuf> {
        if !path.is_dir() {
            return None;
        }

        path.ancestors()
            .take(recurse + 1)
            .find(|candidate| self.is_game_folder(candidate))
            .map(Path::to_path_buf)
    }
}

/// Locates the game installation through Steam library folders
pub struct GameLocator;

impl GameLocator {
    /// Return the first Steam library holding a valid game folder
    pub fn detect(layout: &GameLayout) -> ModResult<PathBuf> {
        let roots = Self::steam_roots();
        if roots.is_empty() {
            return Err(ModError::GameFolder(
                "Autodetection failed. Could not access Steam.".to_string(),
            ));
        }

        let libraries = Self::find_steam_libraries(&roots);
        if libraries.is_empty() {
            return Err(ModError::GameFolder(
                "Autodetection failed. Could not locate any Steam game library folders."
                    .to_string(),
            ));
        }

        for steamapps in &libraries {
            let candidate = steamapps.join("common").join(&layout.steam_folder_name);
            tracing::debug!("Probing {}", candidate.display());
            if layout.is_game_folder(&candidate) {
                tracing::info!("Detected game folder at {}", candidate.display());
                return Ok(candidate);
            }
        }

        Err(ModError::GameFolder(
            "Autodetection failed. The game does not appear to be installed yet.".to_string(),
        ))
    }

    fn steam_roots() -> Vec<PathBuf> {
        let home = directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf());
        Self::steam_root_candidates(home.as_deref())
            .into_iter()
            .filter(|p| p.exists())
            .collect()
    }

    /// Places Steam installs itself, native and Flatpak
    fn steam_root_candidates(home: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(home) = home {
            candidates.push(home.join(".steam/steam"));
            candidates.push(home.join(".local/share/Steam"));
            candidates.push(home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"));
        }
        candidates.push(PathBuf::from("/usr/share/steam"));
        candidates
    }

    /// Find all `steamapps` folders reachable from the given Steam roots
    fn find_steam_libraries(roots: &[PathBuf]) -> Vec<PathBuf> {
        let mut libraries = Vec::new();

        for base in roots {
            let steamapps = base.join("steamapps");
            if steamapps.exists() && !libraries.contains(&steamapps) {
                libraries.push(steamapps.clone());
            }

            let vdf_path = steamapps.join("libraryfolders.vdf");
            if let Ok(content) = std::fs::read_to_string(&vdf_path) {
                for path in parse_library_folders(&content) {
                    let lib_path = path.join("steamapps");
                    if lib_path.exists() && !libraries.contains(&lib_path) {
                        libraries.push(lib_path);
                    }
                }
            }
        }

        libraries
    }
}

/// Extract the `"path"` entries of a Steam `libraryfolders.vdf` file
pub fn parse_library_folders(content: &str) -> Vec<PathBuf> {
    content
        .lines()
        .filter(|line| line.trim_start().starts_with("\"path\""))
        .filter_map(|line| line.split('"').nth(3))
        .map(|path| PathBuf::from(path.replace("\\\\", "\\")))
        .collect()
}
