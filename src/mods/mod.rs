//! Mod management - metadata, registration, state reconciliation

mod apply;
mod archive;
mod changelog;
pub mod package;
mod registry;
mod state;

pub use archive::*;
pub use changelog::FileChangeLog;
pub use registry::*;
pub use state::{Assessment, StateAssessor};

use crate::error::{ModError, ModResult};
use crate::ini::Campaign;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Metadata shipped with every mod in its `mod.json` file.
///
/// Field names are PascalCase on disk so files written by the publishing
/// tools keep loading. `null` string fields read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Mod {
    /// Unique identifier without spaces; `author-modname` by convention
    #[serde(deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub version: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub author: String,
    pub url: Option<String>,
    pub author_url: Option<String>,
    /// Entry point class for the mod's scripts
    pub mutator_class: Option<String>,
    #[serde(rename = "SteamWorkshopId")]
    pub workshop_id: Option<u64>,

    pub is_campaign: bool,
    pub campaign_name: Option<String>,
    pub campaign_prefix: Option<String>,
    pub campaign_description: Option<String>,
    pub campaign_base_level: Option<String>,
    pub campaign_game_type: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Mod {
    /// Read `mod.json` from disk
    pub fn from_file(path: &Path) -> ModResult<Self> {
        if !path.is_file() {
            return Err(ModError::Metadata(format!(
                "Could not find mod metadata at '{}'.",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let content = content.trim_start_matches('\u{feff}');
        Ok(serde_json::from_str(content)?)
    }

    /// Write pretty-printed `mod.json`
    pub fn save_to(&self, path: &Path) -> ModResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn has_mutator(&self) -> bool {
        self.mutator_class().is_some()
    }

    /// Mutator class, if a non-empty one is declared
    pub fn mutator_class(&self) -> Option<&str> {
        self.mutator_class.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_workshop_item(&self) -> bool {
        self.workshop_id.is_some()
    }

    /// Two mods are the same if ids match, or name and version both match
    /// (all case-insensitive)
    pub fn same_identity(&self, other: &Mod) -> bool {
        let same_id = !self.id.is_empty() && eq_ignore_case(&self.id, &other.id);
        let same_release = eq_ignore_case(&self.name, &other.name)
            && eq_ignore_case(&self.version, &other.version);
        same_id || same_release
    }

    /// Reject ids that are empty, contain whitespace, or are not a plain
    /// folder name (the id names the mod's storage folder)
    pub fn validate_id(&self) -> ModResult<()> {
        if self.id.trim().is_empty() {
            return Err(ModError::Registration(
                "Cannot register a mod that has no defined ID.".to_string(),
            ));
        }
        if self.id.chars().any(char::is_whitespace) {
            return Err(ModError::Registration(format!(
                "Cannot register mod '{}' because its ID contains spaces.",
                self.id
            )));
        }
        let mut components = Path::new(&self.id).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain || self.id.contains(['/', '\\']) {
            return Err(ModError::Registration(format!(
                "Cannot register mod '{}' because its ID is not a valid folder name.",
                self.id
            )));
        }
        Ok(())
    }

    /// Campaign entry for the in-game campaign list
    pub fn campaign(&self) -> Option<Campaign> {
        if !self.is_campaign {
            return None;
        }
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        Some(Campaign {
            name: field(&self.campaign_name),
            prefix: field(&self.campaign_prefix),
            description: field(&self.campaign_description),
            base_level: field(&self.campaign_base_level),
            game_type: field(&self.campaign_game_type),
        })
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Installed state of a mod as seen by the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModState {
    /// Content and scripts are not visible to the game
    #[default]
    Disabled,
    /// Content visible, mutator not loaded; keeps save games working
    SoftDisabled,
    Enabled,
    /// The INI files disagree with any state this tool would write
    Undetermined,
}

impl ModState {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::SoftDisabled => "Soft-disabled",
            Self::Enabled => "Enabled",
            Self::Undetermined => "Undetermined",
        }
    }
}

impl fmt::Display for ModState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// How a mod ended up in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RegistrationKind {
    /// Installed from an archive or dropped into the game's mods folder
    #[default]
    Standalone,
    /// Kept in sync by the workshop client; never deleted by us
    #[serde(alias = "SteamWorkshopItem")]
    ExternallySynced,
}

impl fmt::Display for RegistrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone => f.write_str("Standalone"),
            Self::ExternallySynced => f.write_str("Workshop"),
        }
    }
}

/// A registered mod and its per-installation settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModConfiguration {
    /// `None` while the storage folder is missing; the next scan drops the entry
    pub mod_info: Option<Mod>,
    pub storage_folder: PathBuf,
    pub state: ModState,
    pub order_index: usize,
    pub kind: RegistrationKind,
    /// False until the user acts on an auto-discovered entry
    pub managed: bool,
}

impl ModConfiguration {
    pub fn new(mod_info: Mod, storage_folder: PathBuf, kind: RegistrationKind) -> Self {
        Self {
            mod_info: Some(mod_info),
            storage_folder,
            state: ModState::Disabled,
            order_index: 0,
            kind,
            managed: false,
        }
    }

    /// Last component of the storage folder
    pub fn folder_name(&self) -> String {
        self.storage_folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Mod id, or the folder name when metadata is unavailable
    pub fn id(&self) -> String {
        match &self.mod_info {
            Some(m) if !m.id.is_empty() => m.id.clone(),
            _ => self.folder_name(),
        }
    }

    pub fn display_name(&self) -> String {
        match &self.mod_info {
            Some(m) if !m.name.is_empty() => m.name.clone(),
            _ => self.id(),
        }
    }

    pub fn mutator_class(&self) -> Option<&str> {
        self.mod_info.as_ref().and_then(Mod::mutator_class)
    }

    pub fn storage_exists(&self) -> bool {
        self.storage_folder.is_dir()
    }

    pub fn same_identity(&self, other: &Mod) -> bool {
        self.mod_info
            .as_ref()
            .map(|m| m.same_identity(other))
            .unwrap_or(false)
    }
}

/// Whether a scan added or removed a registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationAction {
    Registered,
    Unregistered,
}

/// A change made by a folder scan
#[derive(Debug, Clone)]
pub struct AutomaticRegistrationEvent {
    pub action: RegistrationAction,
    pub configuration: ModConfiguration,
}

impl fmt::Display for AutomaticRegistrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            RegistrationAction::Registered => "Registered",
            RegistrationAction::Unregistered => "Unregistered",
        };
        write!(
            f,
            "{} {} mod '{}' ({})",
            verb,
            self.configuration.kind.to_string().to_lowercase(),
            self.configuration.display_name(),
            self.configuration.storage_folder.display()
        )
    }
}
