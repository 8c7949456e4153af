//! Ordered registry of installed mods
//!
//! The registry persists a small snapshot (storage folder, state, order, kind
//! per mod) and rebuilds everything else from the mods' own `mod.json` files
//! and from scanning the game's mod folders.

use super::{
    extract_archive, find_mod_root, AutomaticRegistrationEvent, FileChangeLog, Mod,
    ModConfiguration, ModState, RegistrationAction, RegistrationKind, StateAssessor,
};
use crate::error::{ModError, ModResult, Outcome};
use crate::games::GameLayout;
use crate::ini::ConfigDocument;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk shape of the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySnapshot {
    pub game_folder_path: String,
    pub configurations: Vec<ModConfigurationRecord>,
}

/// Persisted part of a [`ModConfiguration`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModConfigurationRecord {
    pub storage_folder: PathBuf,
    #[serde(default)]
    pub state: ModState,
    #[serde(default)]
    pub order_index: usize,
    #[serde(default)]
    pub kind: RegistrationKind,
}

impl From<&ModConfiguration> for ModConfigurationRecord {
    fn from(c: &ModConfiguration) -> Self {
        Self {
            storage_folder: c.storage_folder.clone(),
            state: c.state,
            order_index: c.order_index,
            kind: c.kind,
        }
    }
}

/// Order and desired state of every entry at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationSnapshot {
    entries: Vec<(PathBuf, usize, ModState)>,
}

/// Result of comparing a mods folder with the registry, before anything changes
#[derive(Debug, Clone, Default)]
struct ScanDiff {
    /// Registry indices whose storage folder is gone
    removals: Vec<usize>,
    /// Newly found mods and the folder they live in
    additions: Vec<(Mod, PathBuf)>,
}

/// Registered mods for one game installation
pub struct ModRegistry {
    layout: GameLayout,
    snapshot_file: PathBuf,
    pub(super) change_log: FileChangeLog,
    game_folder: Option<PathBuf>,
    pub(super) configurations: Vec<ModConfiguration>,
    /// Set when the snapshot could not be read; saving would destroy it
    load_failed: bool,
}

impl ModRegistry {
    pub fn new(
        layout: GameLayout,
        snapshot_file: impl Into<PathBuf>,
        change_log_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            layout,
            snapshot_file: snapshot_file.into(),
            change_log: FileChangeLog::new(change_log_file),
            game_folder: None,
            configurations: Vec::new(),
            load_failed: false,
        }
    }

    // ========== Accessors ==========

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    pub fn game_folder(&self) -> Option<&Path> {
        self.game_folder.as_deref()
    }

    pub fn configurations(&self) -> &[ModConfiguration] {
        &self.configurations
    }

    pub fn get(&self, index: usize) -> Option<&ModConfiguration> {
        self.configurations.get(index)
    }

    /// Position of the mod with this id (case-insensitive), falling back to folder name
    pub fn find_by_id(&self, id: &str) -> Option<usize> {
        let id = id.to_lowercase();
        self.configurations
            .iter()
            .position(|c| c.id().to_lowercase() == id)
            .or_else(|| {
                self.configurations
                    .iter()
                    .position(|c| c.folder_name().to_lowercase() == id)
            })
    }

    pub(super) fn require_game_folder(&self) -> ModResult<PathBuf> {
        self.game_folder.clone().ok_or_else(|| {
            ModError::GameFolder("The game folder has not been set.".to_string())
        })
    }

    /// Path of the mod's storage folder as the game's engine file refers to it
    pub fn relative_storage_path(&self, configuration: &ModConfiguration) -> String {
        let prefix = match configuration.kind {
            RegistrationKind::Standalone => &self.layout.standalone_ini_prefix,
            RegistrationKind::ExternallySynced => &self.layout.external_ini_prefix,
        };
        GameLayout::ini_path(prefix, &configuration.folder_name())
    }

    // ========== Persistence ==========

    /// Load the snapshot file and reconcile it with the mod folders.
    ///
    /// A missing file is a fresh start. Standalone mods whose folder vanished
    /// produce a warning and are dropped by the scans that follow.
    pub fn load(&mut self) -> Outcome {
        if !self.snapshot_file.exists() {
            tracing::info!("No registry file at {}", self.snapshot_file.display());
            return Outcome::ok();
        }

        match self.try_load() {
            Ok(outcome) => outcome,
            Err(err) => {
                self.load_failed = true;
                Outcome::from_error(
                    &err,
                    "Failed to load the mod registry file. See the log file.",
                )
            }
        }
    }

    fn try_load(&mut self) -> ModResult<Outcome> {
        let content = fs::read_to_string(&self.snapshot_file)?;
        let snapshot: RegistrySnapshot = serde_json::from_str(&content)?;

        if snapshot.game_folder_path.trim().is_empty() {
            return Err(ModError::GameFolder(
                "Cannot load any mods. The registry file has no value for the game folder path."
                    .to_string(),
            ));
        }

        let mut outcome = Outcome::ok();
        let mut records = snapshot.configurations;
        records.sort_by_key(|r| r.order_index);

        let mut configurations = Vec::with_capacity(records.len());
        for record in records {
            let mut configuration = ModConfiguration {
                mod_info: None,
                storage_folder: record.storage_folder,
                state: record.state,
                order_index: record.order_index,
                kind: record.kind,
                managed: false,
            };

            if !configuration.storage_exists() {
                // Workshop folders vanish when the user unsubscribes; only
                // standalone mods are worth a warning
                if configuration.kind == RegistrationKind::Standalone {
                    let message = format!(
                        "Standalone mod '{}' cannot be loaded because its storage folder no longer exists.",
                        configuration.folder_name()
                    );
                    tracing::warn!(
                        "{} It will be unregistered. Its storage location was {}.",
                        message,
                        configuration.storage_folder.display()
                    );
                    outcome.push_failure(message);
                }
            } else {
                let metadata = configuration.storage_folder.join(&self.layout.metadata_file);
                if !metadata.is_file() {
                    return Err(ModError::Metadata(format!(
                        "Registered mod '{}' is missing its {} file. Expected the file to exist at {}.",
                        configuration.folder_name(),
                        self.layout.metadata_file,
                        metadata.display()
                    )));
                }
                configuration.mod_info = Some(Mod::from_file(&metadata)?);
                configuration.managed = true;
            }

            configurations.push(configuration);
        }

        self.game_folder = Some(PathBuf::from(snapshot.game_folder_path));
        self.configurations = configurations;
        self.load_failed = false;
        self.renumber();
        tracing::info!(
            "Loaded {} mods from {}",
            self.configurations.len(),
            self.snapshot_file.display()
        );

        // The records themselves are fine at this point; a failed scan must
        // not stop them from being saved again
        match self.scan_all() {
            Ok(events) => {
                for event in events {
                    tracing::info!("{}", event);
                }
            }
            Err(err) => {
                tracing::warn!("Scan after loading the registry failed: {}", err);
                outcome.push_failure(
                    "Could not scan the game's mod folders. See the log file.".to_string(),
                );
            }
        }

        Ok(outcome)
    }

    /// Write the snapshot file
    pub fn save(&self) -> Outcome {
        if self.load_failed {
            return Outcome::failed(
                "Refusing to overwrite the registry file because it could not be loaded.",
            );
        }

        match self.write_snapshot() {
            Ok(()) => Outcome::ok(),
            Err(err) => Outcome::from_error(&err, "Failed to save the mod registry. See the log file."),
        }
    }

    fn write_snapshot(&self) -> ModResult<()> {
        let snapshot = RegistrySnapshot {
            game_folder_path: self
                .game_folder
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            configurations: self.configurations.iter().map(Into::into).collect(),
        };

        if let Some(parent) = self.snapshot_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.snapshot_file, serde_json::to_string_pretty(&snapshot)?)?;
        tracing::debug!("Saved registry to {}", self.snapshot_file.display());
        Ok(())
    }

    /// Point the registry at a game installation and pick up its mods
    pub fn set_game_folder(&mut self, path: &Path) -> Outcome {
        if !self.layout.is_game_folder(path) {
            return Outcome::failed("The specified folder does not contain the game.");
        }

        self.game_folder = Some(path.to_path_buf());
        let result = fs::create_dir_all(self.layout.standalone_mods_folder(path))
            .map_err(ModError::from)
            .and_then(|_| self.scan_all());

        match result {
            Ok(events) => {
                for event in events {
                    tracing::info!("{}", event);
                }
                Outcome::ok()
            }
            Err(err) => Outcome::from_error(&err, "Could not scan the game's mod folders. See the log file."),
        }
    }

    // ========== Registration ==========

    /// Install a mod from an archive into the standalone mods folder
    pub fn register_archive(&mut self, archive: &Path) -> Outcome {
        if !archive.is_file() {
            return Outcome::failed(
                "Mod package file could not be loaded because it cannot be accessed or does not exist.",
            );
        }

        let game_folder = match self.require_game_folder() {
            Ok(folder) => folder,
            Err(err) => return Outcome::from_error(&err, ""),
        };

        let temp = self
            .layout
            .standalone_mods_folder(&game_folder)
            .join(format!(".srvmods-{:08x}", rand::random::<u32>()));
        let count = self.configurations.len();

        let outcome = match self.register_extracted(archive, &temp) {
            Ok(index) => {
                let configuration = &mut self.configurations[index];
                configuration.managed = true;
                tracing::info!(
                    "Registered '{}' from {}",
                    configuration.id(),
                    archive.display()
                );
                Outcome::ok()
            }
            Err(err) => {
                while self.configurations.len() > count {
                    if let Some(partial) = self.configurations.pop() {
                        if partial.storage_exists() {
                            if let Err(e) = fs::remove_dir_all(&partial.storage_folder) {
                                tracing::warn!("Could not remove {}: {}", partial.storage_folder.display(), e);
                            }
                        }
                    }
                }
                Outcome::from_error(
                    &err,
                    format!("Could not load mod at '{}'. See the log file.", archive.display()),
                )
            }
        };

        if temp.exists() {
            if let Err(e) = fs::remove_dir_all(&temp) {
                tracing::warn!("Could not remove temporary folder {}: {}", temp.display(), e);
            }
        }

        outcome
    }

    fn register_extracted(&mut self, archive: &Path, temp: &Path) -> ModResult<usize> {
        extract_archive(archive, temp)?;

        let root = find_mod_root(temp, &self.layout.metadata_file)?.ok_or_else(|| {
            ModError::Registration(format!(
                "Could not load mod. Could not find and extract {} within the mod package file.",
                self.layout.metadata_file
            ))
        })?;
        let info = Mod::from_file(&root.join(&self.layout.metadata_file))?;
        self.register_standalone(info, &root)
    }

    /// Add a standalone mod, moving `source_folder` to `<mods folder>/<id>`
    fn register_standalone(&mut self, info: Mod, source_folder: &Path) -> ModResult<usize> {
        info.validate_id()?;

        if self.configurations.iter().any(|c| c.same_identity(&info)) {
            return Err(ModError::Registration(format!(
                "Could not register mod because '{}' version {} already exists.",
                info.name, info.version
            )));
        }

        if !source_folder.is_dir() {
            return Err(ModError::MissingStorage(format!(
                "The storage folder for mod '{}' does not exist.",
                info.id
            )));
        }

        let game_folder = self.require_game_folder()?;
        let target = self.layout.standalone_mods_folder(&game_folder).join(&info.id);
        if source_folder != target {
            if target.exists() {
                return Err(ModError::Registration(format!(
                    "Could not register mod because a storage folder already exists for mod with ID '{}'.",
                    info.id
                )));
            }
            fs::rename(source_folder, &target)?;
        }

        Ok(self.push(ModConfiguration::new(info, target, RegistrationKind::Standalone)))
    }

    /// Add a mod that lives in the workshop folder; it stays where it is
    fn register_external(&mut self, info: Mod, folder: &Path) -> ModResult<usize> {
        info.validate_id()?;
        Ok(self.push(ModConfiguration::new(
            info,
            folder.to_path_buf(),
            RegistrationKind::ExternallySynced,
        )))
    }

    fn push(&mut self, mut configuration: ModConfiguration) -> usize {
        configuration.order_index = self.configurations.len();
        self.configurations.push(configuration);
        self.configurations.len() - 1
    }

    /// Remove a mod, taking its paths out of the engine file.
    ///
    /// Standalone mods are deleted from disk. Workshop mods are left alone;
    /// unsubscribing is what removes their files.
    pub fn unregister(&mut self, index: usize) -> Outcome {
        if index >= self.configurations.len() {
            return Outcome::failed(format!("There is no mod at position {}.", index + 1));
        }

        match self.unregister_entries(&[index]) {
            Ok(removed) => {
                for configuration in removed {
                    tracing::info!("Unregistered '{}'", configuration.id());
                }
                Outcome::ok()
            }
            Err(err) => Outcome::from_error(&err, "Mod was not uninstalled correctly. See the log file."),
        }
    }

    /// Drop entries from the registry. The engine file is saved before any
    /// entry is removed, and folders are deleted only after the registry is
    /// consistent again, so a failure never leaves dangling references or a
    /// gap in the order.
    fn unregister_entries(&mut self, indices: &[usize]) -> ModResult<Vec<ModConfiguration>> {
        let game_folder = self.require_game_folder()?;
        let mut engine = ConfigDocument::load(self.layout.engine_config_path(&game_folder))?;
        let original = engine.clone();

        let mut indices = indices.to_vec();
        indices.sort_unstable();
        indices.dedup();
        indices.retain(|&i| i < self.configurations.len());

        for &index in &indices {
            let relative = self.relative_storage_path(&self.configurations[index]);
            exclude_paths(&self.layout, &mut engine, &relative);
        }
        if engine != original {
            engine.save()?;
        }

        let mut removed: Vec<ModConfiguration> = indices
            .iter()
            .rev()
            .map(|&index| self.configurations.remove(index))
            .collect();
        removed.reverse();
        self.renumber();

        for configuration in &removed {
            if configuration.kind == RegistrationKind::Standalone && configuration.storage_exists() {
                fs::remove_dir_all(&configuration.storage_folder)?;
            }
        }
        Ok(removed)
    }

    // ========== Scans ==========

    /// Pick up mods dropped into the standalone folder and forget deleted ones
    pub fn scan_standalone(&mut self) -> ModResult<Vec<AutomaticRegistrationEvent>> {
        let folder = self.layout.standalone_mods_folder(&self.require_game_folder()?);
        let diff = self.diff_folder(&folder, RegistrationKind::Standalone)?;
        self.apply_diff(diff, RegistrationKind::Standalone)
    }

    /// Pick up subscribed workshop items and forget unsubscribed ones
    pub fn scan_external(&mut self) -> ModResult<Vec<AutomaticRegistrationEvent>> {
        let folder = self.layout.external_mods_folder(&self.require_game_folder()?);
        let diff = self.diff_folder(&folder, RegistrationKind::ExternallySynced)?;
        self.apply_diff(diff, RegistrationKind::ExternallySynced)
    }

    pub fn scan_all(&mut self) -> ModResult<Vec<AutomaticRegistrationEvent>> {
        let mut events = self.scan_standalone()?;
        events.extend(self.scan_external()?);
        Ok(events)
    }

    fn diff_folder(&self, folder: &Path, kind: RegistrationKind) -> ModResult<ScanDiff> {
        let removals: Vec<usize> = self
            .configurations
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == kind && !c.storage_exists())
            .map(|(i, _)| i)
            .collect();

        let mut diff = ScanDiff {
            removals,
            additions: Vec::new(),
        };

        // The folder may simply not exist yet
        if !folder.is_dir() {
            return Ok(diff);
        }

        let mut subfolders: Vec<PathBuf> = fs::read_dir(folder)?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .collect();
        subfolders.sort();

        let remaining = |i: usize| !diff.removals.contains(&i);
        let mut additions: Vec<(Mod, PathBuf)> = Vec::new();

        for subfolder in subfolders {
            let metadata = subfolder.join(&self.layout.metadata_file);
            if !metadata.is_file() {
                continue;
            }

            let info = match Mod::from_file(&metadata) {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", subfolder.display(), e);
                    continue;
                }
            };

            let tracked = self
                .configurations
                .iter()
                .enumerate()
                .filter(|(i, _)| remaining(*i))
                .any(|(_, c)| {
                    c.storage_folder == subfolder
                        || (kind == RegistrationKind::Standalone && c.same_identity(&info))
                });
            let pending = kind == RegistrationKind::Standalone
                && additions.iter().any(|(m, _)| m.same_identity(&info));

            if !tracked && !pending {
                additions.push((info, subfolder));
            }
        }

        diff.additions = additions;
        Ok(diff)
    }

    fn apply_diff(
        &mut self,
        diff: ScanDiff,
        kind: RegistrationKind,
    ) -> ModResult<Vec<AutomaticRegistrationEvent>> {
        let mut events = Vec::new();

        if !diff.removals.is_empty() {
            for configuration in self.unregister_entries(&diff.removals)? {
                events.push(AutomaticRegistrationEvent {
                    action: RegistrationAction::Unregistered,
                    configuration,
                });
            }
        }

        if diff.additions.is_empty() {
            return Ok(events);
        }

        let game_folder = self.require_game_folder()?;
        let engine = ConfigDocument::load(self.layout.engine_config_path(&game_folder))?;
        let mutators = ConfigDocument::load(self.layout.mutator_config_path(&game_folder))?;

        for (info, folder) in diff.additions {
            let id = info.id.clone();
            let registered = match kind {
                RegistrationKind::Standalone => self.register_standalone(info, &folder),
                RegistrationKind::ExternallySynced => self.register_external(info, &folder),
            };

            let index = match registered {
                Ok(index) => index,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping mod '{}' in {}: {}", id, folder.display(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let relative = self.relative_storage_path(&self.configurations[index]);
            let state = StateAssessor::new(&self.layout, &engine, &mutators)
                .assess(&self.configurations[index], &relative);

            let configuration = &mut self.configurations[index];
            configuration.state = state;
            configuration.managed = false;
            events.push(AutomaticRegistrationEvent {
                action: RegistrationAction::Registered,
                configuration: configuration.clone(),
            });
        }

        Ok(events)
    }

    // ========== State and order ==========

    /// Set the desired state of a mod; takes effect on the next apply
    pub fn set_state(&mut self, index: usize, state: ModState) -> ModResult<()> {
        if state == ModState::Undetermined {
            return Err(ModError::InvalidState(
                "A mod cannot be set to an undetermined state.".to_string(),
            ));
        }
        let configuration = self.configurations.get_mut(index).ok_or_else(|| {
            ModError::InvalidState(format!("There is no mod at position {}.", index + 1))
        })?;

        configuration.state = state;
        configuration.managed = true;
        Ok(())
    }

    /// Move a mod one slot towards the front
    pub fn shift_up(&mut self, index: usize) {
        if index > 0 && index < self.configurations.len() {
            self.configurations.swap(index, index - 1);
            self.renumber();
        }
    }

    /// Move a mod one slot towards the back
    pub fn shift_down(&mut self, index: usize) {
        if index + 1 < self.configurations.len() {
            self.configurations.swap(index, index + 1);
            self.renumber();
        }
    }

    fn renumber(&mut self) {
        for (i, configuration) in self.configurations.iter_mut().enumerate() {
            configuration.order_index = i;
        }
    }

    // ========== Assessment ==========

    /// State of one mod as the game files currently describe it
    pub fn assess_state(&self, index: usize) -> ModResult<ModState> {
        if index >= self.configurations.len() {
            return Err(ModError::InvalidState(format!(
                "There is no mod at position {}.",
                index + 1
            )));
        }
        Ok(self.assess_all()?[index])
    }

    /// State of every mod as the game files currently describe it
    pub fn assess_all(&self) -> ModResult<Vec<ModState>> {
        let game_folder = self.require_game_folder()?;
        let engine = ConfigDocument::load(self.layout.engine_config_path(&game_folder))?;
        let mutators = ConfigDocument::load(self.layout.mutator_config_path(&game_folder))?;
        let assessor = StateAssessor::new(&self.layout, &engine, &mutators);

        Ok(self
            .configurations
            .iter()
            .map(|c| assessor.assess(c, &self.relative_storage_path(c)))
            .collect())
    }

    pub fn snapshot(&self) -> ConfigurationSnapshot {
        ConfigurationSnapshot {
            entries: self
                .configurations
                .iter()
                .map(|c| (c.storage_folder.clone(), c.order_index, c.state))
                .collect(),
        }
    }

    /// True if order or states changed since `snapshot` was taken
    pub fn has_unapplied_changes(&self, snapshot: &ConfigurationSnapshot) -> bool {
        self.snapshot() != *snapshot
    }
}

/// Remove a mod's path from all three engine path keys
pub(super) fn exclude_paths(layout: &GameLayout, engine: &mut ConfigDocument, relative: &str) {
    for key in [
        &layout.content_path_key,
        &layout.script_path_key,
        &layout.localization_path_key,
    ] {
        engine.exclude(&layout.engine_path_section, key, relative);
    }
}
