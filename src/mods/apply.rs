//! Write the registry's desired state into the game's INI files

use super::registry::exclude_paths;
use super::{ModRegistry, ModState};
use crate::error::{ModError, ModResult, Outcome};
use crate::ini::CampaignDocument;
use crate::ini::ConfigDocument;
use std::path::Path;

const APPLY_FAILED: &str = "Encountered an error while trying to update mod/game files.";

impl ModRegistry {
    /// Bring the mutator list, engine paths and (optionally) the campaign
    /// list in line with each mod's desired state.
    ///
    /// Mods whose files cannot be found are forced to `Disabled` and reported;
    /// the rest are still applied. `Undetermined` mods are left as they are.
    pub fn apply(&mut self) -> Outcome {
        self.change_log.start();
        self.change_log.record("Beginning file changes...");

        let outcome = match self.try_apply() {
            Ok(outcome) => outcome,
            Err(err) => {
                let outcome = Outcome::from_error(&err, APPLY_FAILED);
                self.change_log.record(outcome.message());
                outcome
            }
        };

        self.change_log.record("File changes finished.");
        if let Err(e) = self.change_log.end() {
            tracing::warn!(
                "Could not write file change log {}: {}",
                self.change_log.path().display(),
                e
            );
        }
        outcome
    }

    fn try_apply(&mut self) -> ModResult<Outcome> {
        let game_folder = self.require_game_folder()?;

        // Coercion happens first so both files see the same final states
        let outcome = self.disable_missing_storage();
        self.update_mutator_list(&game_folder)?;
        self.update_engine_paths(&game_folder)?;
        if self.layout().manage_campaigns {
            self.update_campaign_list(&game_folder)?;
        }

        if !outcome.success {
            self.change_log.record(outcome.message());
        }
        Ok(outcome)
    }

    fn update_mutator_list(&mut self, game_folder: &Path) -> ModResult<()> {
        let layout = self.layout().clone();
        let mut document = ConfigDocument::load(layout.mutator_config_path(game_folder))?;

        let mut managed: Vec<String> = Vec::new();
        for configuration in &self.configurations {
            if configuration.state != ModState::Enabled {
                continue;
            }
            if let Some(class) = configuration.mutator_class() {
                if !managed.iter().any(|c| c == class) {
                    managed.push(class.to_string());
                    self.change_log.record(format!(
                        "Mod {} is enabled and has a mutator, adding {} to the mutator list",
                        configuration.id(),
                        class
                    ));
                }
            }
        }

        // Classes no registered mod declares were put there by hand; keep them
        let declared: Vec<&str> = self
            .configurations
            .iter()
            .filter_map(|c| c.mutator_class())
            .collect();
        let existing = document
            .find_item(&layout.mutator_section, &layout.mutator_key)
            .map(|item| item.value.clone())
            .unwrap_or_default();

        let mut classes = managed;
        for class in existing.split(',') {
            if class.is_empty() || declared.contains(&class) || classes.iter().any(|c| c == class) {
                continue;
            }
            self.change_log.record(format!(
                "Preserving unmanaged mutator '{}' in the mutator list",
                class
            ));
            classes.push(class.to_string());
        }

        let list = classes.join(",");
        self.change_log.record(format!("New mutator list will be: {}", list));
        document.set_value(&layout.mutator_section, &layout.mutator_key, &list);
        document.save()?;
        self.change_log.record(format!(
            "Mutator list changes saved to file: {}",
            document.path.display()
        ));
        Ok(())
    }

    /// Force mods whose storage folder vanished to `Disabled`, reporting each
    fn disable_missing_storage(&mut self) -> Outcome {
        let mut outcome = Outcome::ok();
        for configuration in self.configurations.iter_mut() {
            let wanted = matches!(
                configuration.state,
                ModState::Enabled | ModState::SoftDisabled
            );
            if !wanted || configuration.storage_exists() {
                continue;
            }

            let err = ModError::MissingStorage(format!(
                "Mod '{}' doesn't have an existing mod storage folder at '{}'.",
                configuration.id(),
                configuration.storage_folder.display()
            ));
            tracing::warn!("{}", err);
            self.change_log.record(err.to_string());
            outcome.push_failure(err.to_string());
            configuration.state = ModState::Disabled;
        }
        outcome
    }

    fn update_engine_paths(&mut self, game_folder: &Path) -> ModResult<()> {
        let layout = self.layout().clone();
        let mut engine = ConfigDocument::load(layout.engine_config_path(game_folder))?;

        for index in 0..self.configurations.len() {
            let relative = self.relative_storage_path(&self.configurations[index]);
            let configuration = &mut self.configurations[index];
            configuration.managed = true;

            match configuration.state {
                ModState::Enabled | ModState::SoftDisabled => {
                    self.change_log.record(format!(
                        "Mod {} needs to be added to the game directory...",
                        configuration.id()
                    ));
                    for key in [
                        &layout.content_path_key,
                        &layout.localization_path_key,
                        &layout.script_path_key,
                    ] {
                        engine.include(&layout.engine_path_section, key, &relative);
                    }
                    self.change_log.record(format!(
                        "Engine file will include paths for mod '{}' in folder '{}'",
                        configuration.id(),
                        configuration.storage_folder.display()
                    ));
                }
                ModState::Disabled => {
                    self.change_log.record(format!(
                        "Mod {} needs to be removed from the game directory...",
                        configuration.id()
                    ));
                    exclude_paths(&layout, &mut engine, &relative);
                }
                ModState::Undetermined => {
                    self.change_log.record(format!(
                        "Mod {} is in an undetermined state and was left untouched",
                        configuration.id()
                    ));
                }
            }
        }

        engine.save()?;
        Ok(())
    }

    fn update_campaign_list(&mut self, game_folder: &Path) -> ModResult<()> {
        let layout = self.layout().clone();
        let path = layout.campaign_config_path(game_folder);
        if !path.is_file() {
            self.change_log.record(format!(
                "Campaign localization file {} not found, skipping campaign list",
                path.display()
            ));
            return Ok(());
        }

        let mut backup = path.clone().into_os_string();
        backup.push(".backup");
        let backup = std::path::PathBuf::from(backup);
        if !backup.exists() {
            self.change_log.record("Creating backup of campaign localization file.");
            std::fs::copy(&path, &backup)?;
        }

        let mut document = CampaignDocument::load(&path, &layout.campaign_section)?;
        let campaigns: Vec<_> = self
            .configurations
            .iter()
            .filter(|c| c.state == ModState::Enabled)
            .filter_map(|c| c.mod_info.as_ref().and_then(|m| m.campaign()))
            .collect();

        let missing = document.merge_enabled_campaigns(&layout.base_campaign_prefixes, campaigns);
        if !missing.is_empty() {
            self.change_log.record(format!(
                "The campaign list has been modified and does not contain the campaigns: {}",
                missing.join(", ")
            ));
        }

        document.save()?;
        self.change_log.record(
            "Updated campaign localization file to reflect enabled custom campaigns",
        );
        Ok(())
    }
}
