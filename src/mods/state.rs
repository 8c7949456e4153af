//! Infer a mod's installed state from the engine and mutator INI files

use super::{ModConfiguration, ModState};
use crate::games::GameLayout;
use crate::ini::ConfigDocument;

/// What the INI files say about one mod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// Relative path listed under all three engine path keys
    pub has_all_paths: bool,
    pub has_mutator: bool,
    /// Mutator class present in the loaded-mutators list
    pub mutator_enabled: bool,
}

impl Assessment {
    pub fn state(&self) -> ModState {
        match (self.has_all_paths, self.has_mutator, self.mutator_enabled) {
            (true, false, _) | (true, true, true) => ModState::Enabled,
            (true, true, false) => ModState::SoftDisabled,
            (false, false, _) | (false, true, false) => ModState::Disabled,
            (false, true, true) => ModState::Undetermined,
        }
    }
}

/// Reads the two game documents and derives per-mod state
pub struct StateAssessor<'a> {
    layout: &'a GameLayout,
    engine: &'a ConfigDocument,
    mutators: &'a ConfigDocument,
}

impl<'a> StateAssessor<'a> {
    pub fn new(
        layout: &'a GameLayout,
        engine: &'a ConfigDocument,
        mutators: &'a ConfigDocument,
    ) -> Self {
        Self {
            layout,
            engine,
            mutators,
        }
    }

    pub fn examine(&self, configuration: &ModConfiguration, relative_path: &str) -> Assessment {
        let section = &self.layout.engine_path_section;
        let has_all_paths = [
            &self.layout.content_path_key,
            &self.layout.script_path_key,
            &self.layout.localization_path_key,
        ]
        .iter()
        .all(|key| self.engine.is_included(section, key, relative_path));

        let mutator_class = configuration.mutator_class();
        let mutator_enabled = match mutator_class {
            Some(class) => self
                .mutators
                .find_item(&self.layout.mutator_section, &self.layout.mutator_key)
                .map(|item| item.value.split(',').any(|c| c == class))
                .unwrap_or(false),
            None => false,
        };

        Assessment {
            has_all_paths,
            has_mutator: mutator_class.is_some(),
            mutator_enabled,
        }
    }

    pub fn assess(&self, configuration: &ModConfiguration, relative_path: &str) -> ModState {
        self.examine(configuration, relative_path).state()
    }
}
