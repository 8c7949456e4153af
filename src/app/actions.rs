//! CLI command action handlers

use super::{into_result, App};
use crate::games::{is_game_running, GameLocator};
use crate::mods::package::package_mod;
use crate::mods::ModState;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// How many parent folders `game set` walks up looking for the game root
const GAME_FOLDER_SEARCH_DEPTH: usize = 3;

impl App {
    // ========== Game Commands ==========

    pub async fn cmd_game_detect(&self) -> Result<()> {
        println!("Looking for the game in Steam libraries...");
        let layout = self.registry.lock().await.layout().clone();
        let folder = GameLocator::detect(&layout)?;
        println!("Found: {}", folder.display());
        self.use_game_folder(folder).await
    }

    pub async fn cmd_game_set(&self, path: &str) -> Result<()> {
        let layout = self.registry.lock().await.layout().clone();
        let folder = match layout.find_game_folder(Path::new(path), GAME_FOLDER_SEARCH_DEPTH) {
            Some(folder) => folder,
            None => bail!("The specified folder does not contain the game: {}", path),
        };
        self.use_game_folder(folder).await
    }

    async fn use_game_folder(&self, folder: PathBuf) -> Result<()> {
        self.ensure_game_not_running().await?;

        let target = folder.clone();
        let outcome = self.with_registry(move |r| r.set_game_folder(&target)).await?;
        into_result(outcome)?;
        self.save_registry().await?;

        let mut config = self.config.write().await;
        config.game_folder = Some(folder.to_string_lossy().into_owned());
        config.save()?;

        println!("Game folder set to {}", folder.display());
        Ok(())
    }

    pub async fn cmd_game_info(&self) -> Result<()> {
        let registry = self.registry.lock().await;
        let layout = registry.layout();
        let root = match registry.game_folder() {
            Some(root) => root,
            None => bail!("No game folder set. Use 'srvmods game detect' or 'srvmods game set <path>' first."),
        };

        println!("Game Information");
        println!("{:-<60}", "");
        println!("Install Path:  {}", root.display());
        println!("Executable:    {}", layout.executable_path(root, true).display());
        println!("Engine Config: {}", layout.engine_config_path(root).display());
        println!("Mutator List:  {}", layout.mutator_config_path(root).display());
        println!("Campaigns:     {}", layout.campaign_config_path(root).display());
        println!("Mods Folder:   {}", layout.standalone_mods_folder(root).display());
        println!("Workshop:      {}", layout.external_mods_folder(root).display());
        println!(
            "Running:       {}",
            if is_game_running(layout) { "Yes" } else { "No" }
        );
        Ok(())
    }

    // ========== Mod Commands ==========

    pub async fn cmd_mod_list(&self) -> Result<()> {
        let registry = self.registry.lock().await;
        if registry.configurations().is_empty() {
            println!("No mods registered. Use 'srvmods mod install <archive>' or 'srvmods scan'.");
            return Ok(());
        }

        // Actual states need the game files; show the list without them otherwise
        let actual = registry.assess_all().ok();

        println!(
            "{:>3}  {:<13} {:<13} {:<10} {}",
            "#", "State", "In Game", "Source", "Mod"
        );
        println!("{:-<60}", "");
        for (i, c) in registry.configurations().iter().enumerate() {
            let in_game = actual
                .as_ref()
                .and_then(|states| states.get(i))
                .map(|s| s.display_name())
                .unwrap_or("-");
            let version = c
                .mod_info
                .as_ref()
                .map(|m| format!(" (v{})", m.version))
                .unwrap_or_default();
            println!(
                "{:>3}. {:<13} {:<13} {:<10} {}{}",
                i + 1,
                c.state.display_name(),
                in_game,
                c.kind.to_string(),
                c.display_name(),
                version
            );
        }
        Ok(())
    }

    pub async fn cmd_mod_install(&self, path: &str) -> Result<()> {
        self.ensure_game_not_running().await?;
        let archive = PathBuf::from(path);

        println!("Installing mod from: {}", archive.display());
        let outcome = self.with_registry(move |r| r.register_archive(&archive)).await?;
        into_result(outcome)?;
        self.save_registry().await?;

        if let Some(c) = self.registry.lock().await.configurations().last() {
            println!("Installed: {} ({})", c.display_name(), c.id());
        }
        println!("Use 'srvmods mod enable <id>' and 'srvmods apply' to activate it.");
        Ok(())
    }

    pub async fn cmd_mod_remove(&self, selector: &str) -> Result<()> {
        self.ensure_game_not_running().await?;
        let index = self.resolve(selector).await?;
        let name = self.registry.lock().await.configurations()[index].display_name();

        if !self
            .confirm(&format!("Remove '{}' and delete its files?", name))
            .await?
        {
            println!("Cancelled.");
            return Ok(());
        }

        let outcome = self.with_registry(move |r| r.unregister(index)).await?;
        into_result(outcome)?;
        self.save_registry().await?;
        println!("Removed: {}", name);
        Ok(())
    }

    pub async fn cmd_mod_set_state(&self, selector: &str, state: ModState) -> Result<()> {
        let index = self.resolve(selector).await?;
        let name = {
            let mut registry = self.registry.lock().await;
            registry.set_state(index, state)?;
            registry.configurations()[index].display_name()
        };
        self.save_registry().await?;

        println!("{}: {}", state, name);
        println!("Run 'srvmods apply' to apply changes.");
        Ok(())
    }

    pub async fn cmd_mod_move(&self, selector: &str, up: bool) -> Result<()> {
        let index = self.resolve(selector).await?;
        let position = {
            let mut registry = self.registry.lock().await;
            if up {
                registry.shift_up(index);
                index.saturating_sub(1)
            } else {
                registry.shift_down(index);
                (index + 1).min(registry.configurations().len().saturating_sub(1))
            }
        };
        self.save_registry().await?;

        println!("Moved to position {}.", position + 1);
        Ok(())
    }

    pub async fn cmd_mod_info(&self, selector: &str) -> Result<()> {
        let index = self.resolve(selector).await?;
        let registry = self.registry.lock().await;
        let c = &registry.configurations()[index];
        let actual = registry.assess_state(index).ok();

        println!("Mod Information");
        println!("{:-<60}", "");
        println!("ID:        {}", c.id());
        println!("Position:  {}", c.order_index + 1);
        println!("State:     {}", c.state);
        if let Some(actual) = actual {
            println!("In Game:   {}", actual);
        }
        println!("Source:    {}", c.kind);
        println!("Folder:    {}", c.storage_folder.display());
        println!("INI Path:  {}", registry.relative_storage_path(c));

        match &c.mod_info {
            Some(m) => {
                println!("Name:      {}", m.name);
                println!("Version:   {}", m.version);
                if !m.author.is_empty() {
                    println!("Author:    {}", m.author);
                }
                if let Some(class) = m.mutator_class() {
                    println!("Mutator:   {}", class);
                }
                if let Some(workshop_id) = m.workshop_id {
                    println!("Workshop:  {}", workshop_id);
                }
                if let Some(campaign) = m.campaign() {
                    println!("Campaign:  {} ({})", campaign.name, campaign.prefix);
                }
                if !m.description.is_empty() {
                    println!("\n{}", m.description);
                }
            }
            None => println!("Metadata:  unavailable, storage folder is missing"),
        }
        Ok(())
    }

    // ========== Registry Commands ==========

    pub async fn cmd_scan(&self) -> Result<()> {
        self.ensure_game_not_running().await?;

        let events = self.with_registry(|r| r.scan_all()).await??;
        self.save_registry().await?;

        if events.is_empty() {
            println!("No changes found.");
        }
        for event in &events {
            println!("{}", event);
        }
        Ok(())
    }

    pub async fn cmd_apply(&self) -> Result<()> {
        self.ensure_game_not_running().await?;

        println!("Applying mod states to game files...");
        let outcome = self.with_registry(|r| r.apply()).await?;
        // States may have been coerced even when the pass failed
        self.save_registry().await?;
        into_result(outcome)?;

        let log = self.config.read().await.paths.change_log_file();
        println!("Done. File changes recorded in {}", log.display());
        Ok(())
    }

    pub async fn cmd_package(&self, dir: &str, out: &str) -> Result<()> {
        let metadata_file = self.registry.lock().await.layout().metadata_file.clone();
        let source = PathBuf::from(dir);
        let dest = PathBuf::from(out);

        let report = tokio::task::spawn_blocking(move || package_mod(&source, &dest, &metadata_file))
            .await
            .context("Packaging task failed")??;

        if let Some(id) = &report.generated_id {
            println!("Generated mod id: {}", id);
        }
        for warning in &report.warnings {
            println!("Warning: {}", warning);
        }
        println!(
            "Packaged {} files into {}",
            report.files,
            report.archive.display()
        );
        Ok(())
    }

    pub async fn cmd_status(&self) -> Result<()> {
        println!("srvmods Status");
        println!("{:-<40}", "");

        let registry = self.registry.lock().await;
        match registry.game_folder() {
            Some(folder) => println!("Game Folder: {}", folder.display()),
            None => println!("Game Folder: None"),
        };
        println!(
            "Running:     {}",
            if is_game_running(registry.layout()) { "Yes" } else { "No" }
        );

        let configurations = registry.configurations();
        let enabled = configurations
            .iter()
            .filter(|c| c.state == ModState::Enabled)
            .count();
        println!(
            "Mods:        {} registered, {} enabled",
            configurations.len(),
            enabled
        );

        if let Ok(actual) = registry.assess_all() {
            let pending = configurations
                .iter()
                .zip(&actual)
                .filter(|(c, a)| **a != ModState::Undetermined && c.state != **a)
                .count();
            if pending > 0 {
                println!("Pending:     {} mod(s) differ from the game files. Run 'srvmods apply'.", pending);
            }
        }

        let config = self.config.read().await;
        println!("Config:      {}", config.paths.config_file().display());
        println!("Registry:    {}", config.registry_file().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Paths};
    use crate::games::tests::fake_game_folder;
    use crate::games::GameLayout;
    use crate::mods::Mod;
    use std::fs;

    async fn app() -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        fake_game_folder(&dir.path().join("game"), &GameLayout::default());
        let config = Config::load_with(Paths::with_root(dir.path())).unwrap();
        let mut app = App::new(config).await.unwrap();
        app.set_assume_yes(true);
        (dir, app)
    }

    fn write_mod(folder: &Path, id: &str, mutator: Option<&str>) {
        fs::create_dir_all(folder).unwrap();
        Mod {
            id: id.to_string(),
            name: id.to_string(),
            version: "1.0".to_string(),
            mutator_class: mutator.map(str::to_string),
            ..Mod::default()
        }
        .save_to(&folder.join("mod.json"))
        .unwrap();
    }

    #[tokio::test]
    async fn game_set_accepts_nested_folder() {
        let (dir, app) = app().await;
        let nested = dir.path().join("game/Binaries/Win64");
        app.cmd_game_set(nested.to_str().unwrap()).await.unwrap();

        assert_eq!(
            app.registry.lock().await.game_folder(),
            Some(dir.path().join("game").as_path())
        );
        let saved = Config::load_with(Paths::with_root(dir.path())).unwrap();
        assert_eq!(saved.game_folder(), Some(dir.path().join("game")));
    }

    #[tokio::test]
    async fn game_set_rejects_other_folders() {
        let (dir, app) = app().await;
        assert!(app.cmd_game_set(dir.path().to_str().unwrap()).await.is_err());
    }

    #[tokio::test]
    async fn enable_then_apply_updates_game_files() {
        let (dir, app) = app().await;
        let game = dir.path().join("game");
        app.cmd_game_set(game.to_str().unwrap()).await.unwrap();

        write_mod(&game.join("RPGTacGame/Mods/a-mod"), "a-mod", Some("A.Mutator"));
        app.cmd_scan().await.unwrap();
        app.cmd_mod_set_state("a-mod", ModState::Enabled).await.unwrap();
        app.cmd_apply().await.unwrap();

        let mutators = fs::read_to_string(game.join("SRVGame/Config/SRVMods.ini")).unwrap();
        assert!(mutators.contains("MutatorsLoaded=A.Mutator"));
        let engine = fs::read_to_string(game.join("SRVGame/Config/SRVEngine.ini")).unwrap();
        assert!(engine.contains(r"..\..\RPGTacGame\Mods\a-mod"));
        assert_eq!(app.registry.lock().await.assess_state(0).unwrap(), ModState::Enabled);
    }

    #[tokio::test]
    async fn remove_deletes_standalone_folder() {
        let (dir, app) = app().await;
        let game = dir.path().join("game");
        app.cmd_game_set(game.to_str().unwrap()).await.unwrap();

        let folder = game.join("RPGTacGame/Mods/a-mod");
        write_mod(&folder, "a-mod", None);
        app.cmd_scan().await.unwrap();
        app.cmd_mod_remove("1").await.unwrap();

        assert!(!folder.exists());
        assert!(app.registry.lock().await.configurations().is_empty());
    }

    #[tokio::test]
    async fn move_reorders_mods() {
        let (dir, app) = app().await;
        let game = dir.path().join("game");
        app.cmd_game_set(game.to_str().unwrap()).await.unwrap();

        write_mod(&game.join("RPGTacGame/Mods/a-mod"), "a-mod", None);
        write_mod(&game.join("RPGTacGame/Mods/b-mod"), "b-mod", None);
        app.cmd_scan().await.unwrap();
        let last = app.registry.lock().await.configurations()[1].id();

        app.cmd_mod_move(&last, true).await.unwrap();
        assert_eq!(app.registry.lock().await.configurations()[0].id(), last);
    }

    #[tokio::test]
    async fn undetermined_state_is_rejected() {
        let (dir, app) = app().await;
        let game = dir.path().join("game");
        app.cmd_game_set(game.to_str().unwrap()).await.unwrap();
        write_mod(&game.join("RPGTacGame/Mods/a-mod"), "a-mod", None);
        app.cmd_scan().await.unwrap();

        assert!(app.cmd_mod_set_state("1", ModState::Undetermined).await.is_err());
    }

    #[tokio::test]
    async fn commands_need_a_game_folder() {
        let (_dir, app) = app().await;
        assert!(app.cmd_game_info().await.is_err());
        assert!(app.cmd_apply().await.is_err());
        assert!(app.cmd_mod_info("anything").await.is_err());
    }
}
