//! Application state and orchestration

mod actions;

use crate::config::Config;
use crate::error::Outcome;
use crate::games::is_game_running;
use crate::mods::ModRegistry;

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Main application struct that orchestrates all components
pub struct App {
    /// Application configuration
    pub config: Arc<RwLock<Config>>,

    /// Registered mods for the configured game
    pub registry: Arc<Mutex<ModRegistry>>,

    /// Answer yes to confirmation prompts
    assume_yes: bool,
}

impl App {
    /// Create a new App instance and load the registry
    pub async fn new(config: Config) -> Result<Self> {
        config.ensure_dirs().context("Failed to create directories")?;

        let mut registry = ModRegistry::new(
            config.game_layout(),
            config.registry_file(),
            config.paths.change_log_file(),
        );

        let outcome = registry.load();
        if !outcome.success {
            eprintln!("Warning: {}", outcome.message());
        }

        // A configured game folder wins over the one remembered by the registry
        if let Some(folder) = config.game_folder() {
            if registry.game_folder() != Some(folder.as_path()) {
                let outcome = registry.set_game_folder(&folder);
                if !outcome.success {
                    eprintln!("Warning: {} ({})", outcome.message(), folder.display());
                }
            }
        }

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            registry: Arc::new(Mutex::new(registry)),
            assume_yes: false,
        })
    }

    pub fn set_assume_yes(&mut self, yes: bool) {
        self.assume_yes = yes;
    }

    /// Run a registry operation on the blocking thread pool
    async fn with_registry<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ModRegistry) -> T + Send + 'static,
        T: Send + 'static,
    {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || {
            let mut registry = registry.blocking_lock();
            f(&mut registry)
        })
        .await
        .context("Registry task failed")
    }

    async fn save_registry(&self) -> Result<()> {
        let outcome = self.registry.lock().await.save();
        into_result(outcome)
    }

    /// Refuse to touch game files while the game has them open
    async fn ensure_game_not_running(&self) -> Result<()> {
        let layout = self.registry.lock().await.layout().clone();
        if is_game_running(&layout) {
            bail!(
                "{} is running. Close the game before changing mods.",
                layout.process_name
            );
        }
        Ok(())
    }

    /// Resolve a 1-based list position or a mod id to a registry index
    async fn resolve(&self, selector: &str) -> Result<usize> {
        let registry = self.registry.lock().await;
        if let Ok(position) = selector.parse::<usize>() {
            if position >= 1 && position <= registry.configurations().len() {
                return Ok(position - 1);
            }
        }
        match registry.find_by_id(selector) {
            Some(index) => Ok(index),
            None => bail!(
                "Mod '{}' not found. Run 'srvmods list' to see registered mods.",
                selector
            ),
        }
    }

    /// Ask for confirmation unless prompts are disabled
    async fn confirm(&self, prompt: &str) -> Result<bool> {
        if self.assume_yes || !self.config.read().await.confirm_destructive {
            return Ok(true);
        }

        print!("{} [y/N] ", prompt);
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

fn into_result(outcome: Outcome) -> Result<()> {
    if outcome.success {
        Ok(())
    } else {
        bail!("{}", outcome.message())
    }
}
