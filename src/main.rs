use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use srvmods::mods::ModState;
use srvmods::{App, Config, APP_VERSION};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "srvmods")]
#[command(
    author,
    version = APP_VERSION,
    about = "A mod manager for Septaroad Voyager"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Game folder override for this invocation
    #[arg(long)]
    game_folder: Option<String>,

    /// Also write log output to stderr
    #[arg(long)]
    log_stderr: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show game folder and mod summary
    Status,

    /// List registered mods in load order
    List,

    /// Manage the game folder
    Game {
        #[command(subcommand)]
        action: GameCommands,
    },

    /// Manage mods
    Mod {
        #[command(subcommand)]
        action: ModCommands,
    },

    /// Register new mod folders and drop vanished ones
    Scan,

    /// Write the desired mod states into the game's INI files
    Apply,

    /// Validate a mod folder and pack it into a zip archive
    Package {
        /// Mod folder containing mod.json
        dir: String,
        /// Output archive path
        out: String,
    },
}

#[derive(Subcommand)]
enum GameCommands {
    /// Find the game in Steam libraries
    Detect,
    /// Use the given game folder
    Set {
        /// Game root or a folder inside it
        path: String,
    },
    /// Show game paths
    Info,
}

#[derive(Subcommand)]
enum ModCommands {
    /// List registered mods
    List,
    /// Install a mod from an archive
    Install {
        /// Path to a zip, 7z or rar archive
        path: String,
    },
    /// Unregister a mod and delete its files
    Remove {
        /// Position in the list or mod id
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Load the mod's content and activate its mutator
    Enable {
        /// Position in the list or mod id
        id: String,
    },
    /// Load the mod's content without activating its mutator
    SoftDisable {
        /// Position in the list or mod id
        id: String,
    },
    /// Remove the mod from the game's INI files
    Disable {
        /// Position in the list or mod id
        id: String,
    },
    /// Move a mod one position earlier
    Up {
        /// Position in the list or mod id
        id: String,
    },
    /// Move a mod one position later
    Down {
        /// Position in the list or mod id
        id: String,
    },
    /// Show mod details
    Info {
        /// Position in the list or mod id
        id: String,
    },
}

fn setup_logging(verbosity: u8, also_stderr: bool) -> Result<()> {
    let filter = match verbosity {
        0 => "srvmods=info",
        1 => "srvmods=debug",
        2 => "srvmods=trace",
        _ => "trace",
    };

    let log_dir = std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".srvmods");

    std::fs::create_dir_all(&log_dir).ok();
    let log_file = log_dir.join("srvmods.log");

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::sync::Arc::new(file));

    if also_stderr {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.log_stderr)?;
    tracing::info!("srvmods {} starting", APP_VERSION);

    // Load configuration
    let mut config = Config::load()?;
    if let Some(folder) = cli.game_folder.as_deref() {
        let trimmed = folder.trim();
        if trimmed.is_empty() {
            anyhow::bail!("--game-folder cannot be empty");
        }
        config.game_folder = Some(trimmed.to_string());
    }

    let mut app = App::new(config).await?;

    match cli.command {
        Some(Commands::Status) | None => app.cmd_status().await?,
        Some(Commands::List) => app.cmd_mod_list().await?,
        Some(Commands::Game { action }) => match action {
            GameCommands::Detect => app.cmd_game_detect().await?,
            GameCommands::Set { path } => app.cmd_game_set(&path).await?,
            GameCommands::Info => app.cmd_game_info().await?,
        },
        Some(Commands::Mod { action }) => match action {
            ModCommands::List => app.cmd_mod_list().await?,
            ModCommands::Install { path } => app.cmd_mod_install(&path).await?,
            ModCommands::Remove { id, yes } => {
                app.set_assume_yes(yes);
                app.cmd_mod_remove(&id).await?
            }
            ModCommands::Enable { id } => app.cmd_mod_set_state(&id, ModState::Enabled).await?,
            ModCommands::SoftDisable { id } => {
                app.cmd_mod_set_state(&id, ModState::SoftDisabled).await?
            }
            ModCommands::Disable { id } => app.cmd_mod_set_state(&id, ModState::Disabled).await?,
            ModCommands::Up { id } => app.cmd_mod_move(&id, true).await?,
            ModCommands::Down { id } => app.cmd_mod_move(&id, false).await?,
            ModCommands::Info { id } => app.cmd_mod_info(&id).await?,
        },
        Some(Commands::Scan) => app.cmd_scan().await?,
        Some(Commands::Apply) => app.cmd_apply().await?,
        Some(Commands::Package { dir, out }) => app.cmd_package(&dir, &out).await?,
    }

    Ok(())
}
