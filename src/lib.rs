//! srvmods - A mod manager for Septaroad Voyager
//!
//! Mods live in their own folders; the game only sees the ones listed in its
//! INI files. This crate keeps a registry of mods with a desired state and
//! reconciles the game's INI files with it:
//! - INI reading and writing that preserves unknown content
//! - State assessment of each mod from the current game files
//! - Registration from archives, folder scans, ordering and removal
//! - Campaign list maintenance for campaign mods
//! - Packaging a mod folder for distribution

pub const APP_VERSION: &str = "0.2.0";

pub mod app;
pub mod config;
pub mod error;
pub mod games;
pub mod ini;
pub mod mods;

pub use app::App;
pub use config::Config;
pub use error::{ModError, ModResult, Outcome};
