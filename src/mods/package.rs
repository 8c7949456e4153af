//! Publishing support: validate a mod folder and pack it into a distributable archive

use super::{create_archive, Mod};
use crate::error::{ModError, ModResult};
use std::path::{Path, PathBuf};

/// File the workshop uses as the item preview image
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";

/// What `package_mod` produced
#[derive(Debug, Clone)]
pub struct PackageReport {
    pub archive: PathBuf,
    pub files: usize,
    /// Id written into `mod.json` because it had none
    pub generated_id: Option<String>,
    pub warnings: Vec<String>,
}

/// Check the metadata fields required before a mod can be published
pub fn validate(info: &Mod) -> ModResult<()> {
    if info.is_campaign {
        let fields = [
            &info.campaign_name,
            &info.campaign_description,
            &info.campaign_base_level,
            &info.campaign_game_type,
            &info.campaign_prefix,
        ];
        if fields.iter().any(|f| f.as_deref().unwrap_or("").is_empty()) {
            return Err(ModError::Metadata(
                "Cannot publish a campaign with any of name, description, base level, game type, or prefix missing."
                    .to_string(),
            ));
        }
    } else if info.name.is_empty() || info.description.is_empty() {
        return Err(ModError::Metadata(
            "Cannot publish a mod with a missing name or description.".to_string(),
        ));
    }

    if info.author.is_empty() {
        return Err(ModError::Metadata(
            "You must provide an author's name for this mod before publishing.".to_string(),
        ));
    }
    Ok(())
}

/// `author-name` with all whitespace removed
pub fn default_id(info: &Mod) -> String {
    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    format!("{}-{}", strip(&info.author), strip(&info.name))
}

/// Validate the mod in `source_dir` and zip it to `dest`.
///
/// A campaign's description is copied from its campaign description and a
/// missing id is generated; either change is saved back to `mod.json`.
pub fn package_mod(source_dir: &Path, dest: &Path, metadata_file: &str) -> ModResult<PackageReport> {
    if !source_dir.is_dir() {
        return Err(ModError::MissingStorage(format!(
            "Cannot package mod. The folder '{}' does not exist.",
            source_dir.display()
        )));
    }

    let metadata = source_dir.join(metadata_file);
    let mut info = Mod::from_file(&metadata)?;
    let original = info.clone();

    if info.is_campaign {
        info.description = info.campaign_description.clone().unwrap_or_default();
    }
    validate(&info)?;

    let mut generated_id = None;
    if info.id.is_empty() {
        info.id = default_id(&info);
        tracing::info!("Generated mod id '{}'", info.id);
        generated_id = Some(info.id.clone());
    }
    info.validate_id()?;

    if info != original {
        info.save_to(&metadata)?;
    }

    let mut warnings = Vec::new();
    if !has_thumbnail(source_dir)? {
        warnings.push(format!(
            "Your mod has no workshop item thumbnail. You can add one by including a file called '{}'.",
            THUMBNAIL_FILE
        ));
    }

    let files = create_archive(source_dir, dest, |relative| {
        relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
    })?;
    tracing::info!("Packaged '{}' ({} files) into {}", info.id, files, dest.display());

    Ok(PackageReport {
        archive: dest.to_path_buf(),
        files,
        generated_id,
        warnings,
    })
}

fn has_thumbnail(dir: &Path) -> ModResult<bool> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file()
            && entry.file_name().to_string_lossy().to_lowercase() == THUMBNAIL_FILE
        {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mods::extract_archive;
    use std::fs;

    fn publishable() -> Mod {
        Mod {
            name: "Better Maps".to_string(),
            version: "1.0".to_string(),
            description: "Adds maps".to_string(),
            author: "Jane Doe".to_string(),
            ..Mod::default()
        }
    }

    #[test]
    fn validation_rules() {
        assert!(validate(&publishable()).is_ok());

        let mut nameless = publishable();
        nameless.name.clear();
        assert_eq!(
            validate(&nameless).unwrap_err().to_string(),
            "Cannot publish a mod with a missing name or description."
        );

        let mut anonymous = publishable();
        anonymous.author.clear();
        assert!(validate(&anonymous).unwrap_err().to_string().contains("author's name"));

        let mut campaign = publishable();
        campaign.is_campaign = true;
        campaign.campaign_name = Some("C".to_string());
        assert!(validate(&campaign).unwrap_err().to_string().starts_with("Cannot publish a campaign"));
    }

    #[test]
    fn default_id_strips_whitespace() {
        assert_eq!(default_id(&publishable()), "JaneDoe-BetterMaps");
    }

    #[test]
    fn package_generates_id_and_archives_content() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("Better Maps");
        fs::create_dir_all(source.join("Content")).unwrap();
        fs::create_dir_all(source.join(".git")).unwrap();
        fs::write(source.join("Content/map.udk"), b"map").unwrap();
        fs::write(source.join(".git/HEAD"), b"ref").unwrap();
        publishable().save_to(&source.join("mod.json")).unwrap();

        let dest = dir.path().join("out/better-maps.zip");
        let report = package_mod(&source, &dest, "mod.json").unwrap();
        assert_eq!(report.generated_id.as_deref(), Some("JaneDoe-BetterMaps"));
        assert_eq!(report.files, 2);
        assert_eq!(report.warnings.len(), 1);

        let saved = Mod::from_file(&source.join("mod.json")).unwrap();
        assert_eq!(saved.id, "JaneDoe-BetterMaps");

        let extracted = dir.path().join("extracted");
        extract_archive(&dest, &extracted).unwrap();
        assert!(extracted.join("Content/map.udk").is_file());
        assert!(!extracted.join(".git").exists());
        assert_eq!(Mod::from_file(&extracted.join("mod.json")).unwrap().id, "JaneDoe-BetterMaps");
    }

    #[test]
    fn thumbnail_suppresses_warning() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("m");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("Thumbnail.JPG"), b"jpg").unwrap();
        let mut info = publishable();
        info.id = "jane-maps".to_string();
        info.save_to(&source.join("mod.json")).unwrap();

        let report = package_mod(&source, &dir.path().join("m.zip"), "mod.json").unwrap();
        assert!(report.warnings.is_empty());
        assert!(report.generated_id.is_none());
    }

    #[test]
    fn invalid_metadata_is_not_packaged() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("m");
        fs::create_dir_all(&source).unwrap();
        let mut info = publishable();
        info.description.clear();
        info.save_to(&source.join("mod.json")).unwrap();

        let dest = dir.path().join("m.zip");
        assert!(package_mod(&source, &dest, "mod.json").is_err());
        assert!(!dest.exists());
    }
}
