//! Archive extraction (zip, 7z, rar) and zip packaging

use crate::error::{ModError, ModResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    SevenZip,
    Rar,
    Unknown,
}

impl ArchiveFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "zip" => Self::Zip,
            "7z" => Self::SevenZip,
            "rar" => Self::Rar,
            _ => Self::Unknown,
        }
    }

    /// Detect format from the first bytes of the file
    fn sniff(archive: &Path) -> ModResult<Self> {
        let mut header = [0u8; 4];
        let read = {
            use std::io::Read;
            std::fs::File::open(archive)?.read(&mut header)?
        };
        let header = &header[..read];

        Ok(if header.starts_with(&[0x50, 0x4B]) {
            Self::Zip
        } else if header.starts_with(&[0x37, 0x7A, 0xBC, 0xAF]) {
            Self::SevenZip
        } else if header.starts_with(&[0x52, 0x61, 0x72, 0x21]) {
            Self::Rar
        } else {
            Self::Unknown
        })
    }
}

/// Extract an archive to the destination directory
pub fn extract_archive(archive: &Path, dest: &Path) -> ModResult<()> {
    std::fs::create_dir_all(dest)?;

    let format = match ArchiveFormat::from_path(archive) {
        ArchiveFormat::Unknown => ArchiveFormat::sniff(archive)?,
        known => known,
    };

    tracing::debug!("Extracting {} ({:?}) to {}", archive.display(), format, dest.display());
    match format {
        ArchiveFormat::Zip => extract_zip(archive, dest),
        ArchiveFormat::SevenZip => extract_7z(archive, dest),
        ArchiveFormat::Rar => extract_rar(archive, dest),
        ArchiveFormat::Unknown => Err(ModError::Archive(format!(
            "Unknown archive format: {}",
            archive.display()
        ))),
    }
}

fn extract_zip(archive: &Path, dest: &Path) -> ModResult<()> {
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = sanitize_path(entry.name());
        if relative.is_empty() {
            continue;
        }
        let outpath = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = std::fs::File::create(&outpath)?;
            std::io::copy(&mut entry, &mut outfile)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
                }
            }
        }
    }

    Ok(())
}

fn extract_7z(archive: &Path, dest: &Path) -> ModResult<()> {
    sevenz_rust::decompress_file(archive, dest)
        .map_err(|e| ModError::Archive(format!("Failed to extract 7z archive: {}", e)))
}

fn extract_rar(archive: &Path, dest: &Path) -> ModResult<()> {
    let output = std::process::Command::new("unrar")
        .args(["x", "-o+", "-y"])
        .arg(archive)
        .arg(dest)
        .output();

    match output {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => Err(ModError::Archive(format!(
            "unrar failed: {}",
            String::from_utf8_lossy(&out.stderr)
        ))),
        Err(_) => Err(ModError::Archive(
            "RAR extraction requires 'unrar' to be installed.".to_string(),
        )),
    }
}

/// Pack the contents of `source_dir` into a zip file at `dest`.
///
/// Entries are stored relative to `source_dir` with `/` separators. Files for
/// which `skip` returns true are left out.
pub fn create_archive(
    source_dir: &Path,
    dest: &Path,
    skip: impl Fn(&Path) -> bool,
) -> ModResult<usize> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = std::fs::File::create(dest)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut files = 0;
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if path == dest {
            continue;
        }
        let Ok(relative) = path.strip_prefix(source_dir) else {
            continue;
        };
        if relative.as_os_str().is_empty() || skip(relative) {
            continue;
        }

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            writer.write_all(&std::fs::read(path)?)?;
            files += 1;
        }
    }

    writer.finish()?;
    Ok(files)
}

/// Locate the folder holding `metadata_file` in an extracted archive.
///
/// Archives either carry the file at the top level or wrap everything in a
/// single folder.
pub fn find_mod_root(extracted: &Path, metadata_file: &str) -> ModResult<Option<PathBuf>> {
    if extracted.join(metadata_file).is_file() {
        return Ok(Some(extracted.to_path_buf()));
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(extracted)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        } else {
            return Ok(None);
        }
    }

    match dirs.as_slice() {
        [only] if only.join(metadata_file).is_file() => Ok(Some(only.clone())),
        _ => Ok(None),
    }
}

/// Sanitize path to prevent directory traversal
fn sanitize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect::<Vec<_>>()
        .join("/")
}
