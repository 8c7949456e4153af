//! INI-style configuration documents read by the game engine
//!
//! The format is deliberately loose: `[Section]` headers, `key=value` items
//! (duplicate keys are separate entries) and `;` comment lines. Anything else
//! is dropped on load. Output always uses CRLF line endings.

pub mod campaign;

pub use campaign::{Campaign, CampaignDocument};

use crate::error::ModResult;
use std::fmt;
use std::path::{Path, PathBuf};

/// Byte encoding a document was read with; saving writes it back the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// Decode raw file bytes, sniffing a byte-order mark
    fn decode(bytes: &[u8]) -> (String, Self) {
        if bytes.starts_with(&[0xFF, 0xFE]) {
            let (decoded, _, had_errors) = encoding_rs::UTF_16LE.decode(bytes);
            if had_errors {
                tracing::warn!("UTF-16LE decoding had errors, some characters may be incorrect");
            }
            return (decoded.into_owned(), Self::Utf16Le);
        }
        if bytes.starts_with(&[0xFE, 0xFF]) {
            let (decoded, _, had_errors) = encoding_rs::UTF_16BE.decode(bytes);
            if had_errors {
                tracing::warn!("UTF-16BE decoding had errors, some characters may be incorrect");
            }
            return (decoded.into_owned(), Self::Utf16Be);
        }

        let has_bom = bytes.starts_with(&[0xEF, 0xBB, 0xBF]);
        let (decoded, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
        if had_errors {
            tracing::warn!("File is not valid UTF-8, using lossy conversion");
        }
        let encoding = if has_bom { Self::Utf8Bom } else { Self::Utf8 };
        (decoded.into_owned(), encoding)
    }

    fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Utf8Bom => {
                let mut bytes = vec![0xEF, 0xBB, 0xBF];
                bytes.extend_from_slice(text.as_bytes());
                bytes
            }
            Self::Utf16Le => [0xFF, 0xFE]
                .into_iter()
                .chain(text.encode_utf16().flat_map(u16::to_le_bytes))
                .collect(),
            Self::Utf16Be => [0xFE, 0xFF]
                .into_iter()
                .chain(text.encode_utf16().flat_map(u16::to_be_bytes))
                .collect(),
        }
    }
}

/// A single `key=value` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub value: String,
}

impl Item {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A named `[Section]` with its items and comment lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub items: Vec<Item>,
    /// Raw comment lines; written after the items
    pub comments: Vec<String>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn find_item(&self, key: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.key == key)
    }

    fn position_of(&self, key: &str, value: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|i| i.key == key && i.value == value)
    }
}

/// An in-memory INI document bound to a file path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    pub path: PathBuf,
    pub sections: Vec<Section>,
    pub encoding: TextEncoding,
}

impl ConfigDocument {
    /// Empty document that will be written to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Read a document from disk. A missing file gives an empty document.
    pub fn load(path: impl Into<PathBuf>) -> ModResult<Self> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!("{} does not exist, starting empty", path.display());
            return Ok(Self::new(path));
        }

        let bytes = std::fs::read(&path)?;
        let (text, encoding) = TextEncoding::decode(&bytes);
        let mut doc = Self::parse(&text);
        doc.path = path;
        doc.encoding = encoding;
        Ok(doc)
    }

    /// Parse document text. The result has no path.
    pub fn parse(text: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();

            if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
                sections.push(Section::new(&trimmed[1..trimmed.len() - 1]));
                continue;
            }

            // Lines before the first header have nowhere to go
            let Some(section) = sections.last_mut() else {
                continue;
            };

            if trimmed.starts_with(';') {
                section.comments.push(line.to_string());
            } else if let Some((key, value)) = trimmed.split_once('=') {
                section.items.push(Item::new(key, value));
            }
        }

        Self {
            sections,
            ..Default::default()
        }
    }

    /// Write back to the path the document was loaded from
    pub fn save(&self) -> ModResult<()> {
        self.save_to(&self.path)
    }

    pub fn save_to(&self, path: &Path) -> ModResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.encoding.encode(&self.to_string()))?;
        tracing::debug!("Saved {}", path.display());
        Ok(())
    }

    pub fn find_section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn find_section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// First item with `key` in `section`
    pub fn find_item(&self, section: &str, key: &str) -> Option<&Item> {
        self.find_section(section)?.find_item(key)
    }

    pub fn find_item_mut(&mut self, section: &str, key: &str) -> Option<&mut Item> {
        self.find_section_mut(section)?
            .items
            .iter_mut()
            .find(|i| i.key == key)
    }

    /// True if an item with exactly this key and value exists in `section`
    pub fn is_included(&self, section: &str, key: &str, value: &str) -> bool {
        self.find_section(section)
            .and_then(|s| s.position_of(key, value))
            .is_some()
    }

    /// Make sure `key=value` is present in `section`, creating the section if needed
    pub fn include(&mut self, section: &str, key: &str, value: &str) {
        let section = self.section_or_insert(section);
        if section.position_of(key, value).is_none() {
            section.items.push(Item::new(key, value));
        }
    }

    /// Remove the first `key=value` item from `section`, if present
    pub fn exclude(&mut self, section: &str, key: &str, value: &str) {
        if let Some(section) = self.find_section_mut(section) {
            if let Some(index) = section.position_of(key, value) {
                section.items.remove(index);
            }
        }
    }

    /// Replace the value of the first `key` item in `section`, or append one
    pub fn set_value(&mut self, section: &str, key: &str, value: &str) {
        let section = self.section_or_insert(section);
        match section.items.iter_mut().find(|i| i.key == key) {
            Some(item) => item.value = value.to_string(),
            None => section.items.push(Item::new(key, value)),
        }
    }

    fn section_or_insert(&mut self, name: &str) -> &mut Section {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            write!(f, "\r\n[{}]\r\n", section.name)?;
            for item in &section.items {
                write!(f, "{}={}\r\n", item.key, item.value)?;
            }
            for comment in &section.comments {
                write!(f, "{}\r\n", comment)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENGINE: &str = "\
; header comment is dropped
[Core.System]
Paths=..\\..\\Engine\\Content
Paths=..\\..\\SRVGame\\Content
ScriptPaths=..\\..\\SRVGame\\Script
; keep this comment
not an item

[URL]
Map=Entry.udk
Options==with=equals
";

    #[test]
    fn parse_keeps_duplicates_and_comments() {
        let doc = ConfigDocument::parse(ENGINE);
        assert_eq!(doc.sections.len(), 2);

        let core = doc.find_section("Core.System").unwrap();
        assert_eq!(core.items.len(), 3);
        assert_eq!(core.items[1], Item::new("Paths", r"..\..\SRVGame\Content"));
        assert_eq!(core.comments, vec!["; keep this comment".to_string()]);

        // split happens on the first '='
        assert_eq!(doc.find_item("URL", "Options").unwrap().value, "=with=equals");
    }

    #[test]
    fn display_uses_crlf_and_puts_comments_last() {
        let doc = ConfigDocument::parse("[A]\n; note\nx=1\n");
        assert_eq!(doc.to_string(), "\r\n[A]\r\nx=1\r\n; note\r\n");
    }

    #[test]
    fn parse_accepts_crlf_input() {
        let doc = ConfigDocument::parse("[A]\r\nx=1\r\n; c\r\n");
        assert_eq!(doc.find_item("A", "x").unwrap().value, "1");
        assert_eq!(doc.find_section("A").unwrap().comments, vec!["; c".to_string()]);
    }

    #[test]
    fn round_trip_preserves_semantics() {
        let doc = ConfigDocument::parse(ENGINE);
        let reparsed = ConfigDocument::parse(&doc.to_string());
        assert_eq!(doc.sections, reparsed.sections);
    }

    #[test]
    fn include_and_exclude_are_idempotent() {
        let mut doc = ConfigDocument::parse(ENGINE);

        doc.include("Core.System", "Paths", r"..\..\Mods\x");
        doc.include("Core.System", "Paths", r"..\..\Mods\x");
        let count = doc.find_section("Core.System").unwrap().items.len();
        assert_eq!(count, 4);
        assert!(doc.is_included("Core.System", "Paths", r"..\..\Mods\x"));

        doc.exclude("Core.System", "Paths", r"..\..\Mods\x");
        doc.exclude("Core.System", "Paths", r"..\..\Mods\x");
        assert_eq!(doc.find_section("Core.System").unwrap().items.len(), 3);
        assert!(!doc.is_included("Core.System", "Paths", r"..\..\Mods\x"));
    }

    #[test]
    fn include_creates_missing_section() {
        let mut doc = ConfigDocument::default();
        doc.include("New", "k", "v");
        assert!(doc.is_included("New", "k", "v"));
        doc.exclude("Missing", "k", "v");
        assert_eq!(doc.sections.len(), 1);
    }

    #[test]
    fn set_value_replaces_first_match_or_appends() {
        let mut doc = ConfigDocument::parse("[M]\nMutatorsLoaded=A\nMutatorsLoaded=B\n");
        doc.set_value("M", "MutatorsLoaded", "C");
        let section = doc.find_section("M").unwrap();
        assert_eq!(section.items[0].value, "C");
        assert_eq!(section.items[1].value, "B");

        doc.set_value("Other", "MutatorsLoaded", "D");
        assert_eq!(doc.find_item("Other", "MutatorsLoaded").unwrap().value, "D");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ConfigDocument::load(dir.path().join("absent.ini")).unwrap();
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Config/SRVMods.ini");

        let mut doc = ConfigDocument::new(&path);
        doc.set_value("SRVGame.RPGTacMutatorLoader", "MutatorsLoaded", "X.Mutator");
        doc.save().unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("MutatorsLoaded=X.Mutator\r\n"));

        let loaded = ConfigDocument::load(&path).unwrap();
        assert_eq!(loaded.sections, doc.sections);
        assert_eq!(loaded.encoding, TextEncoding::Utf8);
    }

    #[test]
    fn utf16_files_are_written_back_as_utf16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SRVGame.int");
        let text = "[RPGTacCampaignLoader]\r\nCampaignList[0]=(CampaignName=\"Main\")\r\n";
        std::fs::write(&path, TextEncoding::Utf16Le.encode(text)).unwrap();

        let mut doc = ConfigDocument::load(&path).unwrap();
        assert_eq!(doc.encoding, TextEncoding::Utf16Le);
        assert_eq!(
            doc.find_item("RPGTacCampaignLoader", "CampaignList[0]").unwrap().value,
            "(CampaignName=\"Main\")"
        );

        doc.set_value("RPGTacCampaignLoader", "CampaignList[1]", "()");
        doc.save().unwrap();
        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(&[0xFF, 0xFE]));
        assert_eq!(ConfigDocument::load(&path).unwrap().sections, doc.sections);
    }

    #[test]
    fn utf8_bom_is_stripped_and_restored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bom.ini");
        std::fs::write(&path, b"\xEF\xBB\xBF[A]\r\nx=1\r\n").unwrap();

        let doc = ConfigDocument::load(&path).unwrap();
        assert_eq!(doc.encoding, TextEncoding::Utf8Bom);
        assert_eq!(doc.sections[0].name, "A");

        doc.save().unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(&[0xEF, 0xBB, 0xBF]));
    }
}
