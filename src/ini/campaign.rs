//! Campaign list embedded in the game's localization file
//!
//! Each entry of the campaign section looks like
//! `CampaignList[0]=(CampaignName="..",CampaignPrefix="..",...)`.

use super::{ConfigDocument, Item};
use crate::error::{ModError, ModResult};
use std::fmt;
use std::path::PathBuf;

/// A selectable campaign in the in-game campaign menu
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Campaign {
    pub name: String,
    /// Soft key; `Main` is the base game's own campaign
    pub prefix: String,
    pub description: String,
    pub base_level: String,
    pub game_type: String,
}

impl Campaign {
    /// Parse a `(Key="value",...)` tuple
    pub fn parse(payload: &str) -> ModResult<Self> {
        let inner = payload
            .strip_prefix('(')
            .and_then(|p| p.strip_suffix(')'))
            .ok_or_else(|| {
                ModError::Format("Campaign payload was not in expected format.".to_string())
            })?;

        let mut campaign = Campaign::default();
        for token in inner.split("\",").filter(|t| !t.is_empty()) {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            let value = value.replace('"', "");
            match key {
                "CampaignName" => campaign.name = value,
                "CampaignPrefix" => campaign.prefix = value,
                "CampaignDescription" => campaign.description = value,
                "CampaignBaseLevel" => campaign.base_level = value,
                "CampaignGameType" => campaign.game_type = value,
                _ => {}
            }
        }
        Ok(campaign)
    }
}

/// Make a value safe to embed between double quotes on a single line
fn scrub(value: &str) -> String {
    value.replace('"', "''").replace('\r', "").replace('\n', " ")
}

impl fmt::Display for Campaign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(CampaignName=\"{}\",CampaignPrefix=\"{}\",CampaignDescription=\"{}\",CampaignBaseLevel=\"{}\",CampaignGameType=\"{}\")",
            scrub(&self.name),
            scrub(&self.prefix),
            scrub(&self.description),
            scrub(&self.base_level),
            scrub(&self.game_type),
        )
    }
}

/// The campaign section of a localization document
#[derive(Debug, Clone)]
pub struct CampaignDocument {
    pub campaigns: Vec<Campaign>,
    section: String,
    document: ConfigDocument,
}

impl CampaignDocument {
    /// Load campaigns from `section` of the document at `path`
    pub fn load(path: impl Into<PathBuf>, section: &str) -> ModResult<Self> {
        let document = ConfigDocument::load(path)?;
        let campaigns = match document.find_section(section) {
            Some(s) => s
                .items
                .iter()
                .map(|item| Campaign::parse(&item.value))
                .collect::<ModResult<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            campaigns,
            section: section.to_string(),
            document,
        })
    }

    /// Rewrite the campaign section from `campaigns` and save the whole document
    pub fn save(&mut self) -> ModResult<()> {
        let name = self.section.clone();
        let items = self
            .campaigns
            .iter()
            .enumerate()
            .map(|(i, c)| Item::new(format!("CampaignList[{}]", i), c.to_string()))
            .collect();

        match self.document.find_section_mut(&name) {
            Some(section) => section.items = items,
            None => {
                let mut section = super::Section::new(name);
                section.items = items;
                self.document.sections.push(section);
            }
        }

        self.document.save()
    }

    /// Keep base-game campaigns (by prefix, in file order) and append `extra`.
    ///
    /// Returns the prefixes that were expected but not found.
    pub fn merge_enabled_campaigns(
        &mut self,
        base_prefixes: &[String],
        extra: impl IntoIterator<Item = Campaign>,
    ) -> Vec<String> {
        let missing: Vec<String> = base_prefixes
            .iter()
            .filter(|p| !self.campaigns.iter().any(|c| &c.prefix == *p))
            .cloned()
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                "Campaign list does not contain the base campaigns: {}",
                missing.join(", ")
            );
        }

        self.campaigns.retain(|c| base_prefixes.contains(&c.prefix));
        self.campaigns.extend(extra);
        missing
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = r#"(CampaignName="Main Campaign",CampaignPrefix="Main",CampaignDescription="The story.",CampaignBaseLevel="SRV-Start",CampaignGameType="RPGTacGame.RPGTacGame")"#;

    fn sample() -> Campaign {
        Campaign {
            name: "Jungle Run".to_string(),
            prefix: "JR".to_string(),
            description: "A \"short\" one.\r\nTwo lines.".to_string(),
            base_level: "JR-Start".to_string(),
            game_type: "JR.GameInfo".to_string(),
        }
    }

    #[test]
    fn parse_reads_all_fields() {
        let campaign = Campaign::parse(MAIN).unwrap();
        assert_eq!(campaign.name, "Main Campaign");
        assert_eq!(campaign.prefix, "Main");
        assert_eq!(campaign.description, "The story.");
        assert_eq!(campaign.base_level, "SRV-Start");
        assert_eq!(campaign.game_type, "RPGTacGame.RPGTacGame");
    }

    #[test]
    fn parse_rejects_unwrapped_payload() {
        assert!(matches!(
            Campaign::parse("CampaignName=\"x\""),
            Err(ModError::Format(_))
        ));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let campaign = Campaign::parse(r#"(Other="1",CampaignPrefix="P")"#).unwrap();
        assert_eq!(campaign.prefix, "P");
        assert_eq!(campaign.name, "");
    }

    #[test]
    fn display_scrubs_values() {
        let text = sample().to_string();
        assert!(text.contains("CampaignDescription=\"A ''short'' one. Two lines.\""));
        assert!(!text.contains('\n'));

        let reparsed = Campaign::parse(&text).unwrap();
        assert_eq!(reparsed.description, "A ''short'' one. Two lines.");
        assert_eq!(reparsed.prefix, "JR");
    }

    #[test]
    fn formatted_campaigns_parse_back_unchanged() {
        let words = ["Main", "Jungle Run", "Act 2, Part 1", "x", "RPGTacGame.RPGTacGame"];
        for i in 0..words.len() {
            let pick = |offset: usize| words[(i + offset) % words.len()].to_string();
            let campaign = Campaign {
                name: pick(0),
                prefix: format!("P{}", i),
                description: pick(1),
                base_level: format!("{}-Start", pick(2)),
                game_type: pick(3),
            };
            assert_eq!(Campaign::parse(&campaign.to_string()).unwrap(), campaign);
        }
        let empty = Campaign::default();
        assert_eq!(Campaign::parse(&empty.to_string()).unwrap(), empty);
    }

    #[test]
    fn document_round_trip_reindexes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SRVGame.int");
        std::fs::write(
            &path,
            format!(
                "[Other]\r\nKey=Value\r\n[RPGTacCampaignLoader]\r\nCampaignList[4]={}\r\n",
                MAIN
            ),
        )
        .unwrap();

        let mut doc = CampaignDocument::load(&path, "RPGTacCampaignLoader").unwrap();
        assert_eq!(doc.campaigns.len(), 1);
        doc.campaigns.push(sample());
        doc.save().unwrap();

        let reloaded = ConfigDocument::load(&path).unwrap();
        assert_eq!(reloaded.find_item("Other", "Key").unwrap().value, "Value");
        let section = reloaded.find_section("RPGTacCampaignLoader").unwrap();
        assert_eq!(section.items[0].key, "CampaignList[0]");
        assert_eq!(section.items[1].key, "CampaignList[1]");

        let again = CampaignDocument::load(&path, "RPGTacCampaignLoader").unwrap();
        assert_eq!(again.campaigns[0], Campaign::parse(MAIN).unwrap());
        assert_eq!(again.campaigns[1].name, "Jungle Run");
    }

    #[test]
    fn save_creates_missing_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SRVGame.int");
        std::fs::write(&path, "[Other]\r\nKey=Value\r\n").unwrap();

        let mut doc = CampaignDocument::load(&path, "RPGTacCampaignLoader").unwrap();
        assert!(doc.campaigns.is_empty());
        doc.campaigns.push(sample());
        doc.save().unwrap();

        let again = CampaignDocument::load(&path, "RPGTacCampaignLoader").unwrap();
        assert_eq!(again.campaigns.len(), 1);
    }

    #[test]
    fn merge_keeps_base_campaigns_then_appends() {
        let srv = Campaign {
            prefix: "SRV".to_string(),
            ..Campaign::default()
        };
        let stale = Campaign {
            prefix: "Old".to_string(),
            ..Campaign::default()
        };
        let mut doc = CampaignDocument {
            campaigns: vec![Campaign::parse(MAIN).unwrap(), stale, srv],
            section: "RPGTacCampaignLoader".to_string(),
            document: ConfigDocument::default(),
        };

        let base = vec!["Main".to_string(), "SRV".to_string()];
        let missing = doc.merge_enabled_campaigns(&base, vec![sample()]);
        assert!(missing.is_empty());

        let prefixes: Vec<_> = doc.campaigns.iter().map(|c| c.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["Main", "SRV", "JR"]);

        doc.campaigns.retain(|c| c.prefix != "SRV");
        assert_eq!(doc.merge_enabled_campaigns(&base, Vec::new()), vec!["SRV".to_string()]);
    }
}
