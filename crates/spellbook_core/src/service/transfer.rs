//! Export/import JSON document shape.
//!
//! # Invariants
//! - Export carries custom spells only, plus every spellbook and profile.
//! - Import defaults missing `favorite`/`lastUsed`/`custom` on spells.
//! - A document that is not a JSON object of the known keys is rejected as a
//!   whole before any write.

use crate::model::profile::UserProfile;
use crate::model::spell::Spell;
use crate::model::spellbook::Spellbook;
use crate::model::Record;
use serde::{Deserialize, Serialize};

/// Document written by export.
#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub spells: Vec<Spell>,
    pub spellbooks: Vec<Spellbook>,
    pub profiles: Vec<UserProfile>,
}

impl ExportDocument {
    /// Builds the export, keeping only custom spells.
    pub fn new(spells: Vec<Spell>, spellbooks: Vec<Spellbook>, profiles: Vec<UserProfile>) -> Self {
        Self {
            spells: spells.into_iter().filter(|spell| spell.custom).collect(),
            spellbooks,
            profiles,
        }
    }

    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Document accepted by import. Absent keys leave that collection alone.
#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub spells: Option<Vec<Spell>>,
    #[serde(default)]
    pub spellbooks: Option<Vec<Spellbook>>,
    #[serde(default)]
    pub profiles: Option<Vec<UserProfile>>,
}

impl ImportDocument {
    /// Parses and validates an import payload.
    ///
    /// Returns a human-readable reason on failure.
    pub fn parse(text: &str) -> Result<Self, String> {
        let document: Self = serde_json::from_str(text)
            .map_err(|err| format!("not a valid import document: {err}"))?;
        validate_all(document.spells.as_deref())?;
        validate_all(document.spellbooks.as_deref())?;
        validate_all(document.profiles.as_deref())?;
        Ok(document)
    }

    pub fn record_count(&self) -> usize {
        self.spells.as_ref().map_or(0, Vec::len)
            + self.spellbooks.as_ref().map_or(0, Vec::len)
            + self.profiles.as_ref().map_or(0, Vec::len)
    }
}

fn validate_all<R: Record>(records: Option<&[R]>) -> Result<(), String> {
    for record in records.unwrap_or_default() {
        record.validate().map_err(|err| err.to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ExportDocument, ImportDocument};
    use crate::model::spell::{Edition, Spell};

    #[test]
    fn export_keeps_only_custom_spells() {
        let catalog = Spell::with_id("light", "Light", 0, "Evocation", Edition::V2014);
        let custom = Spell::new_custom("Glitter", 0, "Illusion", Edition::V2024);
        let custom_id = custom.id.clone();

        let document = ExportDocument::new(vec![catalog, custom], Vec::new(), Vec::new());
        assert_eq!(document.spells.len(), 1);
        assert_eq!(document.spells[0].id, custom_id);
    }

    #[test]
    fn export_is_pretty_printed_with_three_keys() {
        let text = ExportDocument::new(Vec::new(), Vec::new(), Vec::new())
            .to_pretty_json()
            .unwrap();
        assert!(text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn parse_accepts_partial_documents() {
        let document = ImportDocument::parse(r#"{"profiles":[{"id":"p1","name":"Ana"}]}"#).unwrap();
        assert_eq!(document.spells, None);
        assert_eq!(document.spellbooks, None);
        assert_eq!(document.record_count(), 1);
    }

    #[test]
    fn parse_rejects_non_json_and_wrong_shapes() {
        assert!(ImportDocument::parse("definitely not json").is_err());
        assert!(ImportDocument::parse("[1, 2, 3]").is_err());
        assert!(ImportDocument::parse(r#"{"spellbooks":[{"id":"b1"}]}"#).is_err());
    }

    #[test]
    fn parse_rejects_invalid_records() {
        let err = ImportDocument::parse(r#"{"profiles":[{"id":" ","name":"Ana"}]}"#).unwrap_err();
        assert!(err.contains("blank"));
    }
}
