//! Spellbook domain model.
//!
//! # Responsibility
//! - Define the user-created spell collection record.
//! - Provide known/prepared list editing helpers.
//!
//! # Invariants
//! - Editing helpers never introduce duplicate ids.
//! - Removing a spell also unprepares it.
//! - Referenced spell ids may dangle; readers skip them via
//!   [`Spellbook::resolve_spells`].

use super::spell::Spell;
use super::{require_id_and_name, Collection, Record, ValidationError};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spellbook {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Known spell ids, in insertion order.
    pub spells: Vec<String>,
    /// Prepared spell ids; intended to be a subset of `spells`.
    #[serde(default)]
    pub prepared_spells: Vec<String>,
}

impl Spellbook {
    /// Creates an empty spellbook with a generated id.
    ///
    /// Name and description are trimmed; a blank description is dropped.
    pub fn new(name: &str, description: Option<&str>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, description)
    }

    /// Creates an empty spellbook with a caller-provided id.
    pub fn with_id(id: impl Into<String>, name: &str, description: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.trim().to_string(),
            description: description
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            spells: Vec::new(),
            prepared_spells: Vec::new(),
        }
    }

    pub fn contains(&self, spell_id: &str) -> bool {
        self.spells.iter().any(|id| id == spell_id)
    }

    pub fn is_prepared(&self, spell_id: &str) -> bool {
        self.prepared_spells.iter().any(|id| id == spell_id)
    }

    /// Adds a known spell. Returns `false` when it was already present.
    pub fn add_spell(&mut self, spell_id: &str) -> bool {
        if self.contains(spell_id) {
            return false;
        }
        self.spells.push(spell_id.to_string());
        true
    }

    /// Removes a known spell and its prepared mark. Returns whether it was known.
    pub fn remove_spell(&mut self, spell_id: &str) -> bool {
        let before = self.spells.len();
        self.spells.retain(|id| id != spell_id);
        self.prepared_spells.retain(|id| id != spell_id);
        self.spells.len() != before
    }

    /// Flips the prepared mark and returns the new state.
    pub fn toggle_prepared(&mut self, spell_id: &str) -> bool {
        if self.is_prepared(spell_id) {
            self.prepared_spells.retain(|id| id != spell_id);
            false
        } else {
            self.prepared_spells.push(spell_id.to_string());
            true
        }
    }

    /// Prepares every given id not yet prepared, keeping existing order.
    pub fn prepare_all<'a>(&mut self, spell_ids: impl IntoIterator<Item = &'a str>) {
        for spell_id in spell_ids {
            if !self.is_prepared(spell_id) {
                self.prepared_spells.push(spell_id.to_string());
            }
        }
    }

    /// Removes every given id from both known and prepared lists.
    pub fn remove_all<'a>(&mut self, spell_ids: impl IntoIterator<Item = &'a str>) {
        for spell_id in spell_ids {
            self.remove_spell(spell_id);
        }
    }

    /// Known spells that still exist in `catalog`, in spellbook order.
    pub fn resolve_spells<'a>(&self, catalog: &'a [Spell]) -> Vec<&'a Spell> {
        let by_id: HashMap<&str, &Spell> = catalog
            .iter()
            .map(|spell| (spell.id.as_str(), spell))
            .collect();
        self.spells
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect()
    }
}

impl Record for Spellbook {
    const COLLECTION: Collection = Collection::Spellbooks;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_id_and_name(Self::COLLECTION, &self.id, &self.name)
    }

    fn index_columns(&self) -> Vec<(&'static str, Value)> {
        vec![("name", Value::Text(self.name.clone()))]
    }
}

#[cfg(test)]
mod tests {
    use super::Spellbook;
    use crate::model::spell::{Edition, Spell};

    #[test]
    fn new_trims_and_drops_blank_description() {
        let book = Spellbook::new("  Travel  ", Some("   "));
        assert_eq!(book.name, "Travel");
        assert_eq!(book.description, None);
        assert!(book.spells.is_empty());
        assert!(book.prepared_spells.is_empty());
    }

    #[test]
    fn add_spell_refuses_duplicates() {
        let mut book = Spellbook::with_id("b1", "Wizard", None);
        assert!(book.add_spell("fireball"));
        assert!(!book.add_spell("fireball"));
        assert_eq!(book.spells, vec!["fireball".to_string()]);
    }

    #[test]
    fn remove_spell_also_unprepares() {
        let mut book = Spellbook::with_id("b1", "Wizard", None);
        book.add_spell("shield");
        assert!(book.toggle_prepared("shield"));
        assert!(book.remove_spell("shield"));
        assert!(!book.is_prepared("shield"));
        assert!(!book.remove_spell("shield"));
    }

    #[test]
    fn toggle_prepared_round_trips() {
        let mut book = Spellbook::with_id("b1", "Wizard", None);
        book.add_spell("light");
        assert!(book.toggle_prepared("light"));
        assert!(!book.toggle_prepared("light"));
        assert!(book.prepared_spells.is_empty());
    }

    #[test]
    fn prepare_all_is_a_union() {
        let mut book = Spellbook::with_id("b1", "Wizard", None);
        book.prepared_spells = vec!["a".to_string()];
        book.prepare_all(["b", "a", "c"]);
        assert_eq!(book.prepared_spells, vec!["a", "b", "c"]);
    }

    #[test]
    fn resolve_spells_skips_dangling_ids() {
        let catalog = vec![
            Spell::with_id("light", "Light", 0, "Evocation", Edition::V2014),
            Spell::with_id("shield", "Shield", 1, "Abjuration", Edition::V2014),
        ];
        let mut book = Spellbook::with_id("b1", "Wizard", None);
        book.add_spell("shield");
        book.add_spell("gone");
        book.add_spell("light");

        let resolved: Vec<&str> = book
            .resolve_spells(&catalog)
            .into_iter()
            .map(|spell| spell.id.as_str())
            .collect();
        assert_eq!(resolved, vec!["shield", "light"]);
    }

    #[test]
    fn missing_prepared_spells_defaults_to_empty() {
        let book: Spellbook =
            serde_json::from_str(r#"{"id":"b1","name":"X","spells":["a"]}"#).unwrap();
        assert!(book.prepared_spells.is_empty());
        assert_eq!(book.description, None);
    }
}
