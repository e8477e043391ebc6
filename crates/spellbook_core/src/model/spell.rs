//! Spell domain model.
//!
//! # Responsibility
//! - Define the catalog/custom spell record and its wire shape.
//! - Provide helpers for user interaction state (favorite, last used).
//!
//! # Invariants
//! - `custom == false` for every catalog-derived spell.
//! - `last_used == 0` means the spell has never been used.
//! - `level` is within `0..=9` (0 is a cantrip).

use super::{require_id_and_name, Collection, Record, ValidationError};
use rusqlite::types::Value;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const MAX_SPELL_LEVEL: u8 = 9;

/// Rule-set revision a spell belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Edition {
    #[serde(rename = "2014")]
    V2014,
    #[serde(rename = "2024")]
    V2024,
}

impl Edition {
    pub const ALL: [Edition; 2] = [Edition::V2014, Edition::V2024];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V2014 => "2014",
            Self::V2024 => "2024",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "2014" => Some(Self::V2014),
            "2024" => Some(Self::V2024),
            _ => None,
        }
    }
}

impl Display for Edition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One spell, shipped by the catalog or authored by the user.
///
/// Serialized with camelCase keys; `custom`, `favorite` and `lastUsed`
/// default when absent or `null` so older exports and catalog feeds still
/// parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spell {
    pub id: String,
    pub name: String,
    pub level: u8,
    /// Free-form school name; compared case-insensitively by filters.
    pub school: String,
    /// Class names; order carries no meaning.
    pub classes: Vec<String>,
    pub casting_time: String,
    pub range: String,
    pub components: String,
    pub duration: String,
    pub description: String,
    pub edition: Edition,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub favorite: bool,
    /// Unix epoch milliseconds of the last use, `0` when never used.
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_used: i64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Spell {
    /// Creates a spell with a caller-provided id and empty text fields.
    ///
    /// The result is catalog-shaped (`custom == false`).
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        level: u8,
        school: impl Into<String>,
        edition: Edition,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
            school: school.into(),
            classes: Vec::new(),
            casting_time: String::new(),
            range: String::new(),
            components: String::new(),
            duration: String::new(),
            description: String::new(),
            edition,
            custom: false,
            favorite: false,
            last_used: 0,
        }
    }

    /// Creates a user-authored spell with a generated id.
    pub fn new_custom(
        name: impl Into<String>,
        level: u8,
        school: impl Into<String>,
        edition: Edition,
    ) -> Self {
        let mut spell = Self::with_id(Uuid::new_v4().to_string(), name, level, school, edition);
        spell.custom = true;
        spell
    }

    pub fn set_favorite(&mut self, favorite: bool) {
        self.favorite = favorite;
    }

    /// Records a use at `now_ms`.
    pub fn mark_used(&mut self, now_ms: i64) {
        self.last_used = now_ms;
    }

    pub fn was_used(&self) -> bool {
        self.last_used > 0
    }

    pub fn is_ritual(&self) -> bool {
        self.casting_time.to_lowercase().contains("ritual")
    }

    pub fn requires_concentration(&self) -> bool {
        self.duration.to_lowercase().contains("concentration")
    }
}

impl Record for Spell {
    const COLLECTION: Collection = Collection::Spells;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_id_and_name(Self::COLLECTION, &self.id, &self.name)?;
        if self.level > MAX_SPELL_LEVEL {
            return Err(ValidationError::LevelOutOfRange {
                id: self.id.clone(),
                level: self.level,
            });
        }
        if self.last_used < 0 {
            return Err(ValidationError::NegativeLastUsed {
                id: self.id.clone(),
                last_used: self.last_used,
            });
        }
        Ok(())
    }

    fn index_columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::Text(self.name.clone())),
            ("level", Value::Integer(i64::from(self.level))),
            ("school", Value::Text(self.school.clone())),
            ("edition", Value::Text(self.edition.as_str().to_string())),
            ("custom", Value::Integer(i64::from(self.custom))),
            ("favorite", Value::Integer(i64::from(self.favorite))),
            ("last_used", Value::Integer(self.last_used)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{Edition, Spell};
    use crate::model::{Record, ValidationError};

    #[test]
    fn deserialize_defaults_user_state() {
        let spell: Spell = serde_json::from_str(
            r#"{
                "id": "fireball",
                "name": "Fireball",
                "level": 3,
                "school": "Evocation",
                "classes": ["Wizard", "Sorcerer"],
                "castingTime": "1 action",
                "range": "150 feet",
                "components": "V, S, M",
                "duration": "Instantaneous",
                "description": "A bright streak flashes.",
                "edition": "2014"
            }"#,
        )
        .unwrap();

        assert_eq!(spell.edition, Edition::V2014);
        assert!(!spell.custom);
        assert!(!spell.favorite);
        assert_eq!(spell.last_used, 0);
    }

    #[test]
    fn null_user_state_reads_as_default() {
        let spell: Spell = serde_json::from_str(
            r#"{"id":"shield","name":"Shield","level":1,"school":"Abjuration","classes":[],
                "castingTime":"1 reaction","range":"Self","components":"V, S",
                "duration":"1 round","description":"","edition":"2024",
                "custom":null,"favorite":null,"lastUsed":null}"#,
        )
        .unwrap();

        assert!(!spell.custom);
        assert!(!spell.favorite);
        assert_eq!(spell.last_used, 0);
    }

    #[test]
    fn unknown_edition_is_rejected() {
        let result = serde_json::from_str::<Edition>(r#""2020""#);
        assert!(result.is_err());
        assert_eq!(Edition::parse(" 2024 "), Some(Edition::V2024));
    }

    #[test]
    fn serializes_camel_case_keys() {
        let mut spell = Spell::with_id("shield", "Shield", 1, "Abjuration", Edition::V2024);
        spell.casting_time = "1 reaction".to_string();
        spell.mark_used(42);

        let value = serde_json::to_value(&spell).unwrap();
        assert_eq!(value["castingTime"], "1 reaction");
        assert_eq!(value["lastUsed"], 42);
        assert_eq!(value["edition"], "2024");
    }

    #[test]
    fn new_custom_generates_unique_ids() {
        let first = Spell::new_custom("Glitter", 0, "Illusion", Edition::V2024);
        let second = Spell::new_custom("Glitter", 0, "Illusion", Edition::V2024);
        assert!(first.custom);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn validate_rejects_level_above_nine() {
        let spell = Spell::with_id("wish+", "Wish+", 10, "Conjuration", Edition::V2014);
        assert_eq!(
            spell.validate(),
            Err(ValidationError::LevelOutOfRange {
                id: "wish+".to_string(),
                level: 10
            })
        );
    }

    #[test]
    fn ritual_and_concentration_are_case_insensitive() {
        let mut spell = Spell::with_id("detect", "Detect Magic", 1, "Divination", Edition::V2014);
        spell.casting_time = "1 action (Ritual)".to_string();
        spell.duration = "Concentration, up to 10 minutes".to_string();
        assert!(spell.is_ritual());
        assert!(spell.requires_concentration());
    }
}
