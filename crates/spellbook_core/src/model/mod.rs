//! Domain model for the spell catalog and user collections.
//!
//! # Responsibility
//! - Define the three persisted record shapes (spell, spellbook, profile).
//! - Describe how each record maps onto its storage collection.
//!
//! # Invariants
//! - Every record is identified by a non-empty string `id`, unique within
//!   its collection.
//! - Records are validated before every write and after every read.

use rusqlite::types::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod profile;
pub mod spell;
pub mod spellbook;

/// The three independent collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Spells,
    Spellbooks,
    Profiles,
}

impl Collection {
    /// Backing SQLite table name.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Spells => "spells",
            Self::Spellbooks => "spellbooks",
            Self::Profiles => "profiles",
        }
    }
}

impl Display for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Record-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyId(Collection),
    EmptyName {
        collection: Collection,
        id: String,
    },
    LevelOutOfRange {
        id: String,
        level: u8,
    },
    NegativeLastUsed {
        id: String,
        last_used: i64,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId(collection) => write!(f, "{collection} record id must not be blank"),
            Self::EmptyName { collection, id } => {
                write!(f, "{collection} record `{id}` must have a name")
            }
            Self::LevelOutOfRange { id, level } => {
                write!(f, "spell `{id}` has level {level}; expected 0..=9")
            }
            Self::NegativeLastUsed { id, last_used } => {
                write!(f, "spell `{id}` has negative lastUsed {last_used}")
            }
        }
    }
}

impl Error for ValidationError {}

/// A record persisted in one of the store collections.
///
/// Implementors are stored as a JSON body plus the projection columns
/// returned by [`Record::index_columns`].
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn validate(&self) -> Result<(), ValidationError>;

    /// Indexed projection columns besides `id` and `body`.
    ///
    /// Column names must be identical for every value of the type.
    fn index_columns(&self) -> Vec<(&'static str, Value)>;
}

pub(crate) fn require_id_and_name(
    collection: Collection,
    id: &str,
    name: &str,
) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyId(collection));
    }
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName {
            collection,
            id: id.to_string(),
        });
    }
    Ok(())
}
