//! Spell list filtering and dashboard shortlists.

use crate::model::spell::{Edition, Spell};
use std::collections::BTreeSet;

/// Library filter. Default matches every spell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpellFilter {
    pub edition: Option<Edition>,
    pub level: Option<u8>,
    /// Accepted schools, compared case-insensitively. Empty accepts all.
    pub schools: Vec<String>,
    pub ritual_only: bool,
    pub concentration_only: bool,
    pub favorites_only: bool,
    /// Matched against name, school and classes.
    pub search: Option<String>,
}

impl SpellFilter {
    pub fn matches(&self, spell: &Spell) -> bool {
        if self.edition.is_some_and(|edition| spell.edition != edition) {
            return false;
        }
        if self.level.is_some_and(|level| spell.level != level) {
            return false;
        }
        if !self.schools.is_empty() {
            let school = spell.school.to_lowercase();
            if !self
                .schools
                .iter()
                .any(|accepted| accepted.to_lowercase() == school)
            {
                return false;
            }
        }
        if self.ritual_only && !spell.is_ritual() {
            return false;
        }
        if self.concentration_only && !spell.requires_concentration() {
            return false;
        }
        if self.favorites_only && !spell.favorite {
            return false;
        }

        let term = self
            .search
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_lowercase();
        if term.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {}",
            spell.name,
            spell.school,
            spell.classes.join(" ")
        )
        .to_lowercase();
        haystack.contains(&term)
    }

    pub fn apply<'a>(&self, spells: &'a [Spell]) -> Vec<&'a Spell> {
        spells.iter().filter(|spell| self.matches(spell)).collect()
    }

    /// Whether any non-edition, non-search criterion is set.
    pub fn has_active_criteria(&self) -> bool {
        self.level.is_some()
            || !self.schools.is_empty()
            || self.ritual_only
            || self.concentration_only
            || self.favorites_only
    }
}

/// Distinct lowercase school names, sorted.
pub fn school_options(spells: &[Spell]) -> Vec<String> {
    spells
        .iter()
        .map(|spell| spell.school.to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// First `limit` favorites in list order, optionally for one edition.
pub fn favorite_spells(spells: &[Spell], edition: Option<Edition>, limit: usize) -> Vec<&Spell> {
    spells
        .iter()
        .filter(|spell| edition.map_or(true, |edition| spell.edition == edition))
        .filter(|spell| spell.favorite)
        .take(limit)
        .collect()
}

/// Up to `limit` used spells, most recently used first.
pub fn recent_spells(spells: &[Spell], edition: Option<Edition>, limit: usize) -> Vec<&Spell> {
    let mut used: Vec<&Spell> = spells
        .iter()
        .filter(|spell| edition.map_or(true, |edition| spell.edition == edition))
        .filter(|spell| spell.was_used())
        .collect();
    used.sort_by(|a, b| b.last_used.cmp(&a.last_used));
    used.truncate(limit);
    used
}
