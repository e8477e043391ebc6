//! Per-spellbook view over resolved spells.

use crate::model::spell::Spell;
use crate::model::spellbook::Spellbook;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreparedFilter {
    #[default]
    All,
    Prepared,
    /// Known but not prepared.
    Known,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpellbookView {
    pub level: Option<u8>,
    pub prepared: PreparedFilter,
}

impl SpellbookView {
    /// View used while playing: prepared spells only.
    pub fn session() -> Self {
        Self {
            level: None,
            prepared: PreparedFilter::Prepared,
        }
    }

    /// Spellbook spells present in `catalog` that pass this view.
    pub fn visible<'a>(&self, spellbook: &Spellbook, catalog: &'a [Spell]) -> Vec<&'a Spell> {
        spellbook
            .resolve_spells(catalog)
            .into_iter()
            .filter(|spell| self.level.map_or(true, |level| spell.level == level))
            .filter(|spell| match self.prepared {
                PreparedFilter::All => true,
                PreparedFilter::Prepared => spellbook.is_prepared(&spell.id),
                PreparedFilter::Known => !spellbook.is_prepared(&spell.id),
            })
            .collect()
    }

    /// Ids of resolved spells at this view's level; empty without a level.
    pub fn level_ids<'a>(&self, spellbook: &Spellbook, catalog: &'a [Spell]) -> Vec<&'a str> {
        let Some(level) = self.level else {
            return Vec::new();
        };
        spellbook
            .resolve_spells(catalog)
            .into_iter()
            .filter(|spell| spell.level == level)
            .map(|spell| spell.id.as_str())
            .collect()
    }
}

/// Prepared spells that still resolve in `catalog`.
pub fn prepared_count(spellbook: &Spellbook, catalog: &[Spell]) -> usize {
    spellbook
        .resolve_spells(catalog)
        .into_iter()
        .filter(|spell| spellbook.is_prepared(&spell.id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::{prepared_count, PreparedFilter, SpellbookView};
    use crate::model::spell::{Edition, Spell};
    use crate::model::spellbook::Spellbook;

    fn fixture() -> (Spellbook, Vec<Spell>) {
        let catalog = vec![
            Spell::with_id("light", "Light", 0, "Evocation", Edition::V2014),
            Spell::with_id("shield", "Shield", 1, "Abjuration", Edition::V2014),
            Spell::with_id("sleep", "Sleep", 1, "Enchantment", Edition::V2014),
        ];
        let mut book = Spellbook::with_id("b1", "Wizard", None);
        for id in ["light", "shield", "sleep", "dangling"] {
            book.add_spell(id);
        }
        book.toggle_prepared("shield");
        book.toggle_prepared("dangling");
        (book, catalog)
    }

    fn ids(spells: Vec<&Spell>) -> Vec<&str> {
        spells.into_iter().map(|spell| spell.id.as_str()).collect()
    }

    #[test]
    fn prepared_and_known_partition_the_book() {
        let (book, catalog) = fixture();
        let prepared = SpellbookView::session().visible(&book, &catalog);
        assert_eq!(ids(prepared), vec!["shield"]);

        let known = SpellbookView {
            prepared: PreparedFilter::Known,
            ..SpellbookView::default()
        };
        assert_eq!(ids(known.visible(&book, &catalog)), vec!["light", "sleep"]);
    }

    #[test]
    fn prepared_count_ignores_dangling_ids() {
        let (book, catalog) = fixture();
        assert_eq!(prepared_count(&book, &catalog), 1);
    }

    #[test]
    fn level_ids_feed_bulk_prepare_and_remove() {
        let (mut book, catalog) = fixture();
        let view = SpellbookView {
            level: Some(1),
            ..SpellbookView::default()
        };
        let level_ids: Vec<String> = view
            .level_ids(&book, &catalog)
            .into_iter()
            .map(str::to_string)
            .collect();
        assert_eq!(level_ids, vec!["shield", "sleep"]);

        book.prepare_all(level_ids.iter().map(String::as_str));
        assert!(book.is_prepared("sleep"));

        book.remove_all(level_ids.iter().map(String::as_str));
        assert_eq!(book.spells, vec!["light", "dangling"]);
        assert_eq!(book.prepared_spells, vec!["dangling"]);
        assert!(SpellbookView::default().level_ids(&book, &catalog).is_empty());
    }
}
