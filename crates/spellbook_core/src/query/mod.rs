//! Read-side helpers over listed spells and spellbooks.
//!
//! Pure functions: callers list through the store, then filter here.

pub mod filter;
pub mod spellbook_view;

pub use filter::{favorite_spells, recent_spells, school_options, SpellFilter};
pub use spellbook_view::{prepared_count, PreparedFilter, SpellbookView};
