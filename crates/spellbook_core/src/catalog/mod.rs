//! External spell catalog feeds and reconciliation with stored user state.
//!
//! # Responsibility
//! - Read the per-edition catalog feeds.
//! - Merge candidates with stored spells without clobbering user state.
//!
//! # Invariants
//! - Both feeds are fully read and validated before anything is written.
//! - Reconciliation only upserts candidates; it never deletes.
//! - Custom spells are never modified by reconciliation.

pub mod reconcile;
pub mod source;

pub use reconcile::{merge_catalog_spell, reconcile, ReconcilePlan, ReconcileReport};
pub use source::{fetch_all, CatalogError, CatalogSource, DirectoryCatalogSource};
