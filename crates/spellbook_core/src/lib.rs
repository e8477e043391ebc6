//! Core storage and sync logic for the spellbook app.
//!
//! Owns the on-device spell/spellbook/profile store, its schema migrations,
//! catalog reconciliation and the last-updated change signal.

pub mod catalog;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod query;
pub mod repo;
pub mod service;

pub use catalog::{CatalogError, CatalogSource, DirectoryCatalogSource, ReconcileReport};
pub use config::{ConfigError, StoreConfig};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::profile::UserProfile;
pub use model::spell::{Edition, Spell};
pub use model::spellbook::Spellbook;
pub use model::{Collection, Record, ValidationError};
pub use notify::{Clock, ManualClock, ObserverId, SystemClock};
pub use query::{PreparedFilter, SpellFilter, SpellbookView};
pub use repo::collection_repo::{
    CollectionRepository, RepoError, RepoResult, SqliteCollectionRepository,
};
pub use service::store::{ImportSummary, SpellbookStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
