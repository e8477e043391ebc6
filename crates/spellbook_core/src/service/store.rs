//! Spellbook store: the single entry point for collaborators.
//!
//! # Responsibility
//! - Own the SQLite connection and change notifier for one store instance.
//! - Expose list/add/update/delete per collection, export/import and
//!   catalog loading.
//!
//! # Invariants
//! - The marker is written in the same transaction as the mutation it
//!   reports; observers hear about it only after commit.
//! - Failed operations leave all three collections as they were.
//! - `update_*` is an upsert; `delete_*` of an absent id is a no-op.
//! - Reads never touch the marker.

use crate::catalog::{fetch_all, reconcile, CatalogError, CatalogSource, ReconcileReport};
use crate::config::StoreConfig;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::profile::UserProfile;
use crate::model::spell::{Edition, Spell};
use crate::model::spellbook::Spellbook;
use crate::model::{Collection, Record, ValidationError};
use crate::notify::{current_marker, ChangeNotifier, Clock, ObserverId, SystemClock};
use crate::repo::collection_repo::{CollectionRepository, RepoError, SqliteCollectionRepository};
use crate::service::transfer::{ExportDocument, ImportDocument};
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed failure conditions surfaced to store callers.
#[derive(Debug)]
pub enum StoreError {
    /// Insert collided with an existing id.
    DuplicateKey { collection: Collection, id: String },
    /// Strict lookup target is absent.
    NotFound { collection: Collection, id: String },
    /// Import payload is not parseable or has the wrong shape.
    InvalidFormat(String),
    /// A catalog feed could not be read or parsed.
    CatalogUnavailable { edition: Edition, reason: String },
    Validation(ValidationError),
    Db(DbError),
    /// Persisted data could not be decoded.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey { collection, id } => {
                write!(f, "{collection} already contains id `{id}`")
            }
            Self::NotFound { collection, id } => write!(f, "{collection} has no id `{id}`"),
            Self::InvalidFormat(reason) => write!(f, "invalid import format: {reason}"),
            Self::CatalogUnavailable { edition, reason } => {
                write!(f, "{edition} catalog unavailable: {reason}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::Db(err) => Self::Db(err),
            RepoError::DuplicateKey { collection, id } => Self::DuplicateKey { collection, id },
            RepoError::NotFound { collection, id } => Self::NotFound { collection, id },
            RepoError::InvalidData(message) => Self::InvalidData(message),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<CatalogError> for StoreError {
    fn from(value: CatalogError) -> Self {
        Self::CatalogUnavailable {
            edition: value.edition(),
            reason: value.to_string(),
        }
    }
}

/// Counts of records written by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub spells: usize,
    pub spellbooks: usize,
    pub profiles: usize,
}

/// One opened spellbook store.
///
/// Single actor: callers finish one operation before starting a dependent
/// one (for example `load_catalog` before `list_spells`).
pub struct SpellbookStore {
    conn: Connection,
    notifier: ChangeNotifier,
}

impl SpellbookStore {
    /// Opens (creating and migrating as needed) a store file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::with_connection(open_db(path)?, Box::new(SystemClock)))
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::with_connection(open_db_in_memory()?, Box::new(SystemClock)))
    }

    /// Opens the store file named by `config.db_path`.
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        Self::open(&config.db_path)
    }

    /// Wraps an already-migrated connection with an explicit clock.
    pub fn with_connection(conn: Connection, clock: Box<dyn Clock>) -> Self {
        Self {
            conn,
            notifier: ChangeNotifier::new(clock),
        }
    }

    /// Flushes and closes the underlying connection.
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, err)| StoreError::from(err))?;
        info!("event=store_close module=store status=ok");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Registers an observer called with every new last-updated marker.
    pub fn subscribe(&mut self, observer: impl Fn(i64) + Send + 'static) -> ObserverId {
        self.notifier.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Last published marker, or `None` if nothing was ever mutated.
    pub fn current_marker(&self) -> StoreResult<Option<i64>> {
        Ok(current_marker(&self.conn)?)
    }

    /// Current time from the store clock, for `Spell::mark_used`.
    pub fn now_ms(&self) -> i64 {
        self.notifier.now_ms()
    }

    pub fn list_spells(&self) -> StoreResult<Vec<Spell>> {
        self.list()
    }

    pub fn add_spell(&mut self, spell: &Spell) -> StoreResult<()> {
        self.mutate::<Spell, _>("add_spell", |repo| repo.add(spell))
    }

    pub fn update_spell(&mut self, spell: &Spell) -> StoreResult<()> {
        self.mutate::<Spell, _>("update_spell", |repo| repo.put(spell))
    }

    pub fn delete_spell(&mut self, id: &str) -> StoreResult<()> {
        self.mutate::<Spell, _>("delete_spell", |repo| repo.delete(id).map(drop))
    }

    pub fn list_spellbooks(&self) -> StoreResult<Vec<Spellbook>> {
        self.list()
    }

    pub fn add_spellbook(&mut self, spellbook: &Spellbook) -> StoreResult<()> {
        self.mutate::<Spellbook, _>("add_spellbook", |repo| repo.add(spellbook))
    }

    pub fn update_spellbook(&mut self, spellbook: &Spellbook) -> StoreResult<()> {
        self.mutate::<Spellbook, _>("update_spellbook", |repo| repo.put(spellbook))
    }

    pub fn delete_spellbook(&mut self, id: &str) -> StoreResult<()> {
        self.mutate::<Spellbook, _>("delete_spellbook", |repo| repo.delete(id).map(drop))
    }

    pub fn list_profiles(&self) -> StoreResult<Vec<UserProfile>> {
        self.list()
    }

    pub fn add_profile(&mut self, profile: &UserProfile) -> StoreResult<()> {
        self.mutate::<UserProfile, _>("add_profile", |repo| repo.add(profile))
    }

    pub fn update_profile(&mut self, profile: &UserProfile) -> StoreResult<()> {
        self.mutate::<UserProfile, _>("update_profile", |repo| repo.put(profile))
    }

    pub fn delete_profile(&mut self, id: &str) -> StoreResult<()> {
        self.mutate::<UserProfile, _>("delete_profile", |repo| repo.delete(id).map(drop))
    }

    /// Serializes custom spells, spellbooks and profiles as pretty JSON.
    pub fn export_data(&self) -> StoreResult<String> {
        let document = ExportDocument::new(
            self.list_spells()?,
            self.list_spellbooks()?,
            self.list_profiles()?,
        );
        let text = document.to_pretty_json().map_err(|err| {
            StoreError::InvalidData(format!("cannot serialize export document: {err}"))
        })?;
        info!(
            "event=store_export module=store status=ok spells={} spellbooks={} profiles={}",
            document.spells.len(),
            document.spellbooks.len(),
            document.profiles.len()
        );
        Ok(text)
    }

    /// Inserts every collection present in `text`.
    ///
    /// All-or-nothing: any id collision fails with `DuplicateKey` and no
    /// collection is changed.
    pub fn import_data(&mut self, text: &str) -> StoreResult<ImportSummary> {
        let started_at = Instant::now();
        let document = ImportDocument::parse(text).map_err(|reason| {
            error!("event=store_import module=store status=error error_code=invalid_format");
            StoreError::InvalidFormat(reason)
        })?;

        let tx = self.conn.transaction()?;
        let result = (|| -> StoreResult<(ImportSummary, i64)> {
            let mut summary = ImportSummary::default();
            if let Some(spells) = &document.spells {
                summary.spells = SqliteCollectionRepository::<Spell>::new(&tx).bulk_add(spells)?;
            }
            if let Some(spellbooks) = &document.spellbooks {
                summary.spellbooks =
                    SqliteCollectionRepository::<Spellbook>::new(&tx).bulk_add(spellbooks)?;
            }
            if let Some(profiles) = &document.profiles {
                summary.profiles =
                    SqliteCollectionRepository::<UserProfile>::new(&tx).bulk_add(profiles)?;
            }
            let marker = self.notifier.stamp(&tx)?;
            Ok((summary, marker))
        })();

        let (summary, marker) = match result {
            Ok(written) => written,
            Err(err) => {
                error!(
                    "event=store_import module=store status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };
        tx.commit()?;
        self.notifier.publish(marker);

        info!(
            "event=store_import module=store status=ok spells={} spellbooks={} profiles={} duration_ms={}",
            summary.spells,
            summary.spellbooks,
            summary.profiles,
            started_at.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Refreshes catalog spells from `source`, keeping user state.
    ///
    /// Both feeds are read before any write; on a feed failure the store is
    /// untouched and `CatalogUnavailable` is returned.
    pub fn load_catalog(&mut self, source: &dyn CatalogSource) -> StoreResult<ReconcileReport> {
        let started_at = Instant::now();
        info!("event=catalog_load module=store status=start");

        let candidates = fetch_all(source)?;
        let tx = self.conn.transaction()?;
        let report = {
            let repo = SqliteCollectionRepository::<Spell>::new(&tx);
            let plan = reconcile(candidates, &repo.list()?);
            repo.bulk_put(&plan.records)?;
            plan.report
        };
        let marker = if report.written() > 0 {
            Some(self.notifier.stamp(&tx)?)
        } else {
            None
        };
        tx.commit()?;
        if let Some(marker) = marker {
            self.notifier.publish(marker);
        }

        info!(
            "event=catalog_load module=store status=ok inserted={} updated={} skipped_custom={} duration_ms={}",
            report.inserted,
            report.updated,
            report.skipped_custom,
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }

    fn list<R: Record>(&self) -> StoreResult<Vec<R>> {
        Ok(SqliteCollectionRepository::<R>::new(&self.conn).list()?)
    }

    fn mutate<R, F>(&mut self, op: &'static str, write: F) -> StoreResult<()>
    where
        R: Record,
        F: FnOnce(&SqliteCollectionRepository<'_, R>) -> Result<(), RepoError>,
    {
        let tx = self.conn.transaction()?;
        let written = write(&SqliteCollectionRepository::<R>::new(&tx))
            .map_err(StoreError::from)
            .and_then(|()| self.notifier.stamp(&tx).map_err(StoreError::from));
        let marker = match written {
            Ok(marker) => marker,
            Err(err) => {
                error!(
                    "event=store_write module=store status=error op={} collection={} error={}",
                    op,
                    R::COLLECTION,
                    err
                );
                return Err(err);
            }
        };
        tx.commit()?;
        self.notifier.publish(marker);
        info!(
            "event=store_write module=store status=ok op={} collection={} marker={}",
            op,
            R::COLLECTION,
            marker
        );
        Ok(())
    }
}
