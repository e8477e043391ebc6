//! Collection repository contract and generic SQLite implementation.
//!
//! # Responsibility
//! - Provide list/add/put/update/delete and batch variants for every
//!   [`Record`] type over its collection table.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - `add`/`bulk_add` never overwrite: any colliding id fails the whole call
//!   with `DuplicateKey` before a single row is written.
//! - `put`/`bulk_put` are upserts by id.
//! - `delete` of an absent id is a no-op.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::{Collection, Record, ValidationError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for collection persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    DuplicateKey {
        collection: Collection,
        id: String,
    },
    NotFound {
        collection: Collection,
        id: String,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateKey { collection, id } => {
                write!(f, "{collection} already contains id `{id}`")
            }
            Self::NotFound { collection, id } => write!(f, "{collection} has no id `{id}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::DuplicateKey { .. } | Self::NotFound { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for one collection.
pub trait CollectionRepository<R: Record> {
    /// Returns every stored record ordered by id.
    fn list(&self) -> RepoResult<Vec<R>>;
    fn get(&self, id: &str) -> RepoResult<Option<R>>;
    /// Inserts a new record; fails with `DuplicateKey` on collision.
    fn add(&self, record: &R) -> RepoResult<()>;
    /// Inserts or replaces by id.
    fn put(&self, record: &R) -> RepoResult<()>;
    /// Replaces an existing record; fails with `NotFound` when absent.
    fn update(&self, record: &R) -> RepoResult<()>;
    /// Removes by id. Returns whether a row was deleted.
    fn delete(&self, id: &str) -> RepoResult<bool>;
    /// All-or-nothing batch insert.
    fn bulk_add(&self, records: &[R]) -> RepoResult<usize>;
    /// Batch upsert.
    fn bulk_put(&self, records: &[R]) -> RepoResult<usize>;
}

/// SQLite-backed collection repository.
///
/// Batch methods do not open their own transaction; wrap calls in one when
/// the batch must also be atomic against I/O failures.
pub struct SqliteCollectionRepository<'conn, R> {
    conn: &'conn Connection,
    _record: PhantomData<fn() -> R>,
}

impl<'conn, R: Record> SqliteCollectionRepository<'conn, R> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            _record: PhantomData,
        }
    }

    fn table(&self) -> &'static str {
        R::COLLECTION.table_name()
    }

    fn exists(&self, id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);", self.table()),
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn write_row(&self, record: &R, upsert: bool) -> RepoResult<()> {
        let (sql, values) = write_statement(record, upsert)?;
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    fn ensure_batch_insertable(&self, records: &[R]) -> RepoResult<()> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            record.validate()?;
            if !seen.insert(record.id()) || self.exists(record.id())? {
                return Err(RepoError::DuplicateKey {
                    collection: R::COLLECTION,
                    id: record.id().to_string(),
                });
            }
        }
        Ok(())
    }
}

impl<R: Record> CollectionRepository<R> for SqliteCollectionRepository<'_, R> {
    fn list(&self) -> RepoResult<Vec<R>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, body FROM {} ORDER BY id ASC;", self.table()))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row::<R>(row)?);
        }
        Ok(records)
    }

    fn get(&self, id: &str) -> RepoResult<Option<R>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, body FROM {} WHERE id = ?1;", self.table()))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row::<R>(row)?));
        }
        Ok(None)
    }

    fn add(&self, record: &R) -> RepoResult<()> {
        record.validate()?;
        if self.exists(record.id())? {
            return Err(RepoError::DuplicateKey {
                collection: R::COLLECTION,
                id: record.id().to_string(),
            });
        }
        self.write_row(record, false)
    }

    fn put(&self, record: &R) -> RepoResult<()> {
        record.validate()?;
        self.write_row(record, true)
    }

    fn update(&self, record: &R) -> RepoResult<()> {
        record.validate()?;
        if !self.exists(record.id())? {
            return Err(RepoError::NotFound {
                collection: R::COLLECTION,
                id: record.id().to_string(),
            });
        }
        self.write_row(record, true)
    }

    fn delete(&self, id: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1;", self.table()), [id])?;
        Ok(changed > 0)
    }

    fn bulk_add(&self, records: &[R]) -> RepoResult<usize> {
        self.ensure_batch_insertable(records)?;
        for record in records {
            self.write_row(record, false)?;
        }
        Ok(records.len())
    }

    fn bulk_put(&self, records: &[R]) -> RepoResult<usize> {
        for record in records {
            record.validate()?;
        }
        for record in records {
            self.write_row(record, true)?;
        }
        Ok(records.len())
    }
}

fn write_statement<R: Record>(record: &R, upsert: bool) -> RepoResult<(String, Vec<Value>)> {
    let body = serde_json::to_string(record).map_err(|err| {
        RepoError::InvalidData(format!(
            "cannot serialize {} record `{}`: {err}",
            R::COLLECTION,
            record.id()
        ))
    })?;

    let index = record.index_columns();
    let mut columns = vec!["id", "body"];
    columns.extend(index.iter().map(|(name, _)| *name));
    let placeholders = (1..=columns.len())
        .map(|position| format!("?{position}"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        R::COLLECTION.table_name(),
        columns.join(", ")
    );
    if upsert {
        let assignments = columns[1..]
            .iter()
            .map(|column| format!("{column} = excluded.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(&format!(" ON CONFLICT(id) DO UPDATE SET {assignments}"));
    }
    sql.push(';');

    let mut values = vec![Value::Text(record.id().to_string()), Value::Text(body)];
    values.extend(index.into_iter().map(|(_, value)| value));
    Ok((sql, values))
}

fn parse_record_row<R: Record>(row: &Row<'_>) -> RepoResult<R> {
    let id: String = row.get("id")?;
    let body: String = row.get("body")?;
    let record: R = serde_json::from_str(&body).map_err(|err| {
        RepoError::InvalidData(format!(
            "cannot decode {} record `{id}`: {err}",
            R::COLLECTION
        ))
    })?;

    if record.id() != id {
        return Err(RepoError::InvalidData(format!(
            "{} row `{id}` holds a body for `{}`",
            R::COLLECTION,
            record.id()
        )));
    }
    record.validate()?;
    Ok(record)
}
