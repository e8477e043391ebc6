//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations, including row backfills, atomically.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Every backfill is idempotent: re-running it on upgraded rows is a no-op.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};

/// Row-level data transform run after a migration's DDL.
///
/// Returns the number of rows whose stored body changed.
type Backfill = fn(&Connection) -> DbResult<usize>;

#[derive(Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
    backfill: Option<Backfill>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        sql: include_str!("0001_init.sql"),
        backfill: None,
    },
    Migration {
        version: 2,
        name: "spell_usage",
        sql: include_str!("0002_spell_usage.sql"),
        backfill: Some(backfill_spell_usage),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Returns the schema version currently recorded in the database.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    apply_migrations_to(conn, latest_version())
}

/// Applies pending migrations up to and including `target`.
///
/// Lets upgrade tooling and tests materialize an older schema before
/// upgrading it with [`apply_migrations`].
pub fn apply_migrations_to(conn: &mut Connection, target: u32) -> DbResult<()> {
    let current = current_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    if target > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: target,
            latest_supported: latest,
        });
    }

    if current >= target {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current || migration.version > target {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        if let Some(backfill) = migration.backfill {
            let rewritten = backfill(&tx)?;
            info!(
                "event=db_migrate module=db status=backfill version={} name={} rewritten={}",
                migration.version, migration.name, rewritten
            );
        }
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(())
}

/// v1 -> v2 backfill: gives every stored spell `favorite=false` and
/// `lastUsed=0` when absent, then mirrors both into the indexed columns.
///
/// Only the `spells` table is touched. Running it again changes nothing.
pub fn backfill_spell_usage(conn: &Connection) -> DbResult<usize> {
    let rows = {
        let mut stmt = conn.prepare("SELECT id, body FROM spells ORDER BY id ASC;")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    let mut rewritten = 0;
    for (id, body) in rows {
        let mut value: Value = serde_json::from_str(&body).map_err(|err| DbError::CorruptRecord {
            table: "spells",
            id: id.clone(),
            reason: err.to_string(),
        })?;
        let Some(fields) = value.as_object_mut() else {
            return Err(DbError::CorruptRecord {
                table: "spells",
                id,
                reason: "body is not a JSON object".to_string(),
            });
        };

        let changed = fill_usage_defaults(fields);
        let favorite = fields
            .get("favorite")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let last_used = fields
            .get("lastUsed")
            .and_then(Value::as_i64)
            .unwrap_or(0);

        if changed {
            conn.execute(
                "UPDATE spells SET body = ?1, favorite = ?2, last_used = ?3 WHERE id = ?4;",
                params![value.to_string(), favorite, last_used, id],
            )?;
            rewritten += 1;
        } else {
            conn.execute(
                "UPDATE spells SET favorite = ?1, last_used = ?2 WHERE id = ?3;",
                params![favorite, last_used, id],
            )?;
        }
    }

    Ok(rewritten)
}

fn fill_usage_defaults(fields: &mut Map<String, Value>) -> bool {
    let mut changed = false;
    if fields.get("favorite").map_or(true, Value::is_null) {
        fields.insert("favorite".to_string(), Value::Bool(false));
        changed = true;
    }
    if fields.get("lastUsed").map_or(true, Value::is_null) {
        fields.insert("lastUsed".to_string(), Value::from(0));
        changed = true;
    }
    changed
}
