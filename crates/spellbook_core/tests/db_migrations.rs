use rusqlite::{params, Connection};
use spellbook_core::db::migrations::{
    apply_migrations, apply_migrations_to, backfill_spell_usage, current_version, latest_version,
};
use spellbook_core::db::{open_db, open_db_in_memory, DbError};
use spellbook_core::SpellbookStore;

const V1_FIREBALL: &str = r#"{"id":"fireball","name":"Fireball","level":3,"school":"Evocation","classes":["Wizard"],"castingTime":"1 action","range":"150 feet","components":"V, S, M","duration":"Instantaneous","description":"Boom.","edition":"2014","custom":false}"#;
const V1_SHIELD_FAVORITE: &str = r#"{"id":"shield","name":"Shield","level":1,"school":"Abjuration","classes":["Wizard"],"castingTime":"1 reaction","range":"Self","components":"V, S","duration":"1 round","description":"Ward.","edition":"2014","custom":false,"favorite":true}"#;
const V1_BOOK: &str = r#"{"id":"b1","name":"Travel","spells":["fireball"]}"#;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(current_version(&conn).unwrap(), latest_version());
    for table in ["spells", "spellbooks", "profiles", "store_meta"] {
        assert_table_exists(&conn, table);
    }
    assert!(column_names(&conn, "spells").contains(&"last_used".to_string()));
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spellbook.sqlite3");

    let first = open_db(&path).unwrap();
    assert_eq!(current_version(&first).unwrap(), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(current_version(&second).unwrap(), latest_version());
}

#[test]
fn open_db_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store").join("spellbook.sqlite3");

    let conn = open_db(&path).unwrap();
    assert_eq!(current_version(&conn).unwrap(), latest_version());
    assert!(path.exists());
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn upgrade_from_v1_backfills_usage_fields_on_spells_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite3");
    seed_v1_database(&path);

    let store = SpellbookStore::open(&path).unwrap();
    assert_eq!(
        current_version(store.connection()).unwrap(),
        latest_version()
    );

    let spells = store.list_spells().unwrap();
    assert_eq!(spells.len(), 2);
    let fireball = spells.iter().find(|s| s.id == "fireball").unwrap();
    assert!(!fireball.favorite);
    assert_eq!(fireball.last_used, 0);
    let shield = spells.iter().find(|s| s.id == "shield").unwrap();
    assert!(shield.favorite);

    let (favorite, last_used): (i64, i64) = store
        .connection()
        .query_row(
            "SELECT favorite, last_used FROM spells WHERE id = 'shield';",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((favorite, last_used), (1, 0));

    let book_body: String = store
        .connection()
        .query_row("SELECT body FROM spellbooks WHERE id = 'b1';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(book_body, V1_BOOK);
}

#[test]
fn spell_usage_backfill_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.sqlite3");
    seed_v1_database(&path);

    let mut conn = Connection::open(&path).unwrap();
    apply_migrations(&mut conn).unwrap();
    let once = spell_rows(&conn);

    assert_eq!(backfill_spell_usage(&conn).unwrap(), 0);
    assert_eq!(spell_rows(&conn), once);
}

#[test]
fn corrupt_spell_body_aborts_upgrade_and_keeps_v1() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("corrupt.sqlite3");
    {
        let mut conn = Connection::open(&path).unwrap();
        apply_migrations_to(&mut conn, 1).unwrap();
        conn.execute(
            "INSERT INTO spells (id, name, level, school, edition, custom, body)
             VALUES ('bad', 'Bad', 0, 'Evocation', '2014', 0, 'not json');",
            [],
        )
        .unwrap();
    }

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::CorruptRecord { table: "spells", .. }));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(current_version(&conn).unwrap(), 1);
}

fn seed_v1_database(path: &std::path::Path) {
    let mut conn = Connection::open(path).unwrap();
    apply_migrations_to(&mut conn, 1).unwrap();
    assert_eq!(current_version(&conn).unwrap(), 1);

    for (id, name, level, school, body) in [
        ("fireball", "Fireball", 3, "Evocation", V1_FIREBALL),
        ("shield", "Shield", 1, "Abjuration", V1_SHIELD_FAVORITE),
    ] {
        conn.execute(
            "INSERT INTO spells (id, name, level, school, edition, custom, body)
             VALUES (?1, ?2, ?3, ?4, '2014', 0, ?5);",
            params![id, name, level, school, body],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO spellbooks (id, name, body) VALUES ('b1', 'Travel', ?1);",
        [V1_BOOK],
    )
    .unwrap();
}

fn spell_rows(conn: &Connection) -> Vec<(String, String, i64, i64)> {
    let mut stmt = conn
        .prepare("SELECT id, body, favorite, last_used FROM spells ORDER BY id;")
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap();
    rows
}

fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});")).unwrap();
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap();
    names
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
