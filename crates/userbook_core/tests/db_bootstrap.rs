use rusqlite::Connection;
use userbook_core::db::schema::latest_version;
use userbook_core::db::{open_db, open_db_in_memory, open_url, DbError};
use userbook_core::{StoreError, User, UserStore};

#[test]
fn open_db_in_memory_creates_both_tables() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "user_account");
    assert_table_exists(&conn, "address");
    let foreign_keys: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(foreign_keys, 1);
}

#[test]
fn reopening_same_file_keeps_existing_rows() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("users.db").display());

    let mut store = UserStore::open(&url).unwrap();
    let mut user = User::new("patrick", None).with_address("patrick@rock.bottom");
    store.add_user(&mut user).unwrap();
    store.close().unwrap();

    let mut reopened = UserStore::open(&url).unwrap();
    let loaded = reopened.get_user_by_name("patrick").unwrap();
    assert_eq!(loaded, user);
    assert_eq!(schema_version(reopened.connection()), latest_version());
}

#[test]
fn bootstrap_leaves_preexisting_tables_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE user_account (
            id INTEGER PRIMARY KEY,
            name VARCHAR(30) NOT NULL,
            fullname TEXT
        );
        INSERT INTO user_account (name, fullname) VALUES ('squidward', 'Squidward Tentacles');",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM user_account;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
    assert_table_exists(&conn, "address");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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
fn invalid_connection_strings_fail_to_open() {
    let err = open_url("mysql://root@localhost/users").unwrap_err();
    assert!(matches!(err, DbError::InvalidConnectionString(_)));

    match UserStore::open("") {
        Err(StoreError::Db(DbError::InvalidConnectionString(_))) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("empty connection string should be rejected"),
    }
}

#[test]
fn unreachable_file_target_is_a_connection_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("users.db");

    match UserStore::open(&format!("sqlite://{}", path.display())) {
        Err(StoreError::Db(DbError::Sqlite(_))) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("opening inside a missing directory should fail"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
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
