use rusqlite::Connection;
use userbook_core::db::open_db_in_memory;
use userbook_core::db::schema::latest_version;
use userbook_core::{
    Address, LookupKey, RepoError, SqliteUserRepository, User, UserRepository, UserStore,
    UserValidationError,
};

fn spongebob() -> User {
    User::new("spongebob", Some("Spongebob Squarepants".to_string()))
}

fn address_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM address;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn add_and_get_by_name_roundtrip() {
    let mut store = UserStore::open_in_memory().unwrap();

    let mut user = spongebob().with_address("spongebob@sqlalchemy.org");
    let id = store.add_user(&mut user).unwrap();

    assert_eq!(user.id, Some(id));
    assert_eq!(user.addresses[0].user_id, Some(id));
    assert!(user.addresses[0].id.is_some());

    let loaded = store.get_user_by_name("spongebob").unwrap();
    assert_eq!(loaded, user);
}

#[test]
fn get_by_name_requires_exactly_one_match() {
    let mut store = UserStore::open_in_memory().unwrap();

    let err = store.get_user_by_name("nobody").unwrap_err();
    assert!(matches!(err, RepoError::NotFound(LookupKey::UserName(ref name)) if name == "nobody"));

    store.add_user(&mut User::new("twin", None)).unwrap();
    store.add_user(&mut User::new("twin", None)).unwrap();
    let err = store.get_user_by_name("twin").unwrap_err();
    assert!(matches!(err, RepoError::AmbiguousMatch { count: 2, .. }));
    assert!(err.is_ambiguous());
}

#[test]
fn add_address_appends_to_collection_and_storage() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob();
    store.add_user(&mut user).unwrap();

    let address_id = store
        .add_address_to_user(&mut user, "spongebob@squarepants.com")
        .unwrap();

    let matching: Vec<_> = user
        .addresses
        .iter()
        .filter(|address| address.email_address == "spongebob@squarepants.com")
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].id, Some(address_id));
    assert_eq!(matching[0].user_id, user.id);

    let stored = store
        .find_address(&user, "spongebob@squarepants.com")
        .unwrap();
    assert_eq!(&stored, matching[0]);
}

#[test]
fn update_address_changes_only_the_matching_row() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob()
        .with_address("spongebob@sqlalchemy.org")
        .with_address("spongebob@squarepants.com");
    let mut other = User::new("patrick", None).with_address("spongebob@sqlalchemy.org");
    store.add_user(&mut user).unwrap();
    store.add_user(&mut other).unwrap();

    store
        .update_address(&mut user, "spongebob@sqlalchemy.org", "spongebob2@sqlalchemy.org")
        .unwrap();

    assert_eq!(
        user.email_addresses(),
        vec!["spongebob2@sqlalchemy.org", "spongebob@squarepants.com"]
    );
    assert_eq!(store.get_user_by_name("spongebob").unwrap(), user);
    assert_eq!(store.get_user_by_name("patrick").unwrap(), other);
}

#[test]
fn update_address_requires_exactly_one_match() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob()
        .with_address("dup@bikini.bottom")
        .with_address("dup@bikini.bottom");
    store.add_user(&mut user).unwrap();

    let err = store
        .update_address(&mut user, "missing@bikini.bottom", "new@bikini.bottom")
        .unwrap_err();
    assert!(err.is_not_found());

    let err = store
        .update_address(&mut user, "dup@bikini.bottom", "new@bikini.bottom")
        .unwrap_err();
    assert!(matches!(err, RepoError::AmbiguousMatch { count: 2, .. }));
    assert_eq!(store.get_user_by_name("spongebob").unwrap(), user);
}

#[test]
fn remove_address_deletes_orphan_row() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob()
        .with_address("spongebob@sqlalchemy.org")
        .with_address("spongebob@squarepants.com");
    store.add_user(&mut user).unwrap();

    store
        .remove_address_from_user(&mut user, "spongebob@squarepants.com")
        .unwrap();

    assert_eq!(user.email_addresses(), vec!["spongebob@sqlalchemy.org"]);
    let err = store
        .find_address(&user, "spongebob@squarepants.com")
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(address_count(store.connection()), 1);
}

#[test]
fn delete_user_cascades_to_addresses() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob()
        .with_address("spongebob@sqlalchemy.org")
        .with_address("spongebob@squarepants.com");
    let mut keeper = User::new("sandy", None).with_address("sandy@treedome.org");
    store.add_user(&mut user).unwrap();
    store.add_user(&mut keeper).unwrap();
    let deleted_id = user.id.unwrap();

    store.delete_user(&mut user).unwrap();

    assert_eq!(user.id, None);
    assert!(user.addresses.is_empty());
    assert!(store.get_user_by_name("spongebob").unwrap_err().is_not_found());
    assert!(store.get_user(deleted_id).unwrap().is_none());
    assert_eq!(address_count(store.connection()), 1);
    assert_eq!(store.list_users().unwrap(), vec![keeper]);
}

#[test]
fn delete_of_already_deleted_user_is_not_found() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob();
    store.add_user(&mut user).unwrap();
    let mut stale = user.clone();

    store.delete_user(&mut user).unwrap();

    let err = store.delete_user(&mut stale).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(LookupKey::UserId(_))));
}

#[test]
fn operations_on_unsaved_user_are_rejected() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob();

    assert!(matches!(
        store.add_address_to_user(&mut user, "x@y.z"),
        Err(RepoError::Detached)
    ));
    assert!(matches!(store.delete_user(&mut user), Err(RepoError::Detached)));
    assert!(matches!(store.find_address(&user, "x@y.z"), Err(RepoError::Detached)));
}

#[test]
fn adding_a_persisted_user_twice_is_rejected() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob();
    let id = store.add_user(&mut user).unwrap();

    let err = store.add_user(&mut user).unwrap_err();
    assert!(matches!(err, RepoError::AlreadyPersisted(existing) if existing == id));
    assert_eq!(store.list_users().unwrap().len(), 1);
}

#[test]
fn validation_failure_blocks_writes() {
    let mut store = UserStore::open_in_memory().unwrap();

    let mut long_name = User::new("n".repeat(31), None);
    let err = store.add_user(&mut long_name).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(UserValidationError::NameTooLong { length: 31, max: 30 })
    ));
    assert!(long_name.id.is_none());

    let mut user = spongebob().with_address("spongebob@sqlalchemy.org");
    store.add_user(&mut user).unwrap();
    let err = store
        .update_address(&mut user, "spongebob@sqlalchemy.org", " ")
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(UserValidationError::EmptyEmailAddress)
    ));
    assert!(store.list_users().unwrap()[0]
        .email_addresses()
        .contains(&"spongebob@sqlalchemy.org"));
}

#[test]
fn address_for_missing_user_is_a_constraint_violation() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut ghost = spongebob();
    ghost.id = Some(404);

    let err = store
        .add_address_to_user(&mut ghost, "ghost@nowhere.org")
        .unwrap_err();
    assert!(matches!(err, RepoError::ConstraintViolation(_)));
    assert!(ghost.addresses.is_empty());
    assert_eq!(address_count(store.connection()), 0);
}

#[test]
fn foreign_key_cascade_applies_to_raw_deletes() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
        let mut user = spongebob()
            .with_address("a@bikini.bottom")
            .with_address("b@bikini.bottom");
        repo.add_user(&mut user).unwrap();
    }

    conn.execute("DELETE FROM user_account;", []).unwrap();
    assert_eq!(address_count(&conn), 0);
}

#[test]
fn legacy_rows_with_oversized_names_stay_readable() {
    let mut store = UserStore::open_in_memory().unwrap();
    let legacy_name = "x".repeat(31);
    store
        .connection()
        .execute(
            "INSERT INTO user_account (name, fullname) VALUES (?1, NULL);",
            [legacy_name.as_str()],
        )
        .unwrap();
    let mut sandy = User::new("sandy", None).with_address("sandy@treedome.org");
    store.add_user(&mut sandy).unwrap();

    let users = store.list_users().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1], sandy);

    let mut legacy = store.get_user_by_name(&legacy_name).unwrap();
    assert_eq!(legacy.name, legacy_name);
    store
        .add_address_to_user(&mut legacy, "legacy@bikini.bottom")
        .unwrap();
    store.delete_user(&mut legacy).unwrap();
    assert_eq!(store.list_users().unwrap(), vec![sandy]);
}

#[test]
fn unsaved_addresses_on_persisted_user_are_written_by_next_change() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob().with_address("a@bikini.bottom");
    store.add_user(&mut user).unwrap();

    user.addresses.push(Address::new("pending@bikini.bottom"));
    store
        .add_address_to_user(&mut user, "b@bikini.bottom")
        .unwrap();

    assert!(user.addresses.iter().all(|address| address.id.is_some()));
    assert!(user.addresses.iter().all(|address| address.user_id == user.id));
    assert_eq!(
        user.email_addresses(),
        vec!["a@bikini.bottom", "pending@bikini.bottom", "b@bikini.bottom"]
    );
    assert_eq!(store.get_user_by_name("spongebob").unwrap(), user);

    user.addresses.push(Address::new("later@bikini.bottom"));
    store
        .remove_address_from_user(&mut user, "a@bikini.bottom")
        .unwrap();
    assert_eq!(store.get_user_by_name("spongebob").unwrap(), user);
    assert_eq!(
        user.email_addresses(),
        vec!["pending@bikini.bottom", "b@bikini.bottom", "later@bikini.bottom"]
    );
}

#[test]
fn invalid_unsaved_address_blocks_the_whole_change() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut user = spongebob().with_address("a@bikini.bottom");
    store.add_user(&mut user).unwrap();

    user.addresses.push(Address::new(" "));
    let err = store
        .update_address(&mut user, "a@bikini.bottom", "c@bikini.bottom")
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(UserValidationError::EmptyEmailAddress)
    ));
    assert_eq!(address_count(store.connection()), 1);
    assert_eq!(
        store.get_user_by_name("spongebob").unwrap().email_addresses(),
        vec!["a@bikini.bottom"]
    );
}

#[test]
fn store_checks_schema_once_at_construction() {
    let mut store = UserStore::open_in_memory().unwrap();
    store.add_user(&mut spongebob()).unwrap();

    // Operations reuse the check made when the store was opened.
    store
        .connection()
        .execute_batch("PRAGMA user_version = 0;")
        .unwrap();

    assert_eq!(store.get_user_by_name("spongebob").unwrap().name, "spongebob");
    assert_eq!(store.list_users().unwrap().len(), 1);
}

#[test]
fn get_user_by_id_and_list_are_ordered() {
    let mut store = UserStore::open_in_memory().unwrap();
    let mut first = User::new("first", None);
    let mut second = User::new("second", None).with_address("second@example.com");
    store.add_user(&mut first).unwrap();
    store.add_user(&mut second).unwrap();

    assert_eq!(store.get_user(second.id.unwrap()).unwrap(), Some(second.clone()));
    assert_eq!(store.list_users().unwrap(), vec![first, second]);
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    match SqliteUserRepository::try_new(&mut conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_missing_required_table_or_column() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();
    assert!(matches!(
        SqliteUserRepository::try_new(&mut conn),
        Err(RepoError::MissingRequiredTable("user_account"))
    ));

    conn.execute_batch(
        "CREATE TABLE user_account (id INTEGER PRIMARY KEY, name TEXT NOT NULL, fullname TEXT);
         CREATE TABLE address (id INTEGER PRIMARY KEY, email_address TEXT NOT NULL);",
    )
    .unwrap();
    assert!(matches!(
        SqliteUserRepository::try_new(&mut conn),
        Err(RepoError::MissingRequiredColumn {
            table: "address",
            column: "user_id"
        })
    ));
}

#[test]
fn store_rejects_connection_without_schema() {
    let conn = Connection::open_in_memory().unwrap();
    assert!(UserStore::from_connection(conn).is_err());
}
