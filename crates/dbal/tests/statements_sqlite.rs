use dbal::{
    Adapter, AdapterOptions, CaseFolding, Error, FetchMode, Fetched, ParseErrorKind, Slot,
    StatementState, Value,
};
use dbal_sqlite::{SqliteConfig, SqliteDriver};

fn open(options: AdapterOptions) -> Adapter<SqliteDriver> {
    let db = Adapter::<SqliteDriver>::connect(&SqliteConfig::memory(), options)
        .expect("open sqlite memory db");
    db.driver()
        .execute_raw(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
             INSERT INTO users (name, email) VALUES ('Alice', 'alice@example.com');
             INSERT INTO users (name, email) VALUES ('Bob', NULL);
             INSERT INTO users (name, email) VALUES ('Carol', 'carol@example.com');",
        )
        .expect("create schema");
    db
}

#[test]
fn positional_values_bind_in_placeholder_order() {
    let db = open(AdapterOptions::new());
    let mut stmt = db.prepare("SELECT ?, ?").unwrap();
    stmt.bind_value(2, "second").unwrap();
    stmt.bind_value(1, "first").unwrap();
    stmt.execute().unwrap();

    let row = stmt.fetch_with(FetchMode::Num).unwrap().unwrap();
    assert_eq!(
        row.as_num().unwrap(),
        &[Value::Text("first".into()), Value::Text("second".into())]
    );
    assert!(stmt.fetch().unwrap().is_none());
}

#[test]
fn named_parameters_and_assoc_rows() {
    let db = open(AdapterOptions::new());
    let mut stmt = db
        .prepare("SELECT id, name FROM users WHERE name = :name")
        .unwrap();
    stmt.bind_value("name", "Bob").unwrap();
    stmt.execute().unwrap();

    let Some(Fetched::Assoc(record)) = stmt.fetch().unwrap() else {
        panic!("expected an assoc row");
    };
    assert_eq!(record.keys().collect::<Vec<_>>(), vec!["id", "name"]);
    assert_eq!(record.get("id"), Some(&Value::Int(2)));
    assert_eq!(record.get("name"), Some(&Value::Text("Bob".into())));
}

#[test]
fn override_params_apply_to_one_execution() {
    let db = open(AdapterOptions::new());
    let name = db
        .fetch_one(
            "SELECT name FROM users WHERE id = :id",
            vec![("id", Value::Int(3))],
        )
        .unwrap();
    assert_eq!(name, Some(Value::Text("Carol".into())));

    let names = db
        .fetch_col("SELECT name FROM users WHERE id > ? ORDER BY id", [Value::Int(1)])
        .unwrap();
    assert_eq!(
        names,
        vec![Value::Text("Bob".into()), Value::Text("Carol".into())]
    );
}

#[test]
fn slots_are_read_at_each_execution() {
    let db = open(AdapterOptions::new());
    let id = Slot::new(1);
    let mut stmt = db.prepare("SELECT name FROM users WHERE id = ?").unwrap();
    stmt.bind_param(1, &id).unwrap();

    stmt.execute().unwrap();
    assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::Text("Alice".into())));

    id.set(2);
    stmt.execute().unwrap();
    assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::Text("Bob".into())));
}

#[test]
fn fetch_column_separates_null_from_end_of_data() {
    let db = open(AdapterOptions::new());
    let mut stmt = db.query("SELECT email FROM users WHERE id = 2", ()).unwrap();
    assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::Null));
    assert_eq!(stmt.fetch_column(0).unwrap(), None);
}

#[test]
fn bound_columns_receive_values() {
    let db = open(AdapterOptions::new().case_folding(CaseFolding::Lower));
    let id = Slot::default();
    let name = Slot::default();

    let mut stmt = db
        .prepare("SELECT id AS ID, name AS NAME FROM users ORDER BY id")
        .unwrap();
    stmt.bind_column(1, &id).unwrap();
    stmt.bind_column("NAME", &name).unwrap();
    assert!(matches!(
        stmt.bind_column(0, &id),
        Err(Error::InvalidBindTarget(_))
    ));
    stmt.execute().unwrap();

    stmt.fetch_with(FetchMode::Bound).unwrap().unwrap();
    assert_eq!(id.get(), Value::Int(1));
    assert_eq!(name.get(), Value::Text("Alice".into()));

    stmt.fetch_with(FetchMode::Bound).unwrap().unwrap();
    assert_eq!(id.get(), Value::Int(2));
    assert_eq!(name.get(), Value::Text("Bob".into()));
}

#[test]
fn case_folding_applies_to_result_columns() {
    let db = open(AdapterOptions::new().case_folding(CaseFolding::Upper));
    let mut stmt = db.query("SELECT id, name FROM users WHERE id = 1", ()).unwrap();
    assert_eq!(stmt.column_names(), vec!["ID".to_string(), "NAME".to_string()]);

    let row = stmt.fetch_object().unwrap().unwrap();
    assert_eq!(row.get_by_name("NAME"), Some(&Value::Text("Alice".into())));
    assert_eq!(row.get_named::<i64>("ID").unwrap(), 1);
}

#[test]
fn invalid_fetch_mode_closes_the_cursor() {
    let db = open(AdapterOptions::new());
    let mut stmt = db.query("SELECT id FROM users ORDER BY id", ()).unwrap();
    assert_eq!(stmt.state(), StatementState::Executed);

    match stmt.set_fetch_mode_code(42) {
        Err(Error::InvalidFetchMode(e)) => assert_eq!(e.mode, "42"),
        other => panic!("expected invalid fetch mode, got {other:?}"),
    }
    assert_eq!(stmt.state(), StatementState::Prepared);
    assert!(stmt.fetch().unwrap().is_none());
    assert_eq!(stmt.fetch_mode(), FetchMode::Assoc);

    stmt.execute().unwrap();
    let ids = stmt.fetch_all_column(0).unwrap();
    assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
}

#[test]
fn fetch_mode_codes_select_shapes() {
    let db = open(AdapterOptions::new());
    let mut stmt = db.query("SELECT id, name FROM users ORDER BY id", ()).unwrap();
    stmt.set_fetch_mode_code(FetchMode::NUM).unwrap();
    let first = stmt.fetch().unwrap().unwrap();
    assert_eq!(first.as_num().unwrap()[0], Value::Int(1));

    let second = stmt.fetch_with_code(FetchMode::BOTH).unwrap().unwrap();
    assert_eq!(second.as_num().unwrap()[1], Value::Text("Bob".into()));
    assert_eq!(second.as_record().unwrap().get("name"), Some(&Value::Text("Bob".into())));

    let third = stmt.fetch_with_code(FetchMode::COLUMN).unwrap().unwrap();
    assert_eq!(third.into_scalar(), Some(Value::Int(3)));
}

#[test]
fn syntax_errors_mark_the_failing_offset() {
    let db = open(AdapterOptions::new().profiler(true));
    let err = db.prepare("SELECT * FORM users").unwrap_err();
    let Error::Driver(e) = err else {
        panic!("expected a driver error");
    };
    assert_eq!(e.marked_sql().as_deref(), Some("SELECT * *FORM users"));
    assert!(db.error_info().is_some());
    assert_eq!(db.profiler().total_num_queries(None), 1, "only the connect profile");
}

#[test]
fn insert_reports_row_count_and_last_insert_id() {
    let db = open(AdapterOptions::new());
    let stmt = db
        .query(
            "INSERT INTO users (name) VALUES (?)",
            [Value::Text("Dave".into())],
        )
        .unwrap();
    assert_eq!(stmt.row_count().unwrap(), 1);
    assert_eq!(db.last_insert_id().unwrap(), Value::BigInt(4));

    let updated = db
        .query("UPDATE users SET email = NULL", ())
        .unwrap()
        .row_count()
        .unwrap();
    assert_eq!(updated, 4);
}

#[test]
fn transactions_commit_and_roll_back() {
    let db = open(AdapterOptions::new());
    db.begin_transaction().unwrap();
    db.query("DELETE FROM users", ()).unwrap();
    db.rollback().unwrap();
    assert_eq!(
        db.fetch_one("SELECT COUNT(*) FROM users", ()).unwrap(),
        Some(Value::Int(3))
    );

    db.begin_transaction().unwrap();
    db.query("DELETE FROM users WHERE id = 1", ()).unwrap();
    db.commit().unwrap();
    assert_eq!(
        db.fetch_one("SELECT COUNT(*) FROM users", ()).unwrap(),
        Some(Value::Int(2))
    );

    assert!(matches!(db.commit(), Err(Error::Driver(_))));
}

#[test]
fn pairs_and_assoc_helpers() {
    let db = open(AdapterOptions::new());
    let pairs = db
        .fetch_pairs("SELECT id, name FROM users ORDER BY id", ())
        .unwrap();
    assert_eq!(pairs.len(), 3);
    assert_eq!(pairs[2], (Value::Int(3), Value::Text("Carol".into())));

    let by_id = db
        .fetch_assoc("SELECT id, name, email FROM users ORDER BY id", ())
        .unwrap();
    assert_eq!(by_id[1].0, Value::Int(2));
    assert_eq!(by_id[1].1.get("email"), Some(&Value::Null));

    assert!(matches!(
        db.fetch_pairs("SELECT id FROM users", ()),
        Err(Error::Type(_))
    ));
}

#[test]
fn closed_statements_reject_further_calls() {
    let db = open(AdapterOptions::new());
    let mut stmt = db.query("SELECT id FROM users", ()).unwrap();
    stmt.close().unwrap();
    stmt.close().unwrap();
    assert_eq!(stmt.state(), StatementState::Closed);
    assert!(matches!(stmt.execute(), Err(Error::StatementClosed)));
    assert!(matches!(stmt.fetch(), Err(Error::StatementClosed)));
}

#[test]
fn multiple_rowsets_are_not_supported() {
    let db = open(AdapterOptions::new());
    let mut stmt = db.query("SELECT 1", ()).unwrap();
    assert!(matches!(stmt.next_rowset(), Err(Error::NotImplemented(_))));
}

#[test]
fn failed_execution_does_not_leak_bindings() {
    let db = open(AdapterOptions::new());
    db.driver()
        .execute_raw(
            "CREATE TABLE u (a INTEGER UNIQUE, b TEXT);
             INSERT INTO u (a) VALUES (1);",
        )
        .unwrap();

    let mut stmt = db.prepare("INSERT INTO u (a, b) VALUES (?, ?)").unwrap();
    let err = stmt
        .execute_with(vec![Value::Int(1), Value::Text("stale".into())])
        .unwrap_err();
    assert!(matches!(err, Error::Driver(_)));
    assert_eq!(stmt.state(), StatementState::Prepared);

    stmt.bind_value(1, 2).unwrap();
    stmt.execute().unwrap();
    assert_eq!(
        db.fetch_one("SELECT b FROM u WHERE a = 2", ()).unwrap(),
        Some(Value::Null)
    );
}

#[test]
fn out_of_range_column_does_not_consume_a_row() {
    let db = open(AdapterOptions::new());
    let mut stmt = db.query("SELECT 1 UNION ALL SELECT 2", ()).unwrap();
    assert!(matches!(stmt.fetch_column(3), Err(Error::Type(_))));
    assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::Int(1)));
    assert_eq!(stmt.fetch_column(0).unwrap(), Some(Value::Int(2)));
    assert_eq!(stmt.fetch_column(0).unwrap(), None);
}

#[test]
fn mixed_placeholder_styles_are_rejected() {
    let db = open(AdapterOptions::new());
    match db.prepare("SELECT * FROM users WHERE id = ? AND name = :name") {
        Err(Error::Parse(e)) => assert_eq!(e.kind, ParseErrorKind::MixedPlaceholderStyles),
        Err(other) => panic!("expected a parse error, got {other:?}"),
        Ok(_) => panic!("mixed placeholders were accepted"),
    }
}
