use super::*;

use std::rc::Rc;

use lode_core::Value;

fn db() -> Db {
    Db::open_in_memory().unwrap()
}

fn fixed_batch(rows: Vec<Row>) -> ExtractFn {
    Box::new(move || Ok(rows.clone()))
}

fn keyed_row(id: i64, name: &str) -> Row {
    Row::new(["dummy_id", "dummy_name"], vec![id.into(), name.into()])
}

const ST_KEYED: &str = "CREATE TABLE st_dummy (
    dummy_id INTEGER PRIMARY KEY,
    dummy_name VARCHAR
)";

#[test]
fn test_warehouse_update_creates_populates_and_commits() {
    let db = db();
    let table = WarehouseTable::new(
        "dm_dummy",
        "CREATE TABLE IF NOT EXISTS dm_dummy (dummy_name INTEGER)",
        "INSERT INTO dm_dummy VALUES (5)",
    )
    .unwrap();

    table.update(&db).unwrap();

    assert_eq!(
        db.get_all_rows("dm_dummy").unwrap(),
        vec![vec![Value::Integer(5)]]
    );
}

#[test]
fn test_warehouse_rejects_non_idempotent_create() {
    let err = WarehouseTable::new(
        "dm_dummy",
        "CREATE TABLE dm_dummy (dummy_name INTEGER)",
        "INSERT INTO dm_dummy VALUES (5)",
    )
    .unwrap_err();

    assert!(matches!(
        err,
        BuildError::Script(ScriptError::CreateStatement { .. })
    ));
}

#[test]
fn test_warehouse_rejects_populate_for_another_table() {
    let err = WarehouseTable::new(
        "dm_dummy",
        "CREATE TABLE IF NOT EXISTS dm_dummy (dummy_name INTEGER)",
        "INSERT INTO dm_other VALUES (5)",
    )
    .unwrap_err();

    assert!(matches!(
        err,
        BuildError::Script(ScriptError::InsertStatement { .. })
    ));
}

#[test]
fn test_warehouse_update_failure_names_the_table() {
    let db = db();
    let table = WarehouseTable::new(
        "dm_dummy",
        "CREATE TABLE IF NOT EXISTS dm_dummy (dummy_name INTEGER)",
        "INSERT INTO dm_dummy SELECT dummy_name FROM st_void",
    )
    .unwrap();

    let err = table.update(&db).unwrap_err();
    match err {
        BuildError::TableUpdate { table, .. } => assert_eq!(table.as_str(), "dm_dummy"),
        other => panic!("expected a table update error, got {other:?}"),
    }
}

#[test]
fn test_staging_update_creates_table_and_loads_batch() {
    let db = db();
    let table = StagingTable::new(
        "st_dummy",
        ST_KEYED,
        fixed_batch(vec![keyed_row(1, "x"), keyed_row(2, "y")]),
    )
    .unwrap();

    table.update(&db).unwrap();

    let rows = db
        .select("SELECT * FROM st_dummy ORDER BY dummy_id", &[])
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(1), Value::Text("x".to_string())],
            vec![Value::Integer(2), Value::Text("y".to_string())],
        ]
    );
}

#[test]
fn test_staging_upsert_overwrites_conflicting_keys_only() {
    let db = db();
    StagingTable::new(
        "st_dummy",
        ST_KEYED,
        fixed_batch(vec![keyed_row(1, "x"), keyed_row(2, "y")]),
    )
    .unwrap()
    .update(&db)
    .unwrap();

    StagingTable::new(
        "st_dummy",
        ST_KEYED,
        fixed_batch(vec![keyed_row(2, "z"), keyed_row(3, "w")]),
    )
    .unwrap()
    .update(&db)
    .unwrap();

    let rows = db
        .select("SELECT * FROM st_dummy ORDER BY dummy_id", &[])
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(1), Value::Text("x".to_string())],
            vec![Value::Integer(2), Value::Text("z".to_string())],
            vec![Value::Integer(3), Value::Text("w".to_string())],
        ]
    );
}

#[test]
fn test_unchanged_declaration_preserves_existing_rows() {
    let db = db();
    db.execute_batch("CREATE TABLE st_dummy (dummy_attr INTEGER)")
        .unwrap();
    db.execute("INSERT INTO st_dummy VALUES (?)", &[Value::Integer(5)])
        .unwrap();
    db.commit().unwrap();

    let table = StagingTable::new(
        "st_dummy",
        "CREATE TABLE st_dummy (dummy_attr INTEGER)",
        fixed_batch(vec![Row::new(["dummy_attr"], vec![1.into()])]),
    )
    .unwrap();
    table.update(&db).unwrap();

    let kept = db
        .select("SELECT * FROM st_dummy WHERE dummy_attr = 5", &[])
        .unwrap();
    assert_eq!(kept, vec![vec![Value::Integer(5)]]);
    assert_eq!(db.count_rows("st_dummy").unwrap(), 2);
}

#[test]
fn test_drifted_declaration_drops_and_recreates() {
    let db = db();
    db.execute_batch("CREATE TABLE st_dummy (old_attr INTEGER)")
        .unwrap();
    db.execute("INSERT INTO st_dummy VALUES (?)", &[Value::Integer(5)])
        .unwrap();
    db.commit().unwrap();

    let table = StagingTable::new(
        "st_dummy",
        "CREATE TABLE st_dummy (dummy_attr INTEGER)",
        fixed_batch(vec![Row::new(["dummy_attr"], vec![1.into()])]),
    )
    .unwrap();
    table.update(&db).unwrap();

    assert_eq!(db.get_attributes("st_dummy").unwrap(), ["dummy_attr"]);
    assert_eq!(
        db.get_all_rows("st_dummy").unwrap(),
        vec![vec![Value::Integer(1)]]
    );
}

#[test]
fn test_empty_batch_leaves_table_untouched() {
    let db = db();
    StagingTable::new(
        "st_dummy",
        ST_KEYED,
        fixed_batch(vec![keyed_row(1, "x")]),
    )
    .unwrap()
    .update(&db)
    .unwrap();

    StagingTable::new("st_dummy", ST_KEYED, fixed_batch(vec![]))
        .unwrap()
        .update(&db)
        .unwrap();

    assert_eq!(db.count_rows("st_dummy").unwrap(), 1);
}

#[test]
fn test_incompatible_batch_fails_before_any_write_and_dumps_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let db = db();
    let bad_rows = vec![
        Row::new(["dummy_attr"], vec![1.into()]),
        Row::new(["dummy_attr"], vec![2.into()]),
    ];
    let table = StagingTable::new(
        "st_dummy",
        "CREATE TABLE st_dummy (dummy_name INTEGER)",
        fixed_batch(bad_rows),
    )
    .unwrap()
    .with_recovery_dir(dir.path());

    let err = table.update(&db).unwrap_err();
    assert!(matches!(
        err,
        BuildError::TableUpdate {
            source: TableUpdateError::IncompatibleData { .. },
            ..
        }
    ));

    // nothing was written, but the extracted batch survives on disk
    assert_eq!(db.count_rows("st_dummy").unwrap(), 0);
    let recovered =
        std::fs::read_to_string(dir.path().join("recovery_st_dummy.csv")).unwrap();
    assert_eq!(recovered, "dummy_attr\n1\n2\n");
}

#[test]
fn test_extraction_error_is_wrapped_with_the_table_name() {
    let db = db();
    let table = StagingTable::new(
        "st_dummy",
        "CREATE TABLE st_dummy (dummy_attr INTEGER)",
        Box::new(|| anyhow::bail!("remote source is down")),
    )
    .unwrap();

    let err = table.update(&db).unwrap_err();
    assert!(matches!(
        err,
        BuildError::TableUpdate {
            source: TableUpdateError::Extraction(_),
            ..
        }
    ));
}

#[test]
fn test_extraction_callable_observes_committed_recreate() {
    let db = Rc::new(db());
    let reader = Rc::clone(&db);
    let table = StagingTable::new(
        "st_dummy",
        "CREATE TABLE st_dummy (dummy_attr INTEGER)",
        Box::new(move || {
            // a collaborator reading the freshly recreated shape mid-update
            let columns = reader.get_attributes("st_dummy")?;
            Ok(vec![Row::new(columns, vec![Value::Integer(7)])])
        }),
    )
    .unwrap();

    table.update(&db).unwrap();

    assert_eq!(
        db.get_all_rows("st_dummy").unwrap(),
        vec![vec![Value::Integer(7)]]
    );
}

#[test]
fn test_from_definition_builds_the_staging_twin() {
    let db = db();
    let script = DefinitionScript::parse(
        "dm_season",
        "CREATE TABLE IF NOT EXISTS dm_season (season_id INTEGER PRIMARY KEY);",
    )
    .unwrap();
    let table = StagingTable::from_definition(
        &script,
        fixed_batch(vec![Row::new(["season_id"], vec![1.into()])]),
    )
    .unwrap();

    assert_eq!(table.name().as_str(), "dm_season_staging");
    table.update(&db).unwrap();
    assert_eq!(db.count_rows("dm_season_staging").unwrap(), 1);
}

#[test]
fn test_from_script_requires_a_single_staging_statement() {
    let err = StagingTable::from_script(
        "st_dummy",
        "CREATE TABLE st_dummy (a INTEGER);\nINSERT INTO st_dummy VALUES (1);",
        fixed_batch(vec![]),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        BuildError::Script(ScriptError::StatementCount { found: 2, .. })
    ));
}
