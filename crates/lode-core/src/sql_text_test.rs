use super::*;

const DM_MATCH: &str = "CREATE TABLE IF NOT EXISTS dm_match (
    match_id INTEGER PRIMARY KEY,
    home_team VARCHAR NOT NULL,
    away_score INTEGER CHECK (away_score >= 0),
    season_id INTEGER REFERENCES dm_season(season_id),
    FOREIGN KEY (home_team) REFERENCES dm_team(team_name)
)";

#[test]
fn test_split_statements_drops_blanks() {
    let script = "CREATE TABLE a (x INTEGER);\n\nINSERT INTO a VALUES (1);\n";
    assert_eq!(
        split_statements(script),
        vec!["CREATE TABLE a (x INTEGER)", "INSERT INTO a VALUES (1)"]
    );
}

#[test]
fn test_split_statements_empty_script() {
    assert!(split_statements("  \n ; ; \n").is_empty());
}

#[test]
fn test_collapse_whitespace() {
    assert_eq!(collapse_whitespace("  a\n\t b   c "), "a b c");
}

#[test]
fn test_extract_columns_skips_constraint_clauses() {
    let columns = extract_columns(DM_MATCH, "dm_match").unwrap();
    assert_eq!(columns, ["match_id", "home_team", "away_score", "season_id"]);
}

#[test]
fn test_extract_columns_single_line() {
    let columns = extract_columns("CREATE TABLE t (a INTEGER, b VARCHAR)", "t").unwrap();
    assert_eq!(columns, ["a", "b"]);
}

#[test]
fn test_extract_columns_without_body_fails() {
    let err = extract_columns("CREATE TABLE t AS SELECT 1", "t").unwrap_err();
    assert!(matches!(err, ScriptError::ColumnsNotFound { .. }));
}

#[test]
fn test_primary_key_inline() {
    assert_eq!(primary_key_columns(DM_MATCH), ["match_id"]);
}

#[test]
fn test_primary_key_table_level() {
    let statement = "CREATE TABLE t (a INTEGER, b VARCHAR, PRIMARY KEY (a, b))";
    assert_eq!(extract_columns(statement, "t").unwrap(), ["a", "b"]);
    assert_eq!(primary_key_columns(statement), ["a", "b"]);
}

#[test]
fn test_primary_key_absent() {
    assert!(primary_key_columns("CREATE TABLE t (a INTEGER)").is_empty());
}

#[test]
fn test_referenced_tables_matches_whole_words_only() {
    let statement = "INSERT INTO dm_match\nSELECT * FROM dm_match_staging JOIN dm_season USING (season_id)";
    let found = referenced_tables(
        statement,
        ["dm_match_staging", "dm_season", "dm_team"],
    );
    assert!(found.contains("dm_match_staging"));
    assert!(found.contains("dm_season"));
    assert!(!found.contains("dm_team"));
}

#[test]
fn test_referenced_tables_staging_suffix_is_not_the_base_table() {
    let found = referenced_tables("SELECT * FROM dm_season_staging", ["dm_season"]);
    assert!(found.is_empty());
}

#[test]
fn test_referenced_tables_sees_inside_ctes() {
    let statement =
        "WITH latest AS (SELECT * FROM st_match)\nINSERT INTO dm_match SELECT * FROM latest";
    let found = referenced_tables(statement, ["st_match"]);
    assert!(found.contains("st_match"));
}

#[test]
fn test_insert_statement_one_placeholder_per_column() {
    let columns = vec!["a".to_string(), "b".to_string()];
    assert_eq!(
        insert_statement("st_x", &columns),
        "INSERT INTO st_x(a, b)\nVALUES(?, ?)"
    );
}

#[test]
fn test_upsert_statement_overwrites_non_key_columns() {
    let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let keys = vec!["a".to_string()];
    assert_eq!(
        upsert_statement("st_x", &columns, &keys),
        "INSERT INTO st_x(a, b, c)\nVALUES(?, ?, ?)\nON CONFLICT (a) DO UPDATE SET b = excluded.b, c = excluded.c"
    );
}

#[test]
fn test_upsert_statement_without_key_is_plain_insert() {
    let columns = vec!["a".to_string()];
    assert_eq!(
        upsert_statement("st_x", &columns, &[]),
        insert_statement("st_x", &columns)
    );
}

#[test]
fn test_upsert_statement_all_key_columns_keeps_existing_rows() {
    let columns = vec!["a".to_string()];
    let keys = columns.clone();
    assert_eq!(
        upsert_statement("st_x", &columns, &keys),
        "INSERT INTO st_x(a)\nVALUES(?)\nON CONFLICT (a) DO NOTHING"
    );
}

#[test]
fn test_staging_merge_statement_reads_from_staging_twin() {
    let columns = vec!["a".to_string(), "b".to_string()];
    let keys = vec!["a".to_string()];
    let statement = staging_merge_statement("dm_x", &columns, &keys);
    assert_eq!(
        statement,
        "INSERT INTO dm_x\nSELECT a, b FROM dm_x_staging\nWHERE true\nON CONFLICT (a) DO UPDATE SET b = excluded.b"
    );
}

#[test]
fn test_drop_statement() {
    assert_eq!(drop_statement("st_x"), "DROP TABLE IF EXISTS st_x");
}
