//! Bounded SQL text heuristics.
//!
//! Definition scripts are short and written for this engine, so everything
//! here works by narrow textual rules instead of a SQL grammar: statements
//! are semicolon-delimited, one column or constraint per comma/newline, and
//! no nested parenthesized types. Scripts outside those bounds fail with an
//! explicit [`ScriptError`] rather than being guessed at.

use std::collections::BTreeSet;

use regex::Regex;

use crate::error::{ScriptError, ScriptResult};

/// Column-list tokens that introduce a constraint clause, not a column.
const CONSTRAINT_KEYWORDS: [&str; 5] = ["PRIMARY", "CHECK", "FOREIGN", "REFERENCES", "ON"];

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a script on `;`, trimming statements and discarding blank ones.
///
/// `--` comments are tolerated and ride along inside their statement.
pub fn split_statements(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .collect()
}

/// Check that `statement` defines the warehouse table `name`.
pub fn validate_create_statement(statement: &str, name: &str) -> ScriptResult<()> {
    let expected = format!("CREATE TABLE IF NOT EXISTS {name} ");
    if statement.contains(&expected) {
        Ok(())
    } else {
        Err(ScriptError::CreateStatement {
            script: name.to_string(),
            expected,
        })
    }
}

/// Check that `statement` defines the staging table `name`.
///
/// Deliberately without `IF NOT EXISTS`: staging tables are dropped and
/// recreated on schema drift, so their create statement must stay runnable
/// against an empty catalog.
pub fn validate_staging_statement(statement: &str, name: &str) -> ScriptResult<()> {
    let expected = format!("CREATE TABLE {name} ");
    if statement.contains(&expected) {
        Ok(())
    } else {
        Err(ScriptError::CreateStatement {
            script: name.to_string(),
            expected,
        })
    }
}

/// Check that `statement` populates the table `name`.
pub fn validate_insert_statement(statement: &str, name: &str) -> ScriptResult<()> {
    let expected = format!("INSERT INTO {name}");
    if statement.contains(&expected) {
        Ok(())
    } else {
        Err(ScriptError::InsertStatement {
            script: name.to_string(),
            expected,
        })
    }
}

/// Names from `candidates` that `statement` references as standalone words.
///
/// Word boundaries keep `x` from matching inside `x_staging` and vice versa;
/// references inside a leading CTE count like any other.
pub fn referenced_tables<'a, I>(statement: &str, candidates: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|name| {
            Regex::new(&format!(r"(?i)\b{}\b", regex::escape(name)))
                .expect("escaped table name is a valid pattern")
                .is_match(statement)
        })
        .map(str::to_string)
        .collect()
}

/// Extract the ordered column names from a CREATE TABLE statement.
///
/// Takes everything between the first `(` and the last `)`, splits it into
/// clauses, and keeps the first whitespace-delimited token of every clause
/// that does not open a table-level constraint.
pub fn extract_columns(statement: &str, script: &str) -> ScriptResult<Vec<String>> {
    let body = parenthesized_body(statement).ok_or_else(|| ScriptError::ColumnsNotFound {
        script: script.to_string(),
    })?;
    let columns: Vec<String> = split_clauses(body)
        .iter()
        .filter_map(|clause| clause.split_whitespace().next())
        .filter(|token| !CONSTRAINT_KEYWORDS.contains(&token.to_uppercase().as_str()))
        .map(str::to_string)
        .collect();
    if columns.is_empty() {
        Err(ScriptError::ColumnsNotFound {
            script: script.to_string(),
        })
    } else {
        Ok(columns)
    }
}

/// Extract the primary-key columns of a CREATE TABLE statement.
///
/// Understands both column-level markers (`season_id INTEGER PRIMARY KEY`)
/// and table-level clauses (`PRIMARY KEY (a, b)`). An empty result means the
/// table declares no key.
pub fn primary_key_columns(statement: &str) -> Vec<String> {
    let Some(body) = parenthesized_body(statement) else {
        return Vec::new();
    };
    let mut keys = Vec::new();
    for clause in split_clauses(body) {
        let upper = clause.to_uppercase();
        if !upper.contains("PRIMARY KEY") {
            continue;
        }
        if upper.starts_with("PRIMARY") {
            if let Some(inner) = parenthesized_body(&clause) {
                keys.extend(
                    inner
                        .split(',')
                        .map(collapse_whitespace)
                        .filter(|column| !column.is_empty()),
                );
            }
        } else if let Some(column) = clause.split_whitespace().next() {
            keys.push(column.to_string());
        }
    }
    keys
}

/// `INSERT INTO <name>(<cols>) VALUES(?, ...)`, one placeholder per column.
pub fn insert_statement(name: &str, columns: &[String]) -> String {
    let cols = columns.join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!("INSERT INTO {name}({cols})\nVALUES({placeholders})")
}

/// Upsert form of [`insert_statement`], keyed on `key_columns`.
///
/// Conflicting rows have their non-key columns overwritten from the incoming
/// row; key columns are equal on conflict by definition and the engine
/// rejects assigning them. Without any key column the plain insert is
/// returned unchanged.
pub fn upsert_statement(name: &str, columns: &[String], key_columns: &[String]) -> String {
    match conflict_clause(columns, key_columns) {
        Some(clause) => format!("{}\n{clause}", insert_statement(name, columns)),
        None => insert_statement(name, columns),
    }
}

/// Merge statement moving all rows from `<name>_staging` into `<name>`.
///
/// `WHERE true` keeps the ON CONFLICT clause from binding to a potential
/// JOIN ON in more elaborate select bodies.
pub fn staging_merge_statement(name: &str, columns: &[String], key_columns: &[String]) -> String {
    let cols = columns.join(", ");
    let base = format!("INSERT INTO {name}\nSELECT {cols} FROM {name}_staging\nWHERE true");
    match conflict_clause(columns, key_columns) {
        Some(clause) => format!("{base}\n{clause}"),
        None => base,
    }
}

/// `ON CONFLICT (<keys>) DO ...` clause shared by the two upsert builders.
///
/// The conflict target is always spelled out: the engine cannot infer it
/// when the insert source is a SELECT.
fn conflict_clause(columns: &[String], key_columns: &[String]) -> Option<String> {
    if key_columns.is_empty() {
        return None;
    }
    let target = key_columns.join(", ");
    let assignments = excluded_assignments(columns, key_columns);
    if assignments.is_empty() {
        Some(format!("ON CONFLICT ({target}) DO NOTHING"))
    } else {
        Some(format!(
            "ON CONFLICT ({target}) DO UPDATE SET {assignments}"
        ))
    }
}

/// `DROP TABLE IF EXISTS <name>`.
pub fn drop_statement(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {name}")
}

fn excluded_assignments(columns: &[String], key_columns: &[String]) -> String {
    columns
        .iter()
        .filter(|column| !key_columns.contains(column))
        .map(|column| format!("{column} = excluded.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Body between the first `(` and the last `)`, if any.
fn parenthesized_body(statement: &str) -> Option<&str> {
    let start = statement.find('(')?;
    let end = statement.rfind(')')?;
    if end <= start {
        return None;
    }
    Some(&statement[start + 1..end])
}

/// Split a column-list body on commas and newlines at parenthesis depth zero,
/// so inline `CHECK (...)` and `PRIMARY KEY (a, b)` clauses stay whole.
fn split_clauses(body: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for ch in body.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' | '\n' if depth == 0 => clauses.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    clauses.push(current);
    clauses
        .iter()
        .map(|clause| collapse_whitespace(clause))
        .filter(|clause| !clause.is_empty())
        .collect()
}

#[cfg(test)]
#[path = "sql_text_test.rs"]
mod tests;
