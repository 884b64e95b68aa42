//! Definition-script parsing and derivation.
//!
//! A definition script is the single source of truth for one warehouse table
//! and its staging twin. Two shapes are accepted:
//!
//! - a single `CREATE TABLE IF NOT EXISTS <name> (...)` statement, from
//!   which the staging create and the merge statement are derived;
//! - three or more statements: the warehouse create, an explicit
//!   `CREATE TABLE <name>_staging (...)`, and one or more statements that
//!   together populate the warehouse table.
//!
//! Everything is validated and extracted up front so a parsed script can be
//! queried without further failure modes.

use crate::error::{ScriptError, ScriptResult};
use crate::sql_text;
use crate::table_name::TableName;

/// A validated definition script for one table.
#[derive(Debug, Clone)]
pub struct DefinitionScript {
    name: TableName,
    create_statement: String,
    staging_statement: String,
    populate_statement: String,
    columns: Vec<String>,
    staging_columns: Vec<String>,
    key_columns: Vec<String>,
}

impl DefinitionScript {
    /// Parse and validate `script` as the definition of table `name`.
    pub fn parse(name: impl Into<TableName>, script: &str) -> ScriptResult<Self> {
        let name = name.into();
        let statements = sql_text::split_statements(script);
        if statements.len() != 1 && statements.len() < 3 {
            return Err(ScriptError::StatementCount {
                script: name.to_string(),
                expected: "1 or 3+",
                found: statements.len(),
            });
        }
        sql_text::validate_create_statement(statements[0], &name)?;
        let create_statement = statements[0].to_string();
        let staging_name = format!("{name}_staging");

        let (staging_statement, explicit_populate) = if statements.len() > 1 {
            sql_text::validate_staging_statement(statements[1], &staging_name)?;
            let tail = statements[2..].join(";\n");
            sql_text::validate_insert_statement(&tail, &name)?;
            (statements[1].to_string(), Some(tail))
        } else {
            (derive_staging_statement(&create_statement, &name), None)
        };

        let columns = sql_text::extract_columns(&create_statement, &name)?;
        let staging_columns = sql_text::extract_columns(&staging_statement, &name)?;
        let key_columns = sql_text::primary_key_columns(&create_statement);
        let populate_statement = explicit_populate
            .unwrap_or_else(|| sql_text::staging_merge_statement(&name, &columns, &key_columns));

        Ok(Self {
            name,
            create_statement,
            staging_statement,
            populate_statement,
            columns,
            staging_columns,
            key_columns,
        })
    }

    /// Name of the warehouse table this script defines.
    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Name of the staging twin, by the `<name>_staging` convention.
    pub fn staging_name(&self) -> TableName {
        TableName::new(format!("{}_staging", self.name))
    }

    /// The idempotent warehouse create statement.
    pub fn create_table(&self) -> &str {
        &self.create_statement
    }

    /// The staging create statement, explicit or derived.
    ///
    /// Derived statements are the warehouse create with every occurrence of
    /// the table name substituted by `<name>_staging` and `IF NOT EXISTS`
    /// stripped, so they always recreate from scratch.
    pub fn create_staging_table(&self) -> &str {
        &self.staging_statement
    }

    /// The statement populating the warehouse table, explicit or derived.
    pub fn populate_table(&self) -> &str {
        &self.populate_statement
    }

    /// Ordered warehouse columns.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Ordered staging columns.
    pub fn staging_columns(&self) -> &[String] {
        &self.staging_columns
    }

    /// Primary-key columns of the warehouse table; empty when none declared.
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Parameterized insert template for the staging twin, one placeholder
    /// per staging column, order-preserving.
    pub fn staging_insert(&self) -> String {
        sql_text::insert_statement(&self.staging_name(), &self.staging_columns)
    }
}

fn derive_staging_statement(create_statement: &str, name: &str) -> String {
    create_statement
        .replace(name, &format!("{name}_staging"))
        .replace("IF NOT EXISTS ", "")
}

#[cfg(test)]
#[path = "script_test.rs"]
mod tests;
