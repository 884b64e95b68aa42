//! Warehouse and staging table abstractions.
//!
//! The two kinds share one contract: a name, the set of registered tables
//! they depend on, and an `update` against the shared connection. Warehouse
//! tables replay their create/populate statements; staging tables recreate
//! themselves on schema drift, pull a fresh batch from their extraction
//! callable, and upsert it on the declared key.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use lode_core::{sql_text, DefinitionScript, Row, ScriptError, TableName};
use lode_db::{Db, DbError};

use crate::error::{BuildError, BuildResult, TableUpdateError};
use crate::recovery;
use crate::schema::Schema;

/// Zero-argument extraction callable supplied by a collaborator.
///
/// Collaborators that need to look at already-loaded data capture their own
/// `Rc<Db>` handle; the engine guarantees they only ever observe committed
/// state.
pub type ExtractFn = Box<dyn Fn() -> anyhow::Result<Vec<Row>>>;

/// A registered table, one of the two refreshable kinds.
pub enum Table {
    Warehouse(WarehouseTable),
    Staging(StagingTable),
}

impl Table {
    /// Name the table is registered under.
    pub fn name(&self) -> &TableName {
        match self {
            Table::Warehouse(table) => table.name(),
            Table::Staging(table) => table.name(),
        }
    }

    /// Names of the registered tables this table reads from.
    pub fn depends_on(&self, schema: &Schema) -> BTreeSet<TableName> {
        match self {
            Table::Warehouse(table) => table.depends_on(schema),
            Table::Staging(table) => table.depends_on(),
        }
    }

    /// Refresh the table contents against `db`.
    pub fn update(&self, db: &Db) -> BuildResult<()> {
        match self {
            Table::Warehouse(table) => table.update(db),
            Table::Staging(table) => table.update(db),
        }
    }
}

impl From<WarehouseTable> for Table {
    fn from(table: WarehouseTable) -> Self {
        Table::Warehouse(table)
    }
}

impl From<StagingTable> for Table {
    fn from(table: StagingTable) -> Self {
        Table::Staging(table)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Warehouse(table) => fmt::Debug::fmt(table, f),
            Table::Staging(table) => fmt::Debug::fmt(table, f),
        }
    }
}

/// Externally queryable table representing current truth for an entity.
#[derive(Debug)]
pub struct WarehouseTable {
    name: TableName,
    create_statement: String,
    populate_statement: String,
}

impl WarehouseTable {
    /// Build from explicit create and populate statements.
    pub fn new(
        name: impl Into<TableName>,
        create_statement: impl Into<String>,
        populate_statement: impl Into<String>,
    ) -> BuildResult<Self> {
        let name = name.into();
        let create_statement = create_statement.into();
        let populate_statement = populate_statement.into();
        sql_text::validate_create_statement(&create_statement, &name)?;
        sql_text::validate_insert_statement(&populate_statement, &name)?;
        Ok(Self {
            name,
            create_statement,
            populate_statement,
        })
    }

    /// Build from a raw definition script.
    pub fn from_script(name: impl Into<TableName>, script: &str) -> BuildResult<Self> {
        let script = DefinitionScript::parse(name, script)?;
        Ok(Self::from_definition(&script))
    }

    /// Build from an already-parsed definition script.
    pub fn from_definition(script: &DefinitionScript) -> Self {
        Self {
            name: script.name().clone(),
            create_statement: script.create_table().to_string(),
            populate_statement: script.populate_table().to_string(),
        }
    }

    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Every other registered table the populate statement references as a
    /// standalone word. References inside a leading CTE count like any
    /// other, so CTE names must not shadow registered tables.
    pub fn depends_on(&self, schema: &Schema) -> BTreeSet<TableName> {
        let candidates = schema
            .names()
            .filter(|name| *name != &self.name)
            .map(TableName::as_str);
        sql_text::referenced_tables(&self.populate_statement, candidates)
            .into_iter()
            .map(TableName::from)
            .collect()
    }

    /// Execute the idempotent create, replay the populate statement, commit.
    pub fn update(&self, db: &Db) -> BuildResult<()> {
        log::info!("refreshing warehouse table {}", self.name);
        self.run(db).map_err(|source| BuildError::TableUpdate {
            table: self.name.clone(),
            source,
        })
    }

    fn run(&self, db: &Db) -> Result<(), TableUpdateError> {
        db.execute_batch(&self.create_statement)?;
        db.execute_batch(&self.populate_statement)?;
        db.commit()?;
        Ok(())
    }
}

/// Holding area for freshly extracted raw rows.
pub struct StagingTable {
    name: TableName,
    create_statement: String,
    columns: Vec<String>,
    load_statement: String,
    extract: ExtractFn,
    recovery_dir: PathBuf,
}

impl StagingTable {
    /// Build from a declared schema and an extraction callable.
    ///
    /// This is the only contract required from scraping collaborators: the
    /// declared statement fixes the column tuple, and the callable hands
    /// back rows carrying their own field names.
    pub fn new(
        name: impl Into<TableName>,
        definition: impl Into<String>,
        extract: ExtractFn,
    ) -> BuildResult<Self> {
        let name = name.into();
        let create_statement = definition.into();
        let columns = sql_text::extract_columns(&create_statement, &name)?;
        let key_columns = sql_text::primary_key_columns(&create_statement);
        let load_statement = sql_text::upsert_statement(&name, &columns, &key_columns);
        Ok(Self {
            name,
            create_statement,
            columns,
            load_statement,
            extract,
            recovery_dir: PathBuf::from("."),
        })
    }

    /// Build from a single-statement definition script.
    pub fn from_script(
        name: impl Into<TableName>,
        script: &str,
        extract: ExtractFn,
    ) -> BuildResult<Self> {
        let name = name.into();
        let statements = sql_text::split_statements(script);
        if statements.len() != 1 {
            return Err(ScriptError::StatementCount {
                script: name.to_string(),
                expected: "exactly 1",
                found: statements.len(),
            }
            .into());
        }
        sql_text::validate_staging_statement(statements[0], &name)?;
        Self::new(name, statements[0], extract)
    }

    /// Build the `<name>_staging` twin of a parsed warehouse script.
    pub fn from_definition(script: &DefinitionScript, extract: ExtractFn) -> BuildResult<Self> {
        Self::new(script.staging_name(), script.create_staging_table(), extract)
    }

    /// Override where recovery CSVs are written (default: working directory).
    pub fn with_recovery_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.recovery_dir = dir.into();
        self
    }

    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Declared column tuple, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Staging tables are graph leaves: their freshness is driven by
    /// external state, not by other tables.
    pub fn depends_on(&self) -> BTreeSet<TableName> {
        BTreeSet::new()
    }

    /// Recreate on drift, extract, validate the batch shape, upsert, commit.
    pub fn update(&self, db: &Db) -> BuildResult<()> {
        log::info!("refreshing staging table {}", self.name);
        self.run(db).map_err(|source| BuildError::TableUpdate {
            table: self.name.clone(),
            source,
        })
    }

    fn run(&self, db: &Db) -> Result<(), TableUpdateError> {
        self.recreate_if_drifted(db)?;

        let rows = (self.extract)().map_err(TableUpdateError::Extraction)?;
        if rows.is_empty() {
            log::warn!(
                "no rows extracted for {}; existing rows left untouched",
                self.name
            );
            return Ok(());
        }

        if let Err(load_err) = self.load(db, &rows) {
            let _ = db.rollback();
            match recovery::write_batch(&self.recovery_dir, &self.name, &rows) {
                Ok(path) => log::warn!(
                    "wrote {} unloaded rows for {} to {}",
                    rows.len(),
                    self.name,
                    path.display()
                ),
                Err(err) => log::error!(
                    "could not write recovery file for {}: {err}",
                    self.name
                ),
            }
            return Err(load_err);
        }
        Ok(())
    }

    /// Drop and recreate the table when its on-disk columns differ from the
    /// declared tuple (or the table does not exist yet), committing right
    /// away: the extraction callable may query the database and must see a
    /// stable, already-committed shape.
    fn recreate_if_drifted(&self, db: &Db) -> Result<(), TableUpdateError> {
        let on_disk = match db.get_attributes(&self.name) {
            Ok(attributes) => Some(attributes),
            Err(DbError::NoSuchTable(_)) => None,
            Err(err) => return Err(err.into()),
        };
        if on_disk.as_deref() == Some(self.columns.as_slice()) {
            return Ok(());
        }
        log::info!(
            "staging table {} is absent or drifted; recreating",
            self.name
        );
        db.execute_batch(&sql_text::drop_statement(&self.name))?;
        db.execute_batch(&self.create_statement)?;
        db.commit()?;
        Ok(())
    }

    fn load(&self, db: &Db, rows: &[Row]) -> Result<(), TableUpdateError> {
        self.check_batch_shape(rows)?;
        db.execute_many(&self.load_statement, rows.iter().map(Row::values))?;
        db.commit()?;
        Ok(())
    }

    /// The first and last rows stand in for the whole batch: the load
    /// statement is generated from the declared columns, and data must not
    /// end up under the wrong names.
    fn check_batch_shape(&self, rows: &[Row]) -> Result<(), TableUpdateError> {
        for row in [rows.first(), rows.last()].into_iter().flatten() {
            if self.columns != row.fields() {
                return Err(TableUpdateError::IncompatibleData {
                    expected: self.columns.clone(),
                    found: row.fields().to_vec(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StagingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingTable")
            .field("name", &self.name)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod tests;
