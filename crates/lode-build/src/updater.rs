//! Dependency-ordered, idempotent refresh.
//!
//! The updater visits the dependency graph depth-first and keeps no state
//! of its own: "already refreshed this run" is read back from the update
//! log against a cutoff reserved when the run starts. That makes reruns
//! after a mid-run failure safe, since everything committed earlier is
//! skipped on the next pass.

use chrono::NaiveDateTime;
use lode_core::TableName;
use lode_db::Db;

use crate::error::{BuildError, BuildResult};
use crate::schema::Schema;
use crate::table::Table;

/// One refresh run over a schema registry.
pub struct Updater<'a> {
    db: &'a Db,
    schema: &'a Schema,
    run_start: NaiveDateTime,
}

impl<'a> Updater<'a> {
    /// Start a run, reserving its cutoff from the shared update-log clock.
    pub fn new(db: &'a Db, schema: &'a Schema) -> Self {
        let run_start = db.timestamp();
        log::debug!("refresh run starting at {run_start}");
        Self {
            db,
            schema,
            run_start,
        }
    }

    /// Refresh every registered table, in registration order.
    ///
    /// The recursion makes the effective order correct regardless of how
    /// the registry was assembled.
    pub fn refresh_all(&self) -> BuildResult<()> {
        for table in self.schema.tables() {
            self.refresh_table(table)?;
        }
        Ok(())
    }

    /// Refresh one table and, before it, its transitive dependencies.
    pub fn refresh(&self, name: &str) -> BuildResult<()> {
        let table = self
            .schema
            .get(name)
            .ok_or_else(|| BuildError::UnknownTable(TableName::from(name)))?;
        self.refresh_table(table)
    }

    fn refresh_table(&self, table: &Table) -> BuildResult<()> {
        for dependency in table.depends_on(self.schema) {
            if let Some(upstream) = self.schema.get(&dependency) {
                self.refresh_table(upstream)?;
            }
        }

        if self
            .db
            .meta()
            .was_updated_since(table.name(), self.run_start)?
        {
            log::debug!("{} already refreshed this run", table.name());
            return Ok(());
        }

        table.update(self.db)?;
        self.db.meta().log_table_update(table.name())?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "updater_test.rs"]
mod tests;
