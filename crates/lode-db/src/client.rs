//! Database connection wrapper.
//!
//! [`Db`] owns one DuckDB [`Connection`] and layers explicit transaction
//! discipline on top of it: the first statement after a commit opens a new
//! transaction, and [`commit`](Db::commit) / [`rollback`](Db::rollback)
//! close it. All methods take `&self`, so a single connection can be shared
//! through `Rc<Db>` with extraction collaborators that need to read
//! committed state mid-refresh.

use std::cell::Cell;
use std::path::Path;

use chrono::{Duration, Local, NaiveDateTime, Timelike};
use duckdb::types::{ToSqlOutput, Value as DuckValue};
use duckdb::{Connection, ToSql};
use lode_core::Value;

use crate::error::{DbError, DbResult};
use crate::meta::Meta;

/// Interface to the embedded store.
pub struct Db {
    conn: Connection,
    in_transaction: Cell<bool>,
    last_timestamp: Cell<Option<NaiveDateTime>>,
}

impl Db {
    /// Open (or create) the database file at `path`.
    ///
    /// The metadata tables are ensured on every open.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| DbError::Connection(format!("{e}: {}", path.as_ref().display())))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database, useful for tests and dry runs.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::Connection(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        let db = Self {
            conn,
            in_transaction: Cell::new(false),
            last_timestamp: Cell::new(None),
        };
        db.meta().ensure_tables()?;
        Ok(db)
    }

    /// Borrow the metadata capability of this connection.
    pub fn meta(&self) -> Meta<'_> {
        Meta::new(self)
    }

    /// Execute a single parameterized statement, returning affected rows.
    pub fn execute(&self, statement: &str, params: &[Value]) -> DbResult<usize> {
        self.begin_if_needed()?;
        let bound = bind(params);
        self.conn
            .execute(statement, &as_sql_refs(&bound)[..])
            .map_err(|e| classify(e, statement))
    }

    /// Execute a script of one or more statements without parameters.
    pub fn execute_batch(&self, script: &str) -> DbResult<()> {
        self.begin_if_needed()?;
        self.conn
            .execute_batch(script)
            .map_err(|e| classify(e, script))
    }

    /// Execute one prepared statement once per parameter batch.
    pub fn execute_many<'a, I>(&self, statement: &str, batches: I) -> DbResult<usize>
    where
        I: IntoIterator<Item = &'a [Value]>,
    {
        self.begin_if_needed()?;
        let mut stmt = self
            .conn
            .prepare(statement)
            .map_err(|e| classify(e, statement))?;
        let mut affected = 0;
        for params in batches {
            let bound = bind(params);
            affected += stmt
                .execute(&as_sql_refs(&bound)[..])
                .map_err(|e| classify(e, statement))?;
        }
        Ok(affected)
    }

    /// Run a SELECT and return every row as a vector of [`Value`]s.
    pub fn select(&self, statement: &str, params: &[Value]) -> DbResult<Vec<Vec<Value>>> {
        self.begin_if_needed()?;
        let bound = bind(params);
        let mut stmt = self
            .conn
            .prepare(statement)
            .map_err(|e| classify(e, statement))?;
        stmt.query_map(&as_sql_refs(&bound)[..], |row| {
            let columns = row.as_ref().column_count();
            Ok((0..columns).map(|idx| read_value(row, idx)).collect())
        })
        .map_err(|e| classify(e, statement))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| classify(e, statement))
    }

    /// Number of rows currently in `table`.
    pub fn count_rows(&self, table: &str) -> DbResult<i64> {
        let statement = format!("SELECT COUNT(*) FROM {table}");
        let rows = self.select(&statement, &[])?;
        match rows.first().and_then(|row| row.first()) {
            Some(Value::Integer(count)) => Ok(*count),
            other => Err(DbError::Execution {
                statement,
                message: format!("expected an integer count, got {other:?}"),
            }),
        }
    }

    /// All rows of `table`, in whatever order the engine returns them.
    pub fn get_all_rows(&self, table: &str) -> DbResult<Vec<Vec<Value>>> {
        self.select(&format!("SELECT * FROM {table}"), &[])
    }

    /// Ordered column names of `table`.
    ///
    /// Returns [`DbError::NoSuchTable`] when the table was never created,
    /// which is how staging updates tell "first run" from schema drift.
    pub fn get_attributes(&self, table: &str) -> DbResult<Vec<String>> {
        let statement = format!("PRAGMA table_info('{table}')");
        let rows = self.select(&statement, &[])?;
        rows.iter()
            .map(|row| match row.get(1) {
                Some(Value::Text(name)) => Ok(name.clone()),
                other => Err(DbError::Execution {
                    statement: statement.clone(),
                    message: format!("expected a column name, got {other:?}"),
                }),
            })
            .collect()
    }

    /// Commit the open transaction; a no-op when none is open.
    pub fn commit(&self) -> DbResult<()> {
        if self.in_transaction.replace(false) {
            self.conn
                .execute_batch("COMMIT")
                .map_err(|e| DbError::Transaction(format!("COMMIT failed: {e}")))?;
        }
        Ok(())
    }

    /// Roll back the open transaction; a no-op when none is open.
    pub fn rollback(&self) -> DbResult<()> {
        if self.in_transaction.replace(false) {
            self.conn
                .execute_batch("ROLLBACK")
                .map_err(|e| DbError::Transaction(format!("ROLLBACK failed: {e}")))?;
        }
        Ok(())
    }

    /// A strictly increasing local timestamp, millisecond resolution.
    ///
    /// Two calls in the same millisecond are forced one millisecond apart,
    /// so update-log entries stay ordered even across rapid refreshes.
    pub fn timestamp(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        let mut ts = now
            .with_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
            .unwrap_or(now);
        if let Some(previous) = self.last_timestamp.get() {
            if ts <= previous {
                ts = previous + Duration::milliseconds(1);
            }
        }
        self.last_timestamp.set(Some(ts));
        ts
    }

    fn begin_if_needed(&self) -> DbResult<()> {
        if !self.in_transaction.get() {
            self.conn
                .execute_batch("BEGIN TRANSACTION")
                .map_err(|e| DbError::Transaction(format!("BEGIN failed: {e}")))?;
            self.in_transaction.set(true);
        }
        Ok(())
    }
}

/// Classify DuckDB errors by inspecting the message.
///
/// duckdb::Error does not expose structured variants, so string matching is
/// the only reliable way to tell a missing relation from a real failure.
/// The patterns are kept narrow to avoid misclassifying function or schema
/// errors.
fn classify(err: duckdb::Error, statement: &str) -> DbError {
    let message = err.to_string();
    if message.contains("Table with name")
        || message.contains("View with name")
        || message.contains("Table or view with name")
        || (message.contains("Catalog Error") && message.contains("Table") && message.contains("not found"))
    {
        DbError::NoSuchTable(message)
    } else {
        DbError::Execution {
            statement: statement.to_string(),
            message,
        }
    }
}

/// Read one column, probing types from narrowest to widest.
///
/// A probe returning `Ok(None)` means either NULL or a type mismatch, so the
/// NULL verdict is only reached after every typed probe has passed.
fn read_value(row: &duckdb::Row<'_>, idx: usize) -> Value {
    if let Ok(Some(n)) = row.get::<_, Option<i64>>(idx) {
        return Value::Integer(n);
    }
    if let Ok(Some(f)) = row.get::<_, Option<f64>>(idx) {
        return Value::Real(f);
    }
    if let Ok(Some(b)) = row.get::<_, Option<bool>>(idx) {
        return Value::Boolean(b);
    }
    if let Ok(Some(s)) = row.get::<_, Option<String>>(idx) {
        return Value::Text(s);
    }
    Value::Null
}

struct SqlParam<'a>(&'a Value);

impl ToSql for SqlParam<'_> {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(match self.0 {
            Value::Null => DuckValue::Null,
            Value::Boolean(b) => DuckValue::Boolean(*b),
            Value::Integer(n) => DuckValue::BigInt(*n),
            Value::Real(f) => DuckValue::Double(*f),
            Value::Text(s) => DuckValue::Text(s.clone()),
        }))
    }
}

fn bind<'a>(params: &'a [Value]) -> Vec<SqlParam<'a>> {
    params.iter().map(SqlParam).collect()
}

fn as_sql_refs<'a>(bound: &'a [SqlParam<'a>]) -> Vec<&'a dyn ToSql> {
    bound.iter().map(|param| param as &dyn ToSql).collect()
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
