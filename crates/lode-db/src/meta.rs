//! Refresh metadata layer.
//!
//! Two small tables make refreshes observable and safely repeatable:
//! `ft_tables_update` is an append-only log of (table, timestamp, row count)
//! entries, and `dm_parameter` is a key/value store written once at setup
//! and read by extraction collaborators.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDateTime};
use lode_core::Value;

use crate::client::Db;
use crate::error::{DbError, DbResult};

/// Storage format of `datetime_updated`, millisecond precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const META_DDL: &str = "\
CREATE TABLE IF NOT EXISTS ft_tables_update (
    table_name VARCHAR NOT NULL,
    datetime_updated VARCHAR NOT NULL,
    rows_number BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS dm_parameter (
    key VARCHAR PRIMARY KEY,
    value DOUBLE NOT NULL
);";

/// Metadata capability of a [`Db`] connection.
pub struct Meta<'a> {
    db: &'a Db,
}

impl<'a> Meta<'a> {
    pub(crate) fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Create the metadata tables when missing; idempotent.
    pub(crate) fn ensure_tables(&self) -> DbResult<()> {
        self.db.execute_batch(META_DDL)?;
        self.db.commit()
    }

    /// Insert the setup parameters, committing immediately.
    pub fn set_parameters(&self, parameters: &BTreeMap<String, f64>) -> DbResult<()> {
        for (key, value) in parameters {
            self.db.execute(
                "INSERT INTO dm_parameter(key, value) VALUES(?, ?)",
                &[Value::Text(key.clone()), Value::Real(*value)],
            )?;
        }
        self.db.commit()
    }

    /// Value of a setup parameter.
    pub fn get_parameter(&self, key: &str) -> DbResult<f64> {
        let rows = self.db.select(
            "SELECT value FROM dm_parameter WHERE key = ?",
            &[Value::Text(key.to_string())],
        )?;
        match rows.first().and_then(|row| row.first()) {
            Some(Value::Real(value)) => Ok(*value),
            Some(Value::Integer(value)) => Ok(*value as f64),
            _ => Err(DbError::ParameterNotFound(key.to_string())),
        }
    }

    /// Append an update-log entry for `table` and commit.
    ///
    /// The timestamp comes from [`Db::timestamp`], so two entries can never
    /// share an instant even when tables refresh back to back.
    pub fn log_table_update(&self, table: &str) -> DbResult<()> {
        let rows = self.db.count_rows(table)?;
        let logged_at = self.db.timestamp().format(TIMESTAMP_FORMAT).to_string();
        log::debug!("logging update of {table} ({rows} rows) at {logged_at}");
        self.db.execute(
            "INSERT INTO ft_tables_update(table_name, datetime_updated, rows_number) VALUES(?, ?, ?)",
            &[
                Value::Text(table.to_string()),
                Value::Text(logged_at),
                Value::Integer(rows),
            ],
        )?;
        self.db.commit()
    }

    /// Timestamp of the most recent logged update of `table`, if any.
    pub fn last_updated(&self, table: &str) -> DbResult<Option<NaiveDateTime>> {
        let rows = self.db.select(
            "SELECT datetime_updated FROM ft_tables_update
             WHERE table_name = ?
             ORDER BY datetime_updated DESC
             LIMIT 1",
            &[Value::Text(table.to_string())],
        )?;
        match rows.first().and_then(|row| row.first()) {
            Some(Value::Text(raw)) => NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
                .map(Some)
                .map_err(|e| DbError::Timestamp {
                    value: raw.clone(),
                    message: e.to_string(),
                }),
            _ => Ok(None),
        }
    }

    /// Whether `table` has a logged update from today (local time).
    pub fn was_updated_today(&self, table: &str) -> DbResult<bool> {
        Ok(self
            .last_updated(table)?
            .map(|ts| ts.date() == Local::now().date_naive())
            .unwrap_or(false))
    }

    /// Whether `table` has a logged update at or after `cutoff`.
    pub fn was_updated_since(&self, table: &str, cutoff: NaiveDateTime) -> DbResult<bool> {
        Ok(self
            .last_updated(table)?
            .map(|ts| ts >= cutoff)
            .unwrap_or(false))
    }
}

#[cfg(test)]
#[path = "meta_test.rs"]
mod tests;
