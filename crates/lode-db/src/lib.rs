//! lode-db - Database client for Lodestone
//!
//! One DuckDB connection wrapped with explicit transaction control, typed
//! row reading, column introspection with a distinguished "no such table"
//! condition, and the refresh metadata layer (`ft_tables_update`,
//! `dm_parameter`).

pub mod client;
pub mod error;
pub mod meta;

pub use client::Db;
pub use error::{DbError, DbResult};
pub use meta::Meta;
