//! SQLite persistence for imported transactions, the header catalog and CLI
//! settings.
//!
//! Every operation opens its own connection through [`open`] and drops it
//! when done; nothing keeps a handle across pipeline stages.

pub mod headers;
pub mod settings;
pub mod transactions;

use std::path::Path;

use rusqlite::Connection;
use tracing::debug;

use crate::tinvest::export::error::Result;

/// Default database file, created next to the working directory.
pub const DEFAULT_DATABASE: &str = "Transactions.db";

const SCHEMA: &str = include_str!("schema.sql");

/// Opens the database at `path` and applies the schema. Safe to call on an
/// already initialised file.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Applies the guarded DDL script.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    debug!("schema applied");
    Ok(())
}
