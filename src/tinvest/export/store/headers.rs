//! Header catalog

use rusqlite::{Connection, params};

use crate::tinvest::export::error::Result;
use crate::tinvest::export::model::Header;

/// Replaces the stored catalog with `headers`. Callers run this inside a
/// transaction so the catalog is never left half written.
pub fn replace_headers(conn: &Connection, headers: &[Header]) -> Result<()> {
    conn.execute("DELETE FROM transaction_headers", [])?;
    let mut stmt =
        conn.prepare("INSERT INTO transaction_headers (column_index, name) VALUES (?1, ?2)")?;
    for header in headers {
        stmt.execute(params![header.column_index, header.name])?;
    }
    Ok(())
}

/// Reads the catalog in column order.
pub fn read_headers(conn: &Connection) -> Result<Vec<Header>> {
    let mut stmt =
        conn.prepare("SELECT column_index, name FROM transaction_headers ORDER BY column_index")?;
    let rows = stmt.query_map([], |row| {
        Ok(Header {
            column_index: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
