//! Settings persisted between runs

use std::collections::BTreeMap;

use rusqlite::{Connection, params};

use crate::tinvest::export::error::Result;

/// Keys that describe a single invocation and are never persisted.
pub const RESERVED_KEYS: [&str; 2] = ["storeArgs", "fileName"];

/// Upserts every present value, skipping `None` and reserved keys. Returns
/// the number of written settings.
pub fn store_settings<'a, I>(conn: &mut Connection, args: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, Option<String>)>,
{
    let tx = conn.transaction()?;
    let mut written = 0;
    {
        let mut stmt = tx.prepare("INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)")?;
        for (key, value) in args {
            let Some(value) = value else { continue };
            if RESERVED_KEYS.contains(&key) {
                continue;
            }
            stmt.execute(params![key, value])?;
            written += 1;
        }
    }
    tx.commit()?;
    Ok(written)
}

/// Reads all stored settings.
pub fn read_settings(conn: &Connection) -> Result<BTreeMap<String, String>> {
    let mut stmt = conn.prepare("SELECT key, value FROM settings")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
}
