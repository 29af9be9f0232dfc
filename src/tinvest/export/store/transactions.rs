//! Imported transactions

use rusqlite::{Connection, Row, params};

use crate::tinvest::export::error::Result;
use crate::tinvest::export::model::{COLUMNS, Transaction};

fn column_list() -> String {
    COLUMNS
        .iter()
        .map(|column| format!("\"{column}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Inserts one transaction; the statement commits on its own.
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    let placeholders = (1..=COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO transactions ({}) VALUES ({placeholders})",
        column_list()
    );

    conn.execute(
        &sql,
        params![
            tx.id,
            tx.errand_number,
            tx.conclusion_date,
            tx.time,
            tx.trading_platform,
            tx.trade_regime,
            tx.kind,
            tx.asset_short_name,
            tx.ticker,
            tx.price,
            tx.price_currency,
            tx.count,
            tx.sum_without_nkd,
            tx.nkd,
            tx.sum,
            tx.transaction_currency,
            tx.commission,
            tx.commission_currency,
            tx.repo_rate,
            tx.counterparty,
            tx.settlement_day,
            tx.delivery_date,
            tx.broker_status,
            tx.contract_type,
            tx.contract_number,
            tx.contract_date,
        ],
    )?;
    Ok(())
}

/// All stored transactions in insertion order.
pub fn read_transactions(conn: &Connection) -> Result<Vec<Transaction>> {
    let sql = format!("SELECT {} FROM transactions ORDER BY seq", column_list());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_transaction)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Removes every stored transaction. Returns the number of deleted rows.
pub fn clear_transactions(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM transactions", [])?)
}

fn map_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: row.get(0)?,
        errand_number: row.get(1)?,
        conclusion_date: row.get(2)?,
        time: row.get(3)?,
        trading_platform: row.get(4)?,
        trade_regime: row.get(5)?,
        kind: row.get(6)?,
        asset_short_name: row.get(7)?,
        ticker: row.get(8)?,
        price: row.get(9)?,
        price_currency: row.get(10)?,
        count: row.get(11)?,
        sum_without_nkd: row.get(12)?,
        nkd: row.get(13)?,
        sum: row.get(14)?,
        transaction_currency: row.get(15)?,
        commission: row.get(16)?,
        commission_currency: row.get(17)?,
        repo_rate: row.get(18)?,
        counterparty: row.get(19)?,
        settlement_day: row.get(20)?,
        delivery_date: row.get(21)?,
        broker_status: row.get(22)?,
        contract_type: row.get(23)?,
        contract_number: row.get(24)?,
        contract_date: row.get(25)?,
    })
}
