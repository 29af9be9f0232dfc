use std::fmt;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::tinvest::export::error::{ExportError, Result};
use crate::tinvest::export::io::report_read::{
    END_OF_BLOCK_MARKER, FIRST_DATA_ROW, LAST_DATA_ROW, Report,
};
use crate::tinvest::export::model::{CellValue, FIELD_COUNT, TYPE_FIELD, TradeSide, Transaction};
use crate::tinvest::export::store::{self, headers, transactions};

/// Options controlling a single import run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Delete previously imported transactions once the header row has been
    /// accepted.
    pub fresh: bool,
}

/// Row counters reported once the scan finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Buy and sell rows written to the store.
    pub imported: usize,
    /// Rows with any other operation type, such as repo legs.
    pub repo: usize,
    /// Rows that failed conversion or insertion.
    pub errors: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "imported transactions: {}", self.imported)?;
        writeln!(f, "unrecognised trades (repo and similar): {}", self.repo)?;
        write!(f, "errors: {}", self.errors)
    }
}

enum RowOutcome {
    Imported,
    Repo,
}

/// Imports the buy and sell rows of the report at `report_path` into the
/// database at `database`.
///
/// The header catalog is re-extracted and replaced on every run. Row level
/// failures are counted and logged; the scan carries on with the next row.
#[instrument(
    level = "info",
    skip_all,
    fields(report = %report_path.display(), database = %database.display())
)]
pub fn import_report(
    report_path: &Path,
    database: &Path,
    options: ImportOptions,
) -> Result<ImportSummary> {
    let report = Report::open(report_path)?;
    let mut conn = store::open(database)?;

    let header_catalog = report.headers();
    if header_catalog.len() != FIELD_COUNT {
        return Err(ExportError::HeaderMismatch {
            expected: FIELD_COUNT,
            found: header_catalog.len(),
        });
    }

    let tx = conn.transaction()?;
    if options.fresh {
        let removed = transactions::clear_transactions(&tx)?;
        info!(removed, "cleared previously imported transactions");
    }
    headers::replace_headers(&tx, &header_catalog)?;
    tx.commit()?;
    debug!(header_count = header_catalog.len(), "header catalog stored");

    let mut summary = ImportSummary::default();
    for row in FIRST_DATA_ROW..=LAST_DATA_ROW {
        let first = report.cell(row, 0);
        if first.is_empty() {
            continue;
        }
        if first
            .as_text()
            .is_some_and(|text| text.contains(END_OF_BLOCK_MARKER))
        {
            debug!(row = row + 1, "end of trade block");
            break;
        }

        let cells = report.project_row(row, &header_catalog);
        match import_row(&conn, &cells) {
            Ok(RowOutcome::Imported) => summary.imported += 1,
            Ok(RowOutcome::Repo) => summary.repo += 1,
            Err(error) => {
                warn!(row = row + 1, %error, "skipping row");
                summary.errors += 1;
            }
        }
    }

    info!(
        imported = summary.imported,
        repo = summary.repo,
        errors = summary.errors,
        "report imported"
    );
    Ok(summary)
}

fn import_row(conn: &Connection, cells: &[CellValue]) -> Result<RowOutcome> {
    let side = cells
        .get(TYPE_FIELD)
        .and_then(CellValue::as_text)
        .and_then(|label| TradeSide::from_label(&label));
    if side.is_none() {
        return Ok(RowOutcome::Repo);
    }

    let transaction = Transaction::from_cells(cells)?;
    transactions::insert_transaction(conn, &transaction)?;
    Ok(RowOutcome::Imported)
}
