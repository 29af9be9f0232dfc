use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::tinvest::export::config::{ExportConfig, TemplateStrategy};
use crate::tinvest::export::error::{ExportError, Result};
use crate::tinvest::export::io::sheets::{SheetProperties, SheetsApi, quote_sheet_title, range_rows};
use crate::tinvest::export::model::{COLUMNS, Transaction};
use crate::tinvest::export::store::{self, headers, transactions};

/// Cell the appended table is anchored at on every ticker sheet.
pub const APPEND_ANCHOR: &str = "A6";

/// Fields holding money amounts. `repo_rate` is a rate and keeps the
/// template's format.
pub const MONEY_FIELDS: [&str; 5] = ["price", "sum_without_nkd", "nkd", "sum", "commission"];

/// Options controlling a publishing run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Apply currency number formats to the decimal columns of appended rows.
    pub format_currency: bool,
}

/// Counters reported once every ticker has been published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub sheets_created: usize,
    pub sheets_updated: usize,
    pub rows_appended: usize,
    /// Transactions without a ticker.
    pub skipped: usize,
}

/// Transactions of one instrument, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerGroup {
    pub ticker: String,
    pub transactions: Vec<Transaction>,
}

/// Groups transactions by ticker, keeping the order in which tickers first
/// appear. Returns the groups and the number of transactions without a
/// ticker.
pub fn group_by_ticker(transactions: Vec<Transaction>) -> (Vec<TickerGroup>, usize) {
    let mut groups: Vec<TickerGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for transaction in transactions {
        let Some(ticker) = transaction.ticker.clone().filter(|t| !t.is_empty()) else {
            skipped += 1;
            continue;
        };
        let position = *positions.entry(ticker.clone()).or_insert_with(|| {
            groups.push(TickerGroup {
                ticker,
                transactions: Vec::new(),
            });
            groups.len() - 1
        });
        groups[position].transactions.push(transaction);
    }

    (groups, skipped)
}

/// Sheet titles of the target spreadsheet, kept current while sheets are
/// added during the run.
#[derive(Debug, Default)]
struct SheetIndex {
    by_title: HashMap<String, i64>,
    count: usize,
}

impl SheetIndex {
    fn new(sheets: Vec<SheetProperties>) -> Self {
        let count = sheets.len();
        let by_title = sheets
            .into_iter()
            .map(|sheet| (sheet.title, sheet.sheet_id))
            .collect();
        Self { by_title, count }
    }

    fn get(&self, title: &str) -> Option<i64> {
        self.by_title.get(title).copied()
    }

    fn add(&mut self, title: &str, sheet_id: i64) {
        self.by_title.insert(title.to_string(), sheet_id);
        self.count += 1;
    }
}

/// Publishes stored transactions to one spreadsheet, one sheet per ticker.
pub struct Publisher<'a, S: SheetsApi + ?Sized> {
    api: &'a S,
    spreadsheet_id: String,
    templates: TemplateStrategy,
    options: PublishOptions,
}

impl<'a, S: SheetsApi + ?Sized> Publisher<'a, S> {
    pub fn new(api: &'a S, config: &ExportConfig, options: PublishOptions) -> Self {
        Self {
            api,
            spreadsheet_id: config.spreadsheet_id.clone(),
            templates: config.templates.clone(),
            options,
        }
    }

    /// Publishes every transaction stored in `database`.
    #[instrument(
        level = "info",
        skip_all,
        fields(database = %database.display(), spreadsheet = %self.spreadsheet_id)
    )]
    pub fn publish(&self, database: &Path) -> Result<PublishSummary> {
        let conn = store::open(database)?;
        let header_count = headers::read_headers(&conn)?.len();
        let stored = transactions::read_transactions(&conn)?;
        drop(conn);

        info!(transactions = stored.len(), header_count, "loaded transactions");
        self.publish_transactions(stored, header_count)
    }

    /// Publishes the given transactions, truncating every row to
    /// `header_count` values.
    pub fn publish_transactions(
        &self,
        stored: Vec<Transaction>,
        header_count: usize,
    ) -> Result<PublishSummary> {
        let (groups, skipped) = group_by_ticker(stored);
        if skipped > 0 {
            warn!(skipped, "transactions without ticker were not published");
        }

        let mut sheets = SheetIndex::new(self.api.sheets(&self.spreadsheet_id)?);
        let templates = self.resolve_templates(&mut sheets)?;

        let mut summary = PublishSummary {
            skipped,
            ..PublishSummary::default()
        };
        for group in &groups {
            let rows: Vec<_> = group
                .transactions
                .iter()
                .map(|transaction| {
                    let mut values = transaction.to_values();
                    values.truncate(header_count);
                    values
                })
                .collect();

            let sheet_id = match sheets.get(&group.ticker) {
                Some(sheet_id) => {
                    summary.sheets_updated += 1;
                    sheet_id
                }
                None => {
                    let currency = group_currency(group);
                    let template = templates.get(&currency).copied().ok_or_else(|| {
                        ExportError::UnknownCurrency {
                            ticker: group.ticker.clone(),
                            currency: currency.clone(),
                        }
                    })?;
                    let sheet_id = self.api.duplicate_sheet(
                        &self.spreadsheet_id,
                        template,
                        sheets.count,
                        &group.ticker,
                    )?;
                    sheets.add(&group.ticker, sheet_id);
                    summary.sheets_created += 1;
                    info!(ticker = %group.ticker, %currency, "created sheet from template");
                    sheet_id
                }
            };

            let range = format!("{}!{APPEND_ANCHOR}", quote_sheet_title(&group.ticker));
            let appended = self
                .api
                .append_values(&self.spreadsheet_id, &range, &rows)?;
            summary.rows_appended += rows.len();
            info!(ticker = %group.ticker, rows = rows.len(), "rows appended");

            if self.options.format_currency {
                if let Some(span) = appended.updated_range.as_deref().and_then(range_rows) {
                    let columns = money_columns(header_count);
                    self.api.format_number_cells(
                        &self.spreadsheet_id,
                        sheet_id,
                        &columns,
                        span,
                        currency_pattern(&group_currency(group)),
                    )?;
                }
            }
        }

        info!(
            created = summary.sheets_created,
            updated = summary.sheets_updated,
            rows = summary.rows_appended,
            "publish finished"
        );
        Ok(summary)
    }

    fn resolve_templates(&self, sheets: &mut SheetIndex) -> Result<BTreeMap<String, i64>> {
        let mut resolved = BTreeMap::new();
        match &self.templates {
            TemplateStrategy::Explicit { rub, usd } => {
                resolved.insert("RUB".to_string(), *rub);
                resolved.insert("USD".to_string(), *usd);
            }
            TemplateStrategy::Library(library) => {
                for template in &library.templates {
                    let sheet_id = match sheets.get(&template.title) {
                        Some(sheet_id) => sheet_id,
                        None => {
                            let sheet_id = self.api.copy_sheet_to(
                                &library.spreadsheet_id,
                                template.sheet_id,
                                &self.spreadsheet_id,
                            )?;
                            self.api
                                .rename_sheet(&self.spreadsheet_id, sheet_id, &template.title, 0)?;
                            sheets.add(&template.title, sheet_id);
                            info!(title = %template.title, "template copied from library");
                            sheet_id
                        }
                    };
                    resolved.insert(template.currency.clone(), sheet_id);
                }
            }
        }
        debug!(?resolved, "templates resolved");
        Ok(resolved)
    }
}

fn group_currency(group: &TickerGroup) -> String {
    group
        .transactions
        .first()
        .and_then(|transaction| transaction.price_currency.clone())
        .unwrap_or_default()
}

/// Positions of the money fields within an exported row.
pub fn money_columns(header_count: usize) -> Vec<usize> {
    COLUMNS
        .iter()
        .enumerate()
        .filter(|(position, name)| *position < header_count && MONEY_FIELDS.contains(*name))
        .map(|(position, _)| position)
        .collect()
}

fn currency_pattern(currency: &str) -> &'static str {
    match currency {
        "RUB" => "#,##0.00[₽]",
        _ => "#,##0.00[$]",
    }
}
