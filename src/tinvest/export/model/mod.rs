use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tinvest::export::error::{ExportError, Result};

/// Number of fields in a persisted transaction. The header row of the report
/// must label exactly this many columns.
pub const FIELD_COUNT: usize = 26;

/// Position of the operation type inside a projected row.
pub const TYPE_FIELD: usize = 6;

/// Column names of the `transactions` table, in header catalog order.
pub const COLUMNS: [&str; FIELD_COUNT] = [
    "id",
    "errand_number",
    "conclusion_date",
    "time",
    "trading_platform",
    "trade_regime",
    "type",
    "asset_short_name",
    "ticker",
    "price",
    "price_currency",
    "count",
    "sum_without_nkd",
    "nkd",
    "sum",
    "transaction_currency",
    "commission",
    "commission_currency",
    "repo_rate",
    "counterparty",
    "settlement_day",
    "delivery_date",
    "broker_status",
    "contract_type",
    "contract_number",
    "contract_date",
];

/// Fields whose report text uses a comma decimal separator and is stored as a
/// float.
pub const DECIMAL_FIELDS: [&str; 6] = [
    "price",
    "sum_without_nkd",
    "nkd",
    "sum",
    "commission",
    "repo_rate",
];

/// One labelled column of the report header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Zero-based column position in the source sheet.
    pub column_index: u32,
    /// Display label with line breaks removed.
    pub name: String,
}

impl Header {
    pub fn new(column_index: u32, name: impl Into<String>) -> Self {
        Self {
            column_index,
            name: name.into(),
        }
    }
}

/// Cell content after it has been lifted out of the workbook.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Renders the cell as text, `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(value) => Some(value.clone()),
            CellValue::Number(value) => Some(value.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(value) => value.is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

/// Operation types that are imported as tradable transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub const BUY_LABEL: &'static str = "Покупка";
    pub const SELL_LABEL: &'static str = "Продажа";

    /// Classifies the report's operation type label. Only exact labels match;
    /// repo legs, padded text and any other label yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            Self::BUY_LABEL => Some(TradeSide::Buy),
            Self::SELL_LABEL => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// Converts report decimal text (`"1,234"`) into a float.
pub fn parse_decimal(field: &'static str, raw: &str) -> Result<f64> {
    let normalized = raw.trim().replace(',', ".");
    normalized
        .parse::<f64>()
        .map_err(|_| ExportError::InvalidDecimal {
            field,
            value: raw.to_string(),
        })
}

/// A buy or sell line of the broker report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<String>,
    pub errand_number: Option<String>,
    pub conclusion_date: Option<String>,
    pub time: Option<String>,
    pub trading_platform: Option<String>,
    pub trade_regime: Option<String>,
    pub kind: Option<String>,
    pub asset_short_name: Option<String>,
    pub ticker: Option<String>,
    pub price: Option<f64>,
    pub price_currency: Option<String>,
    pub count: Option<String>,
    pub sum_without_nkd: Option<f64>,
    pub nkd: Option<f64>,
    pub sum: Option<f64>,
    pub transaction_currency: Option<String>,
    pub commission: Option<f64>,
    pub commission_currency: Option<String>,
    pub repo_rate: Option<f64>,
    pub counterparty: Option<String>,
    pub settlement_day: Option<String>,
    pub delivery_date: Option<String>,
    pub broker_status: Option<String>,
    pub contract_type: Option<String>,
    pub contract_number: Option<String>,
    pub contract_date: Option<String>,
}

impl Transaction {
    /// Builds a transaction from a row projected onto the header catalog.
    /// Cells are consumed in [`COLUMNS`] order; decimal fields are normalized.
    pub fn from_cells(cells: &[CellValue]) -> Result<Self> {
        if cells.len() != FIELD_COUNT {
            return Err(ExportError::HeaderMismatch {
                expected: FIELD_COUNT,
                found: cells.len(),
            });
        }

        let mut reader = FieldReader { cells, position: 0 };
        Ok(Self {
            id: reader.text(),
            errand_number: reader.text(),
            conclusion_date: reader.text(),
            time: reader.text(),
            trading_platform: reader.text(),
            trade_regime: reader.text(),
            kind: reader.text(),
            asset_short_name: reader.text(),
            ticker: reader.text(),
            price: reader.decimal()?,
            price_currency: reader.text(),
            count: reader.text(),
            sum_without_nkd: reader.decimal()?,
            nkd: reader.decimal()?,
            sum: reader.decimal()?,
            transaction_currency: reader.text(),
            commission: reader.decimal()?,
            commission_currency: reader.text(),
            repo_rate: reader.decimal()?,
            counterparty: reader.text(),
            settlement_day: reader.text(),
            delivery_date: reader.text(),
            broker_status: reader.text(),
            contract_type: reader.text(),
            contract_number: reader.text(),
            contract_date: reader.text(),
        })
    }

    /// Classifies the transaction by its operation type.
    pub fn side(&self) -> Option<TradeSide> {
        self.kind.as_deref().and_then(TradeSide::from_label)
    }

    /// Field values in [`COLUMNS`] order, as JSON values suitable for the
    /// Sheets API.
    pub fn to_values(&self) -> Vec<Value> {
        fn text(value: &Option<String>) -> Value {
            value.clone().map(Value::String).unwrap_or(Value::Null)
        }
        fn decimal(value: &Option<f64>) -> Value {
            value
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }

        vec![
            text(&self.id),
            text(&self.errand_number),
            text(&self.conclusion_date),
            text(&self.time),
            text(&self.trading_platform),
            text(&self.trade_regime),
            text(&self.kind),
            text(&self.asset_short_name),
            text(&self.ticker),
            decimal(&self.price),
            text(&self.price_currency),
            text(&self.count),
            decimal(&self.sum_without_nkd),
            decimal(&self.nkd),
            decimal(&self.sum),
            text(&self.transaction_currency),
            decimal(&self.commission),
            text(&self.commission_currency),
            decimal(&self.repo_rate),
            text(&self.counterparty),
            text(&self.settlement_day),
            text(&self.delivery_date),
            text(&self.broker_status),
            text(&self.contract_type),
            text(&self.contract_number),
            text(&self.contract_date),
        ]
    }
}

/// Walks a projected row field by field.
struct FieldReader<'a> {
    cells: &'a [CellValue],
    position: usize,
}

impl<'a> FieldReader<'a> {
    fn next(&mut self) -> (&'static str, &'a CellValue) {
        let name = COLUMNS[self.position];
        let cell = &self.cells[self.position];
        self.position += 1;
        (name, cell)
    }

    fn text(&mut self) -> Option<String> {
        self.next().1.as_text()
    }

    fn decimal(&mut self) -> Result<Option<f64>> {
        let (name, cell) = self.next();
        debug_assert!(DECIMAL_FIELDS.contains(&name));
        match cell {
            CellValue::Empty => Ok(None),
            CellValue::Number(value) => Ok(Some(*value)),
            CellValue::Text(raw) => parse_decimal(name, raw).map(Some),
        }
    }
}
