use std::io::{Read, Seek};
use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};

use crate::tinvest::export::error::{ExportError, Result};
use crate::tinvest::export::model::{CellValue, Header};

/// Zero-based row holding the column labels (row 8 in the spreadsheet UI).
pub const HEADER_ROW: u32 = 7;
/// First zero-based row scanned for transactions.
pub const FIRST_DATA_ROW: u32 = 8;
/// Last zero-based row scanned for transactions.
pub const LAST_DATA_ROW: u32 = 999;
/// Number of columns considered, counted from column A.
pub const COLUMN_LIMIT: u32 = 85;
/// A first cell containing this text marks the end of the trade block.
pub const END_OF_BLOCK_MARKER: &str = "1.2";
/// Text layout of date cells once they leave the workbook.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The first worksheet of a broker report, loaded into memory.
pub struct Report {
    range: Range<DataType>,
}

impl Report {
    /// Opens the workbook at `path` and loads its first worksheet.
    pub fn open(path: &Path) -> Result<Self> {
        let mut workbook: Xlsx<_> = open_workbook(path)?;
        let range = read_first_sheet(&mut workbook)?;
        Ok(Self { range })
    }

    /// Returns the cell at the zero-based absolute position.
    pub fn cell(&self, row: u32, column: u32) -> CellValue {
        cell_value(self.range.get_value((row, column)))
    }

    /// Labelled cells of the header row, left to right.
    pub fn headers(&self) -> Vec<Header> {
        (0..COLUMN_LIMIT)
            .filter_map(|column| {
                let label = self.cell(HEADER_ROW, column).as_text()?;
                Some(Header::new(column, strip_line_breaks(&label)))
            })
            .collect()
    }

    /// Projects a row onto the given header positions.
    pub fn project_row(&self, row: u32, headers: &[Header]) -> Vec<CellValue> {
        headers
            .iter()
            .map(|header| self.cell(row, header.column_index))
            .collect()
    }
}

fn read_first_sheet<R: Read + Seek>(workbook: &mut Xlsx<R>) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExportError::InvalidReport("workbook has no worksheets".into()))?;
    let range = range_result.map_err(ExportError::from)?;
    Ok(range)
}

fn cell_value(cell: Option<&DataType>) -> CellValue {
    match cell {
        Some(DataType::String(value)) if value.is_empty() => CellValue::Empty,
        Some(DataType::String(value)) => CellValue::Text(value.clone()),
        Some(DataType::Float(value)) => CellValue::Number(*value),
        Some(DataType::Int(value)) => CellValue::Number(*value as f64),
        Some(DataType::Bool(value)) => CellValue::Text(value.to_string()),
        Some(date @ (DataType::DateTime(_) | DataType::DateTimeIso(_))) => {
            match date.as_datetime() {
                Some(datetime) => CellValue::Text(datetime.format(DATETIME_FORMAT).to_string()),
                None => CellValue::Text(date.to_string()),
            }
        }
        Some(DataType::Empty) | None => CellValue::Empty,
        Some(other) => CellValue::Text(other.to_string()),
    }
}

fn strip_line_breaks(label: &str) -> String {
    label.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}
