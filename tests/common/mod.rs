#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use serde_json::Value;
use tinvest_sheets::Result;
use tinvest_sheets::io::sheets::{AppendResult, SheetProperties, SheetsApi};
use tinvest_sheets::model::FIELD_COUNT;

/// Spreadsheet column receiving each transaction field. Column 13 (N) is left
/// unlabelled so that projection has to skip it.
pub fn field_column(field: usize) -> u16 {
    if field < 13 { field as u16 } else { field as u16 + 1 }
}

pub const UNLABELLED_COLUMN: u16 = 13;

pub fn header_labels() -> Vec<String> {
    (0..FIELD_COUNT)
        .map(|field| match field {
            0 => "Номер\nсделки".to_string(),
            6 => "Вид\nсделки".to_string(),
            8 => "Код актива".to_string(),
            other => format!("Поле {other}"),
        })
        .collect()
}

/// A report line; `None` leaves the cell empty.
pub type ReportRow = Vec<Option<String>>;

pub fn trade_row(id: &str, kind: &str, ticker: &str, currency: &str, price: &str) -> ReportRow {
    let mut row: ReportRow = vec![None; FIELD_COUNT];
    let mut set = |field: usize, value: &str| row[field] = Some(value.to_string());
    set(0, id);
    set(1, "5550001");
    set(2, "01.03.2021");
    set(3, "10:15:00");
    set(4, "ММВБ");
    set(5, "T+");
    set(6, kind);
    set(7, "Актив");
    set(8, ticker);
    set(9, price);
    set(10, currency);
    set(11, "10");
    set(12, "2705");
    set(14, "2705,00");
    set(15, currency);
    set(16, "1,35");
    set(17, currency);
    set(19, "НКЦ");
    set(20, "03.03.2021");
    set(21, "03.03.2021");
    row
}

/// A cell written on top of the report rows with its native type.
pub enum Extra {
    Text(&'static str),
    Number(f64),
    Date(ExcelDateTime),
}

/// Writes a report with the header on spreadsheet row 8 and `rows` starting
/// on row 9. Cells in `extra` are written afterwards at (row, column),
/// replacing whatever the rows put there.
pub fn write_report(path: &Path, rows: &[ReportRow]) {
    write_report_with(path, &header_labels(), rows, &[]);
}

pub fn write_report_with(
    path: &Path,
    headers: &[String],
    rows: &[ReportRow],
    extra: &[(u32, u16, Extra)],
) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .write_string(0, 0, "Брокерский отчет")
        .expect("title written");
    for (field, label) in headers.iter().enumerate() {
        worksheet
            .write_string(7, field_column(field), label)
            .expect("header written");
    }
    for (offset, row) in rows.iter().enumerate() {
        let row_index = 8 + offset as u32;
        worksheet
            .write_string(row_index, UNLABELLED_COLUMN, "junk")
            .expect("junk written");
        for (field, value) in row.iter().enumerate() {
            if let Some(value) = value {
                worksheet
                    .write_string(row_index, field_column(field), value)
                    .expect("cell written");
            }
        }
    }
    let date_format = Format::new().set_num_format("dd.mm.yyyy");
    for (row, column, value) in extra {
        match value {
            Extra::Text(text) => worksheet.write_string(*row, *column, *text),
            Extra::Number(number) => worksheet.write_number(*row, *column, *number),
            Extra::Date(date) => {
                worksheet.write_datetime_with_format(*row, *column, date, &date_format)
            }
        }
        .expect("extra cell written");
    }
    workbook.save(path).expect("report saved");
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Sheets,
    Append {
        range: String,
        rows: Vec<Vec<Value>>,
    },
    Duplicate {
        source_sheet_id: i64,
        insert_index: usize,
        title: String,
    },
    CopyTo {
        source_spreadsheet_id: String,
        sheet_id: i64,
    },
    Rename {
        sheet_id: i64,
        title: String,
        index: usize,
    },
    Format {
        sheet_id: i64,
        columns: Vec<usize>,
        rows: Range<u32>,
        pattern: String,
    },
}

/// In-memory spreadsheet recording every call made by the publisher.
#[derive(Default)]
pub struct FakeSheets {
    sheets: RefCell<Vec<SheetProperties>>,
    filled_rows: RefCell<HashMap<String, u32>>,
    pub calls: RefCell<Vec<Call>>,
}

impl FakeSheets {
    pub fn with_sheets(sheets: &[(i64, &str)]) -> Self {
        let fake = Self::default();
        fake.sheets.replace(
            sheets
                .iter()
                .enumerate()
                .map(|(index, (sheet_id, title))| SheetProperties {
                    sheet_id: *sheet_id,
                    title: title.to_string(),
                    index: Some(index as u32),
                })
                .collect(),
        );
        fake
    }

    pub fn titles(&self) -> Vec<String> {
        self.sheets.borrow().iter().map(|s| s.title.clone()).collect()
    }

    pub fn appends(&self) -> Vec<(String, Vec<Vec<Value>>)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Append { range, rows } => Some((range.clone(), rows.clone())),
                _ => None,
            })
            .collect()
    }

    fn next_id(&self) -> i64 {
        self.sheets
            .borrow()
            .iter()
            .map(|s| s.sheet_id)
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl SheetsApi for FakeSheets {
    fn sheets(&self, _spreadsheet_id: &str) -> Result<Vec<SheetProperties>> {
        self.calls.borrow_mut().push(Call::Sheets);
        Ok(self.sheets.borrow().clone())
    }

    fn append_values(
        &self,
        _spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<Value>],
    ) -> Result<AppendResult> {
        self.calls.borrow_mut().push(Call::Append {
            range: range.to_string(),
            rows: rows.to_vec(),
        });
        let title = range.rsplit_once('!').map(|(t, _)| t).unwrap_or(range);
        let mut filled = self.filled_rows.borrow_mut();
        let start = filled.get(title).copied().unwrap_or(5) + 1;
        let end = start + rows.len() as u32 - 1;
        filled.insert(title.to_string(), end);
        Ok(AppendResult {
            updated_range: Some(format!("{title}!A{start}:Z{end}")),
        })
    }

    fn duplicate_sheet(
        &self,
        _spreadsheet_id: &str,
        source_sheet_id: i64,
        insert_index: usize,
        title: &str,
    ) -> Result<i64> {
        self.calls.borrow_mut().push(Call::Duplicate {
            source_sheet_id,
            insert_index,
            title: title.to_string(),
        });
        let sheet_id = self.next_id();
        self.sheets.borrow_mut().push(SheetProperties {
            sheet_id,
            title: title.to_string(),
            index: Some(insert_index as u32),
        });
        Ok(sheet_id)
    }

    fn copy_sheet_to(
        &self,
        source_spreadsheet_id: &str,
        sheet_id: i64,
        _destination_spreadsheet_id: &str,
    ) -> Result<i64> {
        self.calls.borrow_mut().push(Call::CopyTo {
            source_spreadsheet_id: source_spreadsheet_id.to_string(),
            sheet_id,
        });
        let new_id = self.next_id();
        self.sheets.borrow_mut().push(SheetProperties {
            sheet_id: new_id,
            title: format!("Copy of {sheet_id}"),
            index: None,
        });
        Ok(new_id)
    }

    fn rename_sheet(
        &self,
        _spreadsheet_id: &str,
        sheet_id: i64,
        title: &str,
        index: usize,
    ) -> Result<()> {
        self.calls.borrow_mut().push(Call::Rename {
            sheet_id,
            title: title.to_string(),
            index,
        });
        if let Some(sheet) = self
            .sheets
            .borrow_mut()
            .iter_mut()
            .find(|sheet| sheet.sheet_id == sheet_id)
        {
            sheet.title = title.to_string();
        }
        Ok(())
    }

    fn format_number_cells(
        &self,
        _spreadsheet_id: &str,
        sheet_id: i64,
        columns: &[usize],
        rows: Range<u32>,
        pattern: &str,
    ) -> Result<()> {
        self.calls.borrow_mut().push(Call::Format {
            sheet_id,
            columns: columns.to_vec(),
            rows,
            pattern: pattern.to_string(),
        });
        Ok(())
    }
}
