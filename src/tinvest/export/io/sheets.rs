//! Google Sheets v4 client.
//!
//! The publisher only talks to [`SheetsApi`]; [`GoogleSheets`] is the
//! blocking REST implementation used by the binary.

use std::ops::Range;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::tinvest::export::error::{ExportError, Result};

const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Properties of one sheet (tab) of a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
    #[serde(default)]
    pub index: Option<u32>,
}

/// Outcome of an append call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendResult {
    /// A1 range that received the values, e.g. `'SBER'!A6:Z8`.
    pub updated_range: Option<String>,
}

/// Spreadsheet operations needed by the publisher.
pub trait SheetsApi {
    /// Lists the sheets of a spreadsheet.
    fn sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>>;

    /// Appends rows after the table found at `range`, without evaluating
    /// formulas.
    fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<Value>],
    ) -> Result<AppendResult>;

    /// Duplicates a sheet inside the same spreadsheet and returns the new id.
    fn duplicate_sheet(
        &self,
        spreadsheet_id: &str,
        source_sheet_id: i64,
        insert_index: usize,
        title: &str,
    ) -> Result<i64>;

    /// Copies a sheet into another spreadsheet and returns the id it gets
    /// there.
    fn copy_sheet_to(
        &self,
        source_spreadsheet_id: &str,
        sheet_id: i64,
        destination_spreadsheet_id: &str,
    ) -> Result<i64>;

    /// Renames a sheet and moves it to `index`.
    fn rename_sheet(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        title: &str,
        index: usize,
    ) -> Result<()>;

    /// Applies a number format to the given columns of a row range.
    fn format_number_cells(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        columns: &[usize],
        rows: Range<u32>,
        pattern: &str,
    ) -> Result<()>;
}

/// Blocking REST client authenticated with a bearer token.
pub struct GoogleSheets {
    client: Client,
    access_token: String,
    endpoint: String,
}

impl GoogleSheets {
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        Self::with_endpoint(access_token, SHEETS_ENDPOINT)
    }

    /// Builds a client against a custom endpoint, e.g. a local emulator.
    pub fn with_endpoint(
        access_token: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            access_token: access_token.into(),
            endpoint: endpoint.into(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|err| ExportError::InvalidSetting {
                key: "endpoint",
                value: format!("{}: {err}", self.endpoint),
            })?;
        url.path_segments_mut()
            .map_err(|_| ExportError::InvalidSetting {
                key: "endpoint",
                value: self.endpoint.clone(),
            })?
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.bearer_auth(&self.access_token).send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(ExportError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<Value> {
        let url = self.url(&[&format!("{spreadsheet_id}:batchUpdate")])?;
        self.send(self.client.post(url).json(&json!({ "requests": requests })))
    }
}

impl SheetsApi for GoogleSheets {
    fn sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>> {
        #[derive(Deserialize)]
        struct Spreadsheet {
            #[serde(default)]
            sheets: Vec<Sheet>,
        }

        #[derive(Deserialize)]
        struct Sheet {
            properties: SheetProperties,
        }

        let url = self.url(&[spreadsheet_id])?;
        let body = self.send(
            self.client
                .get(url)
                .query(&[("fields", "sheets.properties")]),
        )?;
        let spreadsheet: Spreadsheet = serde_json::from_value(body)?;
        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties)
            .collect())
    }

    fn append_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<Value>],
    ) -> Result<AppendResult> {
        let url = self.url(&[spreadsheet_id, "values", &format!("{range}:append")])?;
        let body = self.send(
            self.client
                .post(url)
                .query(&[("valueInputOption", "RAW")])
                .json(&json!({ "values": rows })),
        )?;
        let updated_range = body
            .pointer("/updates/updatedRange")
            .and_then(Value::as_str)
            .map(str::to_string);
        debug!(range, rows = rows.len(), ?updated_range, "values appended");
        Ok(AppendResult { updated_range })
    }

    fn duplicate_sheet(
        &self,
        spreadsheet_id: &str,
        source_sheet_id: i64,
        insert_index: usize,
        title: &str,
    ) -> Result<i64> {
        let body = self.batch_update(
            spreadsheet_id,
            vec![json!({
                "duplicateSheet": {
                    "sourceSheetId": source_sheet_id,
                    "newSheetName": title,
                    "insertSheetIndex": insert_index,
                }
            })],
        )?;
        body.pointer("/replies/0/duplicateSheet/properties/sheetId")
            .and_then(Value::as_i64)
            .ok_or_else(|| ExportError::Api {
                status: 200,
                message: "duplicateSheet reply carries no sheet id".into(),
            })
    }

    fn copy_sheet_to(
        &self,
        source_spreadsheet_id: &str,
        sheet_id: i64,
        destination_spreadsheet_id: &str,
    ) -> Result<i64> {
        let url = self.url(&[
            source_spreadsheet_id,
            "sheets",
            &format!("{sheet_id}:copyTo"),
        ])?;
        let body = self.send(
            self.client
                .post(url)
                .json(&json!({ "destinationSpreadsheetId": destination_spreadsheet_id })),
        )?;
        let properties: SheetProperties = serde_json::from_value(body)?;
        Ok(properties.sheet_id)
    }

    fn rename_sheet(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        title: &str,
        index: usize,
    ) -> Result<()> {
        self.batch_update(
            spreadsheet_id,
            vec![json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": sheet_id, "title": title, "index": index },
                    "fields": "title,index",
                }
            })],
        )?;
        Ok(())
    }

    fn format_number_cells(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        columns: &[usize],
        rows: Range<u32>,
        pattern: &str,
    ) -> Result<()> {
        let requests = columns
            .iter()
            .map(|column| {
                json!({
                    "repeatCell": {
                        "range": {
                            "sheetId": sheet_id,
                            "startColumnIndex": column,
                            "endColumnIndex": column + 1,
                            "startRowIndex": rows.start,
                            "endRowIndex": rows.end,
                        },
                        "cell": {
                            "userEnteredFormat": {
                                "numberFormat": { "type": "CURRENCY", "pattern": pattern }
                            }
                        },
                        "fields": "userEnteredFormat.numberFormat",
                    }
                })
            })
            .collect();
        self.batch_update(spreadsheet_id, requests)?;
        Ok(())
    }
}

/// Quotes a sheet title for use in an A1 range.
pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Zero-based, end-exclusive row span of an A1 range such as `'SBER'!A6:Z8`.
pub fn range_rows(a1_range: &str) -> Option<Range<u32>> {
    let cells = a1_range.rsplit('!').next()?;
    let mut bounds = cells.split(':').map(|cell| {
        cell.trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .parse::<u32>()
            .ok()
    });
    let start = bounds.next()??;
    let end = match bounds.next() {
        Some(end) => end?,
        None => start,
    };
    if start == 0 || end < start {
        return None;
    }
    Some(start - 1..end)
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
