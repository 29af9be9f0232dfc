//! Layered run configuration.
//!
//! Every identifier is resolved with the same precedence: a value passed on
//! the command line wins over a value persisted with `--store-args-to-db`;
//! when neither exists the identifier is missing.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::tinvest::export::error::{ExportError, Result};

/// Setting keys shared by the CLI and the settings table.
pub mod keys {
    pub const SPREADSHEET_ID: &str = "spreadsheetId";
    pub const CREDENTIALS: &str = "credentials";
    pub const RUB_SHEET_ID: &str = "rubSheetId";
    pub const USD_SHEET_ID: &str = "usdSheetId";
    pub const STORE_ARGS: &str = "storeArgs";
    pub const FILE_NAME: &str = "fileName";
}

/// Spreadsheet holding the master copies of the currency templates.
pub const TEMPLATE_SPREADSHEET_ID: &str = "1jTFV5BDQh11PQVw7HKvQhAHswhcFQAMw_WOt6QvI5C0";

/// Identifiers supplied for a single invocation.
#[derive(Debug, Clone, Default)]
pub struct CliSettings {
    pub file_name: Option<PathBuf>,
    pub spreadsheet_id: Option<String>,
    pub credentials: Option<PathBuf>,
    pub rub_sheet_id: Option<String>,
    pub usd_sheet_id: Option<String>,
    pub store_args: bool,
}

impl CliSettings {
    /// Key/value view used when persisting the invocation.
    pub fn entries(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            (
                keys::FILE_NAME,
                self.file_name.as_ref().map(|p| p.display().to_string()),
            ),
            (keys::SPREADSHEET_ID, self.spreadsheet_id.clone()),
            (
                keys::CREDENTIALS,
                self.credentials.as_ref().map(|p| p.display().to_string()),
            ),
            (keys::RUB_SHEET_ID, self.rub_sheet_id.clone()),
            (keys::USD_SHEET_ID, self.usd_sheet_id.clone()),
            (keys::STORE_ARGS, Some(self.store_args.to_string())),
        ]
    }
}

/// One currency template kept in the template spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryTemplate {
    pub currency: String,
    /// Sheet id inside [`TemplateLibrary::spreadsheet_id`].
    pub sheet_id: i64,
    /// Title the template carries once copied into the target spreadsheet.
    pub title: String,
}

/// External spreadsheet the templates are copied from when missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLibrary {
    pub spreadsheet_id: String,
    pub templates: Vec<LibraryTemplate>,
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self {
            spreadsheet_id: TEMPLATE_SPREADSHEET_ID.to_string(),
            templates: vec![
                LibraryTemplate {
                    currency: "RUB".into(),
                    sheet_id: 980_318_168,
                    title: "Шаблон RUB".into(),
                },
                LibraryTemplate {
                    currency: "USD".into(),
                    sheet_id: 1_882_164_711,
                    title: "Шаблон USD".into(),
                },
            ],
        }
    }
}

/// How the per-currency template sheets are located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateStrategy {
    /// Template sheet ids already present in the target spreadsheet.
    Explicit { rub: i64, usd: i64 },
    /// Reuse templates by title, copying them from a library when absent.
    Library(TemplateLibrary),
}

/// Fully resolved configuration of a publishing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub spreadsheet_id: String,
    pub credentials: PathBuf,
    pub templates: TemplateStrategy,
}

impl ExportConfig {
    /// Resolves the run configuration from CLI values and persisted settings.
    pub fn resolve(cli: &CliSettings, persisted: &BTreeMap<String, String>) -> Result<Self> {
        let spreadsheet_id = layered(cli.spreadsheet_id.clone(), persisted, keys::SPREADSHEET_ID)
            .ok_or(ExportError::MissingSetting {
                key: keys::SPREADSHEET_ID,
                flag: "--spreadsheet-id",
            })?;

        let credentials = layered(
            cli.credentials.as_ref().map(|p| p.display().to_string()),
            persisted,
            keys::CREDENTIALS,
        )
        .map(PathBuf::from)
        .ok_or(ExportError::MissingSetting {
            key: keys::CREDENTIALS,
            flag: "--credentials",
        })?;

        let rub = layered(cli.rub_sheet_id.clone(), persisted, keys::RUB_SHEET_ID);
        let usd = layered(cli.usd_sheet_id.clone(), persisted, keys::USD_SHEET_ID);
        let templates = match (rub, usd) {
            (Some(rub), Some(usd)) => TemplateStrategy::Explicit {
                rub: parse_sheet_id(keys::RUB_SHEET_ID, &rub)?,
                usd: parse_sheet_id(keys::USD_SHEET_ID, &usd)?,
            },
            (None, None) => TemplateStrategy::Library(TemplateLibrary::default()),
            (Some(_), None) => {
                return Err(ExportError::MissingSetting {
                    key: keys::USD_SHEET_ID,
                    flag: "--usd-sheet-id",
                });
            }
            (None, Some(_)) => {
                return Err(ExportError::MissingSetting {
                    key: keys::RUB_SHEET_ID,
                    flag: "--rub-sheet-id",
                });
            }
        };

        debug!(%spreadsheet_id, ?templates, "configuration resolved");
        Ok(Self {
            spreadsheet_id,
            credentials,
            templates,
        })
    }
}

fn layered(
    cli: Option<String>,
    persisted: &BTreeMap<String, String>,
    key: &str,
) -> Option<String> {
    let present = |value: &String| !value.trim().is_empty();
    cli.filter(present)
        .or_else(|| persisted.get(key).filter(|value| present(value)).cloned())
}

fn parse_sheet_id(key: &'static str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| ExportError::InvalidSetting {
            key,
            value: value.to_string(),
        })
}
