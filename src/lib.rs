//! Exports a broker transaction report to Google Sheets.
//!
//! A run has two stages. [`import`] reads the trade block of the xlsx report
//! and keeps buy and sell rows in a local SQLite file ([`store`]).
//! [`publish`] then appends the stored rows to one sheet per ticker, creating
//! missing sheets from per-currency templates. [`config`] merges command-line
//! values with settings saved by earlier runs.

pub mod tinvest;

pub use tinvest::export::{
    ExportError, Result, config, error, import, io, model, publish, store,
};
