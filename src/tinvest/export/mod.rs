pub mod config;
pub mod error;
pub mod import;
pub mod io;
pub mod model;
pub mod publish;
pub mod store;

pub use error::{ExportError, Result};
