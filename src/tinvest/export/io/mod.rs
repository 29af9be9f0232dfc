pub mod auth;
pub mod report_read;
pub mod sheets;
