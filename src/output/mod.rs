//! Output module for persisting harvested profiles
//!
//! This module handles:
//! - The fixed-field [`ProfileRecord`] every worker produces
//! - The [`ResultSink`] trait and its CSV implementation
//! - Summarizing an existing result CSV

mod csv_sink;
mod record;
pub mod stats;
mod traits;

pub use csv_sink::CsvSink;
pub use record::{ProfileRecord, CSV_COLUMNS, EMAIL_SEPARATOR};
pub use stats::{load_summary, print_summary, CsvSummary};
pub use traits::{OutputError, OutputResult, ResultSink};
