//! Traffic report aggregation
//!
//! Turns a batch of parsed log records into the semicolon-delimited,
//! time-bucketed summary: request counts, byte totals and average
//! time-taken per bucket and per URI stem.

pub mod aggregator;
pub mod error;
pub mod models;
pub mod resolution;

pub use aggregator::{aggregate, Aggregator};
pub use error::{AggregateError, AggregateResult};
pub use models::{AggregateRow, ALL_RESOURCES_LABEL, REPORT_HEADER};
pub use resolution::Resolution;
