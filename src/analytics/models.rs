//! Data models for the traffic report

use chrono::NaiveDateTime;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;

use crate::models::LogRecord;

/// First line of every report
pub const REPORT_HEADER: &str =
    "DateTime;Method;Requests;SumServerReceivedBytes;SumServerSentBytes;AverageTimeTaken;";

/// Group label of the per-bucket total row
pub const ALL_RESOURCES_LABEL: &str = "All";

/// Textual form of a bucket start in report rows
pub const BUCKET_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Records sharing one time bucket, in timestamp order
#[derive(Debug, Clone)]
pub struct TimeBucket<'a> {
    /// Bucket start as local wall-clock time
    pub start: NaiveDateTime,

    pub records: Vec<&'a LogRecord>,
}

/// Records of one bucket that requested the same URI stem
#[derive(Debug, Clone)]
pub struct ResourceGroup<'a> {
    pub uri_stem: &'a str,
    pub records: Vec<&'a LogRecord>,
}

impl<'a> TimeBucket<'a> {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            start,
            records: Vec::new(),
        }
    }

    /// Split the bucket by URI stem.
    ///
    /// Groups come out in the order their stem first appears in the bucket.
    pub fn resource_groups(&self) -> Vec<ResourceGroup<'a>> {
        let mut groups: Vec<ResourceGroup<'a>> = Vec::new();
        let mut index: HashMap<&'a str, usize> = HashMap::new();

        for &record in &self.records {
            let stem = record.uri_stem.as_str();
            match index.entry(stem) {
                Entry::Occupied(slot) => groups[*slot.get()].records.push(record),
                Entry::Vacant(slot) => {
                    slot.insert(groups.len());
                    groups.push(ResourceGroup {
                        uri_stem: stem,
                        records: vec![record],
                    });
                }
            }
        }

        groups
    }
}

/// One line of the report.
///
/// Sums are accumulated as `i128` so no realistic volume of `i64` counters
/// can overflow them.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow<'a> {
    pub bucket_start: NaiveDateTime,
    pub label: &'a str,
    pub requests: u64,
    pub sum_received_bytes: i128,
    pub sum_sent_bytes: i128,
    pub average_time_taken: f64,
}

impl<'a> AggregateRow<'a> {
    /// Summarize `records` under `label`.
    ///
    /// `records` is never empty for rows built by the aggregator; an empty
    /// slice yields a NaN average.
    pub fn from_records(
        bucket_start: NaiveDateTime,
        label: &'a str,
        records: &[&LogRecord],
    ) -> Self {
        let mut sum_received_bytes = 0i128;
        let mut sum_sent_bytes = 0i128;
        let mut sum_time_taken = 0i128;

        for record in records {
            sum_received_bytes += i128::from(record.bytes_received);
            sum_sent_bytes += i128::from(record.bytes_sent);
            sum_time_taken += i128::from(record.time_taken_ms);
        }

        Self {
            bucket_start,
            label,
            requests: records.len() as u64,
            sum_received_bytes,
            sum_sent_bytes,
            average_time_taken: sum_time_taken as f64 / records.len() as f64,
        }
    }
}

impl fmt::Display for AggregateRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{};",
            self.bucket_start.format(BUCKET_TIMESTAMP_FORMAT),
            self.label,
            self.requests,
            self.sum_received_bytes,
            self.sum_sent_bytes,
            self.average_time_taken
        )
    }
}
