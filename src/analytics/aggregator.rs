//! Time-bucketed traffic aggregation
//!
//! Records are sorted by timestamp, partitioned into fixed-width buckets on
//! their local wall-clock time and summarized per bucket: one `All` row for
//! the whole bucket followed by one row per requested URI stem.
//!
//! Aggregation is synchronous. Callers that need to stop a long run pass a
//! cancellation check, which is polled before every bucket and before every
//! resource row. A cancelled run returns `Ok(())` after whatever prefix of
//! the report has already reached the sink.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::analytics::error::{AggregateError, AggregateResult};
use crate::analytics::models::{
    AggregateRow, TimeBucket, ALL_RESOURCES_LABEL, BUCKET_TIMESTAMP_FORMAT, REPORT_HEADER,
};
use crate::analytics::resolution::Resolution;
use crate::models::LogRecord;
use crate::output::LineSink;

/// Aggregate `records` at the resolution named by `resolution`.
///
/// Fails with an invalid-input error, before anything is written, when
/// `records` is empty or `resolution` is not one of `week`, `day`, `hour`,
/// `minute`.
pub fn aggregate<S: LineSink + ?Sized>(
    records: &[LogRecord],
    resolution: &str,
    sink: &mut S,
    verbose: &mut dyn FnMut(&str),
    is_cancelled: &dyn Fn() -> bool,
) -> AggregateResult<()> {
    if records.is_empty() {
        return Err(AggregateError::EmptyInput);
    }
    let resolution = resolution.parse::<Resolution>()?;

    Aggregator::new(resolution).run(records, sink, verbose, is_cancelled)
}

/// Report generator for a fixed bucket width
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    resolution: Resolution,
}

impl Aggregator {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Write the header and every aggregate row for `records` to `sink`.
    ///
    /// The caller's slice is left untouched; sorting happens on references.
    pub fn run<S: LineSink + ?Sized>(
        &self,
        records: &[LogRecord],
        sink: &mut S,
        verbose: &mut dyn FnMut(&str),
        is_cancelled: &dyn Fn() -> bool,
    ) -> AggregateResult<()> {
        if records.is_empty() {
            return Err(AggregateError::EmptyInput);
        }

        verbose(&format!("Log entries count: {}", records.len()));
        verbose("Sorting log entries ...");
        let mut sorted: Vec<&LogRecord> = records.iter().collect();
        // stable: equal timestamps keep input order
        sorted.sort_by_key(|record| record.timestamp);

        let first = sorted[0];
        let last = sorted[sorted.len() - 1];
        verbose(&format!(
            "Creating a report from {} to {} over {} entries",
            first.local_timestamp().format(BUCKET_TIMESTAMP_FORMAT),
            last.local_timestamp().format(BUCKET_TIMESTAMP_FORMAT),
            sorted.len()
        ));

        sink.write_line(REPORT_HEADER)?;

        let buckets = self.partition(&sorted);
        debug!(
            resolution = %self.resolution,
            buckets = buckets.len(),
            "partitioned log entries"
        );

        let mut rows = 0usize;
        for bucket in &buckets {
            if is_cancelled() {
                info!(rows, "aggregation cancelled");
                return Ok(());
            }

            let total =
                AggregateRow::from_records(bucket.start, ALL_RESOURCES_LABEL, &bucket.records);
            sink.write_line(&total.to_string())?;
            rows += 1;

            for group in bucket.resource_groups() {
                if is_cancelled() {
                    info!(rows, "aggregation cancelled");
                    return Ok(());
                }

                let row =
                    AggregateRow::from_records(bucket.start, group.uri_stem, &group.records);
                sink.write_line(&row.to_string())?;
                rows += 1;
            }
        }

        debug!(rows, "aggregation finished");
        Ok(())
    }

    /// Group time-sorted records into buckets, ascending by bucket key.
    fn partition<'a>(&self, sorted: &[&'a LogRecord]) -> Vec<TimeBucket<'a>> {
        let mut buckets: BTreeMap<i64, TimeBucket<'a>> = BTreeMap::new();

        for &record in sorted {
            let local = record.local_timestamp().naive_local();
            let key = self.resolution.bucket_key(local);
            buckets
                .entry(key)
                .or_insert_with(|| TimeBucket::new(self.resolution.bucket_start(local)))
                .records
                .push(record);
        }

        buckets.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, NaiveDateTime, TimeZone, Utc};
    use std::cell::Cell;

    fn record_at_local(
        local: &str,
        stem: &str,
        received: i64,
        sent: i64,
        taken: i64,
    ) -> LogRecord {
        let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S").unwrap();
        let timestamp = Local
            .from_local_datetime(&naive)
            .single()
            .unwrap()
            .with_timezone(&Utc);

        LogRecord {
            timestamp,
            uri_stem: stem.to_string(),
            bytes_received: received,
            bytes_sent: sent,
            time_taken_ms: taken,
            ..Default::default()
        }
    }

    fn run(records: &[LogRecord], resolution: &str) -> AggregateResult<Vec<String>> {
        let mut lines: Vec<String> = Vec::new();
        aggregate(records, resolution, &mut lines, &mut |_: &str| {}, &|| false)?;
        Ok(lines)
    }

    fn scenario() -> Vec<LogRecord> {
        vec![
            record_at_local("2024-01-15 11:15:00", "/b", 50, 5, 10),
            record_at_local("2024-01-15 10:00:00", "/a", 100, 10, 5),
            record_at_local("2024-01-15 10:30:00", "/a", 200, 20, 15),
        ]
    }

    /// Split a row into its six fields
    fn fields(line: &str) -> Vec<&str> {
        let line = line.strip_suffix(';').unwrap();
        line.split(';').collect()
    }

    #[test]
    fn test_hourly_scenario() {
        let lines = run(&scenario(), "hour").unwrap();

        assert_eq!(
            lines,
            vec![
                REPORT_HEADER.to_string(),
                "2024-01-15 10:00:00;All;2;300;30;10;".to_string(),
                "2024-01-15 10:00:00;/a;2;300;30;10;".to_string(),
                "2024-01-15 11:00:00;All;1;50;5;10;".to_string(),
                "2024-01-15 11:00:00;/b;1;50;5;10;".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_input_emits_nothing() {
        let mut lines: Vec<String> = Vec::new();
        let mut notes = Vec::new();

        let err = aggregate(&[], "hour", &mut lines, &mut |n: &str| notes.push(n.to_string()), &|| false)
            .unwrap_err();

        assert!(matches!(err, AggregateError::EmptyInput));
        assert!(err.is_invalid_input());
        assert!(lines.is_empty());
        assert!(notes.is_empty());
    }

    #[test]
    fn test_typed_run_rejects_empty_input() {
        let mut lines: Vec<String> = Vec::new();
        let err = Aggregator::new(Resolution::Day)
            .run(&[], &mut lines, &mut |_: &str| {}, &|| false)
            .unwrap_err();

        assert!(matches!(err, AggregateError::EmptyInput));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_unsupported_resolution_emits_nothing() {
        let mut lines: Vec<String> = Vec::new();
        let err = aggregate(&scenario(), "month", &mut lines, &mut |_: &str| {}, &|| false)
            .unwrap_err();

        assert!(matches!(err, AggregateError::UnsupportedResolution(ref r) if r == "month"));
        assert!(lines.is_empty());
    }

    #[test]
    fn test_verbose_notes() {
        let mut lines: Vec<String> = Vec::new();
        let mut notes = Vec::new();
        aggregate(
            &scenario(),
            "hour",
            &mut lines,
            &mut |n: &str| notes.push(n.to_string()),
            &|| false,
        )
        .unwrap();

        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0], "Log entries count: 3");
        assert_eq!(
            notes[2],
            "Creating a report from 2024-01-15 10:00:00 to 2024-01-15 11:15:00 over 3 entries"
        );
    }

    #[test]
    fn test_resource_rows_follow_first_occurrence() {
        let records = vec![
            record_at_local("2024-01-15 10:05:00", "/zeta", 1, 1, 1),
            record_at_local("2024-01-15 10:01:00", "/mid", 1, 1, 1),
            record_at_local("2024-01-15 10:03:00", "/alpha", 1, 1, 1),
            record_at_local("2024-01-15 10:04:00", "/mid", 1, 1, 1),
        ];
        let lines = run(&records, "hour").unwrap();
        let labels: Vec<&str> = lines[1..].iter().map(|l| fields(l)[1]).collect();

        assert_eq!(labels, vec!["All", "/mid", "/alpha", "/zeta"]);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let records = vec![
            record_at_local("2024-01-15 10:00:00", "/second", 1, 1, 1),
            record_at_local("2024-01-15 10:00:00", "/first", 1, 1, 1),
        ];
        let lines = run(&records, "minute").unwrap();
        let labels: Vec<&str> = lines[1..].iter().map(|l| fields(l)[1]).collect();

        assert_eq!(labels, vec!["All", "/second", "/first"]);
    }

    #[test]
    fn test_totals_are_conserved() {
        let records = vec![
            record_at_local("2024-01-15 10:00:00", "/a", 10, 1, 3),
            record_at_local("2024-01-15 10:10:00", "/b", 20, 2, 4),
            record_at_local("2024-01-15 10:20:00", "/a", 30, 3, 5),
            record_at_local("2024-01-15 12:00:00", "/c", 40, 4, 6),
            record_at_local("2024-01-15 12:59:59", "/c", 50, 5, 7),
        ];
        let lines = run(&records, "hour").unwrap();

        let mut totals: Vec<[i64; 3]> = Vec::new();
        let mut parts: Vec<[i64; 3]> = Vec::new();
        for line in &lines[1..] {
            let f = fields(line);
            let values = [
                f[2].parse::<i64>().unwrap(),
                f[3].parse::<i64>().unwrap(),
                f[4].parse::<i64>().unwrap(),
            ];
            if f[1] == ALL_RESOURCES_LABEL {
                totals.push(values);
                parts.push([0; 3]);
            } else {
                let sum = parts.last_mut().unwrap();
                for i in 0..3 {
                    sum[i] += values[i];
                }
            }
        }

        assert_eq!(totals.len(), 2);
        assert_eq!(totals, parts);
    }

    #[test]
    fn test_bucket_timestamps_ascend() {
        let records = vec![
            record_at_local("2024-01-17 08:00:00", "/a", 1, 1, 1),
            record_at_local("2024-01-15 23:59:59", "/a", 1, 1, 1),
            record_at_local("2024-01-16 00:00:00", "/a", 1, 1, 1),
            record_at_local("2024-01-15 00:00:00", "/a", 1, 1, 1),
        ];
        let lines = run(&records, "day").unwrap();
        let starts: Vec<&str> = lines[1..]
            .iter()
            .map(|l| fields(l))
            .filter(|f| f[1] == ALL_RESOURCES_LABEL)
            .map(|f| f[0])
            .collect();

        assert_eq!(
            starts,
            vec![
                "2024-01-15 00:00:00",
                "2024-01-16 00:00:00",
                "2024-01-17 00:00:00"
            ]
        );
    }

    #[test]
    fn test_week_bucket_start() {
        // Wednesday and the following Sunday share the week that began Monday
        let records = vec![
            record_at_local("2024-01-17 10:00:00", "/a", 1, 1, 1),
            record_at_local("2024-01-21 23:00:00", "/a", 1, 1, 3),
        ];
        let lines = run(&records, "week").unwrap();

        assert_eq!(lines[1], "2024-01-15 00:00:00;All;2;2;2;2;");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_rerun_is_identical() {
        let records = vec![
            record_at_local("2024-01-15 10:20:00", "/b", 3, 1, 7),
            record_at_local("2024-01-15 09:59:00", "/a", 5, 2, 9),
            record_at_local("2024-01-15 10:20:00", "/a", 8, 3, 2),
        ];
        let snapshot = records.clone();

        let first = run(&records, "minute").unwrap();
        let second = run(&records, "minute").unwrap();

        assert_eq!(first, second);
        assert_eq!(records, snapshot, "input must not be reordered or modified");
    }

    #[test]
    fn test_cancelled_before_first_bucket() {
        let mut lines: Vec<String> = Vec::new();
        aggregate(&scenario(), "hour", &mut lines, &mut |_: &str| {}, &|| true).unwrap();

        assert_eq!(lines, vec![REPORT_HEADER.to_string()]);
    }

    #[test]
    fn test_cancelled_after_first_bucket() {
        let polls = Cell::new(0);
        let is_cancelled = || {
            polls.set(polls.get() + 1);
            // bucket 10:00 polls twice (bucket, /a), the third poll starts bucket 11:00
            polls.get() > 2
        };

        let mut lines: Vec<String> = Vec::new();
        aggregate(&scenario(), "hour", &mut lines, &mut |_: &str| {}, &is_cancelled).unwrap();

        assert_eq!(
            lines,
            vec![
                REPORT_HEADER.to_string(),
                "2024-01-15 10:00:00;All;2;300;30;10;".to_string(),
                "2024-01-15 10:00:00;/a;2;300;30;10;".to_string(),
            ]
        );
    }

    #[test]
    fn test_sink_errors_propagate() {
        struct FullDisk {
            accepted: usize,
        }

        impl LineSink for FullDisk {
            fn write_line(&mut self, _line: &str) -> std::io::Result<()> {
                if self.accepted == 2 {
                    return Err(std::io::Error::other("disk full"));
                }
                self.accepted += 1;
                Ok(())
            }
        }

        let mut sink = FullDisk { accepted: 0 };
        let err = aggregate(&scenario(), "hour", &mut sink, &mut |_: &str| {}, &|| false)
            .unwrap_err();

        assert!(matches!(err, AggregateError::Sink(_)));
        assert!(!err.is_invalid_input());
        assert_eq!(sink.accepted, 2);
    }

    #[test]
    fn test_cancelled_mid_bucket() {
        let records = vec![
            record_at_local("2024-01-15 10:00:00", "/a", 1, 1, 1),
            record_at_local("2024-01-15 10:01:00", "/b", 1, 1, 1),
            record_at_local("2024-01-15 10:02:00", "/c", 1, 1, 1),
        ];
        let polls = Cell::new(0);
        let is_cancelled = || {
            polls.set(polls.get() + 1);
            polls.get() > 2
        };

        let mut lines: Vec<String> = Vec::new();
        aggregate(&records, "hour", &mut lines, &mut |_: &str| {}, &is_cancelled).unwrap();
        let labels: Vec<&str> = lines[1..].iter().map(|l| fields(l)[1]).collect();

        assert_eq!(labels, vec!["All", "/a"]);
    }
}
