//! Reading W3C access logs into [`LogRecord`]s
//!
//! Malformed lines are skipped with a warning and counted; I/O failures
//! abort the load. A cancellation check is polled before every file and
//! every line, and a cancelled load returns what it read so far with
//! `interrupted` set.

pub mod discovery;
pub mod w3c;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::InputConfig;
use crate::models::LogRecord;

pub use discovery::{discover, LogSource};
pub use w3c::{ParseError, W3cParser};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to list log files under {}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Records loaded from one or more log files
#[derive(Debug, Default)]
pub struct IngestReport {
    pub records: Vec<LogRecord>,
    pub files_read: usize,
    pub skipped_lines: usize,
    /// Loading stopped early on cancellation
    pub interrupted: bool,
}

impl IngestReport {
    fn merge(&mut self, other: IngestReport) {
        self.records.extend(other.records);
        self.files_read += other.files_read;
        self.skipped_lines += other.skipped_lines;
        self.interrupted |= other.interrupted;
    }
}

/// Load every log file reachable from `paths`
pub fn load_paths(
    paths: &[PathBuf],
    config: &InputConfig,
    is_cancelled: &dyn Fn() -> bool,
) -> Result<IngestReport, IngestError> {
    let mut report = IngestReport::default();

    'paths: for path in paths {
        let sources = discover(path, config)?;
        if sources.is_empty() {
            warn!(path = %path.display(), extension = %config.extension, "no log files found");
        }

        for source in &sources {
            if report.interrupted || is_cancelled() {
                report.interrupted = true;
                info!(files = report.files_read, "loading cancelled");
                break 'paths;
            }
            report.merge(read_log_file(source, is_cancelled)?);
        }
    }

    info!(
        files = report.files_read,
        records = report.records.len(),
        skipped = report.skipped_lines,
        "loaded log files"
    );
    Ok(report)
}

/// Parse one log file
pub fn read_log_file(
    source: &LogSource,
    is_cancelled: &dyn Fn() -> bool,
) -> Result<IngestReport, IngestError> {
    let io_error = |source_err| IngestError::Io {
        path: source.file.clone(),
        source: source_err,
    };

    let file = File::open(&source.file).map_err(io_error)?;
    let parser = W3cParser::for_file(source.file.clone(), source.root.clone());
    let label = source.file.display().to_string();
    let mut report =
        read_log(BufReader::new(file), parser, &label, is_cancelled).map_err(io_error)?;
    report.files_read = 1;

    debug!(
        file = %source.file.display(),
        records = report.records.len(),
        skipped = report.skipped_lines,
        "parsed log file"
    );
    Ok(report)
}

/// Parse log lines from any reader; `label` names the input in warnings
pub fn read_log<R: BufRead>(
    reader: R,
    mut parser: W3cParser,
    label: &str,
    is_cancelled: &dyn Fn() -> bool,
) -> io::Result<IngestReport> {
    let mut report = IngestReport::default();

    for (index, line) in reader.lines().enumerate() {
        if is_cancelled() {
            report.interrupted = true;
            break;
        }

        let line = line?;
        match parser.parse_line(&line) {
            Ok(Some(record)) => report.records.push(record),
            Ok(None) => {}
            Err(err) => {
                warn!(input = label, line = index + 1, error = %err, "skipping malformed log line");
                report.skipped_lines += 1;
            }
        }
    }

    Ok(report)
}
