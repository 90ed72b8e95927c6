//! Parser for the W3C Extended Log File Format
//!
//! Layout is declared by `#Fields:` directives; each data line holds one
//! space-separated value per declared field, with `-` for values the server
//! did not log. Dates and times are UTC.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::models::LogRecord;

const FIELDS_DIRECTIVE: &str = "Fields:";
const NOT_LOGGED: &str = "-";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("data line appears before any #Fields directive")]
    MissingFieldsDirective,
    #[error("expected {expected} values but found {found}")]
    FieldCountMismatch { expected: usize, found: usize },
    #[error("invalid value '{value}' for field {field}")]
    InvalidValue { field: String, value: String },
    #[error("line has no date and time")]
    MissingTimestamp,
}

/// Stateful line parser; remembers the most recent `#Fields:` layout
#[derive(Debug, Clone, Default)]
pub struct W3cParser {
    fields: Vec<String>,
    log_file: Option<PathBuf>,
    log_file_root_folder: Option<PathBuf>,
}

impl W3cParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser whose records are tagged with the file they came from
    pub fn for_file(log_file: PathBuf, root_folder: PathBuf) -> Self {
        Self {
            fields: Vec::new(),
            log_file: Some(log_file),
            log_file_root_folder: Some(root_folder),
        }
    }

    /// Parse one line.
    ///
    /// Directives and blank lines return `Ok(None)`.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<LogRecord>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        if let Some(directive) = line.strip_prefix('#') {
            if let Some(fields) = directive.strip_prefix(FIELDS_DIRECTIVE) {
                self.fields = fields.split_whitespace().map(str::to_string).collect();
            }
            return Ok(None);
        }

        if self.fields.is_empty() {
            return Err(ParseError::MissingFieldsDirective);
        }

        let values: Vec<&str> = line.split_whitespace().collect();
        if values.len() != self.fields.len() {
            return Err(ParseError::FieldCountMismatch {
                expected: self.fields.len(),
                found: values.len(),
            });
        }

        let mut record = LogRecord {
            log_file: self.log_file.clone(),
            log_file_root_folder: self.log_file_root_folder.clone(),
            ..Default::default()
        };
        let mut date = None;
        let mut time = None;

        for (field, &value) in self.fields.iter().zip(&values) {
            match field.as_str() {
                "date" => date = logged(value).map(|v| parse_date(field, v)).transpose()?,
                "time" => time = logged(value).map(|v| parse_time(field, v)).transpose()?,
                "s-ip" => record.source_ip = text(value),
                "c-ip" => record.client_ip = text(value),
                "cs-method" => record.method = text(value).unwrap_or_default(),
                "cs-uri-stem" => record.uri_stem = text(value).unwrap_or_default(),
                "cs-uri-query" => record.uri_query = text(value),
                "s-port" => record.port = number(field, value)?,
                "cs-username" => record.username = text(value),
                "cs(User-Agent)" => record.user_agent = text(value),
                "cs(Referer)" | "cs(Referrer)" => record.referrer = text(value),
                "sc-status" => record.http_status = number(field, value)?,
                "sc-substatus" => record.protocol_substatus = number(field, value)?,
                "sc-win32-status" => record.win32_status = number(field, value)?,
                "sc-bytes" => record.bytes_sent = number(field, value)?.unwrap_or(0),
                "cs-bytes" => record.bytes_received = number(field, value)?.unwrap_or(0),
                "time-taken" => record.time_taken_ms = number(field, value)?.unwrap_or(0),
                "s-sitename" => record.site_name = text(value),
                "cs-host" => record.host = text(value),
                "s-computername" => record.computer_name = text(value),
                _ => {
                    record.extra.insert(field.clone(), value.to_string());
                }
            }
        }

        let (Some(date), Some(time)) = (date, time) else {
            return Err(ParseError::MissingTimestamp);
        };
        record.timestamp = NaiveDateTime::new(date, time).and_utc();

        Ok(Some(record))
    }
}

fn logged(value: &str) -> Option<&str> {
    (value != NOT_LOGGED).then_some(value)
}

fn text(value: &str) -> Option<String> {
    logged(value).map(str::to_string)
}

fn number<T: FromStr>(field: &str, value: &str) -> Result<Option<T>, ParseError> {
    logged(value)
        .map(|v| v.parse::<T>().map_err(|_| invalid(field, v)))
        .transpose()
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid(field, value))
}

fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ParseError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f").map_err(|_| invalid(field, value))
}

fn invalid(field: &str, value: &str) -> ParseError {
    ParseError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}
