//! Data model for a single W3C extended log entry

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One logged request.
///
/// Field names follow the W3C extended log identifiers noted on each field.
/// Values the server logged as `-` are carried as `None` (or `0` for the
/// byte and time counters).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Date and time (UTC) on which the activity occurred (`date` + `time`)
    pub timestamp: DateTime<Utc>,

    /// Server address as logged, zone suffix included (`s-ip`)
    pub source_ip: Option<String>,

    /// Client address as logged, e.g. `fe80::1%11` (`c-ip`)
    pub client_ip: Option<String>,

    /// Requested action, e.g. GET (`cs-method`)
    pub method: String,

    /// Target of the action without query string (`cs-uri-stem`)
    pub uri_stem: String,

    /// Query, if any (`cs-uri-query`)
    pub uri_query: Option<String>,

    /// Server port configured for the service (`s-port`)
    pub port: Option<u16>,

    /// Authenticated user; anonymous users are logged as `-` (`cs-username`)
    pub username: Option<String>,

    /// `cs(User-Agent)`
    pub user_agent: Option<String>,

    /// `cs(Referer)`
    pub referrer: Option<String>,

    /// HTTP status code (`sc-status`)
    pub http_status: Option<u16>,

    /// Substatus error code (`sc-substatus`)
    pub protocol_substatus: Option<u32>,

    /// Win32 error code (`sc-win32-status`)
    pub win32_status: Option<u32>,

    /// Bytes sent by the server (`sc-bytes`)
    pub bytes_sent: i64,

    /// Bytes received by the server (`cs-bytes`)
    pub bytes_received: i64,

    /// Time the action took, in milliseconds (`time-taken`)
    pub time_taken_ms: i64,

    /// Service name and instance number (`s-sitename`)
    pub site_name: Option<String>,

    /// Host header (`cs-host`)
    pub host: Option<String>,

    /// Server that generated the entry (`s-computername`)
    pub computer_name: Option<String>,

    /// Log file the entry was read from
    pub log_file: Option<PathBuf>,

    /// Folder the log file was discovered under
    pub log_file_root_folder: Option<PathBuf>,

    /// Any logged field without a dedicated slot above, keyed by field name
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl LogRecord {
    /// The timestamp converted to the process' local timezone.
    ///
    /// Computed from `timestamp` on every call.
    pub fn local_timestamp(&self) -> DateTime<Local> {
        self.timestamp.with_timezone(&Local)
    }
}
