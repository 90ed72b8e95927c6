//! Bucket widths for the traffic report

use chrono::{NaiveDateTime, TimeDelta};
use std::fmt;
use std::str::FromStr;

use crate::analytics::error::AggregateError;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const WEEK_MS: i64 = 7 * DAY_MS;

/// Days from 0001-01-01 to 1970-01-01
const DAYS_BEFORE_UNIX_EPOCH: i64 = 719_162;

/// Width of a report bucket.
///
/// Widths are fixed wall-clock durations. Ticks count from
/// 0001-01-01T00:00:00 local wall-clock time and buckets are anchored at
/// tick zero, so a week bucket always starts on a Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Week,
    Day,
    Hour,
    Minute,
}

impl Resolution {
    pub const ALL: [Resolution; 4] = [
        Resolution::Week,
        Resolution::Day,
        Resolution::Hour,
        Resolution::Minute,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Week => "week",
            Resolution::Day => "day",
            Resolution::Hour => "hour",
            Resolution::Minute => "minute",
        }
    }

    /// Bucket width in milliseconds
    pub const fn width_millis(self) -> i64 {
        match self {
            Resolution::Week => WEEK_MS,
            Resolution::Day => DAY_MS,
            Resolution::Hour => HOUR_MS,
            Resolution::Minute => MINUTE_MS,
        }
    }

    pub fn width(self) -> TimeDelta {
        TimeDelta::milliseconds(self.width_millis())
    }

    /// Bucket key for a local wall-clock time: `floor(ticks / W) * W`, with
    /// ticks in milliseconds since 0001-01-01T00:00:00.
    pub fn bucket_key(self, local: NaiveDateTime) -> i64 {
        ticks(local).div_euclid(self.width_millis()) * self.width_millis()
    }

    /// Start of the bucket that contains `local`
    pub fn bucket_start(self, local: NaiveDateTime) -> NaiveDateTime {
        local - TimeDelta::milliseconds(ticks(local).rem_euclid(self.width_millis()))
    }
}

fn ticks(local: NaiveDateTime) -> i64 {
    local.and_utc().timestamp_millis() + DAYS_BEFORE_UNIX_EPOCH * DAY_MS
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(Resolution::Week),
            "day" => Ok(Resolution::Day),
            "hour" => Ok(Resolution::Hour),
            "minute" => Ok(Resolution::Minute),
            other => Err(AggregateError::UnsupportedResolution(other.to_string())),
        }
    }
}
