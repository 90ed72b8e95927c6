use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("invalid input: no log records to aggregate")]
    EmptyInput,
    #[error("invalid input: unsupported resolution '{0}', expected one of week, day, hour, minute")]
    UnsupportedResolution(String),
    #[error("failed to write report line")]
    Sink(#[from] io::Error),
}

impl AggregateError {
    /// Whether the error was caused by the caller's arguments rather than the sink
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            AggregateError::EmptyInput | AggregateError::UnsupportedResolution(_)
        )
    }
}

pub type AggregateResult<T> = Result<T, AggregateError>;
