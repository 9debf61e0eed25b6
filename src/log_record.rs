use chrono::NaiveDateTime;
use std::fmt;

/// strftime pattern used for the timestamp column of the log file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single line captured from the serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Local wall-clock time the line was read
    pub timestamp: NaiveDateTime,
    /// Decoded and trimmed line text
    pub text: String,
}

impl LogRecord {
    pub fn new(timestamp: NaiveDateTime, text: String) -> Self {
        Self { timestamp, text }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.timestamp.format(TIMESTAMP_FORMAT), self.text)
    }
}
