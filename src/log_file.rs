use crate::error::LoggerError;
use crate::log_record::LogRecord;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Opens the log file for appending, creating it if missing. Existing
/// content is never truncated.
pub fn open(path: &Path) -> Result<File, LoggerError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

/// Writes one record as a line and flushes it.
pub fn append<W: Write>(writer: &mut W, record: &LogRecord) -> Result<(), LoggerError> {
    writeln!(writer, "{}", record)?;
    writer.flush()?;
    Ok(())
}
