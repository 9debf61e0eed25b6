use crate::config::{Config, InvalidUtf8Policy};
use crate::error::LoggerError;
use crate::log_file;
use crate::log_record::LogRecord;
use crate::serial_source::LineSource;
use chrono::{Local, NaiveDateTime};
use log::{debug, trace, warn};
use std::convert::Infallible;
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::time::sleep;

/// Source of record timestamps.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// A record was written to the console and the log.
    Logged(LogRecord),
    /// Nothing to read.
    Idle,
    /// A line was read but dropped by the invalid UTF-8 policy.
    Skipped,
}

pub struct LineLogger<S, L, C, K = SystemClock> {
    source: S,
    log: L,
    console: C,
    clock: K,
    poll_interval: Duration,
    invalid_utf8: InvalidUtf8Policy,
    lines_logged: u64,
}

impl<S, L, C> LineLogger<S, L, C, SystemClock>
where
    S: LineSource,
    L: Write,
    C: Write,
{
    pub fn new(source: S, log: L, console: C, config: &Config) -> Self {
        Self {
            source,
            log,
            console,
            clock: SystemClock,
            poll_interval: config.poll_interval(),
            invalid_utf8: config.invalid_utf8,
            lines_logged: 0,
        }
    }
}

impl<S, L, C, K> LineLogger<S, L, C, K>
where
    S: LineSource,
    L: Write,
    C: Write,
    K: Clock,
{
    #[cfg(test)]
    pub fn with_clock<K2: Clock>(self, clock: K2) -> LineLogger<S, L, C, K2> {
        LineLogger {
            source: self.source,
            log: self.log,
            console: self.console,
            clock,
            poll_interval: self.poll_interval,
            invalid_utf8: self.invalid_utf8,
            lines_logged: self.lines_logged,
        }
    }

    pub fn lines_logged(&self) -> u64 {
        self.lines_logged
    }

    /// Checks the source once and, if a line is available, writes it to the
    /// console and then to the log. Does not sleep.
    pub async fn poll_once(&mut self) -> Result<Poll, LoggerError> {
        let available = self
            .source
            .bytes_available()
            .map_err(LoggerError::device)?;
        if available == 0 {
            return Ok(Poll::Idle);
        }

        let raw = self
            .source
            .read_line()
            .await
            .map_err(LoggerError::device)?;
        if raw.is_empty() {
            return Ok(Poll::Idle);
        }

        let Some(text) = self.decode(raw)? else {
            return Ok(Poll::Skipped);
        };

        let record = LogRecord::new(self.clock.now(), text.trim().to_string());

        writeln!(self.console, "{}", record.text)?;
        self.console.flush()?;
        log_file::append(&mut self.log, &record)?;

        self.lines_logged += 1;

        Ok(Poll::Logged(record))
    }

    /// Polls until the device fails or `shutdown` resolves. Never returns
    /// `Ok`; the error says why logging stopped.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<Infallible, LoggerError>
    where
        F: Future<Output = ()>,
    {
        let result = tokio::select! {
            result = self.poll_loop() => result,
            _ = shutdown => Err(LoggerError::Interrupted),
        };
        debug!("Logger stopped after {} lines", self.lines_logged);
        result
    }

    async fn poll_loop(&mut self) -> Result<Infallible, LoggerError> {
        loop {
            match self.poll_once().await? {
                Poll::Logged(record) => trace!("Logged: {}", record),
                Poll::Skipped => {}
                Poll::Idle => sleep(self.poll_interval).await,
            }
        }
    }

    fn decode(&self, raw: Vec<u8>) -> Result<Option<String>, LoggerError> {
        match String::from_utf8(raw) {
            Ok(text) => Ok(Some(text)),
            Err(e) => match self.invalid_utf8 {
                InvalidUtf8Policy::Replace => {
                    warn!("Replacing invalid UTF-8 in serial line: {}", e);
                    Ok(Some(String::from_utf8_lossy(e.as_bytes()).into_owned()))
                }
                InvalidUtf8Policy::Skip => {
                    warn!("Skipping serial line with invalid UTF-8: {}", e);
                    Ok(None)
                }
                InvalidUtf8Policy::Abort => Err(e.into()),
            },
        }
    }
}
