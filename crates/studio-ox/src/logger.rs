//! Application log collection.
//!
//! Entries are kept in a bounded [`LogBuffer`], echoed to the `log` facade and
//! periodically shipped to a [`LogSink`], normally the backend's frontend log
//! endpoint with an in-memory store behind it.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::{Studio, error::StudioRequestError};

/// Entries held by a buffer or memory sink before the oldest are dropped.
pub const MAX_LOG_ENTRIES: usize = 1000;
/// How often buffered entries are shipped.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

const LOG_TARGET: &str = "studio_ox::app";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Source of timestamps for log entries and flush scheduling.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Decides when a buffer is due for its next flush.
#[derive(Debug, Clone)]
pub struct FlushTicker {
    interval: Duration,
    last_flush: DateTime<Utc>,
}

impl FlushTicker {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_interval(now, DEFAULT_FLUSH_INTERVAL)
    }

    pub fn with_interval(now: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            interval,
            last_flush: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_flush)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= self.interval)
    }

    pub fn mark_flushed(&mut self, now: DateTime<Utc>) {
        self.last_flush = now;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogSinkError {
    #[error(transparent)]
    Request(#[from] StudioRequestError),
    #[error("log sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for flushed log entries.
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn write(&self, entries: &[LogEntry]) -> Result<(), LogSinkError>;
}

#[async_trait]
impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    async fn write(&self, entries: &[LogEntry]) -> Result<(), LogSinkError> {
        (**self).write(entries).await
    }
}

/// Posts entries to the backend's frontend log endpoint.
#[derive(Debug, Clone)]
pub struct HttpLogSink {
    client: Studio,
}

impl HttpLogSink {
    pub fn new(client: Studio) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LogSink for HttpLogSink {
    async fn write(&self, entries: &[LogEntry]) -> Result<(), LogSinkError> {
        self.client.submit_logs(entries).await?;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn push_bounded(entries: &mut VecDeque<LogEntry>, capacity: usize, entry: LogEntry) {
    entries.push_back(entry);
    while entries.len() > capacity {
        entries.pop_front();
    }
}

/// Keeps the most recent entries in memory; used when the backend is unreachable.
#[derive(Debug)]
pub struct MemoryLogSink {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogSink for MemoryLogSink {
    async fn write(&self, entries: &[LogEntry]) -> Result<(), LogSinkError> {
        let mut stored = lock(&self.entries);
        for entry in entries {
            push_bounded(&mut stored, self.capacity, entry.clone());
        }
        Ok(())
    }
}

/// Writes to `primary`, falling back to `fallback` when it fails.
#[derive(Debug, Clone)]
pub struct FallbackSink<P, F> {
    primary: P,
    fallback: F,
}

impl<P: LogSink, F: LogSink> FallbackSink<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P: LogSink, F: LogSink> LogSink for FallbackSink<P, F> {
    async fn write(&self, entries: &[LogEntry]) -> Result<(), LogSinkError> {
        match self.primary.write(entries).await {
            Ok(()) => Ok(()),
            Err(err) => {
                log::debug!("primary log sink failed, using fallback: {err}");
                self.fallback.write(entries).await
            }
        }
    }
}

/// Bounded in-memory collection of application log entries.
pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for LogBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBuffer")
            .field("entries", &format!("{} entries", self.len()))
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: MAX_LOG_ENTRIES,
            clock,
        }
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Append an entry, dropping the oldest one when full, and echo it to `log`.
    pub fn record(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        data: Option<Value>,
        source: Option<&str>,
    ) {
        let entry = LogEntry {
            timestamp: self.clock.now(),
            level,
            message: message.into(),
            data,
            source: source.map(str::to_string),
        };

        let level = log::Level::from(level);
        match (&entry.source, &entry.data) {
            (Some(source), Some(data)) => {
                log::log!(target: LOG_TARGET, level, "[{source}] {} {data}", entry.message);
            }
            (Some(source), None) => {
                log::log!(target: LOG_TARGET, level, "[{source}] {}", entry.message);
            }
            (None, Some(data)) => {
                log::log!(target: LOG_TARGET, level, "{} {data}", entry.message);
            }
            (None, None) => log::log!(target: LOG_TARGET, level, "{}", entry.message),
        }

        push_bounded(&mut lock(&self.entries), self.capacity, entry);
    }

    pub fn debug(&self, message: impl Into<String>, data: Option<Value>, source: Option<&str>) {
        self.record(LogLevel::Debug, message, data, source);
    }

    pub fn info(&self, message: impl Into<String>, data: Option<Value>, source: Option<&str>) {
        self.record(LogLevel::Info, message, data, source);
    }

    pub fn warn(&self, message: impl Into<String>, data: Option<Value>, source: Option<&str>) {
        self.record(LogLevel::Warn, message, data, source);
    }

    pub fn error(&self, message: impl Into<String>, data: Option<Value>, source: Option<&str>) {
        self.record(LogLevel::Error, message, data, source);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }

    /// Move every buffered entry to `sink`.
    ///
    /// The buffer is emptied before writing. A failed write is logged and the
    /// batch is dropped; returns the number of entries delivered.
    pub async fn flush(&self, sink: &dyn LogSink) -> usize {
        let batch: Vec<LogEntry> = lock(&self.entries).drain(..).collect();
        if batch.is_empty() {
            return 0;
        }

        match sink.write(&batch).await {
            Ok(()) => batch.len(),
            Err(err) => {
                log::warn!("failed to save {} log entries: {err}", batch.len());
                0
            }
        }
    }

    /// Flush when `ticker` says the interval has elapsed.
    pub async fn flush_if_due(&self, ticker: &mut FlushTicker, sink: &dyn LogSink) -> usize {
        let now = self.clock.now();
        if !ticker.is_due(now) {
            return 0;
        }
        ticker.mark_flushed(now);
        self.flush(sink).await
    }
}
