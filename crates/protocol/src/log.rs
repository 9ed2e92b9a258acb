//! Measurement-log records and their reassembly.
//!
//! The station streams each stored measurement as up to three frames that
//! share a record number. [`LogAssembler`] merges them back into one
//! [`LogEntry`].

use crate::codes::response;
use crate::types::{format_timestamp, timestamp_to_local};
use chrono::{DateTime, Local};
use serde::Serialize;

/// One partial log frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "part", rename_all = "snake_case")]
pub enum LogRecord {
    /// `LOG_RECORD1`: time and pressure
    Timestamped {
        record: u16,
        timestamp: u32,
        pressure: f32,
    },
    /// `LOG_RECORD2`: board temperature and humidity
    Climate {
        record: u16,
        temperature: f32,
        humidity: f32,
    },
    /// `LOG_RECORD3`: external sensor
    External { record: u16, temperature_ext: f32 },
}

impl LogRecord {
    pub fn record_number(&self) -> u16 {
        match *self {
            LogRecord::Timestamped { record, .. }
            | LogRecord::Climate { record, .. }
            | LogRecord::External { record, .. } => record,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            LogRecord::Timestamped { .. } => response::LOG_RECORD1,
            LogRecord::Climate { .. } => response::LOG_RECORD2,
            LogRecord::External { .. } => response::LOG_RECORD3,
        }
    }
}

/// A reassembled measurement. Fields stay `None` when the station did not
/// send the matching partial frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogEntry {
    pub record: u16,
    pub timestamp: Option<u32>,
    pub pressure: Option<f32>,
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
    pub temperature_ext: Option<f32>,
}

impl LogEntry {
    fn empty(record: u16) -> Self {
        Self {
            record,
            timestamp: None,
            pressure: None,
            temperature: None,
            humidity: None,
            temperature_ext: None,
        }
    }

    fn apply(&mut self, part: LogRecord) {
        match part {
            LogRecord::Timestamped {
                timestamp, pressure, ..
            } => {
                self.timestamp = Some(timestamp);
                self.pressure = Some(pressure);
            }
            LogRecord::Climate {
                temperature,
                humidity,
                ..
            } => {
                self.temperature = Some(temperature);
                self.humidity = Some(humidity);
            }
            LogRecord::External {
                temperature_ext, ..
            } => self.temperature_ext = Some(temperature_ext),
        }
    }

    /// All three partial frames have arrived
    pub fn is_complete(&self) -> bool {
        self.timestamp.is_some() && self.temperature.is_some() && self.temperature_ext.is_some()
    }

    pub fn datetime(&self) -> Option<DateTime<Local>> {
        self.timestamp.and_then(timestamp_to_local)
    }

    /// Column names matching [`LogEntry::csv_row`]
    pub fn csv_header() -> &'static str {
        "record,timestamp,datetime,pressure_kpa,temperature_c,humidity_pct,temperature_ext_c"
    }

    pub fn csv_row(&self) -> String {
        fn opt<T: std::fmt::Display>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }
        format!(
            "{},{},{},{},{},{},{}",
            self.record,
            opt(self.timestamp),
            self.timestamp.map(format_timestamp).unwrap_or_default(),
            opt(self.pressure),
            opt(self.temperature),
            opt(self.humidity),
            opt(self.temperature_ext),
        )
    }
}

/// Merges partial records into entries, in arrival order.
#[derive(Debug, Default)]
pub struct LogAssembler {
    current: Option<LogEntry>,
    emitted: usize,
}

impl LogAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one partial record.
    ///
    /// Returns an entry when it is complete, or when a record with a new
    /// number arrives and the pending one has to be flushed as-is.
    pub fn push(&mut self, part: LogRecord) -> Option<LogEntry> {
        let number = part.record_number();

        let flushed = if self.current.is_some_and(|pending| pending.record != number) {
            self.current.take()
        } else {
            None
        };

        let entry = self.current.get_or_insert_with(|| LogEntry::empty(number));
        entry.apply(part);

        let ready = if flushed.is_some() {
            flushed
        } else if entry.is_complete() {
            self.current.take()
        } else {
            None
        };

        if ready.is_some() {
            self.emitted += 1;
        }
        ready
    }

    /// Flush the pending entry at the end of a transfer
    pub fn finish(&mut self) -> Option<LogEntry> {
        let entry = self.current.take();
        if entry.is_some() {
            self.emitted += 1;
        }
        entry
    }

    /// Entries produced so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}
