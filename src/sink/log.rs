//! Durable log capability and the shift-rotated CSV appender.
//!
//! # Responsibilities
//! - Format metric lines (`machine,name,value,timestamp`)
//! - Resolve the file of the current shift
//! - Create the file with its header row on first write
//!
//! # Design Decisions
//! - One appender is shared by all machines; writes are serialized
//! - Shift boundaries use local wall-clock time, the way operators read them
//! - Hours before the first shift start belong to the previous day's last shift

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::config::ShiftLogConfig;
use crate::sink::SinkError;

/// Header row of every log file.
pub const LOG_HEADER: &str = "Machine,Name,Value,Timestamp";

/// Append-only line sink.
pub trait LogAppender: Send + Sync {
    fn append(&self, line: &str) -> Result<(), SinkError>;
}

/// Format one log line.
pub fn format_line(machine_id: &str, name: &str, value: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{},{},{},{}",
        machine_id,
        name,
        value,
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Daily shift calendar given by start hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftSchedule {
    starts: Vec<u32>,
}

impl ShiftSchedule {
    /// Build from start hours (0..24). An empty list means one shift starting at midnight.
    pub fn new(mut starts: Vec<u32>) -> Self {
        starts.retain(|h| *h < 24);
        starts.sort_unstable();
        starts.dedup();
        if starts.is_empty() {
            starts.push(0);
        }
        Self { starts }
    }

    /// Production day and 1-based shift number for a local time.
    pub fn shift_of(&self, at: NaiveDateTime) -> (NaiveDate, usize) {
        let hour = at.hour();
        match self.starts.iter().rposition(|start| *start <= hour) {
            Some(index) => (at.date(), index + 1),
            None => {
                let day = at.date().pred_opt().unwrap_or(at.date());
                (day, self.starts.len())
            }
        }
    }
}

/// CSV appender writing to one file per shift.
#[derive(Debug)]
pub struct ShiftLogAppender {
    directory: PathBuf,
    prefix: String,
    schedule: ShiftSchedule,
    write_lock: Mutex<()>,
}

impl ShiftLogAppender {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>, schedule: ShiftSchedule) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            schedule,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ShiftLogConfig) -> Self {
        Self::new(
            config.directory.clone(),
            config.file_prefix.clone(),
            ShiftSchedule::new(config.shift_starts.clone()),
        )
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File that receives lines written at local time `at`.
    pub fn path_for(&self, at: NaiveDateTime) -> PathBuf {
        let (day, shift) = self.schedule.shift_of(at);
        self.directory
            .join(format!("{}_{}_{}.csv", self.prefix, day.format("%Y-%m-%d"), shift))
    }

    /// Append `line` to the file of the shift containing `at`.
    pub fn append_at(&self, line: &str, at: NaiveDateTime) -> Result<PathBuf, SinkError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.path_for(at);

        fs::create_dir_all(&self.directory)?;
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", LOG_HEADER)?;
                tracing::info!(path = %path.display(), "Created shift log");
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        let mut file = OpenOptions::new().append(true).open(&path)?;
        writeln!(file, "{}", line)?;
        Ok(path)
    }
}

impl LogAppender for ShiftLogAppender {
    fn append(&self, line: &str) -> Result<(), SinkError> {
        self.append_at(line, Local::now().naive_local()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 30, 0).unwrap()
    }

    #[test]
    fn test_shift_resolution() {
        let schedule = ShiftSchedule::new(vec![22, 6, 14]);
        assert_eq!(schedule.shift_of(at(2024, 3, 1, 6)), (NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 1));
        assert_eq!(schedule.shift_of(at(2024, 3, 1, 15)), (NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 2));
        assert_eq!(schedule.shift_of(at(2024, 3, 1, 23)), (NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 3));
        // Night shift carries over midnight.
        assert_eq!(schedule.shift_of(at(2024, 3, 2, 2)), (NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 3));
    }

    #[test]
    fn test_empty_schedule_is_single_daily_shift() {
        let schedule = ShiftSchedule::new(vec![]);
        assert_eq!(schedule.shift_of(at(2024, 3, 1, 0)).1, 1);
        assert_eq!(schedule.shift_of(at(2024, 3, 1, 23)).1, 1);
    }

    #[test]
    fn test_line_format() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T10:00:05Z").unwrap().with_timezone(&Utc);
        assert_eq!(format_line("IMM-01", "DoorOpened", "1", ts), "IMM-01,DoorOpened,1,2024-03-01T10:00:05Z");
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let appender = ShiftLogAppender::new(dir.path().join("logs"), "shift", ShiftSchedule::new(vec![6, 14, 22]));

        let first = appender.append_at("a,b,1,t", at(2024, 3, 1, 7)).unwrap();
        let second = appender.append_at("a,b,2,t", at(2024, 3, 1, 8)).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with("shift_2024-03-01_1.csv"));

        let content = fs::read_to_string(&first).unwrap();
        assert_eq!(content, "Machine,Name,Value,Timestamp\na,b,1,t\na,b,2,t\n");

        let next_shift = appender.append_at("a,b,3,t", at(2024, 3, 1, 14)).unwrap();
        assert!(next_shift.ends_with("shift_2024-03-01_2.csv"));
    }
}
