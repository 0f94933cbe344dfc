//! Attendance ledger: an append-only CSV of `Name,Date,Time` rows with a
//! per-person debounce window.

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const LEDGER_HEADER: [&str; 3] = ["Name", "Date", "Time"];
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ledger CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("bad timestamp in ledger row: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// One row of the attendance CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
}

impl AttendanceRecord {
    pub fn at(name: &str, when: &DateTime<Local>) -> Self {
        Self {
            name: name.to_string(),
            date: when.format(DATE_FORMAT).to_string(),
            time: when.format(TIME_FORMAT).to_string(),
        }
    }

    /// Local wall-clock time of the row, to the second.
    pub fn timestamp(&self) -> Result<NaiveDateTime, LedgerError> {
        let joined = format!("{} {}", self.date, self.time);
        Ok(NaiveDateTime::parse_from_str(&joined, &format!("{DATE_FORMAT} {TIME_FORMAT}"))?)
    }
}

/// Create the ledger file with its header row if it does not exist yet.
///
/// An existing file is left untouched. Missing parent directories are created.
pub fn initialize(path: &Path) -> Result<(), LedgerError> {
    let io_err = |source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            tracing::debug!(path = %path.display(), "ledger already exists");
            return Ok(());
        }
        Err(e) => return Err(io_err(e)),
    };

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(LEDGER_HEADER)?;
    writer.flush().map_err(io_err)?;
    tracing::info!(path = %path.display(), "created attendance ledger");
    Ok(())
}

/// Read every row of an existing ledger.
pub fn read_records(path: &Path) -> Result<Vec<AttendanceRecord>, LedgerError> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize::<AttendanceRecord>()
        .map(|row| row.map_err(LedgerError::from))
        .collect()
}

/// Ledger handle owning the debounce state for one run.
pub struct AttendanceLedger {
    path: PathBuf,
    window: chrono::Duration,
    last_seen: HashMap<String, DateTime<Local>>,
}

impl AttendanceLedger {
    /// Initialize the file at `path` and start with an empty last-seen map.
    pub fn open(path: &Path, window: Duration) -> Result<Self, LedgerError> {
        initialize(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            window: chrono::Duration::milliseconds(window.as_millis().min(i64::MAX as u128) as i64),
            last_seen: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a sighting of `name` at the current local time.
    pub fn record(&mut self, name: &str) -> Result<bool, LedgerError> {
        self.record_at(name, Local::now())
    }

    /// Record a sighting of `name` at `now`.
    ///
    /// A row is appended when `name` has not been recorded during this run,
    /// or when at least the debounce window has passed since its last row.
    /// Returns whether a row was written.
    pub fn record_at(&mut self, name: &str, now: DateTime<Local>) -> Result<bool, LedgerError> {
        let due = match self.last_seen.get(name) {
            None => true,
            Some(last) => now.signed_duration_since(*last) >= self.window,
        };
        if !due {
            return Ok(false);
        }

        self.append(&AttendanceRecord::at(name, &now))?;
        self.last_seen.insert(name.to_string(), now);
        tracing::info!(name, at = %now.format(TIME_FORMAT), "attendance recorded");
        Ok(true)
    }

    fn append(&self, record: &AttendanceRecord) -> Result<(), LedgerError> {
        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(io_err)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush().map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 3).unwrap()
    }

    fn ms(n: i64) -> chrono::Duration {
        chrono::Duration::milliseconds(n)
    }

    #[test]
    fn test_initialize_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        initialize(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Name,Date,Time\n");
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        std::fs::write(&path, "Name,Date,Time\nalice,2024-01-01,08:00:00\n").unwrap();

        initialize(&path).unwrap();
        initialize(&path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Name,Date,Time\nalice,2024-01-01,08:00:00\n"
        );
    }

    #[test]
    fn test_initialize_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/2024/attendance.csv");
        initialize(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_debounce_within_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path, Duration::from_secs(1)).unwrap();

        assert!(ledger.record_at("alice", instant()).unwrap());
        assert!(!ledger.record_at("alice", instant() + ms(999)).unwrap());
        assert_eq!(read_records(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_debounce_after_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path, Duration::from_secs(1)).unwrap();

        assert!(ledger.record_at("alice", instant()).unwrap());
        assert!(ledger.record_at("alice", instant() + ms(1000)).unwrap());
        assert_eq!(read_records(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_debounce_is_per_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path, Duration::from_secs(1)).unwrap();

        assert!(ledger.record_at("alice", instant()).unwrap());
        assert!(ledger.record_at("bob", instant() + ms(100)).unwrap());
        assert!(!ledger.record_at("alice", instant() + ms(200)).unwrap());

        let names: Vec<String> = read_records(&path).unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn test_record_uses_wall_clock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path, Duration::from_secs(3600)).unwrap();

        assert!(ledger.record("carol").unwrap());
        assert!(!ledger.record("carol").unwrap());
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, Local::now().format(DATE_FORMAT).to_string());
    }

    #[test]
    fn test_rows_roundtrip_to_the_second() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path, Duration::from_secs(1)).unwrap();
        let when = instant() + ms(450);
        ledger.record_at("alice", when).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row, "alice,2024-03-05,09:07:03");
        assert_eq!(row.split(',').count(), LEDGER_HEADER.len());

        let records = read_records(&path).unwrap();
        assert_eq!(records[0].timestamp().unwrap(), instant().naive_local());
    }

    #[test]
    fn test_existing_rows_are_preserved_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.csv");
        {
            let mut ledger = AttendanceLedger::open(&path, Duration::from_secs(1)).unwrap();
            ledger.record_at("alice", instant()).unwrap();
        }
        // Debounce state is per run: a fresh ledger records again immediately.
        let mut ledger = AttendanceLedger::open(&path, Duration::from_secs(1)).unwrap();
        assert!(ledger.record_at("alice", instant() + ms(10)).unwrap());
        assert_eq!(read_records(&path).unwrap().len(), 2);
    }
}
