//! Rolling Logger
//!
//! Installs a `tracing` subscriber that writes to one log file per day
//! (`<prefix>.<YYYY-MM-DD>.log`) and mirrors every line into a bounded
//! in-memory buffer so the shell can show recent activity.

use std::collections::VecDeque;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use chrono::{Local, NaiveDate};
use tracing_subscriber::EnvFilter;

/// Lines kept in the in-memory buffer
pub const DEFAULT_CAPACITY: usize = 500;
/// Daily files kept on disk
pub const DEFAULT_MAX_FILES: usize = 7;

static RECENT: OnceLock<RingBuffer> = OnceLock::new();

/// Logger setup errors
#[derive(Debug)]
pub enum LoggerError {
    Io(io::Error),
    AlreadyInitialized,
}

impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggerError::Io(e) => write!(f, "log file error: {}", e),
            LoggerError::AlreadyInitialized => write!(f, "a global logger is already installed"),
        }
    }
}

impl std::error::Error for LoggerError {}

impl From<io::Error> for LoggerError {
    fn from(e: io::Error) -> Self {
        LoggerError::Io(e)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ========================
// Circular buffer
// ========================

/// Bounded buffer of the most recent log lines
#[derive(Clone, Debug)]
pub struct RingBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = lock(&self.lines);
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Oldest first
    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).iter().cloned().collect()
    }
}

// ========================
// Rolling file writer
// ========================

struct FileState {
    dir: PathBuf,
    prefix: String,
    max_files: usize,
    date: Option<NaiveDate>,
    file: Option<File>,
    partial: String,
}

/// `io::Write` sink that switches files when the local date changes
#[derive(Clone)]
pub struct RollingWriter {
    state: Arc<Mutex<FileState>>,
    buffer: RingBuffer,
}

impl RollingWriter {
    pub fn new(dir: impl AsRef<Path>, prefix: &str, buffer: RingBuffer) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            state: Arc::new(Mutex::new(FileState {
                dir,
                prefix: prefix.to_string(),
                max_files: DEFAULT_MAX_FILES,
                date: None,
                file: None,
                partial: String::new(),
            })),
            buffer,
        })
    }

    pub fn with_max_files(self, max_files: usize) -> Self {
        lock(&self.state).max_files = max_files.max(1);
        self
    }

    /// Path of the file for a given day
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        let state = lock(&self.state);
        state.dir.join(file_name(&state.prefix, date))
    }

    fn write_dated(&self, buf: &[u8], date: NaiveDate) -> io::Result<usize> {
        let mut state = lock(&self.state);
        if state.date != Some(date) || state.file.is_none() {
            roll(&mut state, date)?;
        }
        if let Some(file) = state.file.as_mut() {
            file.write_all(buf)?;
        }

        state.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = state.partial.find('\n') {
            let line: String = state.partial.drain(..=pos).collect();
            self.buffer.push(line.trim_end().to_string());
        }
        Ok(buf.len())
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_dated(buf, Local::now().date_naive())
    }

    fn flush(&mut self) -> io::Result<()> {
        match lock(&self.state).file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}.{}.log", prefix, date.format("%Y-%m-%d"))
}

fn roll(state: &mut FileState, date: NaiveDate) -> io::Result<()> {
    let path = state.dir.join(file_name(&state.prefix, date));
    state.file = Some(OpenOptions::new().create(true).append(true).open(path)?);
    state.date = Some(date);
    prune(state)
}

/// Remove the oldest daily files beyond `max_files`
fn prune(state: &FileState) -> io::Result<()> {
    let head = format!("{}.", state.prefix);
    let mut logs: Vec<PathBuf> = fs::read_dir(&state.dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(&head) && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect();

    if logs.len() <= state.max_files {
        return Ok(());
    }
    // Date-stamped names sort chronologically
    logs.sort();
    let excess = logs.len() - state.max_files;
    for path in logs.into_iter().take(excess) {
        fs::remove_file(path)?;
    }
    Ok(())
}

// ========================
// Global logger
// ========================

/// Install the global subscriber writing to `log_dir/<app_name>.<date>.log`.
///
/// The level comes from `RUST_LOG` and defaults to `info`.
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    let buffer = RECENT.get_or_init(|| RingBuffer::new(DEFAULT_CAPACITY)).clone();
    let writer = RollingWriter::new(log_dir, app_name, buffer)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)
}

/// Recent log lines, oldest first. Empty before `init_logger`.
pub fn recent_lines() -> Vec<String> {
    RECENT.get().map(RingBuffer::lines).unwrap_or_default()
}

pub fn info(message: &str) {
    tracing::info!(target: "app", "{}", message);
}

pub fn error(message: &str) {
    tracing::error!(target: "app", "{}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let buffer = RingBuffer::new(2);
        buffer.push("a".into());
        buffer.push("b".into());
        buffer.push("c".into());
        assert_eq!(buffer.lines(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_writer_appends_lines_to_file_and_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = RingBuffer::new(10);
        let writer = RollingWriter::new(dir.path(), "Board", buffer.clone()).unwrap();

        writer.write_dated(b"first line\nsecond ", day(1)).unwrap();
        writer.write_dated(b"half\n", day(1)).unwrap();

        let content = fs::read_to_string(writer.path_for(day(1))).unwrap();
        assert_eq!(content, "first line\nsecond half\n");
        assert_eq!(buffer.lines(), vec!["first line".to_string(), "second half".to_string()]);
    }

    #[test]
    fn test_writer_rolls_on_date_change_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RollingWriter::new(dir.path(), "Board", RingBuffer::new(10))
            .unwrap()
            .with_max_files(2);

        writer.write_dated(b"one\n", day(1)).unwrap();
        writer.write_dated(b"two\n", day(2)).unwrap();
        writer.write_dated(b"three\n", day(3)).unwrap();

        assert!(!writer.path_for(day(1)).exists());
        assert!(writer.path_for(day(2)).exists());
        assert_eq!(fs::read_to_string(writer.path_for(day(3))).unwrap(), "three\n");
    }
}
