use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes log lines to a file. The terminal belongs to the display while a
/// ROM runs, so nothing can go to stdout or stderr.
pub struct FileLogger<W: Write + Send> {
    out: Mutex<W>,
    level: LevelFilter,
}

impl<W: Write + Send> FileLogger<W> {
    pub fn new(out: W, level: LevelFilter) -> Self {
        FileLogger {
            out: Mutex::new(out),
            level,
        }
    }
}

impl<W: Write + Send> Log for FileLogger<W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(
                out,
                "{}.{:03} [{:5}] {}: {}",
                now.as_secs(),
                now.subsec_millis(),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Ok(mut out) = self.out.lock() {
            let _ = out.flush();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("opening log file: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    AlreadySet(#[from] SetLoggerError),
}

/// install a file logger as the global `log` backend
pub fn init(path: &Path, level: LevelFilter) -> Result<(), LoggerError> {
    let file = File::create(path)?;
    log::set_boxed_logger(Box::new(FileLogger::new(file, level)))?;
    log::set_max_level(level);
    Ok(())
}
