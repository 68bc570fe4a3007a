//! Shared logging utilities for Levelset binaries.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "levelset=info,levelset_engine=info,levelset_db=info";
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;
const LOG_FILTER_ENV: &str = "LEVELSET_LOG";

/// Logging configuration shared by Levelset binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a size-capped file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
    let file_writer = SharedFileWriter::new(log_dir, config.app_name)
        .context("Failed to initialize log writer")?;

    let file_filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

/// Get the Levelset home directory: ~/.levelset
pub fn levelset_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("LEVELSET_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .expect("Could not determine home directory")
        .join(".levelset")
}

/// Get the logs directory: ~/.levelset/logs
pub fn logs_dir() -> PathBuf {
    levelset_home().join("logs")
}

/// Default database location: ~/.levelset/levelset.sqlite3
pub fn default_db_path() -> PathBuf {
    levelset_home().join("levelset.sqlite3")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}

struct CappedFileAppender {
    path: PathBuf,
    rotated_path: PathBuf,
    max_size: u64,
    file: File,
    current_size: u64,
}

impl CappedFileAppender {
    fn new(dir: PathBuf, base_name: &str, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let base = sanitize_name(base_name);
        let path = dir.join(format!("{base}.log"));
        let rotated_path = dir.join(format!("{base}.log.1"));
        let (file, current_size) = open_append(&path)?;
        let mut appender = Self {
            path,
            rotated_path,
            max_size,
            file,
            current_size,
        };
        if appender.current_size > appender.max_size {
            appender.rotate()?;
        }
        Ok(appender)
    }

    // Single rotation generation: the previous log replaces <name>.log.1.
    fn rotate(&mut self) -> io::Result<()> {
        let _ = self.file.flush();
        if self.path.exists() {
            fs::rename(&self.path, &self.rotated_path)?;
        }
        let (file, size) = open_append(&self.path)?;
        self.file = file;
        self.current_size = size;
        Ok(())
    }
}

fn open_append(path: &std::path::Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let size = file.metadata()?.len();
    Ok((file, size))
}

impl Write for CappedFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }
        let bytes = self.file.write(buf)?;
        self.current_size += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[derive(Clone)]
struct SharedFileWriter {
    inner: Arc<Mutex<CappedFileAppender>>,
}

impl SharedFileWriter {
    fn new(dir: PathBuf, base_name: &str) -> Result<Self> {
        let appender = CappedFileAppender::new(dir, base_name, MAX_LOG_FILE_SIZE)
            .with_context(|| format!("Failed to open log file for {base_name}"))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(appender)),
        })
    }
}

struct SharedFileWriterGuard {
    inner: Arc<Mutex<CappedFileAppender>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedFileWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?;
        guard.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
