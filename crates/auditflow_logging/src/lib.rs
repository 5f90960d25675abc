//! Logging setup for the Auditflow binary.
//!
//! Two layers share one `EnvFilter` source: a size-rotated file under the
//! logs directory (no ANSI) and stderr. Stderr stays at `warn` unless the
//! caller asks for verbose output, so JSON printed on stdout is never mixed
//! with log noise.

use anyhow::{Context, Result};
use auditflow_protocol::paths::default_logs_dir;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "auditflow=info,auditflow_intake=info,auditflow_runs=info,\
auditflow_directory=info,auditflow_orchestrator=info,auditflow_db=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration for the CLI.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Defaults to `<home>/logs` when unset.
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a size-rotated log file and stderr output.
///
/// Returns the directory the log file lives in.
pub fn init_logging(config: LogConfig<'_>) -> Result<PathBuf> {
    let log_dir = config.log_dir.unwrap_or_else(default_logs_dir);
    let file = RotatingFile::open(&log_dir, config.app_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
        .with_context(|| format!("Failed to open log file in {}", log_dir.display()))?;

    let console_filter = if config.verbose {
        env_filter()
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(SharedLog(Mutex::new(file)))
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(log_dir)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// `<name>.log` plus up to `keep - 1` numbered predecessors.
struct RotatingFile {
    dir: PathBuf,
    name: String,
    keep: usize,
    max_bytes: u64,
    file: File,
    written: u64,
}

impl RotatingFile {
    fn open(dir: &Path, app_name: &str, keep: usize, max_bytes: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let name = sanitize_name(app_name);
        let (file, written) = open_append(&dir.join(format!("{}.log", name)))?;
        let mut rotating = Self {
            dir: dir.to_path_buf(),
            name,
            keep: keep.max(1),
            max_bytes,
            file,
            written,
        };
        if rotating.written > rotating.max_bytes {
            rotating.rotate()?;
        }
        Ok(rotating)
    }

    fn path(&self, generation: usize) -> PathBuf {
        match generation {
            0 => self.dir.join(format!("{}.log", self.name)),
            n => self.dir.join(format!("{}.log.{}", self.name, n)),
        }
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let oldest = self.keep - 1;
        if oldest == 0 {
            File::create(self.path(0))?;
        } else {
            remove_if_present(&self.path(oldest))?;
            for generation in (0..oldest).rev() {
                let from = self.path(generation);
                if from.exists() {
                    fs::rename(&from, self.path(generation + 1))?;
                }
            }
        }
        let (file, written) = open_append(&self.path(0))?;
        self.file = file;
        self.written = written;
        Ok(())
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let len = file.metadata()?.len();
    Ok((file, len))
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// `MakeWriter` over one rotating file shared by every event.
struct SharedLog(Mutex<RotatingFile>);

struct SharedLogWriter<'a>(&'a Mutex<RotatingFile>);

impl<'a> MakeWriter<'a> for SharedLog {
    type Writer = SharedLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriter(&self.0)
    }
}

impl SharedLogWriter<'_> {
    fn lock(&self) -> io::Result<MutexGuard<'_, RotatingFile>> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))
    }
}

impl Write for SharedLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}
