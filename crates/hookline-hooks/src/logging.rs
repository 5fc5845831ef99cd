//! Tracing setup. Hook output owns stdout, so logs go to a size-rotated file
//! and, optionally, stderr.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_NAME: &str = "hookline.log";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_ROTATE_SIZE_MB: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub file_path: PathBuf,
    pub level: String,
    pub rotate_size_bytes: u64,
    pub stderr: bool,
}

impl LogConfig {
    pub fn in_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            file_path: log_dir.into().join(LOG_FILE_NAME),
            level: DEFAULT_LOG_LEVEL.to_string(),
            rotate_size_bytes: DEFAULT_ROTATE_SIZE_MB * 1024 * 1024,
            stderr: false,
        }
    }
}

/// Appends to one open log file and shifts it to `<name>.1` once the next
/// write would push it past `max_size_bytes`. Zero disables rotation.
#[derive(Debug)]
struct SizeRotatingFileWriter {
    file_path: PathBuf,
    rotated_path: PathBuf,
    max_size_bytes: u64,
    file: File,
    size: u64,
}

impl SizeRotatingFileWriter {
    fn open(file_path: PathBuf, max_size_bytes: u64) -> io::Result<Self> {
        let file_name = file_path.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("log path {} has no file name", file_path.display()),
            )
        })?;
        let mut rotated_name = file_name.to_os_string();
        rotated_name.push(".1");
        let rotated_path = file_path.with_file_name(rotated_name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = append_to(&file_path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file_path,
            rotated_path,
            max_size_bytes,
            file,
            size,
        })
    }

    fn needs_rotation(&self, incoming_len: usize) -> bool {
        self.max_size_bytes > 0
            && self.size > 0
            && self.size.saturating_add(incoming_len as u64) > self.max_size_bytes
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        match fs::remove_file(&self.rotated_path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => return Err(error),
            _ => {}
        }
        fs::rename(&self.file_path, &self.rotated_path)?;
        self.file = append_to(&self.file_path)?;
        self.size = 0;
        Ok(())
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for SizeRotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.needs_rotation(buf.len()) {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.size = self.size.saturating_add(buf.len() as u64);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Installs the global subscriber. The returned guard flushes the file
/// writer when dropped, so the caller keeps it alive until exit.
pub fn init_tracing(config: &LogConfig) -> Option<WorkerGuard> {
    let file_writer =
        match SizeRotatingFileWriter::open(config.file_path.clone(), config.rotate_size_bytes) {
            Ok(writer) => writer,
            Err(error) => {
                eprintln!(
                    "warning: failed to open hookline log {}: {error}",
                    config.file_path.display()
                );
                return None;
            }
        };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_writer);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking);
    let init_result = if config.stderr {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(io::stderr);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .try_init()
    };
    if let Err(error) = init_result {
        eprintln!(
            "warning: failed to initialize hookline tracing for {}: {error}",
            config.file_path.display()
        );
        return None;
    }
    Some(guard)
}
