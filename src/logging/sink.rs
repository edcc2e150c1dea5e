//! Output sinks and emitters.

use super::{Diagnostics, Level, LogEvent};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Where a sink ends up writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    Stdout,
    Stderr,
    File(PathBuf),
    Other(String),
}

impl fmt::Display for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkTarget::Stdout => f.write_str("stdout"),
            SinkTarget::Stderr => f.write_str("stderr"),
            SinkTarget::File(path) => write!(f, "File: {}", path.display()),
            SinkTarget::Other(name) => f.write_str(name),
        }
    }
}

/// A text destination for formatted lines and progress characters.
pub trait LogSink: Send + Sync {
    fn target(&self) -> SinkTarget;

    fn write_str(&self, text: &str) -> io::Result<()>;

    fn flush(&self) -> io::Result<()>;

    /// Write one formatted line and flush.
    fn write_line(&self, line: &str) -> io::Result<()> {
        self.write_str(line)?;
        self.write_str("\n")?;
        self.flush()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Standard output or standard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSink {
    stderr: bool,
}

impl StreamSink {
    pub fn stdout() -> Self {
        Self { stderr: false }
    }

    pub fn stderr() -> Self {
        Self { stderr: true }
    }
}

impl LogSink for StreamSink {
    fn target(&self) -> SinkTarget {
        if self.stderr {
            SinkTarget::Stderr
        } else {
            SinkTarget::Stdout
        }
    }

    fn write_str(&self, text: &str) -> io::Result<()> {
        if self.stderr {
            io::stderr().lock().write_all(text.as_bytes())
        } else {
            io::stdout().lock().write_all(text.as_bytes())
        }
    }

    fn flush(&self) -> io::Result<()> {
        if self.stderr {
            io::stderr().flush()
        } else {
            io::stdout().flush()
        }
    }
}

/// Appends to a file kept open for the sink's lifetime.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn target(&self) -> SinkTarget {
        SinkTarget::File(self.path.clone())
    }

    fn write_str(&self, text: &str) -> io::Result<()> {
        lock(&self.file).write_all(text.as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        lock(&self.file).flush()
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut file = lock(&self.file);
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }
}

/// In-memory buffer; clones share the same buffer.
#[derive(Debug, Clone)]
pub struct MemorySink {
    name: String,
    buffer: Arc<Mutex<String>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffer: Arc::new(Mutex::new(String::new())),
        }
    }

    pub fn contents(&self) -> String {
        lock(&self.buffer).clone()
    }

    pub fn take(&self) -> String {
        std::mem::take(&mut *lock(&self.buffer))
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl LogSink for MemorySink {
    fn target(&self) -> SinkTarget {
        SinkTarget::Other(self.name.clone())
    }

    fn write_str(&self, text: &str) -> io::Result<()> {
        lock(&self.buffer).push_str(text);
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        Ok(())
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut buffer = lock(&self.buffer);
        buffer.push_str(line);
        buffer.push('\n');
        Ok(())
    }
}

/// Final step of the chain: hands a formatted event to its destination.
///
/// May run while the context's progress flag is locked, so an emitter must not log
/// through the [`Diagnostics`] it is given.
pub trait Emitter: Send + Sync {
    fn name(&self) -> &str;

    fn emit(&self, event: &LogEvent, line: &str, diagnostics: &Diagnostics);
}

/// Writes the formatted line to every registered sink (stderr when none are registered).
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkEmitter;

impl Emitter for SinkEmitter {
    fn name(&self) -> &str {
        "sinks"
    }

    fn emit(&self, _event: &LogEvent, line: &str, diagnostics: &Diagnostics) {
        let sinks = diagnostics.sinks();
        if sinks.is_empty() {
            let _ = StreamSink::stderr().write_line(line);
            return;
        }
        for sink in sinks {
            if let Err(e) = sink.write_line(line) {
                tracing::warn!(sink = %sink.target(), error = %e, "log sink write failed");
            }
        }
    }
}

/// Forwards facade output to the installed `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmitter;

impl Emitter for TracingEmitter {
    fn name(&self) -> &str {
        "tracing"
    }

    fn emit(&self, event: &LogEvent, _line: &str, _diagnostics: &Diagnostics) {
        let logger = event.logger.as_str();
        let prefix = event.prefix.as_str();
        let message = event.message.as_str();
        match event.level {
            Level::Debug => tracing::debug!(logger, prefix, "{}", message),
            Level::Info => tracing::info!(logger, prefix, "{}", message),
            Level::Warning => tracing::warn!(logger, prefix, "{}", message),
            Level::Error => tracing::error!(logger, prefix, "{}", message),
            Level::Critical => tracing::error!(logger, prefix, critical = true, "{}", message),
        }
    }
}
