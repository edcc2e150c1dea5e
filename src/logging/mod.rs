//! Detail-level logging facade.
//!
//! A [`Logger`] is a cheap handle (name, prefix, level, detail tier) over a shared
//! [`Diagnostics`] context. Every call becomes a [`LogEvent`] that runs through the
//! context's stage chain:
//!
//! ```text
//! ProgressCloser -> PrefixFilter -> DetailGate -> ProgressBatcher -> SinkDispatch -> Emitter
//! ```
//!
//! Progress calls (`progress_info(msg, '.')`) log `msg` once and then only write
//! their marker character to the progress destination, so a run of them renders as
//! one line followed by `....`. The next ordinary call closes the run with a newline,
//! even when that call is itself filtered out.
//!
//! Crate-internal diagnostics go through `tracing`; [`init_tracing`] installs a
//! subscriber for hosts that do not bring their own.

mod allow_list;
mod context;
mod diagnosed;
mod format;
mod logger;
mod sink;
mod stages;

pub use allow_list::AllowList;
pub use context::{Diagnostics, DiagnosticsBuilder};
pub use diagnosed::{CallSite, DiagnosedError, DiagnosedKind};
#[doc(hidden)]
pub use diagnosed::__type_name_of;
pub use format::{LogFormat, DEFAULT_FORMAT};
pub use logger::Logger;
pub use sink::{
    Emitter, FileSink, LogSink, MemorySink, SinkEmitter, SinkTarget, StreamSink, TracingEmitter,
};
pub use stages::{
    DetailGate, LogStage, Next, PrefixFilter, ProgressBatcher, ProgressCloser, SinkDispatch,
};

use crate::{Error, ErrorContext, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::str::FromStr;

/// Severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug = 10,
    Info = 20,
    Warning = 30,
    Error = 40,
    Critical = 50,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" | "fatal" => Ok(Level::Critical),
            other => Err(Error::configuration_with_context(
                format!("unknown log level: {}", other),
                ErrorContext::new()
                    .with_field_path("level")
                    .with_source("log_level_parser"),
            )),
        }
    }
}

/// One facade call on its way through the stage chain.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: Level,
    pub message: String,
    /// Name of the emitting logger.
    pub logger: String,
    /// Prefix of the emitting logger, matched against the allow-list.
    pub prefix: String,
    /// Effective minimum severity of the emitting logger.
    pub threshold: Level,
    /// Detail tier of the emitting logger.
    pub detail: u8,
    /// Tier this call requires (0 for untiered calls).
    pub tier: u8,
    /// Marker character for progress calls.
    pub progress: Option<char>,
    pub timestamp: DateTime<Local>,
}

impl LogEvent {
    pub fn is_progress(&self) -> bool {
        self.progress.is_some()
    }
}

/// Install a `tracing_subscriber::fmt` subscriber honoring `RUST_LOG`,
/// falling back to `default_directive` (e.g. `"info"`).
pub fn init_tracing(default_directive: &str) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|e| {
            Error::configuration_with_context(
                format!("tracing subscriber already initialized: {}", e),
                ErrorContext::new().with_source("init_tracing"),
            )
        })
}
