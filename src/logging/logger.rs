use super::{Diagnostics, Level, LogEvent};
use std::sync::Arc;

/// Named logging handle with a prefix, a minimum severity and a detail tier.
///
/// Any detail tier above zero forces the effective minimum severity to
/// [`Level::Debug`]. Tiered calls (`debug1`..`debug3`) emit only when
/// `detail >= tier`.
#[derive(Clone)]
pub struct Logger {
    name: String,
    prefix: String,
    level: Level,
    detail: u8,
    diagnostics: Arc<Diagnostics>,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("level", &self.level)
            .field("detail", &self.detail)
            .finish()
    }
}

impl Logger {
    /// New logger at [`Level::Warning`] with an empty prefix.
    pub fn new(name: impl Into<String>, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            name: name.into(),
            prefix: String::new(),
            level: Level::Warning,
            detail: 0,
            diagnostics,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_detail(mut self, detail: u8) -> Self {
        self.detail = detail;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn set_level(&mut self, level: Level) {
        self.level = level;
    }

    pub fn detail(&self) -> u8 {
        self.detail
    }

    pub fn set_detail(&mut self, detail: u8) {
        self.detail = detail;
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub fn effective_level(&self) -> Level {
        if self.detail > 0 {
            Level::Debug
        } else {
            self.level
        }
    }

    /// Severity check only; the prefix allow-list is applied when the event is dispatched.
    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.effective_level()
    }

    fn event(&self, level: Level, message: &str, tier: u8, progress: Option<char>) -> LogEvent {
        LogEvent {
            level,
            message: message.to_string(),
            logger: self.name.clone(),
            prefix: self.prefix.clone(),
            threshold: self.effective_level(),
            detail: self.detail,
            tier,
            progress,
            timestamp: chrono::Local::now(),
        }
    }

    pub fn log(&self, level: Level, message: impl AsRef<str>) {
        self.diagnostics
            .dispatch(&self.event(level, message.as_ref(), 0, None));
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(Level::Warning, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message);
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.log(Level::Critical, message);
    }

    /// Debug message that needs `detail >= tier`.
    pub fn debug_tier(&self, tier: u8, message: impl AsRef<str>) {
        self.diagnostics
            .dispatch(&self.event(Level::Debug, message.as_ref(), tier, None));
    }

    pub fn debug1(&self, message: impl AsRef<str>) {
        self.debug_tier(1, message);
    }

    pub fn debug2(&self, message: impl AsRef<str>) {
        self.debug_tier(2, message);
    }

    pub fn debug3(&self, message: impl AsRef<str>) {
        self.debug_tier(3, message);
    }

    /// Log `message` once per progress run, then write `marker` for every call.
    pub fn progress(&self, level: Level, message: impl AsRef<str>, marker: char) {
        self.diagnostics
            .dispatch(&self.event(level, message.as_ref(), 0, Some(marker)));
    }

    pub fn progress_debug(&self, message: impl AsRef<str>, marker: char) {
        self.progress(Level::Debug, message, marker);
    }

    pub fn progress_info(&self, message: impl AsRef<str>, marker: char) {
        self.progress(Level::Info, message, marker);
    }

    pub fn progress_warning(&self, message: impl AsRef<str>, marker: char) {
        self.progress(Level::Warning, message, marker);
    }

    pub fn progress_error(&self, message: impl AsRef<str>, marker: char) {
        self.progress(Level::Error, message, marker);
    }

    pub fn progress_critical(&self, message: impl AsRef<str>, marker: char) {
        self.progress(Level::Critical, message, marker);
    }
}
