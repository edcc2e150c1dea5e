//! Errors that carry the site they were raised from.
//!
//! Use the [`diagnosed!`](crate::diagnosed) and [`break_and_log!`](crate::break_and_log)
//! macros so the call site (file, line, enclosing function) is captured where the
//! macro is expanded.

use super::Diagnostics;
use std::fmt;
use std::path::Path;

const DEFAULT_MESSAGE: &str = "An error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosedKind {
    Detailed,
    /// Message composed from the captured log history.
    BreakAndLog,
}

impl DiagnosedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosedKind::Detailed => "DiagnosedError",
            DiagnosedKind::BreakAndLog => "BreakAndLogError",
        }
    }
}

impl fmt::Display for DiagnosedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File, line and enclosing routine of the code that raised an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
    pub routine: String,
    /// File stem of `file`.
    pub module: String,
}

impl CallSite {
    /// `fn_path` is a full item path such as `my_crate::jobs::run::__here`; the
    /// trailing marker item and closure segments are stripped.
    pub fn new(file: &str, line: u32, fn_path: &str) -> Self {
        let mut path = fn_path;
        loop {
            if let Some(p) = path.strip_suffix("::__here") {
                path = p;
            } else if let Some(p) = path.strip_suffix("::{{closure}}") {
                path = p;
            } else {
                break;
            }
        }
        let routine = path.rsplit("::").next().unwrap_or(path).to_string();
        let module = Path::new(file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        Self {
            file: file.to_string(),
            line,
            routine,
            module,
        }
    }

    /// Call site of the caller; the routine name is not available this way.
    #[track_caller]
    pub fn caller() -> Self {
        let loc = std::panic::Location::caller();
        Self::new(loc.file(), loc.line(), "?")
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}(){{{}#{}}}",
            self.module, self.routine, self.file, self.line
        )
    }
}

/// Unrecoverable invariant violation raised by host code.
///
/// Not meant to be retried: it names where it came from and, for
/// [`DiagnosedKind::BreakAndLog`], carries the log lines captured up to that point.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} from: {site}>>\n{message}")]
pub struct DiagnosedError {
    pub kind: DiagnosedKind,
    pub message: String,
    pub site: CallSite,
}

impl DiagnosedError {
    pub fn new(message: impl Into<String>, site: CallSite) -> Self {
        let message = message.into();
        Self {
            kind: DiagnosedKind::Detailed,
            message: if message.is_empty() {
                DEFAULT_MESSAGE.to_string()
            } else {
                message
            },
            site,
        }
    }

    /// Snapshot the capture buffer of `diagnostics` into the message.
    pub fn break_and_log(diagnostics: &Diagnostics, extra: Option<&str>, site: CallSite) -> Self {
        let lines = diagnostics.stored_messages();
        let mut message = if lines.is_empty() {
            "Break condition occurred".to_string()
        } else {
            format!("Break condition occurred, log:\n{}", lines.join("\n"))
        };
        if let Some(extra) = extra.filter(|m| !m.is_empty()) {
            message.push_str("\nAdditional message: ");
            message.push_str(extra);
        }
        Self {
            kind: DiagnosedKind::BreakAndLog,
            message,
            site,
        }
    }

    pub fn kind(&self) -> DiagnosedKind {
        self.kind
    }

    pub fn site(&self) -> &CallSite {
        &self.site
    }
}

#[doc(hidden)]
pub fn __type_name_of<T>(_: T) -> &'static str {
    std::any::type_name::<T>()
}

/// Capture the current [`CallSite`].
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::logging::CallSite::new(file!(), line!(), {
            fn __here() {}
            $crate::logging::__type_name_of(__here)
        })
    };
}

/// Build a [`DiagnosedError`](crate::logging::DiagnosedError) at the current site.
#[macro_export]
macro_rules! diagnosed {
    () => {
        $crate::logging::DiagnosedError::new("", $crate::call_site!())
    };
    ($($arg:tt)+) => {
        $crate::logging::DiagnosedError::new(format!($($arg)+), $crate::call_site!())
    };
}

/// Build a break-and-log error from the capture buffer of a `Diagnostics`.
#[macro_export]
macro_rules! break_and_log {
    ($diag:expr) => {
        $crate::logging::DiagnosedError::break_and_log(&$diag, None, $crate::call_site!())
    };
    ($diag:expr, $($arg:tt)+) => {
        $crate::logging::DiagnosedError::break_and_log(
            &$diag,
            Some(format!($($arg)+).as_str()),
            $crate::call_site!(),
        )
    };
}

/// `return Err(diagnosed!(...).into())`
#[macro_export]
macro_rules! raise_diagnosed {
    ($($arg:tt)*) => {
        return Err($crate::diagnosed!($($arg)*).into())
    };
}

/// `return Err(break_and_log!(...).into())`
#[macro_export]
macro_rules! raise_break_and_log {
    ($($arg:tt)+) => {
        return Err($crate::break_and_log!($($arg)+).into())
    };
}
