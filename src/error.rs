use crate::logging::DiagnosedError;
use crate::normalize::{Inspect, RawValue};
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "request.messages")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., upstream request id)
    pub details: Option<String>,
    /// Source of the error (e.g., "request_validator", "http_transport")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a request was rejected before any network activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    EmptyMessages,
    MissingSystemMessage,
}

impl std::fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationKind::EmptyMessages => f.write_str("request.messages is null or empty"),
            ValidationKind::MissingSystemMessage => {
                f.write_str("request.system_messages is null or empty")
            }
        }
    }
}

/// Unified error type for the diagnostic layer.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {kind}{}", format_context(.context))]
    Validation {
        kind: ValidationKind,
        context: ErrorContext,
    },

    /// The remote service structurally rejected the request (HTTP 400 class).
    #[error("Malformed request: HTTP {status}: {message}{}", format_context(.context))]
    MalformedRequest {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    #[error("Remote error: HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Request cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Diagnosed(#[from] DiagnosedError),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn validation(kind: ValidationKind, context: ErrorContext) -> Self {
        Error::Validation { kind, context }
    }

    pub fn malformed_request(status: u16, message: impl Into<String>) -> Self {
        Error::MalformedRequest {
            status,
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// True for the collaborator's "structurally rejected" class, the only class that is retried.
    pub fn is_malformed_request(&self) -> bool {
        matches!(self, Error::MalformedRequest { .. })
    }

    pub fn validation_kind(&self) -> Option<ValidationKind> {
        match self {
            Error::Validation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Validation { context, .. }
            | Error::MalformedRequest { context, .. }
            | Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

impl Error {
    fn variant_name(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "Validation",
            Error::MalformedRequest { .. } => "MalformedRequest",
            Error::Remote { .. } => "Remote",
            Error::Transport(_) => "Transport",
            Error::Configuration { .. } => "Configuration",
            Error::Cancelled => "Cancelled",
            Error::Io(_) => "Io",
            Error::Serialization(_) => "Serialization",
            Error::Yaml(_) => "Yaml",
            Error::Diagnosed(_) => "Diagnosed",
        }
    }
}

/// Errors dump as `{error, status?, message, context?}` in the diagnostic log.
impl Inspect for Error {
    fn inspect(&self) -> RawValue {
        let mut entries = vec![("error".to_string(), RawValue::named(self.variant_name()))];
        match self {
            Error::MalformedRequest {
                status, message, ..
            }
            | Error::Remote { status, message } => {
                entries.push(("status".to_string(), status.inspect()));
                entries.push(("message".to_string(), message.inspect()));
            }
            other => entries.push(("message".to_string(), other.to_string().inspect())),
        }
        if let Some(ctx) = self.context() {
            let fields = [
                ("field_path", &ctx.field_path),
                ("details", &ctx.details),
                ("source", &ctx.source),
            ];
            let present: Vec<(String, RawValue)> = fields
                .iter()
                .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), v.inspect())))
                .collect();
            if !present.is_empty() {
                entries.push(("context".to_string(), RawValue::Mapping(present)));
            }
        }
        RawValue::Mapping(entries)
    }
}
