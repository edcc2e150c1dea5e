//! # ai-diag-rust
//!
//! Diagnostic and resilience layer for chat-completion calls.
//!
//! ## Overview
//!
//! The crate wraps a remote completion service (an OpenAI-compatible HTTP endpoint,
//! or any [`CompletionTransport`]) with:
//!
//! - **Validation**: requests without messages or without a system message are rejected
//!   before any network activity
//! - **Retry**: malformed-request rejections of complete requests are retried with a
//!   fixed, cancellable backoff
//! - **Audit trail**: at detail tier 3 every request (normalized, block-style YAML) and
//!   response (raw text) is appended to `openai_requests.yaml`
//! - **Logging facade**: detail tiers, a prefix allow-list, progress-character batching,
//!   message capture and diagnosed errors, all over an explicit [`Diagnostics`] context
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_diag_rust::{ChatClient, CompletionRequest, Diagnostics, Logger, Message};
//!
//! #[tokio::main]
//! async fn main() -> ai_diag_rust::Result<()> {
//!     let logger = Logger::new("app", Diagnostics::global()).with_detail(3);
//!     let client = ChatClient::builder().logger(logger).build()?;
//!
//!     let request = CompletionRequest::new("gpt-4o-mini")
//!         .with_message(Message::system("Answer in one word."))
//!         .with_message(Message::user("Capital of France?"));
//!
//!     let response = client.send(&request).await?;
//!     println!("{}", response.content().unwrap_or_default());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Validating, retrying executor and its builder |
//! | [`audit`] | Append-only request/response audit file |
//! | [`normalize`] | Never-failing conversion of values into YAML-safe form |
//! | [`logging`] | Detail-level logging facade and diagnosed errors |
//! | [`transport`] | Completion service seam and HTTP implementation |
//! | [`config`] | YAML/env configuration |
//! | [`types`] | Request and response data model |

pub mod audit;
pub mod client;
pub mod config;
pub mod logging;
pub mod normalize;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use audit::{AuditKind, AuditTrail};
pub use client::{ChatClient, ChatClientBuilder, RetryPolicy, SendStats};
pub use config::DiagnosticsConfig;
pub use logging::{DiagnosedError, Diagnostics, Level, Logger};
pub use normalize::{Inspect, Normalizer, RawValue, SafeValue};
pub use transport::{CompletionTransport, HttpTransport};
pub use types::{CompletionRequest, CompletionResponse, Message, MessageRole};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ValidationKind};
