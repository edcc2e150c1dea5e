use crate::audit::{AuditTrail, DEFAULT_AUDIT_FILE};
use crate::client::core::ChatClient;
use crate::client::policy::RetryPolicy;
use crate::logging::{Diagnostics, Logger};
use crate::transport::{CompletionTransport, HttpTransport};
use crate::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for [`ChatClient`].
///
/// Without an explicit transport, an [`HttpTransport`] is built from
/// `OPENAI_BASE_URL` / `OPENAI_API_KEY` (or the values set here).
pub struct ChatClientBuilder {
    transport: Option<Arc<dyn CompletionTransport>>,
    base_url: Option<String>,
    api_key: Option<String>,
    default_model: Option<String>,
    logger: Option<Logger>,
    diagnostics: Option<Arc<Diagnostics>>,
    audit_path: Option<PathBuf>,
    audit: Option<AuditTrail>,
    policy: RetryPolicy,
}

impl ChatClientBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            base_url: None,
            api_key: None,
            default_model: None,
            logger: None,
            diagnostics: None,
            audit_path: None,
            audit: None,
            policy: RetryPolicy::default(),
        }
    }

    /// Use a custom collaborator instead of HTTP.
    pub fn transport(mut self, transport: Arc<dyn CompletionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Context for the default logger; ignored when [`logger`](Self::logger) is set.
    pub fn diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn audit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_path = Some(path.into());
        self
    }

    /// Share an existing trail (and its lock) with other clients.
    pub fn audit_trail(mut self, trail: AuditTrail) -> Self {
        self.audit = Some(trail);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Result<ChatClient> {
        let transport = match self.transport {
            Some(t) => t,
            None => {
                let base_url = self
                    .base_url
                    .or_else(|| std::env::var("OPENAI_BASE_URL").ok())
                    .unwrap_or_else(|| crate::transport::DEFAULT_BASE_URL.to_string());
                let api_key = self
                    .api_key
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok());
                let mut http = HttpTransport::new(&base_url, api_key)?;
                if let Some(model) = self.default_model {
                    http = http.with_default_model(model);
                }
                Arc::new(http)
            }
        };

        let logger = self.logger.unwrap_or_else(|| {
            Logger::new(
                "ai_diag_rust::client",
                self.diagnostics.unwrap_or_else(Diagnostics::global),
            )
        });

        let audit = self.audit.unwrap_or_else(|| {
            AuditTrail::new(
                self.audit_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_FILE)),
            )
        });

        Ok(ChatClient::new(transport, audit, logger).with_retry_policy(self.policy))
    }
}

impl Default for ChatClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
