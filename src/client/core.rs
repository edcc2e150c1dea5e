use crate::audit::AuditTrail;
use crate::client::policy::RetryPolicy;
use crate::client::types::SendStats;
use crate::logging::{Level, Logger};
use crate::transport::CompletionTransport;
use crate::types::{CompletionRequest, CompletionResponse};
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Detail tier at which request/response pairs go to the audit trail.
pub const AUDIT_DETAIL_TIER: u8 = 3;

/// Validating, retrying executor for chat-completion calls.
///
/// Each `send` validates the request, writes it to the audit trail when the
/// diagnostic gate is open, calls the transport and retries malformed-request
/// rejections per the [`RetryPolicy`].
#[derive(Clone)]
pub struct ChatClient {
    pub(crate) transport: Arc<dyn CompletionTransport>,
    pub(crate) audit: AuditTrail,
    pub(crate) logger: Logger,
    pub(crate) policy: RetryPolicy,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("audit", &self.audit)
            .field("logger", &self.logger)
            .field("policy", &self.policy)
            .finish()
    }
}

impl ChatClient {
    pub fn new(transport: Arc<dyn CompletionTransport>, audit: AuditTrail, logger: Logger) -> Self {
        Self {
            transport,
            audit,
            logger,
            policy: RetryPolicy::default(),
        }
    }

    pub fn builder() -> crate::client::ChatClientBuilder {
        crate::client::ChatClientBuilder::new()
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Debug enabled and detail tier at least [`AUDIT_DETAIL_TIER`].
    pub fn audit_gate_open(&self) -> bool {
        self.logger.is_enabled_for(Level::Debug) && self.logger.detail() >= AUDIT_DETAIL_TIER
    }

    /// Send one request and return the collaborator's full response.
    pub async fn send(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        Ok(self.execute(request, None).await?.0)
    }

    /// Like [`send`](Self::send), also returning attempt and timing facts.
    pub async fn send_with_stats(
        &self,
        request: &CompletionRequest,
    ) -> Result<(CompletionResponse, SendStats)> {
        self.execute(request, None).await
    }

    /// Like [`send`](Self::send), but gives up with [`Error::Cancelled`](crate::Error::Cancelled)
    /// as soon as `cancel` fires, whether a call or a backoff pause is in progress.
    pub async fn send_with_cancel(
        &self,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse> {
        Ok(self.execute(request, Some(cancel)).await?.0)
    }
}
