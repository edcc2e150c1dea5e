//! The send/retry loop.

use crate::client::policy::Decision;
use crate::client::types::SendStats;
use crate::client::validation::validate_request;
use crate::normalize::to_yaml_string;
use crate::types::{CompletionRequest, CompletionResponse};
use crate::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::core::ChatClient;

impl ChatClient {
    pub(crate) async fn execute(
        &self,
        request: &CompletionRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<(CompletionResponse, SendStats)> {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        validate_request(request, &self.logger)?;

        let audit = self.audit_gate_open();
        if audit {
            if let Err(e) = self.audit.record_request(request).await {
                tracing::warn!(path = %self.audit.path().display(), error = %e, "audit request write failed");
            }
        }

        self.logger.debug("* Calling completion service *");
        let mut attempts: u32 = 0;
        let mut pauses: u32 = 0;
        loop {
            attempts += 1;
            let outcome = until_cancelled(cancel, self.transport.create_completion(request)).await;
            let err = match outcome {
                Ok(response) => {
                    if audit {
                        let text = response.content().unwrap_or_default();
                        if let Err(e) = self.audit.record_response(text).await {
                            tracing::warn!(path = %self.audit.path().display(), error = %e, "audit response write failed");
                        }
                    }
                    let stats = SendStats {
                        request_id,
                        attempts,
                        pauses,
                        duration_ms: started.elapsed().as_millis() as u64,
                    };
                    return Ok((response, stats));
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => e,
            };

            if err.is_malformed_request() {
                self.logger
                    .error(format!("Bad request error\n{}", to_yaml_string(&err)));
                self.logger
                    .error(format!("request:\n{}", to_yaml_string(request)));
            }

            match self.policy.decide(&err, request, attempts) {
                Decision::Retry { delay } => {
                    self.logger.error("Trying again");
                    tracing::debug!(request_id = %request_id, attempts, "retrying malformed request");
                    pause(cancel, delay).await?;
                    pauses += 1;
                }
                Decision::GiveUp => {
                    self.logger.error("Giving up");
                    self.audit_failure(audit, &err).await;
                    return Err(err);
                }
                Decision::Surface => {
                    self.audit_failure(audit, &err).await;
                    return Err(err);
                }
            }
        }
    }

    async fn audit_failure(&self, audit: bool, err: &Error) {
        if !audit {
            return;
        }
        if let Err(e) = self.audit.record_response(err.to_string()).await {
            tracing::warn!(path = %self.audit.path().display(), error = %e, "audit error write failed");
        }
    }
}

async fn until_cancelled<T>(
    cancel: Option<&CancellationToken>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            out = fut => out,
        },
        None => fut.await,
    }
}

async fn pause(cancel: Option<&CancellationToken>, delay: Duration) -> Result<()> {
    until_cancelled(cancel, async {
        tokio::time::sleep(delay).await;
        Ok(())
    })
    .await
}
