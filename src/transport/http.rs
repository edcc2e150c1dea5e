use super::{CompletionTransport, TransportError};
use crate::types::{CompletionRequest, CompletionResponse, Message};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::env;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible `POST /chat/completions` client.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
}

impl HttpTransport {
    /// `AI_HTTP_TIMEOUT_SECS` overrides the 30 second default timeout.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let timeout_secs = env::var("AI_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        Self::with_timeout(base_url, api_key, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let parsed = url::Url::parse(base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid base url {:?}: {}", base_url, e),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("http_transport"),
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                format!("unsupported url scheme: {}", parsed.scheme()),
                ErrorContext::new()
                    .with_field_path("base_url")
                    .with_source("http_transport"),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Model used when a request does not name one.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Pull `error.message` out of an OpenAI-style error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn create_completion(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = ChatCompletionBody {
            model: request.model.as_deref().unwrap_or(&self.default_model),
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            frequency_penalty: request.frequency_penalty,
            presence_penalty: request.presence_penalty,
        };
        let request_id = Uuid::new_v4().to_string();

        let mut req = self
            .client
            .post(self.endpoint())
            .json(&body)
            .header("x-request-id", &request_id);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<CompletionResponse>()
                .await
                .map_err(|e| Error::Transport(TransportError::Http(e)));
        }

        let text = resp.text().await.unwrap_or_default();
        let message = error_message(&text);
        tracing::debug!(status = status.as_u16(), request_id = %request_id, "completion request rejected");
        if status.as_u16() == 400 {
            Err(Error::MalformedRequest {
                status: 400,
                message,
                context: ErrorContext::new()
                    .with_details(format!("request_id={}", request_id))
                    .with_source("http_transport"),
            })
        } else {
            Err(Error::Remote {
                status: status.as_u16(),
                message,
            })
        }
    }
}
