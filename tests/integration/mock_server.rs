//! Mock HTTP server setup for integration tests

use ai_diag_rust::HttpTransport;
use mockito::{Matcher, Mock, Server, ServerGuard};

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Transport pointed at the mock server, authenticating with `sk-test`.
    pub fn transport(&self) -> HttpTransport {
        HttpTransport::new(&self.base_url, Some("sk-test".to_string()))
            .expect("mock server url is valid")
    }

    /// Mock `POST /chat/completions` answering `status` with `body`, expected `hits` times.
    pub async fn mock_completion(&mut self, status: usize, body: &str, hits: usize) -> Mock {
        self.server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_header("x-request-id", Matcher::Any)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }
}

pub const OK_BODY: &str = r#"{
  "id": "chatcmpl-1",
  "model": "gpt-4o-mini",
  "choices": [
    {"index": 0, "message": {"role": "assistant", "content": "Paris"}, "finish_reason": "stop"}
  ],
  "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
}"#;

pub const BAD_REQUEST_BODY: &str =
    r#"{"error": {"message": "Invalid value for 'role'", "type": "invalid_request_error"}}"#;
