//! HttpTransport status mapping and its use by the executor

use crate::integration::mock_server::{MockServerFixture, BAD_REQUEST_BODY, OK_BODY};
use ai_diag_rust::logging::MemorySink;
use ai_diag_rust::{
    ChatClient, CompletionRequest, CompletionTransport, Diagnostics, Error, Logger, Message,
    RetryPolicy,
};
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;

fn request() -> CompletionRequest {
    CompletionRequest::new("gpt-4o-mini")
        .with_message(Message::system("Answer in one word."))
        .with_message(Message::user("Capital of France?"))
}

#[tokio::test]
async fn success_parses_response_and_sends_request_shape() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [
                {"role": "system", "content": "Answer in one word."},
                {"role": "user", "content": "Capital of France?"}
            ],
            "temperature": 1.0,
            "top_p": 1.0,
            "frequency_penalty": 0.0,
            "presence_penalty": 0.0
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(OK_BODY)
        .create_async()
        .await;

    let resp = fixture.transport().create_completion(&request()).await.unwrap();
    assert_eq!(resp.content(), Some("Paris"));
    assert_eq!(resp.usage.map(|u| u.total_tokens), Some(13));
    mock.assert_async().await;
}

#[tokio::test]
async fn status_400_is_malformed_request() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture.mock_completion(400, BAD_REQUEST_BODY, 1).await;

    let err = fixture
        .transport()
        .create_completion(&request())
        .await
        .unwrap_err();
    match err {
        Error::MalformedRequest { status, message, .. } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid value for 'role'");
        }
        other => panic!("expected malformed request, got {other}"),
    }
}

#[tokio::test]
async fn other_statuses_are_remote_errors() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture.mock_completion(503, "upstream busy", 1).await;

    let err = fixture
        .transport()
        .create_completion(&request())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote { status: 503, ref message } if message == "upstream busy"));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let transport = ai_diag_rust::HttpTransport::new("http://127.0.0.1:9", None).unwrap();
    let err = transport.create_completion(&request()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn executor_retries_http_400_up_to_the_budget() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture.mock_completion(400, BAD_REQUEST_BODY, 3).await;

    let diag = Arc::new(
        Diagnostics::builder()
            .sink(Arc::new(MemorySink::default()))
            .build(),
    );
    let client = ChatClient::builder()
        .base_url(&fixture.base_url)
        .api_key("sk-test")
        .logger(Logger::new("http", diag))
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(5)))
        .build()
        .unwrap();

    let err = client.send(&request()).await.unwrap_err();
    assert!(err.is_malformed_request());
    mock.assert_async().await;
}
