//! Executor behavior against a scripted in-process collaborator.

use ai_diag_rust::logging::{LogFormat, MemorySink};
use ai_diag_rust::{
    AuditTrail, ChatClient, CompletionRequest, CompletionResponse, CompletionTransport,
    Diagnostics, Error, Logger, Message, RetryPolicy, ValidationKind,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Replays a fixed list of outcomes, one per call.
struct ScriptedTransport {
    script: Mutex<VecDeque<ai_diag_rust::Result<CompletionResponse>>>,
    calls: AtomicU32,
}

impl ScriptedTransport {
    fn new(script: Vec<ai_diag_rust::Result<CompletionResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionTransport for ScriptedTransport {
    async fn create_completion(
        &self,
        _request: &CompletionRequest,
    ) -> ai_diag_rust::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::malformed_request(400, "script exhausted")))
    }
}

fn bad_request() -> ai_diag_rust::Result<CompletionResponse> {
    Err(Error::malformed_request(400, "Invalid 'messages': bad role"))
}

fn temp_audit_path() -> PathBuf {
    std::env::temp_dir().join(format!("ai_diag_exec_{}.yaml", uuid::Uuid::new_v4()))
}

struct Harness {
    client: ChatClient,
    transport: Arc<ScriptedTransport>,
    log: MemorySink,
    audit_path: PathBuf,
}

fn harness(script: Vec<ai_diag_rust::Result<CompletionResponse>>, detail: u8) -> Harness {
    let log = MemorySink::new("mem");
    let diag = Arc::new(
        Diagnostics::builder()
            .sink(Arc::new(log.clone()))
            .format(LogFormat::new("{level} {message}"))
            .build(),
    );
    let transport = ScriptedTransport::new(script);
    let audit_path = temp_audit_path();
    let client = ChatClient::builder()
        .transport(transport.clone())
        .logger(Logger::new("executor", diag).with_detail(detail))
        .audit_path(&audit_path)
        .build()
        .unwrap();
    Harness {
        client,
        transport,
        log,
        audit_path,
    }
}

fn complete_request() -> CompletionRequest {
    CompletionRequest::new("gpt-4o-mini")
        .with_message(Message::system("You are terse."))
        .with_message(Message::user("Say hi"))
}

#[tokio::test(start_paused = true)]
async fn malformed_twice_then_success_takes_three_attempts_and_two_pauses() {
    let h = harness(
        vec![
            bad_request(),
            bad_request(),
            Ok(CompletionResponse::from_text("hi")),
        ],
        0,
    );

    let started = tokio::time::Instant::now();
    let (resp, stats) = h.client.send_with_stats(&complete_request()).await.unwrap();

    assert_eq!(resp.content(), Some("hi"));
    assert_eq!(h.transport.calls(), 3);
    assert_eq!(stats.attempts, 3);
    assert_eq!(stats.pauses, 2);
    assert!(started.elapsed() >= Duration::from_secs(2));

    let log = h.log.contents();
    assert_eq!(log.matches("ERROR Trying again").count(), 2);
    assert!(!log.contains("Giving up"));
    assert!(log.contains("ERROR Bad request error\nerror: MalformedRequest\nstatus: 400\n"));
    assert!(log.contains("ERROR request:\n"));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_returns_original_error() {
    let h = harness(vec![bad_request(), bad_request(), bad_request()], 0);

    let err = h.client.send(&complete_request()).await.unwrap_err();
    match err {
        Error::MalformedRequest {
            status, message, ..
        } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Invalid 'messages': bad role");
        }
        other => panic!("expected the collaborator's error, got {other}"),
    }
    assert_eq!(h.transport.calls(), 3);

    let log = h.log.contents();
    assert_eq!(log.matches("Trying again").count(), 2);
    assert!(log.ends_with("ERROR Giving up\n"));
}

#[tokio::test]
async fn request_without_user_message_is_not_retried() {
    let h = harness(vec![bad_request(), Ok(CompletionResponse::from_text("never"))], 0);
    let request = CompletionRequest::new("m").with_message(Message::system("rules only"));

    let err = h.client.send(&request).await.unwrap_err();
    assert!(err.is_malformed_request());
    assert_eq!(h.transport.calls(), 1);
    assert!(!h.log.contents().contains("Trying again"));
}

#[tokio::test]
async fn other_collaborator_errors_surface_immediately() {
    let h = harness(
        vec![Err(Error::Remote {
            status: 503,
            message: "overloaded".into(),
        })],
        0,
    );
    let err = h.client.send(&complete_request()).await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 503, .. }));
    assert_eq!(h.transport.calls(), 1);
}

#[tokio::test]
async fn validation_fails_before_any_call() {
    let h = harness(vec![Ok(CompletionResponse::from_text("unused"))], 3);

    let err = h
        .client
        .send(&CompletionRequest::new("m"))
        .await
        .unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationKind::EmptyMessages));

    let no_system = CompletionRequest::new("m").with_message(Message::user("hi"));
    let err = h.client.send(&no_system).await.unwrap_err();
    assert_eq!(
        err.validation_kind(),
        Some(ValidationKind::MissingSystemMessage)
    );

    assert_eq!(h.transport.calls(), 0);
    assert!(!h.audit_path.exists());
}

#[tokio::test]
async fn open_gate_audits_normalized_request_and_raw_response() {
    let h = harness(vec![Ok(CompletionResponse::from_text("Hello: *world*"))], 3);
    assert!(h.client.audit_gate_open());

    h.client.send(&complete_request()).await.unwrap();

    let text = std::fs::read_to_string(&h.audit_path).unwrap();
    let entries: Vec<&str> = text.lines().filter(|l| l.starts_with("# ")).collect();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].ends_with(" - REQUEST: #"));
    assert!(entries[1].ends_with(" - RESPONSE: #"));
    assert!(text.contains("model: gpt-4o-mini\n"));
    assert!(text.contains("\nHello: *world*\n"));
    let _ = std::fs::remove_file(&h.audit_path);
}

#[tokio::test]
async fn closed_gate_writes_nothing() {
    let h = harness(vec![Ok(CompletionResponse::from_text("hi"))], 2);
    assert!(!h.client.audit_gate_open());
    h.client.send(&complete_request()).await.unwrap();
    assert!(!h.audit_path.exists());
}

#[tokio::test]
async fn exhaustion_is_audited_as_error_text() {
    let mut h = harness(vec![bad_request(), bad_request()], 3);
    h.client = h
        .client
        .clone()
        .with_retry_policy(RetryPolicy::new(2, Duration::ZERO));

    h.client.send(&complete_request()).await.unwrap_err();

    let text = std::fs::read_to_string(&h.audit_path).unwrap();
    assert!(text.contains(" - RESPONSE: #\nMalformed request: HTTP 400: Invalid 'messages': bad role"));
    let _ = std::fs::remove_file(&h.audit_path);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_backoff() {
    let h = harness(vec![bad_request(), Ok(CompletionResponse::from_text("late"))], 0);
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let err = h
        .client
        .send_with_cancel(&complete_request(), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(h.transport.calls(), 1);
}

/// Never answers; stands in for a call still on the wire.
struct HangingTransport {
    calls: AtomicU32,
}

#[async_trait]
impl CompletionTransport for HangingTransport {
    async fn create_completion(
        &self,
        _request: &CompletionRequest,
    ) -> ai_diag_rust::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_an_in_flight_call() {
    let transport = Arc::new(HangingTransport {
        calls: AtomicU32::new(0),
    });
    let log = MemorySink::new("mem");
    let diag = Arc::new(Diagnostics::builder().sink(Arc::new(log.clone())).build());
    let audit_path = temp_audit_path();
    let client = ChatClient::builder()
        .transport(transport.clone())
        .logger(Logger::new("executor", diag))
        .audit_path(&audit_path)
        .build()
        .unwrap();

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });

    let err = client
        .send_with_cancel(&complete_request(), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert!(!log.contents().contains("Trying again"));
    assert!(!audit_path.exists());
}

#[tokio::test]
async fn failed_audit_write_does_not_reach_the_caller() {
    let log = MemorySink::new("mem");
    let diag = Arc::new(Diagnostics::builder().sink(Arc::new(log.clone())).build());
    let transport = ScriptedTransport::new(vec![Ok(CompletionResponse::from_text("still fine"))]);
    let unwritable = std::env::temp_dir()
        .join(format!("ai_diag_missing_{}", uuid::Uuid::new_v4()))
        .join("openai_requests.yaml");
    let client = ChatClient::builder()
        .transport(transport.clone())
        .logger(Logger::new("executor", diag).with_detail(3))
        .audit_path(&unwritable)
        .build()
        .unwrap();
    assert!(client.audit_gate_open());

    let resp = client.send(&complete_request()).await.unwrap();
    assert_eq!(resp.content(), Some("still fine"));
    assert_eq!(transport.calls(), 1);
    assert!(!unwritable.exists());
}

#[tokio::test]
async fn concurrent_sends_share_one_audit_file() {
    let path = temp_audit_path();
    let trail = AuditTrail::new(&path);
    let diag = Arc::new(Diagnostics::builder().sink(Arc::new(MemorySink::default())).build());

    let mut handles = Vec::new();
    for i in 0..8 {
        let transport = ScriptedTransport::new(vec![Ok(CompletionResponse::from_text(format!(
            "answer {i}"
        )))]);
        let client = ChatClient::builder()
            .transport(transport)
            .logger(Logger::new("executor", diag.clone()).with_detail(3))
            .audit_trail(trail.clone())
            .build()
            .unwrap();
        handles.push(tokio::spawn(async move {
            client.send(&complete_request()).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let text = std::fs::read_to_string(&path).unwrap();
    let headers: Vec<&str> = text.lines().filter(|l| l.starts_with("# ")).collect();
    assert_eq!(headers.len(), 16);
    let mut unique = headers.clone();
    unique.dedup();
    assert_eq!(unique.len(), 16);
    for i in 0..8 {
        assert!(text.contains(&format!("\nanswer {i}\n")));
    }
    let _ = std::fs::remove_file(&path);
}
