//! Progress batching, prefix filtering and capture through the public facade.

use ai_diag_rust::logging::{
    Emitter, FileSink, LogFormat, MemorySink, StreamSink, TracingEmitter,
};
use ai_diag_rust::{Diagnostics, Level, Logger};
use std::sync::Arc;

fn diagnostics() -> (Arc<Diagnostics>, MemorySink) {
    let mem = MemorySink::new("mem");
    let diag = Arc::new(
        Diagnostics::builder()
            .sink(Arc::new(mem.clone()))
            .format(LogFormat::new("{name}: {message}"))
            .build(),
    );
    (diag, mem)
}

#[test]
fn progress_run_is_one_line_then_markers() {
    let (diag, mem) = diagnostics();
    let log = Logger::new("loader", diag.clone()).with_level(Level::Info);

    log.progress_info("fetching pages", '.');
    log.progress_info("fetching pages", '.');
    assert_eq!(mem.contents(), "loader: fetching pages\n..");
    assert!(diag.is_progress_open());

    log.info("done");
    assert_eq!(mem.contents(), "loader: fetching pages\n..\nloader: done\n");
    assert!(!diag.is_progress_open());
}

#[test]
fn progress_run_is_shared_between_loggers() {
    let (diag, mem) = diagnostics();
    let a = Logger::new("a", diag.clone()).with_level(Level::Info);
    let b = Logger::new("b", diag.clone()).with_level(Level::Info);

    a.progress_info("a working", '+');
    b.progress_info("b working", '-');
    b.warning("b finished");
    assert_eq!(mem.contents(), "a: a working\n+-\nb: b finished\n");
}

#[test]
fn suppressed_calls_still_close_the_run() {
    let (diag, mem) = diagnostics();
    let log = Logger::new("loader", diag.clone()).with_level(Level::Info);
    log.progress_info("step", '.');
    log.debug("below threshold");
    assert_eq!(mem.contents(), "loader: step\n.\n");
    assert!(!diag.is_progress_open());

    log.progress_info("step", '.');
    assert_eq!(mem.contents(), "loader: step\n.\nloader: step\n.");
}

#[test]
fn prefix_filtered_calls_close_the_run() {
    let (diag, mem) = diagnostics();
    let shown = Logger::new("shown", diag.clone())
        .with_prefix("cmd_")
        .with_level(Level::Info);
    let hidden = Logger::new("hidden", diag.clone())
        .with_prefix("net_")
        .with_level(Level::Info);
    diag.set_allowed_prefixes(["cmd_"]);

    shown.progress_info("scan", '.');
    hidden.info("dropped");
    assert_eq!(mem.contents(), "shown: scan\n.\n");
}

#[test]
fn sinks_added_after_earlier_calls_receive_markers() {
    let diag = Arc::new(Diagnostics::builder().format(LogFormat::new("{message}")).build());
    let log = Logger::new("boot", diag.clone()).with_level(Level::Info);
    log.debug("before any sink");

    let mem = MemorySink::new("mem");
    diag.add_sink(Arc::new(mem.clone()));
    log.progress_info("work", '.');
    assert_eq!(mem.contents(), "work\n.");
    assert_eq!(diag.destination().target().to_string(), "mem");
}

#[test]
fn prefix_allow_list() {
    let (diag, mem) = diagnostics();
    let log = Logger::new("emote", diag.clone())
        .with_prefix("cmd_emote")
        .with_level(Level::Info);

    diag.set_allowed_prefixes(["cmd_"]);
    log.info("waves");
    assert_eq!(mem.take(), "emote: waves\n");

    diag.set_allowed_prefixes(["other"]);
    log.info("waves again");
    assert_eq!(mem.take(), "");

    diag.add_allowed_prefix("emote");
    log.info("third");
    assert_eq!(mem.take(), "emote: third\n");

    diag.deny_all();
    log.critical("nobody hears");
    assert_eq!(mem.take(), "");

    diag.allow_all();
    log.info("back");
    assert_eq!(mem.take(), "emote: back\n");
}

#[test]
fn capture_feeds_break_and_log() {
    let (diag, _mem) = diagnostics();
    diag.enable_message_capture();
    let log = Logger::new("job", diag.clone()).with_detail(1);
    log.debug1("stage one");
    log.debug2("too detailed");
    log.error("stage two failed");

    assert_eq!(
        diag.stored_messages(),
        vec!["job: stage one".to_string(), "job: stage two failed".to_string()]
    );
    let err = ai_diag_rust::break_and_log!(diag);
    assert_eq!(
        err.message,
        "Break condition occurred, log:\njob: stage one\njob: stage two failed"
    );
    assert_eq!(err.site.routine, "capture_feeds_break_and_log");
    assert_eq!(err.site.module, "logging_progress");
}

#[test]
fn destination_prefers_stdout_and_lists_outputs() {
    let path = std::env::temp_dir().join(format!("ai_diag_dest_{}.log", uuid::Uuid::new_v4()));
    let diag = Diagnostics::builder()
        .sink(Arc::new(FileSink::open(&path).unwrap()))
        .sink(Arc::new(StreamSink::stderr()))
        .sink(Arc::new(StreamSink::stdout()))
        .build();
    assert_eq!(
        diag.output_destinations(),
        vec![
            format!("File: {}", path.display()),
            "stderr".to_string(),
            "stdout".to_string()
        ]
    );
    assert_eq!(diag.destination().target().to_string(), "stdout");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn swapping_the_emitter_bypasses_sinks() {
    let (diag, mem) = diagnostics();
    let log = Logger::new("svc", diag.clone()).with_level(Level::Info);

    let tracing: Arc<dyn Emitter> = Arc::new(TracingEmitter);
    let (previous, _) = diag.change_default_logger(Some(tracing), None);
    log.info("to tracing");
    assert_eq!(mem.contents(), "");

    diag.change_default_logger(Some(previous), Some(LogFormat::new("[{level}] {message}")));
    log.info("to sinks");
    assert_eq!(mem.contents(), "[INFO] to sinks\n");
}
