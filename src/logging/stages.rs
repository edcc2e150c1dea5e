//! The stage chain every [`LogEvent`] runs through.
//!
//! A stage either stops the event or hands it on with [`Next::run`]. Stages that need
//! to act after the rest of the chain (the progress batcher) do so after `run` returns.

use super::{Diagnostics, LogEvent, LogSink};
use std::sync::Arc;

pub trait LogStage: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, event: &LogEvent, diagnostics: &Diagnostics, next: Next<'_>);
}

/// The remainder of the chain after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn LogStage>],
    diagnostics: &'a Diagnostics,
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn LogStage>], diagnostics: &'a Diagnostics) -> Self {
        Self {
            stages,
            diagnostics,
        }
    }

    pub fn run(self, event: &LogEvent) {
        if let Some((head, rest)) = self.stages.split_first() {
            head.handle(event, self.diagnostics, Next::new(rest, self.diagnostics));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Drops events whose logger prefix the allow-list does not permit.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixFilter;

impl LogStage for PrefixFilter {
    fn name(&self) -> &'static str {
        "prefix_filter"
    }

    fn handle(&self, event: &LogEvent, diagnostics: &Diagnostics, next: Next<'_>) {
        if diagnostics.permits_prefix(&event.prefix) {
            next.run(event);
        }
    }
}

/// Drops events below the logger's effective severity or above its detail tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetailGate;

impl LogStage for DetailGate {
    fn name(&self) -> &'static str {
        "detail_gate"
    }

    fn handle(&self, event: &LogEvent, _diagnostics: &Diagnostics, next: Next<'_>) {
        if event.level >= event.threshold && event.detail >= event.tier {
            next.run(event);
        }
    }
}

/// Terminates an open progress run before any ordinary event is filtered or gated.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressCloser;

impl LogStage for ProgressCloser {
    fn name(&self) -> &'static str {
        "progress_closer"
    }

    fn handle(&self, event: &LogEvent, diagnostics: &Diagnostics, next: Next<'_>) {
        if !event.is_progress() {
            diagnostics.close_progress();
        }
        next.run(event);
    }
}

/// Collapses progress calls into one message line plus a run of marker characters.
///
/// A progress event with no open run is passed on (so its message is logged) and opens
/// the run; every progress event then writes its character to the destination.
/// Ordinary events pass straight through; [`ProgressCloser`] has already ended the run.
///
/// The progress flag stays locked while the rest of the chain handles the opening
/// message, so stages after this one must not log through the same [`Diagnostics`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressBatcher;

impl LogStage for ProgressBatcher {
    fn name(&self) -> &'static str {
        "progress_batcher"
    }

    fn handle(&self, event: &LogEvent, diagnostics: &Diagnostics, next: Next<'_>) {
        let Some(ch) = event.progress else {
            next.run(event);
            return;
        };
        let mut open = diagnostics.progress_state();
        if !*open {
            next.run(event);
            *open = true;
        }
        let mut buf = [0u8; 4];
        write_marker(diagnostics.destination().as_ref(), ch.encode_utf8(&mut buf));
    }
}

/// Write and flush a progress marker, reporting failures the way [`SinkEmitter`](super::SinkEmitter) does.
pub(crate) fn write_marker(dest: &dyn LogSink, text: &str) {
    if let Err(e) = dest.write_str(text).and_then(|()| dest.flush()) {
        tracing::warn!(sink = %dest.target(), error = %e, "progress marker write failed");
    }
}

/// Formats the event, captures the line if capture is on, and hands it to the active emitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinkDispatch;

impl LogStage for SinkDispatch {
    fn name(&self) -> &'static str {
        "sink_dispatch"
    }

    fn handle(&self, event: &LogEvent, diagnostics: &Diagnostics, _next: Next<'_>) {
        let line = diagnostics.format().render(event);
        diagnostics.capture(&line);
        diagnostics.emitter().emit(event, &line, diagnostics);
    }
}
