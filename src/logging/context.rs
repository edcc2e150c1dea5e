//! Shared diagnostics state.

use super::stages::{
    write_marker, DetailGate, LogStage, Next, PrefixFilter, ProgressBatcher, ProgressCloser,
    SinkDispatch,
};
use super::{AllowList, Emitter, LogEvent, LogFormat, LogSink, SinkEmitter, SinkTarget, StreamSink};
use arc_swap::ArcSwap;
use once_cell::sync::{Lazy, OnceCell};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State every [`Logger`](super::Logger) handle shares: sinks, the cached progress
/// destination, the progress flag, the prefix allow-list, the message-capture buffer
/// and the active emitter/format.
///
/// Each piece sits behind its own lock. When more than one is held the order is
/// progress flag, then sinks/destination, then capture buffer.
pub struct Diagnostics {
    sinks: RwLock<Vec<Arc<dyn LogSink>>>,
    destination: OnceCell<Arc<dyn LogSink>>,
    progress_open: Mutex<bool>,
    allow_list: RwLock<AllowList>,
    message_store: Mutex<Option<Vec<String>>>,
    emitter: ArcSwap<Arc<dyn Emitter>>,
    format: ArcSwap<LogFormat>,
    stages: Vec<Arc<dyn LogStage>>,
}

static GLOBAL: Lazy<Arc<Diagnostics>> = Lazy::new(|| {
    Arc::new(
        Diagnostics::builder()
            .sink(Arc::new(StreamSink::stderr()))
            .build(),
    )
});

impl Diagnostics {
    pub fn builder() -> DiagnosticsBuilder {
        DiagnosticsBuilder::new()
    }

    /// Process-wide context writing to stderr, for hosts that do not build their own.
    pub fn global() -> Arc<Diagnostics> {
        GLOBAL.clone()
    }

    /// Run an event through the stage chain.
    pub fn dispatch(&self, event: &LogEvent) {
        Next::new(&self.stages, self).run(event);
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    // ---- sinks and the progress destination ----

    pub fn add_sink(&self, sink: Arc<dyn LogSink>) {
        write(&self.sinks).push(sink);
    }

    pub fn sinks(&self) -> Vec<Arc<dyn LogSink>> {
        read(&self.sinks).clone()
    }

    /// Describe every registered sink: `stdout`, `stderr`, `File: <path>` or the sink's own name.
    pub fn output_destinations(&self) -> Vec<String> {
        read(&self.sinks)
            .iter()
            .map(|s| s.target().to_string())
            .collect()
    }

    /// Where progress characters go. Resolved on first use and cached:
    /// a stdout sink, else a stderr sink, else the first sink, else process stderr.
    pub fn destination(&self) -> Arc<dyn LogSink> {
        self.destination
            .get_or_init(|| {
                let sinks = read(&self.sinks);
                let pick = sinks
                    .iter()
                    .find(|s| s.target() == SinkTarget::Stdout)
                    .or_else(|| sinks.iter().find(|s| s.target() == SinkTarget::Stderr))
                    .or_else(|| sinks.first())
                    .cloned();
                pick.unwrap_or_else(|| Arc::new(StreamSink::stderr()))
            })
            .clone()
    }

    // ---- progress state ----

    pub fn is_progress_open(&self) -> bool {
        *lock(&self.progress_open)
    }

    pub(crate) fn progress_state(&self) -> MutexGuard<'_, bool> {
        lock(&self.progress_open)
    }

    /// Terminate a pending progress run with a newline, if one is open.
    pub fn close_progress(&self) {
        let mut open = self.progress_state();
        if *open {
            write_marker(self.destination().as_ref(), "\n");
            *open = false;
        }
    }

    // ---- prefix allow-list ----

    pub fn allowed_prefixes(&self) -> AllowList {
        read(&self.allow_list).clone()
    }

    /// Replace the allow-list; an empty list allows everything.
    pub fn set_allowed_prefixes<I, S>(&self, prefixes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *write(&self.allow_list) = AllowList::from_prefixes(prefixes);
    }

    pub fn set_allow_list(&self, list: AllowList) {
        *write(&self.allow_list) = list;
    }

    pub fn add_allowed_prefix(&self, prefix: impl Into<String>) {
        write(&self.allow_list).add(prefix);
    }

    pub fn remove_allowed_prefix(&self, prefix: &str) -> bool {
        write(&self.allow_list).remove(prefix)
    }

    /// Suppress every logger regardless of prefix.
    pub fn deny_all(&self) {
        self.set_allow_list(AllowList::Nothing);
    }

    pub fn allow_all(&self) {
        self.set_allow_list(AllowList::All);
    }

    pub fn permits_prefix(&self, prefix: &str) -> bool {
        read(&self.allow_list).permits(prefix)
    }

    // ---- message capture ----

    /// Start collecting every emitted line. Lines already captured are kept.
    pub fn enable_message_capture(&self) {
        let mut store = lock(&self.message_store);
        if store.is_none() {
            *store = Some(Vec::new());
        }
    }

    /// Stop collecting and return what was captured.
    pub fn disable_message_capture(&self) -> Vec<String> {
        lock(&self.message_store).take().unwrap_or_default()
    }

    pub fn is_capturing(&self) -> bool {
        lock(&self.message_store).is_some()
    }

    pub fn stored_messages(&self) -> Vec<String> {
        lock(&self.message_store).clone().unwrap_or_default()
    }

    pub fn clear_stored_messages(&self) {
        if let Some(store) = lock(&self.message_store).as_mut() {
            store.clear();
        }
    }

    pub(crate) fn capture(&self, line: &str) {
        if let Some(store) = lock(&self.message_store).as_mut() {
            store.push(line.to_string());
        }
    }

    // ---- emitter and format ----

    pub fn emitter(&self) -> Arc<dyn Emitter> {
        self.emitter.load_full().as_ref().clone()
    }

    pub fn format(&self) -> Arc<LogFormat> {
        self.format.load_full()
    }

    pub fn set_format(&self, format: LogFormat) -> LogFormat {
        self.format.swap(Arc::new(format)).as_ref().clone()
    }

    /// Swap the active emitter and/or line format; `None` leaves that part unchanged.
    /// Returns the previous pair.
    pub fn change_default_logger(
        &self,
        emitter: Option<Arc<dyn Emitter>>,
        format: Option<LogFormat>,
    ) -> (Arc<dyn Emitter>, LogFormat) {
        let previous_emitter = match emitter {
            Some(e) => self.emitter.swap(Arc::new(e)).as_ref().clone(),
            None => self.emitter(),
        };
        let previous_format = match format {
            Some(f) => self.set_format(f),
            None => self.format().as_ref().clone(),
        };
        (previous_emitter, previous_format)
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sinks", &self.output_destinations())
            .field("progress_open", &self.is_progress_open())
            .field("allow_list", &self.allowed_prefixes())
            .field("capturing", &self.is_capturing())
            .field("emitter", &self.emitter().name().to_string())
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for [`Diagnostics`].
pub struct DiagnosticsBuilder {
    sinks: Vec<Arc<dyn LogSink>>,
    allow_list: AllowList,
    capture: bool,
    emitter: Arc<dyn Emitter>,
    format: LogFormat,
    extra_stages: Vec<Arc<dyn LogStage>>,
}

impl DiagnosticsBuilder {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            allow_list: AllowList::All,
            capture: false,
            emitter: Arc::new(SinkEmitter),
            format: LogFormat::default(),
            extra_stages: Vec::new(),
        }
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn allowed_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_list = AllowList::from_prefixes(prefixes);
        self
    }

    pub fn allow_list(mut self, list: AllowList) -> Self {
        self.allow_list = list;
        self
    }

    pub fn capture_messages(mut self, enabled: bool) -> Self {
        self.capture = enabled;
        self
    }

    pub fn emitter(mut self, emitter: Arc<dyn Emitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a custom stage; custom stages run after the progress batcher, before dispatch.
    ///
    /// The opening message of a progress run reaches custom stages while the progress
    /// flag is locked, so a stage must not log through the context it is installed on.
    pub fn stage(mut self, stage: Arc<dyn LogStage>) -> Self {
        self.extra_stages.push(stage);
        self
    }

    pub fn build(self) -> Diagnostics {
        let mut stages: Vec<Arc<dyn LogStage>> = vec![
            Arc::new(ProgressCloser),
            Arc::new(PrefixFilter),
            Arc::new(DetailGate),
            Arc::new(ProgressBatcher),
        ];
        stages.extend(self.extra_stages);
        stages.push(Arc::new(SinkDispatch));

        Diagnostics {
            sinks: RwLock::new(self.sinks),
            destination: OnceCell::new(),
            progress_open: Mutex::new(false),
            allow_list: RwLock::new(self.allow_list),
            message_store: Mutex::new(if self.capture { Some(Vec::new()) } else { None }),
            emitter: ArcSwap::from_pointee(self.emitter),
            format: ArcSwap::from_pointee(self.format),
            stages,
        }
    }
}

impl Default for DiagnosticsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
