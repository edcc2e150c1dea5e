//! Append-only audit trail of request/response snapshots.
//!
//! Every entry is a comment header followed by a payload:
//!
//! ```text
//! # 2024-05-01 10:00:00.000001 - REQUEST: #
//! frequency_penalty: 0.0
//! messages:
//! -   role: system
//!     content: ...
//!
//! # 2024-05-01 10:00:01.250000 - RESPONSE: #
//! raw response text
//! ```
//!
//! Requests are normalized and dumped as block YAML; responses are written verbatim.
//! Each append opens the file, writes the whole entry in one call and closes it,
//! all while holding the lock for that path, so concurrent writers never interleave.

use crate::normalize::{Inspect, Normalizer, SafeValue};
use crate::Result;
use chrono::{DateTime, Duration, Local};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Conventional audit file name.
pub const DEFAULT_AUDIT_FILE: &str = "openai_requests.yaml";

const HEADER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    Request,
    Response,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditKind::Request => f.write_str("REQUEST"),
            AuditKind::Response => f.write_str("RESPONSE"),
        }
    }
}

/// What gets written under a header.
#[derive(Debug, Clone)]
pub enum AuditPayload {
    /// Already normalized; dumped as block YAML.
    Structured(SafeValue),
    /// Written verbatim.
    Text(String),
}

/// One appended entry, as written.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub kind: AuditKind,
    pub timestamp: DateTime<Local>,
    pub body: String,
}

impl AuditRecord {
    pub fn header(&self) -> String {
        format!(
            "# {} - {}: #",
            self.timestamp.format(HEADER_TIME_FORMAT),
            self.kind
        )
    }

    /// Full text appended to the file for this record.
    pub fn render(&self) -> String {
        let mut out = self.header();
        out.push('\n');
        out.push_str(&self.body);
        if !self.body.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

struct TrailState {
    last_timestamp: Option<DateTime<Local>>,
}

static TRAIL_STATES: Lazy<StdMutex<HashMap<PathBuf, Arc<Mutex<TrailState>>>>> =
    Lazy::new(|| StdMutex::new(HashMap::new()));

fn shared_state(path: &Path) -> Arc<Mutex<TrailState>> {
    let key = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut states = TRAIL_STATES
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    states
        .entry(key)
        .or_insert_with(|| {
            Arc::new(Mutex::new(TrailState {
                last_timestamp: None,
            }))
        })
        .clone()
}

/// Shared, append-only audit file.
///
/// Cheap to clone. Every trail on one path, clone or not, shares the same lock and
/// header clock.
#[derive(Clone)]
pub struct AuditTrail {
    path: PathBuf,
    normalizer: Arc<Normalizer>,
    state: Arc<Mutex<TrailState>>,
}

impl fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditTrail").field("path", &self.path).finish()
    }
}

impl AuditTrail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_normalizer(path, Arc::new(Normalizer::new()))
    }

    /// Trails on the same path share one lock and header clock, however they were built.
    pub fn with_normalizer(path: impl Into<PathBuf>, normalizer: Arc<Normalizer>) -> Self {
        let path = path.into();
        let state = shared_state(&path);
        Self {
            path,
            normalizer,
            state,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Normalize `value` and append it as a REQUEST entry.
    pub async fn record_request(&self, value: &(impl Inspect + ?Sized)) -> Result<AuditRecord> {
        let safe = self.normalizer.normalize(value);
        self.record(AuditKind::Request, AuditPayload::Structured(safe))
            .await
    }

    /// Append raw text as a RESPONSE entry.
    pub async fn record_response(&self, text: impl Into<String>) -> Result<AuditRecord> {
        self.record(AuditKind::Response, AuditPayload::Text(text.into()))
            .await
    }

    /// Append one entry. Header timestamps strictly increase across calls on this trail.
    pub async fn record(&self, kind: AuditKind, payload: AuditPayload) -> Result<AuditRecord> {
        let body = match payload {
            AuditPayload::Structured(value) => crate::normalize::to_block_yaml(&value),
            AuditPayload::Text(text) => text,
        };

        let mut state = self.state.lock().await;
        let mut timestamp = Local::now();
        if let Some(last) = state.last_timestamp {
            if timestamp <= last {
                timestamp = last + Duration::microseconds(1);
            }
        }

        let record = AuditRecord {
            kind,
            timestamp,
            body,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(record.render().as_bytes()).await?;
        file.flush().await?;
        drop(file);

        // Only advance the clock once the entry is actually on disk.
        state.last_timestamp = Some(timestamp);
        Ok(record)
    }
}
