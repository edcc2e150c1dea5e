use serde::{Deserialize, Serialize};

/// Per-call facts for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendStats {
    /// Client-side correlation id for this `send`.
    pub request_id: String,
    /// Collaborator invocations, the successful one included.
    pub attempts: u32,
    /// Backoff pauses taken between attempts.
    pub pauses: u32,
    pub duration_ms: u64,
}
