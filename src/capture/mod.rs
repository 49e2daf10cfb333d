//! Out-of-band response body capture
//!
//! Bodies are fetched separately from the event stream, retried, and
//! deduplicated per logical resource before landing in their response entry.

mod dedup;
mod entry;
mod fetcher;
mod stats;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::event::{RequestId, ResponseReceived};

pub use dedup::BodyDeduplicator;
pub use entry::{LogicalResourceKey, ResponseEntry, ResponseStore};
pub use fetcher::{decode_body, FetchHandle, FetchOutcome, FetchTrigger, ResponseFetcher};
pub use stats::{SessionStats, StatsCounters};

/// Everything body capture mutates during one recording session
#[derive(Debug, Default)]
pub struct CaptureState {
    responses: ResponseStore,
    dedup: BodyDeduplicator,
    stats: Arc<StatsCounters>,
    gates: DashMap<RequestId, Arc<Mutex<()>>>,
}

impl CaptureState {
    /// Create empty session state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Response entries
    #[must_use]
    pub fn responses(&self) -> &ResponseStore {
        &self.responses
    }

    /// Fetch outcome counters
    #[must_use]
    pub fn stats(&self) -> &StatsCounters {
        &self.stats
    }

    /// Counters that stay readable after the session is cleared
    #[must_use]
    pub fn shared_stats(&self) -> Arc<StatsCounters> {
        Arc::clone(&self.stats)
    }

    /// Create (or refresh) the entry for a response event
    pub fn register_response(&self, event: ResponseReceived) -> bool {
        self.responses.register(event)
    }

    /// Store a fetched body on its entry after deduplication.
    ///
    /// Returns `false` when no entry exists for `request_id`.
    pub fn attach_body(&self, request_id: &str, body: String) -> bool {
        let attached = self.responses.update(request_id, |entry| {
            let key = entry.resource_key();
            let kept = self.dedup.reconcile(&key, request_id, body);
            entry.set_body(kept);
        });

        if attached.is_none() {
            warn!(
                "Fetched body for request {} without a response entry",
                request_id
            );
        }
        attached.is_some()
    }

    /// Lock serializing fetch attempts for one request
    pub(crate) fn attempt_gate(&self, request_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.gates
                .entry(request_id.to_string())
                .or_default()
                .value(),
        )
    }

    /// Drop all session-scoped data
    pub fn clear(&self) {
        self.responses.clear();
        self.dedup.clear();
        self.gates.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn register(state: &CaptureState, request_id: &str, kind: &str, url: &str) {
        let event = ResponseReceived::from_params(&json!({
            "requestId": request_id,
            "type": kind,
            "response": {"url": url}
        }))
        .unwrap();
        state.register_response(event);
    }

    #[test]
    fn test_attach_body_without_entry() {
        let state = CaptureState::new();
        assert!(!state.attach_body("missing", "x".to_string()));
        assert!(state.responses().is_empty());
    }

    #[test]
    fn test_identical_bodies_across_entries() {
        let state = CaptureState::new();
        register(&state, "1", "Document", "https://a.test/");
        register(&state, "2", "Document", "https://a.test/");

        assert!(state.attach_body("1", "<html>".to_string()));
        assert!(state.attach_body("2", "<html>".to_string()));

        assert_eq!(
            state.responses().get("1").unwrap().body.as_deref(),
            Some("<html>")
        );
        assert!(state.responses().get("2").unwrap().body.is_none());
    }

    #[test]
    fn test_divergent_bodies_across_entries() {
        let state = CaptureState::new();
        register(&state, "1", "Stylesheet", "https://a.test/s.css");
        register(&state, "2", "Stylesheet", "https://a.test/s.css");

        state.attach_body("1", "a{}".to_string());
        state.attach_body("2", "b{}".to_string());

        assert_eq!(state.responses().get("1").unwrap().body.as_deref(), Some("a{}"));
        assert_eq!(state.responses().get("2").unwrap().body.as_deref(), Some("b{}"));
    }

    #[test]
    fn test_xhr_bodies_never_collide() {
        let state = CaptureState::new();
        register(&state, "1", "XHR", "https://a.test/api");
        register(&state, "2", "XHR", "https://a.test/api");

        state.attach_body("1", "{}".to_string());
        state.attach_body("2", "{}".to_string());

        assert!(state.responses().get("2").unwrap().body.is_some());
    }

    #[test]
    fn test_clear() {
        let state = CaptureState::new();
        register(&state, "1", "Document", "https://a.test/");
        state.attach_body("1", "x".to_string());
        let _gate = state.attempt_gate("1");

        state.clear();
        assert!(state.responses().is_empty());
        assert!(state.dedup.is_empty());
        assert!(state.gates.is_empty());
    }
}
