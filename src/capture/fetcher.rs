//! Response body retrieval with retry

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RetryConfig;
use crate::event::RequestId;
use crate::protocol::{ProtocolSession, GET_RESPONSE_BODY};
use crate::{HarvestError, Result};

use super::CaptureState;

/// Event that caused a body fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    /// Best-effort fetch as soon as the response headers arrive
    ResponseReceived,
    /// Fetch once loading completed; counted in stats and drained on stop
    LoadingFinished,
}

impl FetchTrigger {
    /// Whether fetches from this trigger are counted and awaited by `stop`
    #[must_use]
    pub const fn is_tracked(self) -> bool {
        matches!(self, Self::LoadingFinished)
    }
}

/// Terminal result of a fetch chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body stored on the response entry
    Captured,
    /// Body retrieved but the entry no longer exists
    Orphaned,
    /// Every attempt failed
    Failed,
}

/// Handle to one `fetch_body` call
pub struct FetchHandle {
    settled: oneshot::Receiver<()>,
    chain: JoinHandle<FetchOutcome>,
}

impl FetchHandle {
    /// Wait until the first attempt has resolved, success or failure.
    /// Retries keep running in the background.
    pub async fn settled(self) {
        // A dropped sender means the chain ended, which also counts as settled.
        let _ = self.settled.await;
    }

    /// Wait for the whole retry chain
    pub async fn finished(self) -> Option<FetchOutcome> {
        match self.chain.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Body fetch task ended abnormally: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    body: String,
    #[serde(default)]
    base64_encoded: bool,
}

/// Decode a `Network.getResponseBody` result into text
///
/// # Errors
///
/// Returns error if the result is malformed or the base64 payload is invalid
pub fn decode_body(reply: Value) -> Result<String> {
    let payload: ResponseBody =
        serde_json::from_value(reply).map_err(|e| HarvestError::InvalidBody(e.to_string()))?;

    if !payload.base64_encoded {
        return Ok(payload.body);
    }

    let bytes = STANDARD
        .decode(payload.body.as_bytes())
        .map_err(|e| HarvestError::InvalidBody(format!("base64: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Issues body fetches for one recording session
#[derive(Clone)]
pub struct ResponseFetcher {
    session: Arc<dyn ProtocolSession>,
    state: Arc<CaptureState>,
    retry: RetryConfig,
    runtime: Handle,
}

impl ResponseFetcher {
    /// Create a fetcher spawning its chains on `runtime`
    #[must_use]
    pub fn new(
        session: Arc<dyn ProtocolSession>,
        state: Arc<CaptureState>,
        retry: RetryConfig,
        runtime: Handle,
    ) -> Self {
        Self {
            session,
            state,
            retry,
            runtime,
        }
    }

    /// Start fetching the body of `request_id`.
    ///
    /// The returned handle settles once, on the first attempt's resolution.
    /// Failed attempts are retried after a fixed delay until the attempt
    /// budget runs out; failures are logged and counted, never returned.
    pub fn fetch_body(&self, request_id: RequestId, trigger: FetchTrigger) -> FetchHandle {
        if trigger.is_tracked() {
            self.state.stats().record_attempt();
        }

        let (settled_tx, settled_rx) = oneshot::channel();
        let fetcher = self.clone();
        let chain = self
            .runtime
            .spawn(async move { fetcher.run_chain(request_id, trigger, settled_tx).await });

        FetchHandle {
            settled: settled_rx,
            chain,
        }
    }

    async fn run_chain(
        self,
        request_id: RequestId,
        trigger: FetchTrigger,
        settled: oneshot::Sender<()>,
    ) -> FetchOutcome {
        let mut settled = Some(settled);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.attempt(&request_id).await {
                Ok(attached) => {
                    if attempt > 1 {
                        info!(
                            "Fetched body for request {} after {} attempts",
                            request_id, attempt
                        );
                    }
                    if trigger.is_tracked() {
                        self.state.stats().record_success();
                    }
                    settle(&mut settled);
                    return if attached {
                        FetchOutcome::Captured
                    } else {
                        FetchOutcome::Orphaned
                    };
                }
                Err(e) if attempt >= max_attempts => {
                    if trigger.is_tracked() {
                        self.state.stats().record_failure();
                    }
                    error!(
                        "Giving up on body for request {} after {} attempts: {}",
                        request_id, attempt, e
                    );
                    settle(&mut settled);
                    return FetchOutcome::Failed;
                }
                Err(e) => {
                    warn!(
                        "Body fetch for request {} failed ({}), retrying [{} left]",
                        request_id,
                        e,
                        max_attempts - attempt
                    );
                    settle(&mut settled);
                    tokio::time::sleep(self.retry.delay()).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One `Network.getResponseBody` round-trip, serialized per request
    async fn attempt(&self, request_id: &str) -> Result<bool> {
        let gate = self.state.attempt_gate(request_id);
        let _guard = gate.lock().await;

        debug!("Requesting body for request {}", request_id);
        let reply = self
            .session
            .send(GET_RESPONSE_BODY, json!({ "requestId": request_id }))
            .await?;
        let body = decode_body(reply)?;

        Ok(self.state.attach_body(request_id, body))
    }
}

/// Counters are updated before this fires, so a waiter sees the outcome.
fn settle(settled: &mut Option<oneshot::Sender<()>>) {
    if let Some(tx) = settled.take() {
        let _ = tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ResponseReceived;
    use crate::protocol::MemorySession;
    use std::time::Duration;

    fn setup(session: &Arc<MemorySession>) -> (ResponseFetcher, Arc<CaptureState>) {
        let state = Arc::new(CaptureState::new());
        state.register_response(
            ResponseReceived::from_params(&json!({
                "requestId": "1",
                "type": "Document",
                "response": {"url": "https://a.test/"}
            }))
            .unwrap(),
        );
        let fetcher = ResponseFetcher::new(
            Arc::clone(session) as Arc<dyn ProtocolSession>,
            Arc::clone(&state),
            RetryConfig::default(),
            Handle::current(),
        );
        (fetcher, state)
    }

    #[test]
    fn test_decode_plain_body() {
        let body = decode_body(json!({"body": "OK", "base64Encoded": false})).unwrap();
        assert_eq!(body, "OK");
    }

    #[test]
    fn test_decode_base64_body() {
        let body = decode_body(json!({"body": "T0s=", "base64Encoded": true})).unwrap();
        assert_eq!(body, "OK");
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(decode_body(json!({"base64Encoded": true})).is_err());
        assert!(decode_body(json!({"body": "%%%", "base64Encoded": true})).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_success_first_attempt() {
        let session = Arc::new(MemorySession::new());
        session.set_body("1", "T0s=", true);
        let (fetcher, state) = setup(&session);

        let handle = fetcher.fetch_body("1".to_string(), FetchTrigger::LoadingFinished);
        assert_eq!(handle.finished().await, Some(FetchOutcome::Captured));

        assert_eq!(state.responses().get("1").unwrap().body.as_deref(), Some("OK"));
        let stats = state.stats().snapshot();
        assert_eq!((stats.attempted, stats.succeeded, stats.failed), (1, 1, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_recovers_after_retry() {
        let session = Arc::new(MemorySession::new());
        session.set_body("1", "body", false);
        session.fail_body("1", 2);
        let (fetcher, state) = setup(&session);

        let start = tokio::time::Instant::now();
        let handle = fetcher.fetch_body("1".to_string(), FetchTrigger::LoadingFinished);
        assert_eq!(handle.finished().await, Some(FetchOutcome::Captured));

        assert_eq!(session.body_requests("1"), 3);
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert_eq!(state.stats().snapshot().succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_gives_up_after_budget() {
        let session = Arc::new(MemorySession::new());
        let (fetcher, state) = setup(&session);

        let handle = fetcher.fetch_body("1".to_string(), FetchTrigger::LoadingFinished);
        assert_eq!(handle.finished().await, Some(FetchOutcome::Failed));

        assert_eq!(session.body_requests("1"), 3);
        assert!(state.responses().get("1").unwrap().body.is_none());
        let stats = state.stats().snapshot();
        assert_eq!((stats.attempted, stats.succeeded, stats.failed), (1, 0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_on_first_failure() {
        let session = Arc::new(MemorySession::new());
        let (fetcher, state) = setup(&session);

        let handle = fetcher.fetch_body("1".to_string(), FetchTrigger::LoadingFinished);
        handle.settled().await;

        assert_eq!(session.body_requests("1"), 1);
        assert_eq!(state.stats().snapshot().failed, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_settled_fetch_is_already_counted() {
        let session = Arc::new(MemorySession::new());
        session.set_body("1", "T0s=", true);
        let (fetcher, state) = setup(&session);

        for round in 1..=200 {
            let handle = fetcher.fetch_body("1".to_string(), FetchTrigger::LoadingFinished);
            handle.settled().await;
            assert_eq!(state.stats().snapshot().succeeded, round);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_untracked_fetch_does_not_count() {
        let session = Arc::new(MemorySession::new());
        session.set_body("1", "x", false);
        let (fetcher, state) = setup(&session);

        let handle = fetcher.fetch_body("1".to_string(), FetchTrigger::ResponseReceived);
        assert_eq!(handle.finished().await, Some(FetchOutcome::Captured));

        assert_eq!(state.stats().snapshot(), crate::capture::SessionStats::default());
        assert_eq!(state.responses().get("1").unwrap().body.as_deref(), Some("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orphaned_body() {
        let session = Arc::new(MemorySession::new());
        session.set_body("2", "x", false);
        let (fetcher, _state) = setup(&session);

        let handle = fetcher.fetch_body("2".to_string(), FetchTrigger::ResponseReceived);
        assert_eq!(handle.finished().await, Some(FetchOutcome::Orphaned));
    }
}
