//! Recording session lifecycle

use std::sync::{Arc, Weak};

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::capture::{
    CaptureState, FetchHandle, FetchTrigger, ResponseFetcher, SessionStats, StatsCounters,
};
use crate::config::{CaptureConfig, Config, DrainMode, StartOptions};
use crate::event::{request_id_of, EventKind, NetworkEvent, PageEvent, ResponseReceived};
use crate::har::{write_document, BuildOptions, HarAssembler, HarDocument, MessageHarBuilder};
use crate::protocol::{ProtocolSession, NETWORK_ENABLE, PAGE_ENABLE};
use crate::{HarvestError, Result};

use super::recorder::EventRecorder;

/// Records one protocol session at a time into a HAR document.
///
/// `start` subscribes to page and network events; `stop` waits for tracked
/// body fetches, detaches, and assembles the document.
pub struct HarRecorder {
    config: Config,
    assembler: Arc<dyn HarAssembler>,
    state: RecorderState,
    last_stats: Option<Arc<StatsCounters>>,
}

enum RecorderState {
    Idle,
    Recording(ActiveRecording),
}

struct ActiveRecording {
    protocol: Arc<dyn ProtocolSession>,
    core: Arc<SessionCore>,
}

/// State reachable from event handlers for the lifetime of one recording
struct SessionCore {
    capture_config: CaptureConfig,
    recorder: EventRecorder,
    capture: Arc<CaptureState>,
    fetcher: ResponseFetcher,
    pending: Mutex<Vec<FetchHandle>>,
}

impl SessionCore {
    fn on_page_event(&self, kind: PageEvent, params: Value) {
        self.recorder.observe(EventKind::Page(kind), params);
    }

    fn on_network_event(&self, kind: NetworkEvent, params: Value) {
        let capture = self.capture_config.body_capture;
        let request_id = request_id_of(&params).map(str::to_string);
        let response = (capture && kind == NetworkEvent::ResponseReceived)
            .then(|| ResponseReceived::from_params(&params));

        if self.recorder.observe(EventKind::Network(kind), params).is_none() || !capture {
            return;
        }

        match (kind, response) {
            (NetworkEvent::ResponseReceived, Some(Ok(event))) => {
                let request_id = event.request_id.clone();
                self.note_mime_type(&event);
                self.capture.register_response(event);
                // Best effort; the loadingFinished fetch is the one awaited.
                drop(
                    self.fetcher
                        .fetch_body(request_id, FetchTrigger::ResponseReceived),
                );
            }
            (NetworkEvent::ResponseReceived, Some(Err(e))) => {
                warn!("Ignoring malformed responseReceived event: {}", e);
            }
            (NetworkEvent::LoadingFinished, _) => {
                let Some(request_id) = request_id else {
                    return;
                };
                if !self.capture.responses().contains(&request_id) {
                    debug!("No response recorded for request {}, skipping body", request_id);
                    return;
                }
                let handle = self
                    .fetcher
                    .fetch_body(request_id, FetchTrigger::LoadingFinished);
                self.pending.lock().push(handle);
            }
            _ => {}
        }
    }

    fn note_mime_type(&self, event: &ResponseReceived) {
        let mime = event
            .response
            .as_ref()
            .and_then(|response| response.get("mimeType"))
            .and_then(Value::as_str);
        if let Some(mime) = mime {
            if !self
                .capture_config
                .captured_mime_types
                .iter()
                .any(|declared| declared == mime)
            {
                debug!(
                    "Request {} has mime type {} outside the declared capture types",
                    event.request_id, mime
                );
            }
        }
    }
}

impl HarRecorder {
    /// Create a recorder using the built-in HAR assembler
    #[must_use]
    pub fn new(config: Config) -> Self {
        let assembler = Arc::new(MessageHarBuilder::from_config(&config.har));
        Self::with_assembler(config, assembler)
    }

    /// Create a recorder handing its logs to `assembler`
    #[must_use]
    pub fn with_assembler(config: Config, assembler: Arc<dyn HarAssembler>) -> Self {
        Self {
            config,
            assembler,
            state: RecorderState::Idle,
            last_stats: None,
        }
    }

    /// Whether a recording is active
    #[must_use]
    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording(_))
    }

    /// Stats of the most recently stopped recording.
    ///
    /// Fetches still retrying in the background after `stop` keep updating
    /// these counters until they succeed or give up.
    #[must_use]
    pub fn last_stats(&self) -> Option<SessionStats> {
        self.last_stats.as_ref().map(|stats| stats.snapshot())
    }

    /// Stats of the active recording so far
    #[must_use]
    pub fn live_stats(&self) -> Option<SessionStats> {
        match &self.state {
            RecorderState::Recording(active) => Some(active.core.capture.stats().snapshot()),
            RecorderState::Idle => None,
        }
    }

    /// Number of events logged by the active recording
    #[must_use]
    pub fn event_count(&self) -> usize {
        match &self.state {
            RecorderState::Recording(active) => active.core.recorder.len(),
            RecorderState::Idle => 0,
        }
    }

    /// Begin recording `session`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::AlreadyRecording`] if a recording is active, or
    /// the session's error if enabling the page or network domain fails.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime; body fetches are spawned
    /// on the runtime `start` runs on.
    pub async fn start(
        &mut self,
        session: Arc<dyn ProtocolSession>,
        options: StartOptions,
    ) -> Result<()> {
        if self.is_recording() {
            return Err(HarvestError::AlreadyRecording);
        }

        let capture_config = self.config.capture.with_start_options(&options);

        session.send(PAGE_ENABLE, json!({})).await?;
        session.send(NETWORK_ENABLE, json!({})).await?;

        let capture = Arc::new(CaptureState::new());
        let fetcher = ResponseFetcher::new(
            Arc::clone(&session),
            Arc::clone(&capture),
            self.config.retry,
            Handle::current(),
        );
        let core = Arc::new(SessionCore {
            capture_config,
            recorder: EventRecorder::new(),
            capture,
            fetcher,
            pending: Mutex::new(Vec::new()),
        });

        subscribe(session.as_ref(), &core);
        core.recorder.activate();

        info!(
            "Recording started (body capture: {}, destination: {})",
            core.capture_config.body_capture,
            core.capture_config
                .destination_path
                .as_ref()
                .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string())
        );

        self.state = RecorderState::Recording(ActiveRecording {
            protocol: session,
            core,
        });
        Ok(())
    }

    /// Finish the active recording.
    ///
    /// Returns the document, or `None` once it has been written to the
    /// configured destination.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::NotRecording`] if nothing is being recorded,
    /// or the error from detaching, assembling, or writing the document.
    pub async fn stop(&mut self) -> Result<Option<HarDocument>> {
        let RecorderState::Recording(active) =
            std::mem::replace(&mut self.state, RecorderState::Idle)
        else {
            return Err(HarvestError::NotRecording);
        };
        let ActiveRecording { protocol, core } = active;

        core.recorder.deactivate();

        let pending = std::mem::take(&mut *core.pending.lock());
        debug!("Draining {} body fetches", pending.len());
        match self.config.retry.drain {
            DrainMode::FirstAttempt => {
                join_all(pending.into_iter().map(FetchHandle::settled)).await;
            }
            DrainMode::Exhausted => {
                join_all(pending.into_iter().map(FetchHandle::finished)).await;
            }
        }

        let stats = core.capture.stats().snapshot();
        info!(
            "Recording stopped: {} body fetches, {} succeeded, {} failed",
            stats.attempted, stats.succeeded, stats.failed
        );
        self.last_stats = Some(core.capture.shared_stats());

        protocol.detach().await?;

        let events = core.recorder.merged_log(core.capture.responses());
        let options = BuildOptions {
            include_body: core.capture_config.body_capture,
        };
        let document = self.assembler.build(&events, options);

        core.recorder.clear();
        core.capture.clear();

        let document = document?;
        match &core.capture_config.destination_path {
            Some(path) => {
                write_document(path, &document).await?;
                Ok(None)
            }
            None => Ok(Some(document)),
        }
    }
}

/// Register handlers for every page and network event kind.
///
/// Handlers hold the core weakly so a stopped recording is freed even
/// though the session keeps its handlers.
fn subscribe(session: &dyn ProtocolSession, core: &Arc<SessionCore>) {
    for kind in PageEvent::ALL {
        let core: Weak<SessionCore> = Arc::downgrade(core);
        session.on(
            kind.method(),
            Arc::new(move |params: Value| {
                if let Some(core) = core.upgrade() {
                    core.on_page_event(kind, params);
                }
            }),
        );
    }

    for kind in NetworkEvent::ALL {
        let core: Weak<SessionCore> = Arc::downgrade(core);
        session.on(
            kind.method(),
            Arc::new(move |params: Value| {
                if let Some(core) = core.upgrade() {
                    core.on_network_event(kind, params);
                }
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MemorySession;

    fn as_session(session: &Arc<MemorySession>) -> Arc<dyn ProtocolSession> {
        Arc::clone(session) as Arc<dyn ProtocolSession>
    }

    #[tokio::test]
    async fn test_start_enables_domains_and_subscribes() {
        let session = Arc::new(MemorySession::new());
        let mut recorder = HarRecorder::new(Config::default());

        recorder
            .start(as_session(&session), StartOptions::default())
            .await
            .unwrap();

        assert!(recorder.is_recording());
        assert_eq!(session.commands(), vec![PAGE_ENABLE, NETWORK_ENABLE]);
        for kind in PageEvent::ALL {
            assert_eq!(session.handler_count(kind.method()), 1);
        }
        for kind in NetworkEvent::ALL {
            assert_eq!(session.handler_count(kind.method()), 1);
        }
    }

    #[tokio::test]
    async fn test_reentrant_start_is_rejected() {
        let session = Arc::new(MemorySession::new());
        let mut recorder = HarRecorder::new(Config::default());
        recorder
            .start(as_session(&session), StartOptions::default())
            .await
            .unwrap();

        let err = recorder
            .start(as_session(&session), StartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::AlreadyRecording));
        assert!(recorder.is_recording());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut recorder = HarRecorder::new(Config::default());
        assert!(matches!(
            recorder.stop().await,
            Err(HarvestError::NotRecording)
        ));
    }

    #[tokio::test]
    async fn test_events_counted_while_recording() {
        let session = Arc::new(MemorySession::new());
        let mut recorder = HarRecorder::new(Config::default());
        recorder
            .start(as_session(&session), StartOptions::default())
            .await
            .unwrap();

        session.emit("Page.frameStartedLoading", json!({"frameId": "F1"}));
        session.emit("Network.dataReceived", json!({"requestId": "1"}));
        assert_eq!(recorder.event_count(), 2);
        assert_eq!(recorder.live_stats(), Some(SessionStats::default()));

        recorder.stop().await.unwrap();
        assert_eq!(recorder.event_count(), 0);
        assert!(session.is_detached());
        assert_eq!(recorder.last_stats(), Some(SessionStats::default()));
    }

    struct RejectingAssembler;

    impl HarAssembler for RejectingAssembler {
        fn build(&self, _: &[crate::event::RecordedEvent], _: BuildOptions) -> Result<HarDocument> {
            Err(HarvestError::Assembly("rejected".to_string()))
        }
    }

    #[tokio::test]
    async fn test_assembly_failure_still_ends_recording() {
        let session = Arc::new(MemorySession::new());
        let mut recorder =
            HarRecorder::with_assembler(Config::default(), Arc::new(RejectingAssembler));
        recorder
            .start(as_session(&session), StartOptions::default())
            .await
            .unwrap();
        session.emit("Page.loadEventFired", json!({"timestamp": 1.0}));

        let err = recorder.stop().await.unwrap_err();
        assert!(matches!(err, HarvestError::Assembly(_)));
        assert!(!recorder.is_recording());
        assert!(session.is_detached());

        // a fresh recording can begin right away
        let next = Arc::new(MemorySession::new());
        recorder
            .start(as_session(&next), StartOptions::default())
            .await
            .unwrap();
        assert_eq!(recorder.event_count(), 0);
    }

    #[tokio::test]
    async fn test_loading_finished_without_response_fetches_nothing() {
        let session = Arc::new(MemorySession::new());
        let mut recorder = HarRecorder::new(Config::default());
        let options = StartOptions {
            save_response: Some(true),
            ..StartOptions::default()
        };
        recorder.start(as_session(&session), options).await.unwrap();

        session.emit("Network.loadingFinished", json!({"requestId": "5"}));
        recorder.stop().await.unwrap();

        assert_eq!(session.body_requests("5"), 0);
        assert_eq!(recorder.last_stats().unwrap().attempted, 0);
    }
}
