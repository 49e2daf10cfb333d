//! Ordered page and network event logs

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::capture::ResponseStore;
use crate::event::{request_id_of, EventKind, NetworkEvent, RecordedEvent};

/// Which log an event was appended to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Page lifecycle log
    Page,
    /// Network log
    Network,
}

/// Appends protocol events to two arrival-ordered logs while active
#[derive(Debug, Default)]
pub struct EventRecorder {
    active: AtomicBool,
    page_log: Mutex<Vec<RecordedEvent>>,
    network_log: Mutex<Vec<RecordedEvent>>,
}

impl EventRecorder {
    /// Create an inactive recorder with empty logs
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting events
    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    /// Stop accepting events; later events are dropped
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Whether events are currently recorded
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Append an event to its log.
    ///
    /// Returns the log it went to, or `None` if recording is not active.
    /// Parameters are stored as delivered, without validation.
    pub fn observe(&self, kind: EventKind, params: Value) -> Option<LogKind> {
        if !self.is_active() {
            debug!("Dropping {} outside of a recording", kind);
            return None;
        }

        let log = match &kind {
            EventKind::Page(_) => LogKind::Page,
            EventKind::Network(_) => LogKind::Network,
            EventKind::Opaque(_) if request_id_of(&params).is_some() => LogKind::Network,
            EventKind::Opaque(_) => LogKind::Page,
        };

        let event = RecordedEvent::new(kind, params);
        match log {
            LogKind::Page => self.page_log.lock().push(event),
            LogKind::Network => self.network_log.lock().push(event),
        }
        Some(log)
    }

    /// Copy of the page log
    #[must_use]
    pub fn page_events(&self) -> Vec<RecordedEvent> {
        self.page_log.lock().clone()
    }

    /// Copy of the network log
    #[must_use]
    pub fn network_events(&self) -> Vec<RecordedEvent> {
        self.network_log.lock().clone()
    }

    /// Number of events in both logs
    #[must_use]
    pub fn len(&self) -> usize {
        self.page_log.lock().len() + self.network_log.lock().len()
    }

    /// Whether both logs are empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Page log followed by the network log, with captured bodies merged
    /// into each `Network.responseReceived` event's `response` object.
    #[must_use]
    pub fn merged_log(&self, responses: &ResponseStore) -> Vec<RecordedEvent> {
        let mut events = self.page_events();
        let network = self.network_log.lock();
        events.reserve(network.len());

        for event in network.iter() {
            let mut event = event.clone();
            if event.method == EventKind::Network(NetworkEvent::ResponseReceived) {
                let body = event
                    .request_id()
                    .and_then(|request_id| responses.get(request_id))
                    .and_then(|entry| entry.body);
                if let Some(body) = body {
                    attach_body(&mut event.params, body);
                }
            }
            events.push(event);
        }
        events
    }

    /// Empty both logs
    pub fn clear(&self) {
        self.page_log.lock().clear();
        self.network_log.lock().clear();
    }
}

fn attach_body(params: &mut Value, body: String) {
    let Some(params) = params.as_object_mut() else {
        return;
    };
    let response = params
        .entry("response")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(response) = response.as_object_mut() {
        response.insert("body".to_string(), Value::String(body));
    }
}
