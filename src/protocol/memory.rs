//! In-memory protocol session
//!
//! Drives the recorder from an already-captured event log, and serves as the
//! session double in tests. Response bodies are scripted per request id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::debug;

use crate::event::{request_id_of, RecordedEvent};
use crate::{HarvestError, Result};

use super::{EventHandler, ProtocolSession, GET_RESPONSE_BODY};

#[derive(Debug, Default)]
struct BodyScript {
    body: Option<(String, bool)>,
    failures_left: usize,
    requests: usize,
}

/// Protocol session backed by in-process state
#[derive(Default)]
pub struct MemorySession {
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
    bodies: Mutex<HashMap<String, BodyScript>>,
    commands: Mutex<Vec<(String, Value)>>,
    detached: AtomicBool,
}

impl MemorySession {
    /// Create an empty session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every handler registered for `method`.
    ///
    /// Returns the number of handlers invoked.
    pub fn emit(&self, method: &str, params: Value) -> usize {
        let handlers = self
            .handlers
            .lock()
            .get(method)
            .cloned()
            .unwrap_or_default();

        for handler in &handlers {
            handler(params.clone());
        }
        handlers.len()
    }

    /// Deliver every event of a captured log, in order
    pub fn replay(&self, events: &[RecordedEvent]) {
        for event in events {
            self.emit(event.method.method(), event.params.clone());
        }
    }

    /// Serve `body` for `request_id` from now on
    pub fn set_body(&self, request_id: &str, body: &str, base64_encoded: bool) {
        self.bodies
            .lock()
            .entry(request_id.to_string())
            .or_default()
            .body = Some((body.to_string(), base64_encoded));
    }

    /// Reject the next `failures` body requests for `request_id`
    pub fn fail_body(&self, request_id: &str, failures: usize) {
        self.bodies
            .lock()
            .entry(request_id.to_string())
            .or_default()
            .failures_left = failures;
    }

    /// Number of body requests issued for `request_id`
    #[must_use]
    pub fn body_requests(&self, request_id: &str) -> usize {
        self.bodies
            .lock()
            .get(request_id)
            .map_or(0, |script| script.requests)
    }

    /// Names of every command sent, in order
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    /// Number of handlers currently registered for `method`
    #[must_use]
    pub fn handler_count(&self, method: &str) -> usize {
        self.handlers.lock().get(method).map_or(0, Vec::len)
    }

    /// Whether `detach` has been called
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    fn response_body(&self, params: &Value) -> Result<Value> {
        let request_id = request_id_of(params)
            .ok_or_else(|| HarvestError::protocol(GET_RESPONSE_BODY, "missing requestId"))?;

        let mut bodies = self.bodies.lock();
        let script = bodies.entry(request_id.to_string()).or_default();
        script.requests += 1;

        if script.failures_left > 0 {
            script.failures_left -= 1;
            return Err(HarvestError::protocol(
                GET_RESPONSE_BODY,
                "scripted failure",
            ));
        }

        match &script.body {
            Some((body, base64_encoded)) => Ok(json!({
                "body": body,
                "base64Encoded": base64_encoded,
            })),
            None => Err(HarvestError::protocol(
                GET_RESPONSE_BODY,
                "No resource with given identifier found",
            )),
        }
    }
}

#[async_trait]
impl ProtocolSession for MemorySession {
    async fn send(&self, command: &str, params: Value) -> Result<Value> {
        if self.is_detached() {
            return Err(HarvestError::protocol(command, "session detached"));
        }

        debug!("MemorySession command: {}", command);
        self.commands
            .lock()
            .push((command.to_string(), params.clone()));

        if command == GET_RESPONSE_BODY {
            self.response_body(&params)
        } else {
            Ok(json!({}))
        }
    }

    fn on(&self, method: &str, handler: EventHandler) {
        self.handlers
            .lock()
            .entry(method.to_string())
            .or_default()
            .push(handler);
    }

    async fn detach(&self) -> Result<()> {
        self.detached.store(true, Ordering::Release);
        self.handlers.lock().clear();
        Ok(())
    }
}
