//! Response entries and logical resource keys

use std::fmt;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::event::{RequestId, ResponseReceived};

/// Resource types whose key is the URL alone
const URL_KEYED_TYPES: [&str; 5] = ["Document", "Stylesheet", "Image", "Media", "Font"];

/// Key under which bodies of the same real-world resource are compared
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogicalResourceKey(String);

impl LogicalResourceKey {
    /// Derive the key for a response.
    ///
    /// XHR responses are only comparable with themselves, so their key is
    /// suffixed with the request id.
    #[must_use]
    pub fn derive(resource_type: Option<&str>, url: &str, request_id: &str) -> Self {
        match resource_type {
            Some(kind) if URL_KEYED_TYPES.contains(&kind) => Self(url.to_string()),
            Some("XHR") => Self(format!("{url}-{request_id}")),
            _ => Self(url.to_string()),
        }
    }

    /// Key as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mutable per-request record created by `Network.responseReceived`
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEntry {
    /// Request identifier
    pub request_id: RequestId,
    /// Resource type reported with the response
    pub resource_type: Option<String>,
    /// Loader identifier
    pub loader_id: Option<String>,
    /// Monotonic timestamp of the response event
    pub timestamp: Option<f64>,
    /// Frame identifier
    pub frame_id: Option<String>,
    /// The event's `response` sub-object
    pub response: Option<Map<String, Value>>,
    /// Decoded body, absent until fetched (or suppressed as a duplicate)
    pub body: Option<String>,
}

impl ResponseEntry {
    /// Build an entry from a response event
    #[must_use]
    pub fn from_event(event: ResponseReceived) -> Self {
        Self {
            request_id: event.request_id,
            resource_type: event.resource_type,
            loader_id: event.loader_id,
            timestamp: event.timestamp,
            frame_id: event.frame_id,
            response: event.response,
            body: None,
        }
    }

    /// `response.url`, or empty
    #[must_use]
    pub fn url(&self) -> &str {
        self.response_str("url").unwrap_or_default()
    }

    fn response_str(&self, field: &str) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|response| response.get(field))
            .and_then(Value::as_str)
    }

    /// Logical resource key of this entry
    #[must_use]
    pub fn resource_key(&self) -> LogicalResourceKey {
        LogicalResourceKey::derive(
            self.resource_type.as_deref(),
            self.url(),
            &self.request_id,
        )
    }

    /// Set or clear the body, materializing an empty `response` if the
    /// event carried none.
    pub fn set_body(&mut self, body: Option<String>) {
        self.response.get_or_insert_with(Map::new);
        self.body = body;
    }
}

/// Session-scoped map of response entries, one per request id
#[derive(Debug, Default)]
pub struct ResponseStore {
    entries: DashMap<RequestId, ResponseEntry>,
}

impl ResponseStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a response event. A repeated event for the same request id
    /// replaces the existing entry's contents.
    ///
    /// Returns `true` if a new entry was created.
    pub fn register(&self, event: ResponseReceived) -> bool {
        let entry = ResponseEntry::from_event(event);
        let request_id = entry.request_id.clone();
        let replaced = self.entries.insert(request_id.clone(), entry).is_some();
        if replaced {
            debug!("Replaced response entry for request {}", request_id);
        }
        !replaced
    }

    /// Whether an entry exists for `request_id`
    #[must_use]
    pub fn contains(&self, request_id: &str) -> bool {
        self.entries.contains_key(request_id)
    }

    /// Copy of the entry for `request_id`
    #[must_use]
    pub fn get(&self, request_id: &str) -> Option<ResponseEntry> {
        self.entries.get(request_id).map(|entry| entry.clone())
    }

    /// Run `f` on the entry for `request_id` while holding it exclusively
    pub fn update<R>(
        &self,
        request_id: &str,
        f: impl FnOnce(&mut ResponseEntry) -> R,
    ) -> Option<R> {
        self.entries
            .get_mut(request_id)
            .map(|mut entry| f(entry.value_mut()))
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }
}
