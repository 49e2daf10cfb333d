//! Protocol event kinds and recorded event envelopes

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque protocol-assigned identifier of one network exchange
pub type RequestId = String;

/// Page lifecycle events the recorder subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageEvent {
    /// `Page.loadEventFired`
    LoadEventFired,
    /// `Page.domContentEventFired`
    DomContentEventFired,
    /// `Page.frameStartedLoading`
    FrameStartedLoading,
    /// `Page.frameAttached`
    FrameAttached,
    /// `Page.frameScheduledNavigation`
    FrameScheduledNavigation,
}

impl PageEvent {
    /// Every page event kind, in subscription order
    pub const ALL: [Self; 5] = [
        Self::LoadEventFired,
        Self::DomContentEventFired,
        Self::FrameStartedLoading,
        Self::FrameAttached,
        Self::FrameScheduledNavigation,
    ];

    /// Protocol method name
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::LoadEventFired => "Page.loadEventFired",
            Self::DomContentEventFired => "Page.domContentEventFired",
            Self::FrameStartedLoading => "Page.frameStartedLoading",
            Self::FrameAttached => "Page.frameAttached",
            Self::FrameScheduledNavigation => "Page.frameScheduledNavigation",
        }
    }
}

/// Network lifecycle events the recorder subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkEvent {
    /// `Network.requestWillBeSent`
    RequestWillBeSent,
    /// `Network.requestServedFromCache`
    RequestServedFromCache,
    /// `Network.dataReceived`
    DataReceived,
    /// `Network.responseReceived`
    ResponseReceived,
    /// `Network.resourceChangedPriority`
    ResourceChangedPriority,
    /// `Network.loadingFinished`
    LoadingFinished,
    /// `Network.loadingFailed`
    LoadingFailed,
}

impl NetworkEvent {
    /// Every network event kind, in subscription order
    pub const ALL: [Self; 7] = [
        Self::RequestWillBeSent,
        Self::RequestServedFromCache,
        Self::DataReceived,
        Self::ResponseReceived,
        Self::ResourceChangedPriority,
        Self::LoadingFinished,
        Self::LoadingFailed,
    ];

    /// Protocol method name
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::RequestWillBeSent => "Network.requestWillBeSent",
            Self::RequestServedFromCache => "Network.requestServedFromCache",
            Self::DataReceived => "Network.dataReceived",
            Self::ResponseReceived => "Network.responseReceived",
            Self::ResourceChangedPriority => "Network.resourceChangedPriority",
            Self::LoadingFinished => "Network.loadingFinished",
            Self::LoadingFailed => "Network.loadingFailed",
        }
    }
}

/// Kind of a recorded protocol event.
///
/// Unknown methods are kept as [`EventKind::Opaque`] so newer protocol
/// revisions still flow through to the HAR assembler untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// Page lifecycle event
    Page(PageEvent),
    /// Network lifecycle event
    Network(NetworkEvent),
    /// Any other protocol method
    Opaque(String),
}

impl EventKind {
    /// Resolve a protocol method name
    #[must_use]
    pub fn from_method(method: &str) -> Self {
        if let Some(event) = PageEvent::ALL.iter().find(|e| e.method() == method) {
            return Self::Page(*event);
        }
        if let Some(event) = NetworkEvent::ALL.iter().find(|e| e.method() == method) {
            return Self::Network(*event);
        }
        Self::Opaque(method.to_string())
    }

    /// Protocol method name
    #[must_use]
    pub fn method(&self) -> &str {
        match self {
            Self::Page(event) => event.method(),
            Self::Network(event) => event.method(),
            Self::Opaque(method) => method,
        }
    }
}

impl From<String> for EventKind {
    fn from(method: String) -> Self {
        match Self::from_method(&method) {
            Self::Opaque(_) => Self::Opaque(method),
            known => known,
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.method().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// Immutable `{method, params}` snapshot of one protocol event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Event kind, serialized as the protocol method name
    pub method: EventKind,
    /// Raw event parameters
    #[serde(default)]
    pub params: Value,
}

impl RecordedEvent {
    /// Create a new event record
    #[must_use]
    pub fn new(method: EventKind, params: Value) -> Self {
        Self { method, params }
    }

    /// `params.requestId`, if present
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        request_id_of(&self.params)
    }
}

/// Extract `requestId` from raw event parameters
#[must_use]
pub fn request_id_of(params: &Value) -> Option<&str> {
    params.get("requestId").and_then(Value::as_str)
}

/// Typed view of `Network.responseReceived` parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
    /// Request identifier
    pub request_id: RequestId,
    /// Resource type (`Document`, `XHR`, ...)
    #[serde(default, rename = "type")]
    pub resource_type: Option<String>,
    /// Loader identifier
    #[serde(default)]
    pub loader_id: Option<String>,
    /// Monotonic timestamp in seconds
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// Frame identifier
    #[serde(default)]
    pub frame_id: Option<String>,
    /// The `response` sub-object, kept as-is
    #[serde(default)]
    pub response: Option<Map<String, Value>>,
}

impl ResponseReceived {
    /// Parse from raw event parameters
    ///
    /// # Errors
    ///
    /// Returns error if `requestId` is missing or fields have the wrong type
    pub fn from_params(params: &Value) -> serde_json::Result<Self> {
        Self::deserialize(params)
    }
}
