//! HAR 1.2 document model

use serde::{Deserialize, Serialize};

/// HAR format version written by this crate
pub const HAR_VERSION: &str = "1.2";

/// Top-level HAR document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarDocument {
    /// The log
    pub log: HarLog,
}

/// `log` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarLog {
    /// Format version
    pub version: String,
    /// Producing application
    pub creator: HarCreator,
    /// Pages, in navigation order
    #[serde(default)]
    pub pages: Vec<HarPage>,
    /// Entries, ordered by start time
    #[serde(default)]
    pub entries: Vec<HarEntry>,
}

/// `creator` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarCreator {
    /// Application name
    pub name: String,
    /// Application version
    pub version: String,
}

/// `page` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPage {
    /// ISO 8601 start time
    pub started_date_time: String,
    /// Unique page id referenced by entries
    pub id: String,
    /// Page title (the navigated URL)
    pub title: String,
    /// Load milestones
    pub page_timings: HarPageTimings,
}

/// `pageTimings` object; `-1` when unknown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPageTimings {
    /// Milliseconds until `DOMContentLoaded`
    pub on_content_load: f64,
    /// Milliseconds until `load`
    pub on_load: f64,
}

impl Default for HarPageTimings {
    fn default() -> Self {
        Self {
            on_content_load: -1.0,
            on_load: -1.0,
        }
    }
}

/// `entry` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    /// Owning page id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pageref: Option<String>,
    /// ISO 8601 start time
    pub started_date_time: String,
    /// Total elapsed milliseconds
    pub time: f64,
    /// Request
    pub request: HarRequest,
    /// Response
    pub response: HarResponse,
    /// Cache usage (always empty)
    #[serde(default)]
    pub cache: HarCache,
    /// Phase timings
    pub timings: HarTimings,
    /// Remote address
    #[serde(
        default,
        rename = "serverIPAddress",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_ip_address: Option<String>,
    /// Connection id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    /// Protocol request id
    #[serde(rename = "_requestId")]
    pub request_id: String,
    /// Protocol resource type
    #[serde(
        default,
        rename = "_resourceType",
        skip_serializing_if = "Option::is_none"
    )]
    pub resource_type: Option<String>,
    /// Last reported priority
    #[serde(default, rename = "_priority", skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// `memory` or `disk` when served from cache
    #[serde(default, rename = "_fromCache", skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<String>,
    /// Failure reason reported by `loadingFailed`
    #[serde(default, rename = "_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `request` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    /// HTTP method
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Protocol version
    pub http_version: String,
    /// Cookies (not parsed)
    #[serde(default)]
    pub cookies: Vec<HarNameValue>,
    /// Headers
    #[serde(default)]
    pub headers: Vec<HarNameValue>,
    /// Decoded query parameters
    #[serde(default)]
    pub query_string: Vec<HarNameValue>,
    /// Posted body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<HarPostData>,
    /// Header bytes, `-1` when unknown
    pub headers_size: i64,
    /// Body bytes, `-1` when unknown
    pub body_size: i64,
}

/// `response` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    /// Status code, `0` when none was received
    pub status: i64,
    /// Status text
    pub status_text: String,
    /// Protocol version
    pub http_version: String,
    /// Cookies (not parsed)
    #[serde(default)]
    pub cookies: Vec<HarNameValue>,
    /// Headers
    #[serde(default)]
    pub headers: Vec<HarNameValue>,
    /// Body details
    pub content: HarContent,
    /// `Location` target
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    /// Header bytes, `-1` when unknown
    pub headers_size: i64,
    /// Body bytes on the wire, `-1` when unknown
    pub body_size: i64,
    /// Total bytes transferred
    #[serde(
        default,
        rename = "_transferSize",
        skip_serializing_if = "Option::is_none"
    )]
    pub transfer_size: Option<i64>,
}

/// `content` object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarContent {
    /// Decoded size in bytes
    pub size: i64,
    /// MIME type
    pub mime_type: String,
    /// Decoded response text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Encoding of `text`, when not plain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// `postData` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPostData {
    /// MIME type of the posted body
    pub mime_type: String,
    /// Posted text
    pub text: String,
}

/// Name/value pair used for headers, cookies and query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarNameValue {
    /// Name
    pub name: String,
    /// Value
    pub value: String,
}

impl HarNameValue {
    /// Create a pair
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// `cache` object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarCache {}

/// `timings` object in milliseconds; optional phases use `-1`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarTimings {
    /// Queueing time
    pub blocked: f64,
    /// DNS resolution
    pub dns: f64,
    /// TCP connect, including TLS
    pub connect: f64,
    /// Sending the request
    pub send: f64,
    /// Waiting for the first byte
    pub wait: f64,
    /// Receiving the body
    pub receive: f64,
    /// TLS negotiation
    pub ssl: f64,
}

impl Default for HarTimings {
    fn default() -> Self {
        Self {
            blocked: -1.0,
            dns: -1.0,
            connect: -1.0,
            send: 0.0,
            wait: 0.0,
            receive: 0.0,
            ssl: -1.0,
        }
    }
}

impl HarTimings {
    /// Sum of every known phase; `ssl` is already part of `connect`
    #[must_use]
    pub fn total(&self) -> f64 {
        [
            self.blocked,
            self.dns,
            self.connect,
            self.send,
            self.wait,
            self.receive,
        ]
        .iter()
        .filter(|phase| **phase > 0.0)
        .sum()
    }
}
