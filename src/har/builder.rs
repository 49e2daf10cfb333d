//! Default HAR assembler over `{method, params}` message logs

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::HarConfig;
use crate::event::{EventKind, NetworkEvent, PageEvent, RecordedEvent};
use crate::Result;

use super::model::{
    HarCache, HarContent, HarCreator, HarDocument, HarEntry, HarLog, HarNameValue, HarPage,
    HarPageTimings, HarPostData, HarRequest, HarResponse, HarTimings, HAR_VERSION,
};
use super::{BuildOptions, HarAssembler};

/// Builds HAR documents from recorded page and network events.
///
/// Page and network events may arrive as separate concatenated logs, so page
/// milestones are matched to pages by timestamp rather than by position.
#[derive(Debug, Clone)]
pub struct MessageHarBuilder {
    creator: HarCreator,
}

impl Default for MessageHarBuilder {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_NAME"))
    }
}

impl MessageHarBuilder {
    /// Create a builder stamping documents with `creator_name`
    pub fn new(creator_name: impl Into<String>) -> Self {
        Self {
            creator: HarCreator {
                name: creator_name.into(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Create a builder from the `[har]` config section
    #[must_use]
    pub fn from_config(config: &HarConfig) -> Self {
        Self::new(config.creator_name.clone())
    }
}

impl HarAssembler for MessageHarBuilder {
    fn build(&self, events: &[RecordedEvent], options: BuildOptions) -> Result<HarDocument> {
        let mut child_frames = HashSet::new();
        let mut milestones = Vec::new();

        for event in events {
            let params = &event.params;
            match event.method {
                EventKind::Page(PageEvent::FrameAttached) => {
                    if params.get("parentFrameId").is_some() {
                        if let Some(frame_id) = str_field(params, "frameId") {
                            child_frames.insert(frame_id.to_string());
                        }
                    }
                }
                EventKind::Page(
                    kind @ (PageEvent::DomContentEventFired | PageEvent::LoadEventFired),
                ) => {
                    if let Some(timestamp) = f64_field(params, "timestamp") {
                        milestones.push((kind, timestamp));
                    }
                }
                _ => {}
            }
        }

        let mut pages: Vec<PageState> = Vec::new();
        let mut open: HashMap<String, PendingEntry> = HashMap::new();
        let mut closed: Vec<PendingEntry> = Vec::new();
        let mut clock_offset = None;

        for event in events {
            let EventKind::Network(kind) = event.method else {
                continue;
            };
            let Some(request_id) = event.request_id() else {
                debug!("Skipping {} without requestId", event.method);
                continue;
            };
            let params = &event.params;

            match kind {
                NetworkEvent::RequestWillBeSent => {
                    let redirect = params.get("redirectResponse");
                    if let Some(mut previous) = open.remove(request_id) {
                        if let Some(response) = redirect {
                            previous.response = Some(response.clone());
                            previous.finished_ts = f64_field(params, "timestamp");
                        }
                        closed.push(previous);
                    }

                    if redirect.is_none() && is_navigation(params, request_id, &child_frames) {
                        let page = PageState::open(pages.len() + 1, params);
                        debug!("Opened {} for {}", page.id, page.title);
                        pages.push(page);
                    }

                    if let (Some(wall), Some(timestamp)) =
                        (f64_field(params, "wallTime"), f64_field(params, "timestamp"))
                    {
                        clock_offset.get_or_insert(wall - timestamp);
                    }
                    open.insert(request_id.to_string(), PendingEntry::new(request_id, params));
                }
                NetworkEvent::RequestServedFromCache => {
                    if let Some(entry) = open.get_mut(request_id) {
                        entry.from_cache = Some("memory".to_string());
                    }
                }
                NetworkEvent::ResponseReceived => {
                    let entry = open.entry(request_id.to_string()).or_insert_with(|| {
                        debug!("Response for request {} arrived without its request", request_id);
                        PendingEntry::from_response(request_id, params)
                    });
                    entry.response = params.get("response").cloned();
                    if let Some(kind) = str_field(params, "type") {
                        entry.resource_type = Some(kind.to_string());
                    }
                }
                NetworkEvent::DataReceived => {
                    if let Some(entry) = open.get_mut(request_id) {
                        entry.data_length += i64_field(params, "dataLength").unwrap_or(0);
                        entry.encoded_length +=
                            i64_field(params, "encodedDataLength").unwrap_or(0);
                    }
                }
                NetworkEvent::ResourceChangedPriority => {
                    if let Some(entry) = open.get_mut(request_id) {
                        entry.priority = str_field(params, "newPriority").map(str::to_string);
                    }
                }
                NetworkEvent::LoadingFinished => {
                    if let Some(mut entry) = open.remove(request_id) {
                        entry.finished_ts = f64_field(params, "timestamp");
                        if let Some(length) = i64_field(params, "encodedDataLength") {
                            entry.encoded_length = length;
                        }
                        closed.push(entry);
                    }
                }
                NetworkEvent::LoadingFailed => {
                    if let Some(mut entry) = open.remove(request_id) {
                        entry.finished_ts = f64_field(params, "timestamp");
                        entry.error = str_field(params, "errorText").map(str::to_string);
                        closed.push(entry);
                    }
                }
            }
        }

        closed.extend(open.into_values());
        let clock_offset = clock_offset.unwrap_or(0.0);
        for entry in &mut closed {
            entry
                .wall_time
                .get_or_insert(entry.started_ts + clock_offset);
        }
        closed.sort_by(|a, b| {
            a.wall_time
                .unwrap_or_default()
                .total_cmp(&b.wall_time.unwrap_or_default())
        });

        for (kind, timestamp) in milestones {
            if let Some(page) = pages
                .iter_mut()
                .rev()
                .find(|page| page.started_ts <= timestamp)
            {
                let elapsed = (timestamp - page.started_ts) * 1000.0;
                match kind {
                    PageEvent::DomContentEventFired => page.timings.on_content_load = elapsed,
                    _ => page.timings.on_load = elapsed,
                }
            }
        }

        let total = closed.len();
        let entries: Vec<HarEntry> = closed
            .into_iter()
            .filter_map(|entry| {
                let pageref = pages
                    .iter()
                    .rev()
                    .find(|page| page.started_ts <= entry.started_ts)
                    .map(|page| page.id.clone());
                entry.into_har(pageref, options)
            })
            .collect();

        if entries.len() < total {
            debug!("Omitted {} requests without a response", total - entries.len());
        }

        Ok(HarDocument {
            log: HarLog {
                version: HAR_VERSION.to_string(),
                creator: self.creator.clone(),
                pages: pages.into_iter().map(PageState::into_har).collect(),
                entries,
            },
        })
    }
}

struct PageState {
    id: String,
    title: String,
    started_wall: f64,
    started_ts: f64,
    timings: HarPageTimings,
}

impl PageState {
    fn open(index: usize, params: &Value) -> Self {
        Self {
            id: format!("page_{index}"),
            title: params
                .get("request")
                .and_then(|request| str_field(request, "url"))
                .unwrap_or_default()
                .to_string(),
            started_wall: f64_field(params, "wallTime").unwrap_or(0.0),
            started_ts: f64_field(params, "timestamp").unwrap_or(0.0),
            timings: HarPageTimings::default(),
        }
    }

    fn into_har(self) -> HarPage {
        HarPage {
            started_date_time: iso_time(self.started_wall),
            id: self.id,
            title: self.title,
            page_timings: self.timings,
        }
    }
}

struct PendingEntry {
    request_id: String,
    wall_time: Option<f64>,
    started_ts: f64,
    request: Value,
    response: Option<Value>,
    resource_type: Option<String>,
    data_length: i64,
    encoded_length: i64,
    finished_ts: Option<f64>,
    from_cache: Option<String>,
    priority: Option<String>,
    error: Option<String>,
}

impl PendingEntry {
    fn new(request_id: &str, params: &Value) -> Self {
        Self {
            request_id: request_id.to_string(),
            wall_time: f64_field(params, "wallTime"),
            started_ts: f64_field(params, "timestamp").unwrap_or(0.0),
            request: params.get("request").cloned().unwrap_or(Value::Null),
            response: None,
            resource_type: str_field(params, "type").map(str::to_string),
            data_length: 0,
            encoded_length: 0,
            finished_ts: None,
            from_cache: None,
            priority: None,
            error: None,
        }
    }

    /// Stand-in for a request whose `requestWillBeSent` was not recorded.
    /// Its start time is inferred from the session clock.
    fn from_response(request_id: &str, params: &Value) -> Self {
        let url = params
            .get("response")
            .and_then(|response| str_field(response, "url"))
            .unwrap_or_default();
        Self {
            wall_time: None,
            request: json!({ "url": url, "method": "GET" }),
            ..Self::new(request_id, params)
        }
    }

    fn into_har(self, pageref: Option<String>, options: BuildOptions) -> Option<HarEntry> {
        let response = self.response?;
        let request = &self.request;

        let url = str_field(request, "url").unwrap_or_default().to_string();
        let http_version = http_version(str_field(&response, "protocol"));

        let request_headers = response
            .get("requestHeaders")
            .or_else(|| request.get("headers"));
        let request_headers = name_values(request_headers);
        let post_data = str_field(request, "postData").map(|text| HarPostData {
            mime_type: header_value(&request_headers, "content-type")
                .unwrap_or_default()
                .to_string(),
            text: text.to_string(),
        });
        let request_body_size = post_data.as_ref().map_or(0, |data| data.text.len() as i64);

        let response_headers = name_values(response.get("headers"));
        let redirect_url = header_value(&response_headers, "location")
            .unwrap_or_default()
            .to_string();

        let body = str_field(&response, "body");
        let size = if self.data_length > 0 {
            self.data_length
        } else {
            body.map_or(0, |text| text.len() as i64)
        };

        let from_cache = self.from_cache.or_else(|| {
            response
                .get("fromDiskCache")
                .and_then(Value::as_bool)
                .filter(|cached| *cached)
                .map(|_| "disk".to_string())
        });
        let body_size = if from_cache.is_some() {
            0
        } else if self.encoded_length > 0 {
            self.encoded_length
        } else {
            -1
        };

        let timings = timings(response.get("timing"), self.finished_ts);

        Some(HarEntry {
            pageref,
            started_date_time: iso_time(self.wall_time.unwrap_or_default()),
            time: timings.total(),
            request: HarRequest {
                method: str_field(request, "method").unwrap_or("GET").to_string(),
                query_string: query_string(&url),
                url,
                http_version: http_version.clone(),
                cookies: Vec::new(),
                headers: request_headers,
                post_data,
                headers_size: -1,
                body_size: request_body_size,
            },
            response: HarResponse {
                status: i64_field(&response, "status").unwrap_or(0),
                status_text: str_field(&response, "statusText")
                    .unwrap_or_default()
                    .to_string(),
                http_version,
                cookies: Vec::new(),
                headers: response_headers,
                content: HarContent {
                    size,
                    mime_type: str_field(&response, "mimeType")
                        .unwrap_or_default()
                        .to_string(),
                    text: body
                        .filter(|_| options.include_body)
                        .map(str::to_string),
                    encoding: None,
                },
                redirect_url,
                headers_size: -1,
                body_size,
                transfer_size: (self.encoded_length > 0).then_some(self.encoded_length),
            },
            cache: HarCache::default(),
            timings,
            server_ip_address: str_field(&response, "remoteIPAddress")
                .map(|address| address.trim_matches(|c| c == '[' || c == ']').to_string()),
            connection: response.get("connectionId").and_then(|id| match id {
                Value::String(id) => Some(id.clone()),
                Value::Number(id) => Some(id.to_string()),
                _ => None,
            }),
            request_id: self.request_id,
            resource_type: self.resource_type,
            priority: self.priority.or_else(|| {
                str_field(request, "initialPriority").map(str::to_string)
            }),
            from_cache,
            error: self.error,
        })
    }
}

/// Top-level document navigation: request id doubles as loader id
fn is_navigation(params: &Value, request_id: &str, child_frames: &HashSet<String>) -> bool {
    str_field(params, "type") == Some("Document")
        && str_field(params, "loaderId") == Some(request_id)
        && !str_field(params, "frameId").is_some_and(|frame| child_frames.contains(frame))
}

fn timings(timing: Option<&Value>, finished_ts: Option<f64>) -> HarTimings {
    let Some(timing) = timing else {
        return HarTimings::default();
    };
    let get = |field: &str| f64_field(timing, field).unwrap_or(-1.0);

    let request_time = get("requestTime");
    let dns_start = get("dnsStart");
    let connect_start = get("connectStart");
    let ssl_start = get("sslStart");
    let send_start = get("sendStart");
    let send_end = get("sendEnd");
    let headers_end = get("receiveHeadersEnd");

    let span = |start: f64, end: f64| if start >= 0.0 { end - start } else { -1.0 };

    HarTimings {
        blocked: [dns_start, connect_start, send_start]
            .into_iter()
            .find(|start| *start >= 0.0)
            .unwrap_or(-1.0),
        dns: span(dns_start, get("dnsEnd")),
        connect: span(connect_start, get("connectEnd")),
        ssl: span(ssl_start, get("sslEnd")),
        send: (send_end - send_start).max(0.0),
        wait: (headers_end - send_end).max(0.0),
        receive: match finished_ts {
            Some(finished) if request_time >= 0.0 => {
                ((finished - request_time) * 1000.0 - headers_end).max(0.0)
            }
            _ => 0.0,
        },
    }
}

fn http_version(protocol: Option<&str>) -> String {
    match protocol.map(str::to_ascii_lowercase).as_deref() {
        Some("h2") => "HTTP/2.0".to_string(),
        Some("h3" | "h3-29" | "quic") => "HTTP/3".to_string(),
        Some("http/1.0") => "HTTP/1.0".to_string(),
        Some("http/1.1") | None | Some("") => "HTTP/1.1".to_string(),
        Some(other) => other.to_ascii_uppercase(),
    }
}

/// Header objects map names to values; repeated headers are newline-joined.
fn name_values(headers: Option<&Value>) -> Vec<HarNameValue> {
    let Some(Value::Object(headers)) = headers else {
        return Vec::new();
    };

    let mut pairs = Vec::with_capacity(headers.len());
    for (name, value) in headers {
        match value {
            Value::String(value) => {
                for line in value.split('\n') {
                    pairs.push(HarNameValue::new(name.as_str(), line));
                }
            }
            other => pairs.push(HarNameValue::new(name.as_str(), other.to_string())),
        }
    }
    pairs
}

fn header_value<'a>(headers: &'a [HarNameValue], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

fn query_string(url: &str) -> Vec<HarNameValue> {
    Url::parse(url)
        .map(|url| {
            url.query_pairs()
                .map(|(name, value)| HarNameValue::new(name, value))
                .collect()
        })
        .unwrap_or_default()
}

fn iso_time(wall_seconds: f64) -> String {
    let millis = (wall_seconds * 1000.0).round() as i64;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

fn f64_field(value: &Value, field: &str) -> Option<f64> {
    value.get(field).and_then(Value::as_f64)
}

fn i64_field(value: &Value, field: &str) -> Option<i64> {
    value
        .get(field)
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(method: &str, params: Value) -> RecordedEvent {
        RecordedEvent::new(EventKind::from_method(method), params)
    }

    fn request(id: &str, kind: &str, url: &str, ts: f64) -> RecordedEvent {
        event(
            "Network.requestWillBeSent",
            json!({
                "requestId": id,
                "loaderId": "L1",
                "frameId": "F1",
                "type": kind,
                "timestamp": ts,
                "wallTime": 1_700_000_000.0 + ts,
                "request": {"url": url, "method": "GET", "headers": {"Accept": "*/*"}}
            }),
        )
    }

    fn response(id: &str, url: &str, body: Option<&str>) -> RecordedEvent {
        let mut response = json!({
            "url": url,
            "status": 200,
            "statusText": "OK",
            "protocol": "h2",
            "mimeType": "text/html",
            "headers": {"Content-Type": "text/html"},
            "remoteIPAddress": "[::1]",
            "connectionId": 12,
            "timing": {
                "requestTime": 10.0,
                "dnsStart": 1.0, "dnsEnd": 3.0,
                "connectStart": 3.0, "connectEnd": 8.0,
                "sslStart": 5.0, "sslEnd": 8.0,
                "sendStart": 8.0, "sendEnd": 9.0,
                "receiveHeadersEnd": 20.0
            }
        });
        if let Some(body) = body {
            response["body"] = json!(body);
        }
        event(
            "Network.responseReceived",
            json!({"requestId": id, "type": "Document", "response": response}),
        )
    }

    fn finished(id: &str, ts: f64) -> RecordedEvent {
        event(
            "Network.loadingFinished",
            json!({"requestId": id, "timestamp": ts, "encodedDataLength": 120}),
        )
    }

    fn navigation(body: Option<&str>) -> Vec<RecordedEvent> {
        vec![
            event("Page.domContentEventFired", json!({"timestamp": 10.5})),
            event("Page.loadEventFired", json!({"timestamp": 11.0})),
            event(
                "Network.requestWillBeSent",
                json!({
                    "requestId": "L1",
                    "loaderId": "L1",
                    "frameId": "F1",
                    "type": "Document",
                    "timestamp": 10.0,
                    "wallTime": 1_700_000_000.0,
                    "request": {
                        "url": "https://a.test/?q=1&x=y%20z",
                        "method": "GET",
                        "headers": {}
                    }
                }),
            ),
            response("L1", "https://a.test/", body),
            event(
                "Network.dataReceived",
                json!({"requestId": "L1", "dataLength": 5, "encodedDataLength": 0}),
            ),
            finished("L1", 10.1),
        ]
    }

    #[test]
    fn test_navigation_builds_page_and_entry() {
        let doc = MessageHarBuilder::new("probe")
            .build(&navigation(Some("hello")), BuildOptions { include_body: true })
            .unwrap();

        assert_eq!(doc.log.version, "1.2");
        assert_eq!(doc.log.creator.name, "probe");
        assert_eq!(doc.log.pages.len(), 1);

        let page = &doc.log.pages[0];
        assert_eq!(page.id, "page_1");
        assert_eq!(page.title, "https://a.test/?q=1&x=y%20z");
        assert!((page.page_timings.on_content_load - 500.0).abs() < 1e-6);
        assert!((page.page_timings.on_load - 1000.0).abs() < 1e-6);
        assert_eq!(page.started_date_time, "2023-11-14T22:13:20.000Z");

        let entry = &doc.log.entries[0];
        assert_eq!(entry.pageref.as_deref(), Some("page_1"));
        assert_eq!(entry.request_id, "L1");
        assert_eq!(entry.request.http_version, "HTTP/2.0");
        assert_eq!(
            entry.request.query_string,
            vec![HarNameValue::new("q", "1"), HarNameValue::new("x", "y z")]
        );
        assert_eq!(entry.response.status, 200);
        assert_eq!(entry.response.content.text.as_deref(), Some("hello"));
        assert_eq!(entry.response.content.size, 5);
        assert_eq!(entry.response.body_size, 120);
        assert_eq!(entry.server_ip_address.as_deref(), Some("::1"));
        assert_eq!(entry.connection.as_deref(), Some("12"));
    }

    #[test]
    fn test_timings_from_response_timing() {
        let doc = MessageHarBuilder::default()
            .build(&navigation(None), BuildOptions::default())
            .unwrap();
        let timings = doc.log.entries[0].timings;

        assert!((timings.blocked - 1.0).abs() < 1e-6);
        assert!((timings.dns - 2.0).abs() < 1e-6);
        assert!((timings.connect - 5.0).abs() < 1e-6);
        assert!((timings.ssl - 3.0).abs() < 1e-6);
        assert!((timings.send - 1.0).abs() < 1e-6);
        assert!((timings.wait - 11.0).abs() < 1e-6);
        assert!((timings.receive - 80.0).abs() < 1e-3);
        assert!((doc.log.entries[0].time - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_body_omitted_without_include_body() {
        let doc = MessageHarBuilder::default()
            .build(&navigation(Some("hello")), BuildOptions::default())
            .unwrap();
        assert!(doc.log.entries[0].response.content.text.is_none());
    }

    #[test]
    fn test_redirect_produces_two_entries() {
        let events = vec![
            request("7", "Script", "https://a.test/old.js", 1.0),
            event(
                "Network.requestWillBeSent",
                json!({
                    "requestId": "7",
                    "type": "Script",
                    "timestamp": 1.2,
                    "wallTime": 1_700_000_001.2,
                    "request": {"url": "https://a.test/new.js", "method": "GET"},
                    "redirectResponse": {
                        "url": "https://a.test/old.js",
                        "status": 302,
                        "headers": {"Location": "https://a.test/new.js"}
                    }
                }),
            ),
            response("7", "https://a.test/new.js", None),
            finished("7", 1.5),
        ];

        let doc = MessageHarBuilder::default()
            .build(&events, BuildOptions::default())
            .unwrap();

        assert_eq!(doc.log.entries.len(), 2);
        assert_eq!(doc.log.entries[0].response.status, 302);
        assert_eq!(doc.log.entries[0].response.redirect_url, "https://a.test/new.js");
        assert_eq!(doc.log.entries[1].request.url, "https://a.test/new.js");
        assert!(doc.log.pages.is_empty());
    }

    #[test]
    fn test_failed_and_unanswered_requests() {
        let events = vec![
            request("1", "XHR", "https://a.test/api", 1.0),
            request("2", "XHR", "https://a.test/gone", 2.0),
            response("1", "https://a.test/api", None),
            event(
                "Network.loadingFailed",
                json!({"requestId": "1", "timestamp": 1.1, "errorText": "net::ERR_ABORTED"}),
            ),
            event(
                "Network.loadingFailed",
                json!({"requestId": "2", "timestamp": 2.1, "errorText": "net::ERR_FAILED"}),
            ),
        ];

        let doc = MessageHarBuilder::default()
            .build(&events, BuildOptions::default())
            .unwrap();

        assert_eq!(doc.log.entries.len(), 1);
        assert_eq!(doc.log.entries[0].error.as_deref(), Some("net::ERR_ABORTED"));
    }

    #[test]
    fn test_cache_and_priority_markers() {
        let events = vec![
            request("1", "Image", "https://a.test/i.png", 1.0),
            event("Network.requestServedFromCache", json!({"requestId": "1"})),
            event(
                "Network.resourceChangedPriority",
                json!({"requestId": "1", "newPriority": "High"}),
            ),
            response("1", "https://a.test/i.png", None),
            finished("1", 1.2),
        ];

        let doc = MessageHarBuilder::default()
            .build(&events, BuildOptions::default())
            .unwrap();
        let entry = &doc.log.entries[0];

        assert_eq!(entry.from_cache.as_deref(), Some("memory"));
        assert_eq!(entry.priority.as_deref(), Some("High"));
        assert_eq!(entry.response.body_size, 0);
    }

    #[test]
    fn test_child_frame_document_does_not_open_page() {
        let events = vec![
            event(
                "Page.frameAttached",
                json!({"frameId": "F2", "parentFrameId": "F1"}),
            ),
            event(
                "Network.requestWillBeSent",
                json!({
                    "requestId": "L2",
                    "loaderId": "L2",
                    "frameId": "F2",
                    "type": "Document",
                    "timestamp": 3.0,
                    "wallTime": 1_700_000_003.0,
                    "request": {"url": "https://ads.test/frame", "method": "GET"}
                }),
            ),
            response("L2", "https://ads.test/frame", None),
        ];

        let doc = MessageHarBuilder::default()
            .build(&events, BuildOptions::default())
            .unwrap();

        assert!(doc.log.pages.is_empty());
        assert_eq!(doc.log.entries.len(), 1);
        assert!(doc.log.entries[0].pageref.is_none());
    }

    #[test]
    fn test_entries_sorted_by_start() {
        let events = vec![
            request("2", "Script", "https://a.test/b.js", 2.0),
            request("1", "Script", "https://a.test/a.js", 1.0),
            response("2", "https://a.test/b.js", None),
            response("1", "https://a.test/a.js", None),
        ];

        let doc = MessageHarBuilder::default()
            .build(&events, BuildOptions::default())
            .unwrap();
        let ids: Vec<_> = doc.log.entries.iter().map(|e| e.request_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_response_without_request_still_recorded() {
        let events = vec![
            request("1", "Script", "https://a.test/a.js", 1.0),
            response("1", "https://a.test/a.js", None),
            event(
                "Network.responseReceived",
                json!({
                    "requestId": "2",
                    "type": "XHR",
                    "timestamp": 3.0,
                    "response": {"url": "https://a.test/api", "status": 204}
                }),
            ),
            finished("2", 3.1),
        ];

        let doc = MessageHarBuilder::default()
            .build(&events, BuildOptions::default())
            .unwrap();

        assert_eq!(doc.log.entries.len(), 2);
        let orphan = &doc.log.entries[1];
        assert_eq!(orphan.request.url, "https://a.test/api");
        assert_eq!(orphan.request.method, "GET");
        assert_eq!(orphan.response.status, 204);
        assert_eq!(orphan.started_date_time, "2023-11-14T22:13:23.000Z");
    }

    #[test]
    fn test_repeated_headers_are_split() {
        let headers = name_values(Some(&json!({"Set-Cookie": "a=1\nb=2", "X-Num": 3})));
        assert_eq!(headers.len(), 3);
        assert_eq!(header_value(&headers, "x-num"), Some("3"));
    }
}
