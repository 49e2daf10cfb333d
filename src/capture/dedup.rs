//! Duplicate response body suppression

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::entry::LogicalResourceKey;

#[derive(Debug)]
struct SeenBody {
    owner: String,
    body: String,
}

/// Session-scoped cache of the first body captured per logical resource
#[derive(Debug, Default)]
pub struct BodyDeduplicator {
    seen: Mutex<HashMap<LogicalResourceKey, SeenBody>>,
}

impl BodyDeduplicator {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide which body `request_id` keeps for `key`.
    ///
    /// The first request to supply a body for a key owns it and always keeps
    /// its body. Another request with an identical body gets `None`; one with
    /// different content keeps its own body and is reported.
    pub fn reconcile(
        &self,
        key: &LogicalResourceKey,
        request_id: &str,
        body: String,
    ) -> Option<String> {
        let mut seen = self.seen.lock();

        let Some(first) = seen.get_mut(key) else {
            seen.insert(
                key.clone(),
                SeenBody {
                    owner: request_id.to_string(),
                    body: body.clone(),
                },
            );
            return Some(body);
        };

        if first.owner == request_id {
            first.body.clone_from(&body);
            return Some(body);
        }

        if first.body == body {
            debug!(
                "Dropping duplicate body for {} (request {}, first seen on {})",
                key, request_id, first.owner
            );
            None
        } else {
            warn!(
                "Inconsistent content for {} across requests {} and {}",
                key, first.owner, request_id
            );
            Some(body)
        }
    }

    /// Number of distinct keys seen
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Whether no key has been seen
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    /// Forget every key
    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}
