//! Debugging-protocol session seam
//!
//! Attaching to a browser and framing protocol messages live outside this
//! crate; the recorder only needs to issue commands and register handlers.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

pub use memory::MemorySession;

/// Enables page lifecycle events
pub const PAGE_ENABLE: &str = "Page.enable";

/// Enables network events
pub const NETWORK_ENABLE: &str = "Network.enable";

/// Retrieves a response body out-of-band
pub const GET_RESPONSE_BODY: &str = "Network.getResponseBody";

/// Callback invoked with the parameters of each delivered event
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// An attached protocol session
#[async_trait]
pub trait ProtocolSession: Send + Sync {
    /// Issue a command and wait for its result
    async fn send(&self, command: &str, params: Value) -> Result<Value>;

    /// Register `handler` for every event named `method`.
    ///
    /// Handlers are invoked in delivery order for a given method.
    fn on(&self, method: &str, handler: EventHandler);

    /// Detach from the target
    async fn detach(&self) -> Result<()>;
}
