use std::time::Duration;

use async_trait::async_trait;

use super::TwirpError;

/// Per-invocation request context, visible to hooks.
///
/// `headers` is writable only during the started phase; whatever is in it when
/// the last started hook returns is what goes on the wire.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Method path as passed to `invoke`, e.g. `"pkg.Service/Method"`.
    pub path: String,
    /// Full POST endpoint URL.
    pub url: String,
    /// Extra request headers, on top of the content headers the client sets.
    pub headers: Vec<(String, String)>,
}

/// Read-only view of a finished invocation handed to finished hooks.
#[derive(Debug, Clone)]
pub struct CallSummary {
    pub ok: bool,
    /// HTTP status, when a response was obtained at all.
    pub http_status: Option<u16>,
    /// The envelope the call failed with, for protocol and transport failures.
    pub error: Option<TwirpError>,
    pub elapsed: Duration,
}

/// Lifecycle observer. Hooks see every invocation exactly twice, strictly
/// before dispatch and strictly after the terminal state is fixed, in
/// registration order. They observe the outcome; they cannot veto it.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn on_request_started(&self, _ctx: &mut CallContext) {}

    async fn on_request_finished(&self, _ctx: &CallContext, _summary: &CallSummary) {}
}
