use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use prost::Message as _;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub mod proto;

pub const PREFIX: &str = "/twirp";

/// Method paths as a Twirp client supplies them (no leading slash).
pub const METHOD_ECHO: &str = "test.EchoService/Echo";
pub const METHOD_FAIL: &str = "test.EchoService/Fail";
pub const METHOD_FAIL_LEGACY: &str = "test.EchoService/FailLegacy";
pub const METHOD_GARBAGE: &str = "test.EchoService/Garbage";
pub const METHOD_CORRUPT: &str = "test.EchoService/Corrupt";
pub const METHOD_SLOW: &str = "test.EchoService/Slow";

pub const PATH_ECHO: &str = "/twirp/test.EchoService/Echo";
pub const PATH_FAIL: &str = "/twirp/test.EchoService/Fail";
pub const PATH_FAIL_LEGACY: &str = "/twirp/test.EchoService/FailLegacy";
pub const PATH_GARBAGE: &str = "/twirp/test.EchoService/Garbage";
pub const PATH_CORRUPT: &str = "/twirp/test.EchoService/Corrupt";
pub const PATH_SLOW: &str = "/twirp/test.EchoService/Slow";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    saw_protobuf_content_type: Arc<AtomicU64>,
    saw_hook_header: Arc<AtomicU64>,
}

impl TestServerStats {
    fn observe(&self, headers: &HeaderMap) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().starts_with("application/protobuf"))
        {
            self.saw_protobuf_content_type.fetch_add(1, Ordering::Relaxed);
        }
        if headers.get("x-test").and_then(|v| v.to_str().ok()) == Some("1") {
            self.saw_hook_header.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn saw_protobuf_content_type(&self) -> u64 {
        self.saw_protobuf_content_type.load(Ordering::Relaxed)
    }

    pub fn saw_hook_header(&self) -> u64 {
        self.saw_hook_header.load(Ordering::Relaxed)
    }
}

fn twirp_error(status: StatusCode, body: serde_json::Value) -> Response {
    (status, axum::Json(body)).into_response()
}

/// Echoes the request message back; a `x-request-id` header, if present, is
/// reflected into the response so header-mutating hooks can be observed
/// end-to-end.
async fn handle_echo(
    State(stats): State<TestServerStats>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stats.observe(&headers);

    let req = match proto::EchoRequest::decode(body) {
        Ok(req) => req,
        Err(e) => {
            return twirp_error(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"code": "malformed", "msg": e.to_string()}),
            );
        }
    };

    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let res = proto::EchoResponse {
        message: req.message,
        request_id,
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/protobuf")],
        Bytes::from(res.encode_to_vec()),
    )
        .into_response()
}

async fn handle_fail(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    stats.observe(&headers);
    twirp_error(
        StatusCode::NOT_FOUND,
        serde_json::json!({
            "code": "not_found",
            "msg": "no such widget",
            "meta": {"id": "42"},
        }),
    )
}

// Older servers spell the message field "message"; clients must accept both.
async fn handle_fail_legacy(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    stats.observe(&headers);
    twirp_error(
        StatusCode::FORBIDDEN,
        serde_json::json!({
            "code": "permission_denied",
            "message": "members only",
        }),
    )
}

/// A misbehaving upstream: non-JSON error page.
async fn handle_garbage(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    stats.observe(&headers);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, "text/html")],
        "<html>service unavailable</html>",
    )
        .into_response()
}

/// A contract violation: HTTP 200 with bytes that are not a valid message.
async fn handle_corrupt(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    stats.observe(&headers);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/protobuf")],
        Bytes::from_static(&[0xff; 8]),
    )
        .into_response()
}

async fn handle_slow(State(stats): State<TestServerStats>, headers: HeaderMap) -> Response {
    stats.observe(&headers);
    sleep(Duration::from_secs(2)).await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/protobuf")],
        Bytes::from(proto::EchoResponse::default().encode_to_vec()),
    )
        .into_response()
}

pub fn router(stats: TestServerStats) -> Router {
    Router::new()
        .route(PATH_ECHO, post(handle_echo))
        .route(PATH_FAIL, post(handle_fail))
        .route(PATH_FAIL_LEGACY, post(handle_fail_legacy))
        .route(PATH_GARBAGE, post(handle_garbage))
        .route(PATH_CORRUPT, post(handle_corrupt))
        .route(PATH_SLOW, post(handle_slow))
        .with_state(stats)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}
