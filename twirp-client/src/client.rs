use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use prost::Message;
use tokio::sync::oneshot;

use super::call::{CallOutcome, CallResult, PendingCall};
use super::envelope::META_TRANSPORT_ERROR_KIND;
use super::error::TransportErrorKind;
use super::hook::{CallContext, CallSummary, Hook};
use super::{Error, Result, TwirpError};

pub const CONTENT_TYPE_PROTOBUF: &str = "application/protobuf";

#[derive(Clone)]
pub struct ClientOptions {
    /// Server path prefix, no trailing slash. `"/twirp"` unless the server
    /// was mounted elsewhere.
    pub prefix: String,
    /// Per-call deadline covering the whole HTTP exchange.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Lifecycle observers, invoked in this order.
    pub hooks: Vec<Arc<dyn Hook>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        // The OS-level TCP connect timeout can be very long (tens of seconds),
        // which makes an unreachable server look like a hung call.
        //
        // We apply a sane default so failed connects surface promptly.
        Self {
            prefix: "/twirp".to_string(),
            timeout: None,
            connect_timeout: Some(Duration::from_secs(3)),
            hooks: Vec::new(),
        }
    }
}

/// Either a hard failure or a transport failure destined for a synthesized
/// `internal` envelope; protocol-level errors never go through here.
enum DispatchError {
    Fatal(Error),
    Transport(TransportErrorKind, String),
}

/// A Twirp client bound to one server.
///
/// Configured once and read-only afterwards; invocations share nothing beyond
/// this configuration, so a clone or concurrent calls never interfere.
#[derive(Clone)]
pub struct TwirpClient {
    http: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    base_url: Arc<str>,
    prefix: Arc<str>,
    timeout: Option<Duration>,
    hooks: Arc<[Arc<dyn Hook>]>,
}

impl fmt::Debug for TwirpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwirpClient")
            .field("base_url", &self.base_url)
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl TwirpClient {
    pub fn new(base_url: impl Into<String>, opts: ClientOptions) -> Result<Self> {
        let base_url = base_url.into();
        let parsed =
            url::Url::parse(&base_url).map_err(|_| Error::InvalidUrl(base_url.clone()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::UnsupportedScheme(base_url));
        }

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(opts.connect_timeout);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let http = Client::builder(TokioExecutor::new()).build(https_connector);

        Ok(Self {
            http,
            base_url: base_url.into(),
            prefix: opts.prefix.into(),
            timeout: opts.timeout,
            hooks: Arc::from(opts.hooks.into_boxed_slice()),
        })
    }

    /// Issues one `POST {base}{prefix}/{path}` carrying the encoded request
    /// and returns immediately; the returned handle resolves to the terminal
    /// outcome. Exactly one request goes out per call, no retries.
    ///
    /// `path` is the method path without a leading slash, the way generated
    /// stubs supply it: `"pkg.Service/Method"`.
    pub fn invoke<Req, Resp>(&self, path: &str, req: &Req) -> PendingCall<Resp>
    where
        Req: Message,
        Resp: Message + Default + 'static,
    {
        let ctx = CallContext {
            path: path.to_string(),
            url: endpoint_url(&self.base_url, &self.prefix, path),
            headers: Vec::new(),
        };
        let body = Bytes::from(req.encode_to_vec());

        let (tx, rx) = oneshot::channel();
        let client = self.clone();
        tokio::spawn(async move {
            // A dropped receiver just means nobody is watching anymore.
            let _ = tx.send(client.dispatch(ctx, body).await);
        });

        PendingCall::new(rx)
    }

    /// Runs one full lifecycle: started hooks, dispatch, classification,
    /// finished hooks. The summary handed to finished hooks is built after the
    /// terminal result is fixed and shared immutably.
    async fn dispatch<Resp>(&self, mut ctx: CallContext, body: Bytes) -> CallResult<Resp>
    where
        Resp: Message + Default,
    {
        for hook in self.hooks.iter() {
            hook.on_request_started(&mut ctx).await;
        }

        let started = Instant::now();
        let (http_status, result) = self.round_trip::<Resp>(&ctx, body).await;
        let elapsed = started.elapsed();

        let summary = CallSummary {
            ok: matches!(result, Ok(CallOutcome::Success(_))),
            http_status,
            error: match &result {
                Ok(CallOutcome::Failure(error)) => Some(error.clone()),
                _ => None,
            },
            elapsed,
        };

        for hook in self.hooks.iter() {
            hook.on_request_finished(&ctx, &summary).await;
        }

        result
    }

    /// Response classification:
    /// - no response obtained: failure with a synthesized `internal` envelope;
    /// - 200: the body must decode as `Resp`, anything else is a hard failure;
    /// - any other status: the body is an envelope, the numeric status itself
    ///   is informational only.
    async fn round_trip<Resp>(
        &self,
        ctx: &CallContext,
        body: Bytes,
    ) -> (Option<u16>, CallResult<Resp>)
    where
        Resp: Message + Default,
    {
        match self.send(ctx, body).await {
            Err(DispatchError::Fatal(err)) => (None, Err(err)),
            Err(DispatchError::Transport(kind, message)) => {
                let envelope = TwirpError::internal(message)
                    .with_meta(META_TRANSPORT_ERROR_KIND, kind.to_string());
                (None, Ok(CallOutcome::Failure(envelope)))
            }
            Ok((status, body)) if status == 200 => match Resp::decode(body) {
                Ok(resp) => (Some(status), Ok(CallOutcome::Success(resp))),
                Err(err) => (Some(status), Err(Error::ResponseDecode(err))),
            },
            Ok((status, body)) => (
                Some(status),
                Ok(CallOutcome::Failure(TwirpError::from_response(status, &body))),
            ),
        }
    }

    async fn send(
        &self,
        ctx: &CallContext,
        body: Bytes,
    ) -> std::result::Result<(u16, Bytes), DispatchError> {
        let uri: hyper::Uri = ctx
            .url
            .parse()
            .map_err(|_| DispatchError::Fatal(Error::InvalidUrl(ctx.url.clone())))?;

        let mut builder = Request::builder()
            .method(http::Method::POST)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, CONTENT_TYPE_PROTOBUF)
            .header(http::header::CONTENT_LENGTH, body.len());

        for (k, v) in &ctx.headers {
            let name = http::header::HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| DispatchError::Fatal(Error::HeaderName(e)))?;
            let value = http::header::HeaderValue::from_str(v)
                .map_err(|e| DispatchError::Fatal(Error::HeaderValue(e)))?;
            builder = builder.header(name, value);
        }

        let req: Request<Full<Bytes>> = builder
            .body(Full::new(body))
            .map_err(|e| DispatchError::Fatal(Error::RequestBuild(e)))?;

        let res: hyper::Response<Incoming> = if let Some(timeout) = self.timeout {
            match tokio::time::timeout(timeout, self.http.request(req)).await {
                Ok(res) => res.map_err(|e| {
                    DispatchError::Transport(TransportErrorKind::Request, e.to_string())
                })?,
                Err(_) => {
                    return Err(DispatchError::Transport(
                        TransportErrorKind::Timeout,
                        format!("request timed out after {timeout:?}"),
                    ));
                }
            }
        } else {
            self.http.request(req).await.map_err(|e| {
                DispatchError::Transport(TransportErrorKind::Request, e.to_string())
            })?
        };

        let (parts, body) = res.into_parts();
        let status = parts.status.as_u16();
        let body = body
            .collect()
            .await
            .map_err(|e| DispatchError::Transport(TransportErrorKind::BodyRead, e.to_string()))?
            .to_bytes();

        Ok((status, body))
    }
}

/// Pure concatenation, no slash normalization. The prefix
/// carries its leading slash and no trailing one; the path has no leading
/// slash.
fn endpoint_url(base: &str, prefix: &str, path: &str) -> String {
    format!("{base}{prefix}/{path}")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn endpoint_url_is_pure_concatenation() {
        assert_eq!(
            endpoint_url("http://localhost:8080", "/twirp", "pkg.Svc/Method"),
            "http://localhost:8080/twirp/pkg.Svc/Method"
        );
        // No normalization: a sloppy prefix shows up verbatim.
        assert_eq!(
            endpoint_url("http://h", "/twirp/", "pkg.Svc/Method"),
            "http://h/twirp//pkg.Svc/Method"
        );
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = TwirpClient::new("ftp://example.com", ClientOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(_)));
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = TwirpClient::new("not a url", ClientOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
