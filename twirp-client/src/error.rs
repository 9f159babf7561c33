pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a dispatch that never obtained a usable HTTP response.
///
/// These never surface as [`Error`]; they are folded into a synthesized
/// `internal` envelope, with the kind recorded under the
/// [`crate::META_TRANSPORT_ERROR_KIND`] meta key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransportErrorKind {
    Request,
    Timeout,
    BodyRead,
}

/// Hard failures: contract and programming errors, as opposed to protocol or
/// transport failures, which resolve into a `TwirpError` envelope instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("only http:// and https:// base urls are supported: {0}")]
    UnsupportedScheme(String),

    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("invalid http header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid http header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    /// A 200 response whose body is not the expected message. The server broke
    /// the contract; there is no envelope to hand back.
    #[error("failed to decode response body as the expected message: {0}")]
    ResponseDecode(#[from] prost::DecodeError),
}
