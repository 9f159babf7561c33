use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ErrorCode;

/// Meta key carrying the transport failure classification on synthesized
/// `internal` envelopes (parses back into [`crate::TransportErrorKind`]).
pub const META_TRANSPORT_ERROR_KIND: &str = "transport_error_kind";

/// The Twirp error envelope: the JSON body of every non-200 response.
///
/// `code` is kept as a plain string so codes outside the canonical set
/// round-trip verbatim; use [`TwirpError::error_code`] for the taxonomy
/// lookup. The wire field for the message is `msg`, but `message` is accepted
/// on decode as well — older servers emit that spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwirpError {
    pub code: String,
    #[serde(rename = "msg", alias = "message")]
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
}

impl TwirpError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            meta: BTreeMap::new(),
        }
    }

    /// Synthesized envelope for failures that never produced a protocol-level
    /// error body (transport failures, unparseable error pages).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Taxonomy lookup; `None` when the server sent a code we don't know.
    #[must_use]
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(&self.code)
    }

    /// HTTP status implied by the code, 500 when the code is unrecognized.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.error_code().map_or(500, ErrorCode::http_status)
    }

    /// Decodes a non-200 response body into an envelope.
    ///
    /// Two-path decode: a well-formed JSON envelope is taken as-is; anything
    /// else (HTML error page, truncated body, proxy noise) is folded into a
    /// synthesized `internal` envelope that keeps the status line text and the
    /// raw body, so diagnostics are never dropped.
    #[must_use]
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(envelope) => envelope,
            Err(_) => {
                let raw = String::from_utf8_lossy(body);
                let reason = http::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason());
                let message = match reason {
                    Some(reason) => {
                        format!("unexpected error body for HTTP {status} {reason}: {raw}")
                    }
                    None => format!("unexpected error body for HTTP {status}: {raw}"),
                };
                Self::internal(message)
            }
        }
    }
}

impl fmt::Display for TwirpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "twirp error {}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn decodes_canonical_body() {
        let body = br#"{"code":"not_found","msg":"no such widget","meta":{"id":"42"}}"#;
        let e = TwirpError::from_response(404, body);

        assert_eq!(e.code, "not_found");
        assert_eq!(e.message, "no such widget");
        assert_eq!(e.meta["id"], "42");
        assert_eq!(e.error_code(), Some(ErrorCode::NotFound));
        assert_eq!(e.http_status(), 404);
    }

    #[test]
    fn accepts_legacy_message_spelling() {
        let body = br#"{"code":"permission_denied","message":"nope"}"#;
        let e = TwirpError::from_response(403, body);

        assert_eq!(e.code, "permission_denied");
        assert_eq!(e.message, "nope");
        assert!(e.meta.is_empty());
    }

    #[test]
    fn absent_meta_defaults_to_empty() {
        let e = TwirpError::from_response(409, br#"{"code":"aborted","msg":"try again"}"#);
        assert!(e.meta.is_empty());
    }

    #[test]
    fn unrecognized_code_round_trips() {
        let e = TwirpError::from_response(418, br#"{"code":"teapot","msg":"short and stout"}"#);

        assert_eq!(e.code, "teapot");
        assert_eq!(e.error_code(), None);
        assert_eq!(e.http_status(), 500);

        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["code"], "teapot");
    }

    #[test]
    fn non_json_body_becomes_internal_with_diagnostics() {
        let e = TwirpError::from_response(503, b"<html>upstream sad</html>");

        assert_eq!(e.code, "internal");
        assert!(e.message.contains("503 Service Unavailable"));
        assert!(e.message.contains("<html>upstream sad</html>"));
    }

    #[test]
    fn serializes_with_msg_key() {
        let e = TwirpError::new(ErrorCode::Unavailable, "maintenance").with_meta("until", "noon");
        let json = serde_json::to_value(&e).unwrap();

        assert_eq!(json["code"], "unavailable");
        assert_eq!(json["msg"], "maintenance");
        assert!(json.get("message").is_none());
        assert_eq!(json["meta"]["until"], "noon");
    }
}
