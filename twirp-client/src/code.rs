/// The canonical Twirp error code set.
///
/// The wire spelling is the snake_case form (`"not_found"`, `"dataloss"`, ...),
/// produced by `Display` and parsed by `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    Canceled,
    Unknown,
    InvalidArgument,
    Malformed,
    DeadlineExceeded,
    NotFound,
    BadRoute,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    Dataloss,
}

impl ErrorCode {
    /// HTTP status a Twirp server responds with for this code.
    ///
    /// Total and deterministic, but not injective: several codes share a
    /// status (e.g. `unknown`, `internal` and `dataloss` are all 500).
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidArgument | Self::Malformed | Self::OutOfRange => 400,
            Self::Unauthenticated => 401,
            Self::PermissionDenied => 403,
            Self::NotFound | Self::BadRoute => 404,
            Self::Canceled | Self::DeadlineExceeded => 408,
            Self::AlreadyExists | Self::Aborted => 409,
            Self::FailedPrecondition => 412,
            Self::ResourceExhausted => 429,
            Self::Unknown | Self::Internal | Self::Dataloss => 500,
            Self::Unimplemented => 501,
            Self::Unavailable => 503,
        }
    }

    /// Looks up a canonical code by its wire spelling.
    ///
    /// Returns `None` for codes outside the canonical set; the protocol does
    /// not require rejecting those, so this is a convenience, not a validator.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        code.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn wire_spelling_round_trips() {
        assert_eq!(ErrorCode::NotFound.to_string(), "not_found");
        assert_eq!(ErrorCode::Dataloss.to_string(), "dataloss");
        assert_eq!(ErrorCode::from_code("not_found"), Some(ErrorCode::NotFound));
        assert_eq!(
            ErrorCode::from_code("failed_precondition"),
            Some(ErrorCode::FailedPrecondition)
        );
    }

    #[test]
    fn unknown_spelling_is_none() {
        assert_eq!(ErrorCode::from_code("no_such_code"), None);
        assert_eq!(ErrorCode::from_code(""), None);
        // Lookup is by the exact wire spelling, not the variant name.
        assert_eq!(ErrorCode::from_code("NotFound"), None);
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorCode::Canceled.http_status(), 408);
        assert_eq!(ErrorCode::InvalidArgument.http_status(), 400);
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::PermissionDenied.http_status(), 403);
        assert_eq!(ErrorCode::Unauthenticated.http_status(), 401);
        assert_eq!(ErrorCode::ResourceExhausted.http_status(), 429);
        assert_eq!(ErrorCode::FailedPrecondition.http_status(), 412);
        assert_eq!(ErrorCode::Unimplemented.http_status(), 501);
        assert_eq!(ErrorCode::Unavailable.http_status(), 503);
    }

    #[test]
    fn status_mapping_is_not_injective() {
        assert_eq!(ErrorCode::Unknown.http_status(), 500);
        assert_eq!(ErrorCode::Internal.http_status(), 500);
        assert_eq!(ErrorCode::Dataloss.http_status(), 500);
        assert_eq!(ErrorCode::NotFound.http_status(), ErrorCode::BadRoute.http_status());
        assert_eq!(
            ErrorCode::AlreadyExists.http_status(),
            ErrorCode::Aborted.http_status()
        );
    }
}
