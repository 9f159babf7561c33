#![forbid(unsafe_code)]

mod call;
mod client;
mod code;
mod envelope;
mod error;
mod hook;

pub use call::{CallOutcome, CallResult, PendingCall};
pub use client::{CONTENT_TYPE_PROTOBUF, ClientOptions, TwirpClient};
pub use code::ErrorCode;
pub use envelope::{META_TRANSPORT_ERROR_KIND, TwirpError};
pub use error::{Error, Result, TransportErrorKind};
pub use hook::{CallContext, CallSummary, Hook};
