use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use super::{Error, ErrorCode, TwirpError};

/// Terminal protocol outcome of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    Success(T),
    Failure(TwirpError),
}

impl<T> CallOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(resp) => Some(resp),
            Self::Failure(_) => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&TwirpError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }
}

/// The outer `Err` is the hard-failure channel (contract violations such as an
/// undecodable 200 body); protocol and transport failures land in
/// [`CallOutcome::Failure`].
pub type CallResult<T> = std::result::Result<CallOutcome<T>, Error>;

/// Handle over one in-flight invocation.
///
/// Exactly one terminal write happens on the dispatch side; once
/// [`PendingCall::is_done`] returns true the cached outcome never changes.
/// Await [`PendingCall::wait`] instead of polling when the caller can suspend.
#[derive(Debug)]
pub struct PendingCall<T> {
    rx: Option<oneshot::Receiver<CallResult<T>>>,
    outcome: Option<CallResult<T>>,
}

impl<T> PendingCall<T> {
    pub(crate) fn new(rx: oneshot::Receiver<CallResult<T>>) -> Self {
        Self {
            rx: Some(rx),
            outcome: None,
        }
    }

    // The dispatch task reports exactly once; a dropped sender means the host
    // tore the task down mid-flight.
    fn canceled() -> CallResult<T> {
        Ok(CallOutcome::Failure(TwirpError::new(
            ErrorCode::Canceled,
            "dispatch was canceled before completing",
        )))
    }

    /// Non-blocking completion check, usable from a poll-each-tick loop.
    pub fn is_done(&mut self) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        let Some(rx) = self.rx.as_mut() else {
            return true;
        };
        match rx.try_recv() {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.rx = None;
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Closed) => {
                self.outcome = Some(Self::canceled());
                self.rx = None;
                true
            }
        }
    }

    /// The terminal outcome, once [`PendingCall::is_done`] has returned true.
    #[must_use]
    pub fn outcome(&self) -> Option<&CallResult<T>> {
        self.outcome.as_ref()
    }

    /// Suspends until the invocation reaches its terminal state.
    pub async fn wait(mut self) -> CallResult<T> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        match self.rx.take() {
            Some(rx) => rx.await.unwrap_or_else(|_| Self::canceled()),
            None => Self::canceled(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn torn_down_dispatch_resolves_as_canceled() {
        let (tx, rx) = oneshot::channel::<CallResult<u32>>();
        drop(tx);

        let call = PendingCall::new(rx);
        let outcome = call.wait().await.unwrap();

        let error = outcome.failure().unwrap();
        assert_eq!(error.error_code(), Some(ErrorCode::Canceled));
    }

    #[tokio::test]
    async fn is_done_caches_the_terminal_state() {
        let (tx, rx) = oneshot::channel::<CallResult<u32>>();
        let mut call = PendingCall::new(rx);

        assert!(!call.is_done());
        assert!(call.outcome().is_none());

        tx.send(Ok(CallOutcome::Success(7))).unwrap();

        assert!(call.is_done());
        assert!(call.is_done());
        let outcome = call.outcome().unwrap().as_ref().unwrap();
        assert_eq!(outcome.failure(), None);
        assert_eq!(call.wait().await.unwrap().success(), Some(7));
    }
}
