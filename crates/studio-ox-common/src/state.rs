//! Loading/error bookkeeping around async calls.
//!
//! A [`RequestTracker`] owns one [`RequestState`] slot and publishes every
//! change through a `tokio::sync::watch` channel so a UI can observe it.

use std::future::Future;

use tokio::sync::watch;

use crate::error::{UserMessage, user_message};

/// Observable state of one operation slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestState {
    /// True strictly between call start and settlement, or until the call is dropped
    pub loading: bool,
    /// Message of the last failed settlement, cleared when the next call starts
    pub error: Option<String>,
}

/// Tracks loading and error state for repeated invocations of one operation.
#[derive(Debug)]
pub struct RequestTracker {
    state: watch::Sender<RequestState>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RequestState::default());
        Self { state }
    }

    /// Receiver that sees every subsequent state change.
    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> RequestState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Record an error without running a call (e.g. a failed precondition).
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.send_modify(|state| state.error = Some(message));
    }

    pub fn clear_error(&self) {
        self.state.send_modify(|state| state.error = None);
    }

    /// Run `call`, recording its failure in the state instead of returning it.
    ///
    /// Returns `None` when the call failed; the message is then in [`Self::error`].
    pub async fn run<T, E, Fut>(&self, call: Fut) -> Option<T>
    where
        Fut: Future<Output = Result<T, E>>,
        E: UserMessage,
    {
        self.track(call).await.ok()
    }

    /// Like [`Self::run`] but hands the error back after recording it.
    pub async fn track<T, E, Fut>(&self, call: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: UserMessage,
    {
        self.begin();
        let mut in_flight = InFlight {
            tracker: self,
            settled: false,
        };
        let result = call.await;
        in_flight.settled = true;
        match &result {
            Ok(_) => self.settle(None),
            Err(err) => self.settle(Some(user_message(err))),
        }
        result
    }

    fn begin(&self) {
        self.state.send_replace(RequestState {
            loading: true,
            error: None,
        });
    }

    fn settle(&self, error: Option<String>) {
        if let Some(message) = &error {
            log::debug!("request settled with error: {message}");
        }
        self.state.send_replace(RequestState {
            loading: false,
            error,
        });
    }
}

/// Clears `loading` when a tracked call is dropped before it settles.
struct InFlight<'a> {
    /// Tracker whose slot the call owns
    tracker: &'a RequestTracker,
    /// Set once the call completed and `settle` takes over
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::debug!("request dropped before settling");
            self.tracker.state.send_replace(RequestState::default());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::{CommonRequestError, UNKNOWN_ERROR};

    #[tokio::test]
    async fn success_clears_loading_and_leaves_no_error() {
        let tracker = RequestTracker::new();
        tracker.set_error("stale");

        let result = tracker
            .run(async {
                assert_eq!(
                    tracker.snapshot(),
                    RequestState { loading: true, error: None }
                );
                Ok::<_, CommonRequestError>(42)
            })
            .await;

        assert_eq!(result, Some(42));
        assert_eq!(tracker.snapshot(), RequestState::default());
    }

    #[tokio::test]
    async fn failure_is_recorded_not_propagated() {
        let tracker = RequestTracker::new();

        let result: Option<()> = tracker
            .run(async {
                Err(CommonRequestError::Api {
                    status: 404,
                    message: "template not found".into(),
                })
            })
            .await;

        assert!(result.is_none());
        assert!(!tracker.is_loading());
        assert_eq!(tracker.error().as_deref(), Some("template not found"));
    }

    #[tokio::test]
    async fn empty_messages_fall_back_to_unknown_error() {
        let tracker = RequestTracker::new();
        let _ = tracker
            .run(async { Err::<(), _>(CommonRequestError::Rejected(String::new())) })
            .await;
        assert_eq!(tracker.error().as_deref(), Some(UNKNOWN_ERROR));
    }

    #[tokio::test]
    async fn next_call_clears_previous_error() {
        let tracker = RequestTracker::new();
        let mut rx = tracker.subscribe();

        let _ = tracker
            .run(async { Err::<(), _>(CommonRequestError::Rejected("boom".into())) })
            .await;
        assert_eq!(tracker.error().as_deref(), Some("boom"));

        rx.mark_unchanged();
        let _ = tracker.run(async { Ok::<_, CommonRequestError>(()) }).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), RequestState::default());
    }

    #[tokio::test]
    async fn track_returns_the_error_after_recording_it() {
        let tracker = RequestTracker::new();
        let result = tracker
            .track(async { Err::<(), _>(CommonRequestError::Rejected("parse failed".into())) })
            .await;

        assert!(matches!(result, Err(CommonRequestError::Rejected(_))));
        assert_eq!(tracker.error().as_deref(), Some("parse failed"));
        assert!(!tracker.is_loading());
    }

    #[tokio::test]
    async fn abandoned_call_does_not_stay_loading() {
        let tracker = RequestTracker::new();
        let mut rx = tracker.subscribe();

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            tracker.run(std::future::pending::<Result<(), CommonRequestError>>()),
        )
        .await;

        assert!(timed_out.is_err());
        assert!(!tracker.is_loading());
        assert_eq!(tracker.snapshot(), RequestState::default());
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().loading);
    }
}
