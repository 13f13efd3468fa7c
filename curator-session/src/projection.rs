//! Uniform `{data, loading, error}` view over one-shot async operations.

use crate::error::ErrorMessage;
use std::future::Future;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::watch;
use tracing::trace;

/// What a screen renders for an async operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionState<T> {
    /// Result of the latest successful call.
    pub data: Option<T>,
    /// True while the latest call is in flight.
    pub loading: bool,
    /// Message of the latest failed call.
    pub error: Option<String>,
}

impl<T> Default for ProjectionState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// Runs operations and records their outcome.
///
/// Clones share state. Overlapping `execute` calls are not queued or
/// coalesced: the state follows the most recently started call and results of
/// earlier calls are dropped when they land.
#[derive(Debug, Clone)]
pub struct Projection<T> {
    state: Arc<watch::Sender<ProjectionState<T>>>,
    calls: Arc<AtomicU64>,
}

impl<T> Default for Projection<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(watch::Sender::new(ProjectionState::default())),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<T: Clone> Projection<T> {
    /// Idle projection with no data and no error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> ProjectionState<T> {
        self.state.borrow().clone()
    }

    /// Last successful result, if the latest call succeeded.
    #[must_use]
    pub fn data(&self) -> Option<T> {
        self.state.borrow().data.clone()
    }

    /// True while the latest call is running.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Message of the latest call's failure.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProjectionState<T>> {
        self.state.subscribe()
    }

    /// Run `operation`, publishing loading, then data or error.
    ///
    /// The operation's own result is handed back to the caller unchanged.
    ///
    /// # Errors
    /// Returns whatever error `operation` resolved to.
    pub async fn execute<F, E>(&self, operation: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: ErrorMessage,
    {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(ProjectionState {
            data: None,
            loading: true,
            error: None,
        });

        let result = operation.await;

        if self.calls.load(Ordering::SeqCst) == call {
            let settled = match &result {
                Ok(data) => ProjectionState {
                    data: Some(data.clone()),
                    loading: false,
                    error: None,
                },
                Err(err) => ProjectionState {
                    data: None,
                    loading: false,
                    error: Some(err.error_message()),
                },
            };
            self.state.send_replace(settled);
        } else {
            trace!(call, "dropping result of superseded call");
        }
        result
    }
}
