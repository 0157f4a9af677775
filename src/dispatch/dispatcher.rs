use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

use crate::error::{Result, StoreError};

/// A queued request to run the reducers for `action`.
#[derive(Debug)]
pub struct ActionRequest {
    pub action: String,
    pub payload: Option<Value>,
    completion: oneshot::Sender<Result<()>>,
}

impl ActionRequest {
    /// Create a request together with the handle that observes its completion.
    pub fn new(action: impl Into<String>, payload: Option<Value>) -> (Self, Dispatched) {
        let (completion, rx) = oneshot::channel();
        let request = Self {
            action: action.into(),
            payload,
            completion,
        };
        (request, Dispatched { rx })
    }

    /// Resolve the handle. A dropped handle is not an error.
    pub fn complete(self, result: Result<()>) {
        let _ = self.completion.send(result);
    }
}

/// Completion signal for a dispatched action.
///
/// Resolves once the action's reducers ran and every notification was
/// delivered, or immediately with an error if the dispatch was rejected.
/// Await it, or call [`Dispatched::wait`] outside an async context.
#[derive(Debug)]
pub struct Dispatched {
    rx: oneshot::Receiver<Result<()>>,
}

impl Dispatched {
    pub(crate) fn rejected(err: StoreError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self { rx }
    }

    /// Block the current thread until the action completes.
    ///
    /// Must not be called from within an async runtime, nor from a reducer
    /// or subscriber of the same store (the action cannot start until the
    /// current one returns).
    pub fn wait(self) -> Result<()> {
        self.rx.blocking_recv().unwrap_or(Err(StoreError::Abandoned))
    }

    /// Take the result if the action already completed.
    ///
    /// Returns `None` while the action is still queued or running.
    pub fn try_result(&mut self) -> Option<Result<()>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(StoreError::Abandoned)),
        }
    }
}

impl Future for Dispatched {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(StoreError::Abandoned)))
    }
}

/// Busy flag plus FIFO of actions waiting for their turn.
#[derive(Debug, Default)]
pub struct ActionDispatcher {
    busy: bool,
    pending: VecDeque<ActionRequest>,
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request. Returns `true` when the dispatcher was idle: the
    /// caller now owns the busy flag and must drain with [`Self::next`].
    pub fn enqueue(&mut self, request: ActionRequest) -> bool {
        self.pending.push_back(request);
        if self.busy {
            false
        } else {
            self.busy = true;
            true
        }
    }

    /// Next request to run, or `None` after clearing the busy flag.
    pub fn next(&mut self) -> Option<ActionRequest> {
        let request = self.pending.pop_front();
        if request.is_none() {
            self.busy = false;
        }
        request
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_enqueue_takes_busy_flag() {
        let mut dispatcher = ActionDispatcher::new();
        let (a, _) = ActionRequest::new("A", None);
        let (b, _) = ActionRequest::new("B", None);

        assert!(dispatcher.enqueue(a));
        assert!(dispatcher.is_busy());
        assert!(!dispatcher.enqueue(b));
        assert_eq!(dispatcher.pending(), 2);
    }

    #[test]
    fn drains_fifo_then_goes_idle() {
        let mut dispatcher = ActionDispatcher::new();
        for key in ["A", "B", "C"] {
            let (request, _) = ActionRequest::new(key, None);
            dispatcher.enqueue(request);
        }

        let order: Vec<String> = std::iter::from_fn(|| dispatcher.next())
            .map(|r| r.action)
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert!(!dispatcher.is_busy());
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn handle_observes_completion() {
        let (request, mut handle) = ActionRequest::new("A", None);
        assert!(handle.try_result().is_none());
        request.complete(Ok(()));
        assert_eq!(handle.try_result(), Some(Ok(())));
    }

    #[test]
    fn dropped_request_abandons_handle() {
        let (request, handle) = ActionRequest::new("A", None);
        drop(request);
        assert_eq!(handle.wait(), Err(StoreError::Abandoned));
    }

    #[test]
    fn rejected_handle_carries_error() {
        let handle = Dispatched::rejected(StoreError::invalid("bad"));
        assert!(matches!(handle.wait(), Err(StoreError::InvalidArgument(_))));
    }
}
