//! Task execution polling.
//!
//! A [`TaskWatcher`] follows one task execution (the detail view) and a
//! [`TaskListWatcher`] follows the list of executions. Both publish snapshots
//! through a `watch` channel and re-fetch on a fixed interval. The detail
//! watcher stops at the first terminal status it observes; the list watcher
//! runs until it is stopped.
//!
//! Responses are applied only if they answer the most recently issued
//! request (see [`RequestSequencer`]), so a slow response can never overwrite
//! a newer one.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub mod detail;
pub mod list;

pub use detail::{fetch_task_and_log, LogView, TaskSnapshot, TaskWatcher};
pub use list::{StatusSummary, TaskListSnapshot, TaskListWatcher};

/// Ticket for one issued request. Higher tickets were issued later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether no request has been issued after this one.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.issued.load(Ordering::SeqCst) == ticket.0
    }
}

/// A running poll loop. Dropping the handle cancels the loop.
#[derive(Debug)]
pub(crate) struct PollHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PollHandle {
    pub(crate) fn spawn<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(f(cancel.clone()));
        Self { cancel, join }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_that_only_the_latest_ticket_is_current() {
        let sequencer = RequestSequencer::new();
        let first = sequencer.issue();
        assert!(sequencer.is_current(first));
        let second = sequencer.issue();
        assert!(!sequencer.is_current(first));
        assert!(sequencer.is_current(second));
        assert!(first < second);
    }
}
