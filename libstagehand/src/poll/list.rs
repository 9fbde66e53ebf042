use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use derive_getters::Getters;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{PollHandle, RequestSequencer};
use crate::api::Backend;
use crate::log::*;
use crate::model::{Id, TaskExecution, TaskStatus};

pub const DEFAULT_LIST_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Getters, Clone, Debug, Default, PartialEq)]
pub struct TaskListSnapshot {
    tasks: Vec<TaskExecution>,
    error: Option<String>,
    loading: bool,
    polling: bool,
    /// Whether at least one fetch has succeeded.
    loaded: bool,
}

impl TaskListSnapshot {
    /// Tasks with the given status, or all of them.
    pub fn filtered(&self, status: Option<&TaskStatus>) -> Vec<&TaskExecution> {
        self.tasks
            .iter()
            .filter(|t| status.map(|s| &t.status == s).unwrap_or(true))
            .collect()
    }

    pub fn summary(&self) -> StatusSummary {
        StatusSummary::of(&self.tasks)
    }

    /// Whether every listed task has finished.
    pub fn is_settled(&self) -> bool {
        self.loaded && self.tasks.iter().all(|t| t.status.is_terminal())
    }
}

/// Count of tasks per status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub total: usize,
    pub counts: BTreeMap<String, usize>,
}

impl StatusSummary {
    pub fn of(tasks: &[TaskExecution]) -> Self {
        let mut counts = BTreeMap::new();
        for task in tasks {
            *counts.entry(task.status.as_str().to_string()).or_insert(0) += 1;
        }
        Self {
            total: tasks.len(),
            counts,
        }
    }

    pub fn count(&self, status: &TaskStatus) -> usize {
        self.counts.get(status.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone)]
struct Shared {
    backend: Arc<dyn Backend>,
    playbook: Option<Id>,
    state: Arc<watch::Sender<TaskListSnapshot>>,
    sequencer: Arc<RequestSequencer>,
}

impl Shared {
    /// Fetch and publish once. The poll loop's `polling` flag is left alone.
    async fn cycle(&self) {
        let ticket = self.sequencer.issue();
        self.state.send_modify(|s| s.loading = true);
        let outcome = self.backend.task_executions(self.playbook).await;

        self.state.send_modify(|s| {
            if !self.sequencer.is_current(ticket) {
                debug!("dropping stale task list response");
                return;
            }
            s.loading = false;
            match outcome {
                Ok(tasks) => {
                    s.tasks = tasks;
                    s.loaded = true;
                    s.error = None;
                }
                // The next tick retries.
                Err(e) => {
                    warn!("failed to fetch task executions: {e}");
                    s.error = Some(e.to_string());
                }
            }
        });
    }
}

/// Follows the list of task executions, optionally for one playbook. The
/// list is re-fetched on every tick until the watcher is stopped or dropped,
/// so new executions show up even when everything listed has finished.
/// Fetch errors are shown and retried on the next tick.
#[derive(Debug)]
pub struct TaskListWatcher {
    shared: Shared,
    interval: Duration,
    current: Option<PollHandle>,
}

impl TaskListWatcher {
    pub fn new(backend: Arc<dyn Backend>, playbook: Option<Id>) -> Self {
        Self::with_interval(backend, playbook, DEFAULT_LIST_INTERVAL)
    }

    pub fn with_interval(
        backend: Arc<dyn Backend>,
        playbook: Option<Id>,
        interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(TaskListSnapshot::default());
        Self {
            shared: Shared {
                backend,
                playbook,
                state: Arc::new(state),
                sequencer: Arc::new(RequestSequencer::new()),
            },
            interval,
            current: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskListSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> TaskListSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Start (or restart) polling; the first fetch happens immediately.
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self) {
        self.stop();
        self.shared.state.send_modify(|s| {
            s.polling = true;
            s.loading = true;
        });
        let shared = self.shared.clone();
        let period = self.interval;
        self.current = Some(PollHandle::spawn(move |cancel| run(shared, period, cancel)));
    }

    pub fn stop(&mut self) {
        if self.current.take().is_some() {
            self.shared.state.send_modify(|s| {
                s.polling = false;
                s.loading = false;
            });
        }
    }

    pub fn is_polling(&self) -> bool {
        self.current
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
            && self.shared.state.borrow().polling
    }

    /// Fetch once without touching the poll loop.
    pub async fn refresh(&self) -> TaskListSnapshot {
        let looping = self.is_polling();
        self.shared.cycle().await;
        if !looping {
            self.shared.state.send_modify(|s| s.polling = false);
        }
        self.snapshot()
    }
}

async fn run(shared: Shared, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if !shared.state.borrow().polling {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = shared.cycle() => {}
        }
    }
    debug!("stopped polling task list");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::{task, FakeBackend};

    #[tokio::test(start_paused = true)]
    async fn test_that_the_list_keeps_polling_after_everything_finished() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_task_lists(vec![
            Ok(vec![task(1, TaskStatus::Running), task(2, TaskStatus::Succeeded)]),
            Ok(vec![task(1, TaskStatus::Failed), task(2, TaskStatus::Succeeded)]),
        ]);
        let mut watcher = TaskListWatcher::new(backend.clone(), None);
        watcher.start();

        tokio::time::sleep(Duration::from_secs(16)).await;
        let snapshot = watcher.snapshot();
        assert!(snapshot.is_settled());
        assert!(*snapshot.polling());
        assert_eq!(2, backend.count("task_executions"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(4, backend.count("task_executions"));
        assert!(watcher.is_polling());

        let summary = snapshot.summary();
        assert_eq!(2, summary.total);
        assert_eq!(1, summary.count(&TaskStatus::Failed));
        assert_eq!(0, summary.count(&TaskStatus::Running));
        assert_eq!(1, snapshot.filtered(Some(&TaskStatus::Succeeded)).len());
        assert_eq!(2, snapshot.filtered(None).len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_that_tasks_triggered_later_show_up() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_task_lists(vec![Ok(vec![]), Ok(vec![task(9, TaskStatus::Running)])]);
        let mut watcher = TaskListWatcher::new(backend.clone(), None);
        watcher.start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = watcher.snapshot();
        assert!(*snapshot.loaded());
        assert!(snapshot.tasks().is_empty());
        assert!(*snapshot.polling());

        tokio::time::sleep(Duration::from_secs(60)).await;
        let snapshot = watcher.snapshot();
        assert!(backend.count("task_executions") > 1);
        assert_eq!(vec![9], snapshot.tasks().iter().map(|t| t.id).collect::<Vec<_>>());
        assert!(*snapshot.polling());
    }

    #[tokio::test(start_paused = true)]
    async fn test_that_list_errors_are_retried_on_the_next_tick() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_task_lists(vec![
            Err(ApiError::Transport("connection refused".into())),
            Ok(vec![task(1, TaskStatus::Succeeded)]),
        ]);
        let mut watcher = TaskListWatcher::new(backend.clone(), Some(3));
        watcher.start();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let snapshot = watcher.snapshot();
        assert_eq!(
            &Some("Request failed: connection refused".to_string()),
            snapshot.error()
        );
        assert!(*snapshot.polling());

        tokio::time::sleep(Duration::from_secs(15)).await;
        let snapshot = watcher.snapshot();
        assert_eq!(&None, snapshot.error());
        assert_eq!(1, snapshot.tasks().len());
        assert!(*snapshot.polling());
        assert_eq!(2, backend.count_for("task_executions", 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_that_stopping_cancels_the_timer() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_task_lists(vec![Ok(vec![task(1, TaskStatus::Running)])]);
        let mut watcher = TaskListWatcher::new(backend.clone(), None);
        watcher.start();
        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(2, backend.count("task_executions"));

        watcher.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(2, backend.count("task_executions"));
        assert!(!*watcher.snapshot().polling());
    }
}
