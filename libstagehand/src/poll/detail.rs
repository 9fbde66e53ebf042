use std::sync::Arc;
use std::time::Duration;

use derive_getters::Getters;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{PollHandle, RequestSequencer};
use crate::api::Backend;
use crate::error::ApiError;
use crate::log::*;
use crate::model::{Id, LogPolicy, TaskExecution};

pub const DEFAULT_DETAIL_INTERVAL: Duration = Duration::from_secs(5);
pub const LOG_FAILED_PLACEHOLDER: &str = "Log content not available or failed to load.";

/// What the log pane shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogView {
    /// Nothing fetched yet.
    Empty,
    /// The log endpoint was deliberately not called.
    Placeholder(&'static str),
    Loaded(String),
    /// The log endpoint failed. Kept apart from the task-level error.
    Failed(String),
}

impl LogView {
    pub fn text(&self) -> &str {
        match self {
            LogView::Empty => "",
            LogView::Placeholder(text) => text,
            LogView::Loaded(text) => text,
            LogView::Failed(_) => LOG_FAILED_PLACEHOLDER,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LogView::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Getters, Clone, Debug, PartialEq)]
pub struct TaskSnapshot {
    task_id: Option<Id>,
    task: Option<TaskExecution>,
    log: LogView,
    /// Failure to load the task itself.
    error: Option<String>,
    loading: bool,
    /// Whether another fetch is scheduled.
    polling: bool,
}

impl TaskSnapshot {
    fn idle() -> Self {
        Self {
            task_id: None,
            task: None,
            log: LogView::Empty,
            error: None,
            loading: false,
            polling: false,
        }
    }

    fn watching(id: Id) -> Self {
        Self {
            task_id: Some(id),
            loading: true,
            polling: true,
            ..Self::idle()
        }
    }

    /// Whether the watched task has reached a terminal status.
    pub fn is_settled(&self) -> bool {
        self.task
            .as_ref()
            .map(|t| t.status.is_terminal())
            .unwrap_or(false)
    }
}

/// Fetch one task execution and, depending on its status, its log. A failed
/// log fetch is folded into [`LogView::Failed`]; only a failed task fetch is
/// an error.
#[tracing::instrument(skip(backend))]
pub async fn fetch_task_and_log(
    backend: &dyn Backend,
    id: Id,
) -> Result<(TaskExecution, LogView), ApiError> {
    let task = backend.task_execution(id).await?;
    let log = match task.status.log_policy() {
        LogPolicy::Placeholder(text) => LogView::Placeholder(text),
        LogPolicy::Fetch => match backend.task_log(id).await {
            Ok(text) => LogView::Loaded(text),
            Err(e) => {
                warn!("failed to fetch log for task {id}: {e}");
                LogView::Failed(e.to_string())
            }
        },
    };
    Ok((task, log))
}

#[derive(Debug, Clone)]
struct Shared {
    backend: Arc<dyn Backend>,
    state: Arc<watch::Sender<TaskSnapshot>>,
    sequencer: Arc<RequestSequencer>,
}

impl Shared {
    /// Fetch and publish once. Returns whether polling should go on;
    /// `looping` says whether a poll loop is around to do it.
    async fn cycle(&self, id: Id, looping: bool) -> bool {
        let ticket = self.sequencer.issue();
        self.state.send_modify(|s| {
            if s.task_id == Some(id) {
                s.loading = true;
            }
        });
        let outcome = fetch_task_and_log(self.backend.as_ref(), id).await;

        let mut keep_polling = true;
        self.state.send_modify(|s| {
            if s.task_id != Some(id) {
                keep_polling = false;
                return;
            }
            if !self.sequencer.is_current(ticket) {
                debug!("dropping stale response for task {id}");
                keep_polling = !s.is_settled() && s.error.is_none();
                return;
            }
            s.loading = false;
            match outcome {
                Ok((task, log)) => {
                    keep_polling = !task.status.is_terminal();
                    if !keep_polling {
                        info!("task {id} finished: {}", task.status);
                    }
                    s.task = Some(task);
                    s.log = log;
                    s.error = None;
                }
                Err(e) => {
                    error!("failed to fetch task {id}: {e}");
                    s.error = Some(e.to_string());
                    keep_polling = false;
                }
            }
            s.polling = keep_polling && looping;
        });
        keep_polling
    }
}

/// Follows a single task execution.
#[derive(Debug)]
pub struct TaskWatcher {
    shared: Shared,
    interval: Duration,
    current: Option<PollHandle>,
}

impl TaskWatcher {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_interval(backend, DEFAULT_DETAIL_INTERVAL)
    }

    pub fn with_interval(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        let (state, _) = watch::channel(TaskSnapshot::idle());
        Self {
            shared: Shared {
                backend,
                state: Arc::new(state),
                sequencer: Arc::new(RequestSequencer::new()),
            },
            interval,
            current: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.shared.state.subscribe()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.shared.state.borrow().clone()
    }

    /// Start following `id`, cancelling whatever was followed before. The
    /// first fetch happens immediately.
    #[tracing::instrument(skip(self))]
    pub fn watch(&mut self, id: Id) {
        self.stop();
        self.shared.state.send_replace(TaskSnapshot::watching(id));
        let shared = self.shared.clone();
        let period = self.interval;
        self.current = Some(PollHandle::spawn(move |cancel| {
            run(shared, id, period, cancel)
        }));
    }

    /// Cancel polling. The last snapshot stays readable.
    pub fn stop(&mut self) {
        if self.current.take().is_some() {
            self.shared.state.send_modify(|s| {
                s.polling = false;
                s.loading = false;
            });
        }
    }

    pub fn is_polling(&self) -> bool {
        let running = self
            .current
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        running && self.shared.state.borrow().polling
    }

    /// Fetch the watched task now, outside the regular cadence. Does not
    /// restart polling.
    pub async fn refresh(&self) -> Option<TaskSnapshot> {
        let id = self.shared.state.borrow().task_id?;
        self.shared.cycle(id, self.is_polling()).await;
        Some(self.snapshot())
    }
}

async fn run(shared: Shared, id: Id, period: Duration, cancel: CancellationToken) {
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
        let keep_polling = tokio::select! {
            _ = cancel.cancelled() => break,
            keep_polling = shared.cycle(id, true) => keep_polling,
        };
        if !keep_polling {
            break;
        }
    }
    debug!("stopped polling task {id}");
}
