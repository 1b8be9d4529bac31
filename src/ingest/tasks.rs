// src/ingest/tasks.rs
//! Fire-and-forget background runner with pollable task state.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;

pub type TaskId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "error", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "outcome", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Done(TaskOutcome),
}

/// What callers of the pipeline see. A failed task is still `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Running,
    Completed,
}

impl TaskState {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskState::Done(_))
    }

    pub fn processing_status(&self) -> ProcessingStatus {
        match self {
            TaskState::Pending | TaskState::Running => ProcessingStatus::Running,
            TaskState::Done(_) => ProcessingStatus::Completed,
        }
    }
}

/// Finished tasks kept for status polls; older ones are forgotten.
pub const DEFAULT_FINISHED_RETENTION: usize = 256;

#[derive(Default)]
struct TaskTable {
    states: HashMap<TaskId, TaskState>,
    /// Finished ids, oldest first.
    finished: VecDeque<TaskId>,
}

#[derive(Clone)]
pub struct TaskRunner {
    tasks: Arc<RwLock<TaskTable>>,
    seq: Arc<AtomicU64>,
    retain_finished: usize,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::with_retention(DEFAULT_FINISHED_RETENTION)
    }
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `retain_finished` finished tasks (at least one).
    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(TaskTable::default())),
            seq: Arc::new(AtomicU64::new(0)),
            retain_finished: retain_finished.max(1),
        }
    }

    /// Spawns `work` and returns its handle immediately. No cancellation.
    /// Must be called from within a tokio runtime.
    pub fn queue_task<F>(&self, work: F) -> TaskId
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = self.next_id();
        self.set(&id, TaskState::Pending);

        let runner = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            runner.set(&task_id, TaskState::Running);
            // Inner spawn so a panic surfaces as a JoinError instead of
            // unwinding past the state update.
            let outcome = match tokio::spawn(work).await {
                Ok(Ok(())) => TaskOutcome::Succeeded,
                Ok(Err(e)) => TaskOutcome::Failed(format!("{e:#}")),
                Err(join) if join.is_panic() => TaskOutcome::Failed("task panicked".into()),
                Err(_) => TaskOutcome::Failed("task cancelled".into()),
            };
            if let TaskOutcome::Failed(reason) = &outcome {
                tracing::error!(target: "tasks", task_id = %task_id, %reason, "background task failed");
            }
            runner.set(&task_id, TaskState::Done(outcome));
        });
        id
    }

    pub fn status(&self, id: &str) -> Option<TaskState> {
        self.tasks
            .read()
            .expect("task table poisoned")
            .states
            .get(id)
            .cloned()
    }

    /// Polls until the task is done or `timeout` elapses; returns the last state seen.
    pub async fn wait_done(&self, id: &str, timeout: Duration) -> Option<TaskState> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let state = self.status(id);
            let settled = state.as_ref().map_or(true, TaskState::is_done);
            if settled || tokio::time::Instant::now() >= deadline {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Number of tasks currently tracked, finished or not.
    pub fn tracked(&self) -> usize {
        self.tasks.read().expect("task table poisoned").states.len()
    }

    fn set(&self, id: &str, state: TaskState) {
        let mut table = self.tasks.write().expect("task table poisoned");
        let done = state.is_done();
        table.states.insert(id.to_string(), state);
        if done {
            table.finished.push_back(id.to_string());
            while table.finished.len() > self.retain_finished {
                if let Some(old) = table.finished.pop_front() {
                    table.states.remove(&old);
                }
            }
        }
    }

    fn next_id(&self) -> TaskId {
        let n = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ingest-{}-{n}", chrono::Utc::now().timestamp_millis())
    }
}
