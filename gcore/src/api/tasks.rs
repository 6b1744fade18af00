//! Cloud task API and the polling helpers built on it
//!
//! Most cloud mutations answer with `{"tasks": ["<task id>"]}` instead of the
//! object itself. The caller polls `/v1/tasks/{id}` until the task leaves
//! `NEW`/`RUNNING`, then reads the created resource ids off the finished task.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use super::client::{Client, Service};
use super::common::deserialize_timestamp_option;
use super::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Running,
    Finished,
    Error,
    Unknown,
}

impl From<&str> for TaskState {
    fn from(raw: &str) -> Self {
        match raw {
            "NEW" => TaskState::New,
            "RUNNING" => TaskState::Running,
            "FINISHED" => TaskState::Finished,
            "ERROR" => TaskState::Error,
            _ => TaskState::Unknown,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::New => "NEW",
            TaskState::Running => "RUNNING",
            TaskState::Finished => "FINISHED",
            TaskState::Error => "ERROR",
            TaskState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    pub state: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub created_resources: Option<HashMap<String, Vec<serde_json::Value>>>,
    #[serde(default, deserialize_with = "deserialize_timestamp_option")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp_option")]
    pub finished_on: Option<DateTime<Utc>>,
}

impl Task {
    pub fn task_state(&self) -> TaskState {
        TaskState::from(self.state.as_str())
    }

    /// Ids of the resources of `kind` (e.g. "instances") the task created
    pub fn created_ids(&self, kind: &str) -> Vec<String> {
        self.created_resources
            .as_ref()
            .and_then(|resources| resources.get(kind))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| match id {
                        serde_json::Value::String(s) => Some(s.clone()),
                        serde_json::Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The single resource of `kind` created by this task
    pub fn created_id(&self, kind: &str) -> Result<String, ApiError> {
        self.created_ids(kind)
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::MissingTaskResult(self.id.clone()))
    }
}

/// Response body of every task-producing cloud call
#[derive(Debug, Clone, Deserialize)]
pub struct TaskResults {
    pub tasks: Vec<String>,
}

impl TaskResults {
    pub fn task_id(&self) -> Result<&str, ApiError> {
        self.tasks
            .first()
            .map(String::as_str)
            .ok_or_else(|| ApiError::ParseError("response did not contain a task id".to_string()))
    }
}

pub struct TasksApi<'a> {
    client: &'a Client,
}

impl<'a> TasksApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, task_id: &str) -> Result<Task, ApiError> {
        self.client
            .get(Service::Cloud, &format!("/v1/tasks/{}", task_id))
            .await
    }
}

/// Polls a task until it finishes. With `check_on_finished` the finished task
/// is handed to `retrieve`, whose result is returned; otherwise the result is
/// `None`. An `ERROR` task, an unrecognised state or running out of `timeout`
/// all fail.
pub async fn wait_task_and_return_result<T, F, Fut>(
    client: &Client,
    task_id: &str,
    check_on_finished: bool,
    timeout: Duration,
    retrieve: F,
) -> Result<Option<T>, ApiError>
where
    F: FnOnce(Task) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let deadline = Instant::now() + timeout;
    let poll_interval = client.task_poll_interval();

    loop {
        let task = client.tasks().get(task_id).await?;
        match task.task_state() {
            TaskState::New | TaskState::Running => {
                tracing::debug!(task_id, state = %task.state, "task still in progress");
            }
            TaskState::Finished => {
                tracing::info!(task_id, "task finished");
                if !check_on_finished {
                    return Ok(None);
                }
                return retrieve(task).await.map(Some);
            }
            TaskState::Error => {
                return Err(ApiError::TaskFailed {
                    task_id: task_id.to_string(),
                    error: task.error.unwrap_or_else(|| "unknown error".to_string()),
                });
            }
            TaskState::Unknown => {
                return Err(ApiError::TaskInvalidState {
                    task_id: task_id.to_string(),
                    state: task.state,
                });
            }
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(ApiError::TaskTimeout {
                task_id: task_id.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(poll_interval.min(deadline - now)).await;
    }
}

/// Waits for a task and returns it once finished
pub async fn wait_for_task(
    client: &Client,
    task_id: &str,
    timeout: Duration,
) -> Result<Task, ApiError> {
    wait_task_and_return_result(client, task_id, true, timeout, |task| async move { Ok(task) })
        .await?
        .ok_or_else(|| ApiError::MissingTaskResult(task_id.to_string()))
}

/// Generic status waiter: calls `refresh` until it reports one of the
/// `target` states. A state outside `pending` and `target` fails immediately.
/// `refresh` returns `None` while the object cannot be found; that is
/// tolerated `not_found_checks` times in a row.
pub struct StateChangeConf<F> {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub refresh: F,
    pub delay: Duration,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub not_found_checks: u32,
}

impl<F> StateChangeConf<F> {
    pub fn new(pending: &[&str], target: &[&str], refresh: F) -> Self {
        Self {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            target: target.iter().map(|s| s.to_string()).collect(),
            refresh,
            delay: Duration::ZERO,
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(20 * 60),
            not_found_checks: 20,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn wait_for_state<T, Fut>(&self) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Option<(T, String)>, ApiError>>,
    {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let deadline = Instant::now() + self.timeout;
        let target = self.target.join(", ");
        let mut last_state = String::new();
        let mut not_found = 0;

        loop {
            match (self.refresh)().await? {
                Some((value, state)) => {
                    not_found = 0;
                    if self.target.contains(&state) {
                        return Ok(value);
                    }
                    if !self.pending.contains(&state) {
                        return Err(ApiError::UnexpectedState { state, target });
                    }
                    tracing::debug!(%state, %target, "waiting for state change");
                    last_state = state;
                }
                None => {
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Err(ApiError::UnexpectedState {
                            state: "not found".to_string(),
                            target,
                        });
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ApiError::StateTimeout { target, last_state });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
