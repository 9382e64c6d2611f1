/// Remote service boundary.
///
/// The session talks to three external collaborators: a feed source
/// (ordered message log), a mutable key/value store (authorization lists),
/// and a task runner (which appends actions to feeds). Each is an async
/// trait so the embedding application can plug in its own transport;
/// `memory::InMemoryService` implements all three for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::curation::{FeedId, FeedMessage};

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Feed not found: {0}")]
    FeedNotFound(FeedId),

    #[error("Task {task_name} rejected: {reason}")]
    TaskRejected { task_name: String, reason: String },

    #[error("Malformed task input: {0}")]
    MalformedTaskInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Action,
    Calculation,
}

/// A request to run a named remote task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub task_name: String,
    pub task_input: Value,
    pub task_type: TaskType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Waiting,
    Started,
    Finished,
    Error,
}

/// Receipt for a submitted task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskJob {
    pub job_id: Uuid,
    pub status: TaskStatus,
    pub submitted_at: DateTime<Utc>,
}

impl TaskJob {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            status,
            submitted_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Service traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Messages of `feed_id` at index `position` and beyond.
    ///
    /// When there are none yet the source may hold the request for up to
    /// `wait` and answer as soon as something is appended. Answering empty
    /// early is allowed; callers pace their own re-polls.
    async fn load_messages(
        &self,
        feed_id: &FeedId,
        position: usize,
        wait: Duration,
    ) -> Result<Vec<FeedMessage>, RemoteError>;
}

#[async_trait]
pub trait MutableStore: Send + Sync {
    /// Value stored under `key`, or `None` if the key is absent.
    async fn get_mutable(&self, key: &str) -> Result<Option<String>, RemoteError>;
}

#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Submit a task. Returning does not imply the task has completed.
    async fn initiate_task(&self, request: TaskRequest) -> Result<TaskJob, RemoteError>;
}
