/// In-memory implementation of every remote service.
///
/// Feeds, the mutable store, and the task runner share one process-local
/// store. A curation-action task appends its action to the target feed, so
/// a dispatch travels the full loop back into a subscription's replayed
/// state without a network.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use crate::config::DEFAULT_TASK_NAME;
use crate::curation::{CurationAction, FeedEncoding, FeedId, FeedMessage};
use crate::network::remote::{
    FeedSource, MutableStore, RemoteError, TaskJob, TaskRequest, TaskRunner, TaskStatus, TaskType,
};

#[derive(Default)]
struct Store {
    feeds: HashMap<FeedId, Vec<FeedMessage>>,
    mutables: HashMap<String, String>,
    submitted: Vec<TaskRequest>,
    failing: bool,
    task_delay: Option<Duration>,
}

pub struct InMemoryService {
    store: Mutex<Store>,
    appended: Notify,
    task_name: String,
    encoding: FeedEncoding,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::with_encoding(FeedEncoding::Bare)
    }

    /// Service whose curation tasks append actions using `encoding`.
    pub fn with_encoding(encoding: FeedEncoding) -> Self {
        Self {
            store: Mutex::new(Store::default()),
            appended: Notify::new(),
            task_name: DEFAULT_TASK_NAME.to_string(),
            encoding,
        }
    }

    pub async fn append_messages(&self, feed_id: &FeedId, messages: Vec<FeedMessage>) {
        self.store
            .lock()
            .await
            .feeds
            .entry(feed_id.clone())
            .or_default()
            .extend(messages);
        self.appended.notify_waiters();
    }

    pub async fn append_action(&self, feed_id: &FeedId, action: &CurationAction, encoding: FeedEncoding) {
        self.append_messages(feed_id, vec![FeedMessage::from_action(action, encoding)])
            .await;
    }

    pub async fn feed_len(&self, feed_id: &FeedId) -> usize {
        self.store
            .lock()
            .await
            .feeds
            .get(feed_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub async fn set_mutable(&self, key: impl Into<String>, value: impl Into<String>) {
        self.store.lock().await.mutables.insert(key.into(), value.into());
    }

    /// Make every task submission fail until reset.
    pub async fn set_failing(&self, failing: bool) {
        self.store.lock().await.failing = failing;
    }

    /// Delay every task submission by `delay`.
    pub async fn set_task_delay(&self, delay: Option<Duration>) {
        self.store.lock().await.task_delay = delay;
    }

    /// Every task request received, in order.
    pub async fn submitted_tasks(&self) -> Vec<TaskRequest> {
        self.store.lock().await.submitted.clone()
    }

    async fn messages_after(&self, feed_id: &FeedId, position: usize) -> Vec<FeedMessage> {
        let store = self.store.lock().await;
        let messages = store.feeds.get(feed_id).map(Vec::as_slice).unwrap_or(&[]);
        messages.get(position..).unwrap_or(&[]).to_vec()
    }

    fn decode_curation_task(input: &Value) -> Result<(FeedId, CurationAction), RemoteError> {
        let uri = input
            .get("sorting_curation_uri")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::MalformedTaskInput("missing sorting_curation_uri".into()))?;
        let feed_id =
            FeedId::from_uri(uri).map_err(|e| RemoteError::MalformedTaskInput(e.to_string()))?;
        let action = input
            .get("action")
            .ok_or_else(|| RemoteError::MalformedTaskInput("missing action".into()))?;
        let action = CurationAction::from_json(action)
            .map_err(|e| RemoteError::MalformedTaskInput(e.to_string()))?;
        Ok((feed_id, action))
    }
}

impl Default for InMemoryService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSource for InMemoryService {
    async fn load_messages(
        &self,
        feed_id: &FeedId,
        position: usize,
        wait: Duration,
    ) -> Result<Vec<FeedMessage>, RemoteError> {
        let appended = self.appended.notified();
        tokio::pin!(appended);
        appended.as_mut().enable();

        let found = self.messages_after(feed_id, position).await;
        if !found.is_empty() || wait.is_zero() {
            return Ok(found);
        }
        if tokio::time::timeout(wait, appended).await.is_err() {
            return Ok(Vec::new());
        }
        Ok(self.messages_after(feed_id, position).await)
    }
}

#[async_trait]
impl MutableStore for InMemoryService {
    async fn get_mutable(&self, key: &str) -> Result<Option<String>, RemoteError> {
        Ok(self.store.lock().await.mutables.get(key).cloned())
    }
}

#[async_trait]
impl TaskRunner for InMemoryService {
    async fn initiate_task(&self, request: TaskRequest) -> Result<TaskJob, RemoteError> {
        let delay = {
            let mut store = self.store.lock().await;
            store.submitted.push(request.clone());
            if store.failing {
                return Err(anyhow::anyhow!("task service unavailable").into());
            }
            store.task_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if request.task_name != self.task_name || request.task_type != TaskType::Action {
            return Err(RemoteError::TaskRejected {
                task_name: request.task_name,
                reason: "unknown task".into(),
            });
        }

        let (feed_id, action) = Self::decode_curation_task(&request.task_input)?;
        self.append_action(&feed_id, &action, self.encoding).await;
        log::debug!("Appended {} to feed {}", action.kind().as_str(), feed_id);
        Ok(TaskJob::new(TaskStatus::Finished))
    }
}
