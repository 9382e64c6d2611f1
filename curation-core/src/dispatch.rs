/// Mutation dispatch: turns a user's curation action into a remote task.
///
/// Dispatch never touches local state. The action is packaged with the
/// curation URI and the caller's credentials and submitted to the task
/// runner; the resulting feed append comes back through the subscription
/// like any other client's action.
///
/// Submissions are fire-and-forget on a spawned task. Failures and timeouts
/// are logged and counted but never retried: a feed append is not
/// idempotent, and retrying after an ambiguous timeout could apply the same
/// action twice.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::curation::CurationAction;
use crate::identity::SignedInUser;
use crate::network::remote::{RemoteError, TaskJob, TaskRequest, TaskRunner, TaskType};

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No curation resource configured")]
    NoResource,

    #[error("Task submission timed out after {0:?}")]
    Timeout(Duration),

    #[error("No async runtime available for dispatch")]
    NoRuntime,

    #[error("Task payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Input of the curation-action task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurationTaskInput {
    pub sorting_curation_uri: String,
    pub action: CurationAction,
    pub user_id: Option<String>,
    pub google_id_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct DispatchStats {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStatsSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl DispatchStats {
    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
        }
    }

    fn record(&self, result: &Result<TaskJob, DispatchError>) {
        let counter = match result {
            Ok(_) => &self.succeeded,
            Err(DispatchError::Timeout(_)) => &self.timed_out,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// MutationDispatcher
// ---------------------------------------------------------------------------

pub struct MutationDispatcher {
    runner: Arc<dyn TaskRunner>,
    resource_uri: Option<String>,
    identity: watch::Receiver<SignedInUser>,
    config: Arc<SessionConfig>,
    stats: Arc<DispatchStats>,
}

impl MutationDispatcher {
    pub fn new(
        runner: Arc<dyn TaskRunner>,
        resource_uri: Option<String>,
        identity: watch::Receiver<SignedInUser>,
        config: Arc<SessionConfig>,
    ) -> Self {
        Self {
            runner,
            resource_uri,
            identity,
            config,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn resource_uri(&self) -> Option<&str> {
        self.resource_uri.as_deref()
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    /// Task request for `action` under the current identity.
    pub fn build_request(&self, action: &CurationAction) -> Result<TaskRequest, DispatchError> {
        let uri = self.resource_uri.as_ref().ok_or(DispatchError::NoResource)?;
        let user = self.identity.borrow().clone();
        let input = CurationTaskInput {
            sorting_curation_uri: uri.clone(),
            action: action.clone(),
            user_id: user.user_id.map(|u| u.as_str().to_string()),
            google_id_token: user.id_token,
        };
        Ok(TaskRequest {
            task_name: self.config.task_name.clone(),
            task_input: serde_json::to_value(&input)?,
            task_type: TaskType::Action,
        })
    }

    /// Submit and wait for the runner's receipt, bounded by the configured
    /// timeout.
    pub async fn submit(&self, action: &CurationAction) -> Result<TaskJob, DispatchError> {
        let request = self.build_request(action)?;
        submit_request(
            Arc::clone(&self.runner),
            request,
            self.config.dispatch_timeout,
            Arc::clone(&self.stats),
        )
        .await
    }

    /// Fire and forget. Returns `None` when there is nothing to submit to.
    pub fn dispatch(&self, action: CurationAction) -> Option<JoinHandle<()>> {
        let request = match self.build_request(&action) {
            Ok(request) => request,
            Err(DispatchError::NoResource) => return None,
            Err(e) => {
                log::warn!("Dropping {} action: {}", action.kind().as_str(), e);
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        let Ok(runtime) = Handle::try_current() else {
            log::error!("Dropping {} action: {}", action.kind().as_str(), DispatchError::NoRuntime);
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let runner = Arc::clone(&self.runner);
        let stats = Arc::clone(&self.stats);
        let timeout = self.config.dispatch_timeout;
        let kind = action.kind().as_str();
        Some(runtime.spawn(async move {
            if let Err(e) = submit_request(runner, request, timeout, stats).await {
                log::warn!("Curation action {} was not submitted: {}", kind, e);
            }
        }))
    }
}

async fn submit_request(
    runner: Arc<dyn TaskRunner>,
    request: TaskRequest,
    timeout: Duration,
    stats: Arc<DispatchStats>,
) -> Result<TaskJob, DispatchError> {
    stats.submitted.fetch_add(1, Ordering::Relaxed);
    let result = match tokio::time::timeout(timeout, runner.initiate_task(request)).await {
        Ok(Ok(job)) => Ok(job),
        Ok(Err(e)) => Err(DispatchError::Remote(e)),
        Err(_) => Err(DispatchError::Timeout(timeout)),
    };
    stats.record(&result);
    result
}
