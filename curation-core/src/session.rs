/// Curation session: the render-facing entry point.
///
/// A session is opened for one view. With a curation URI it runs in feed
/// mode: state comes from a `FeedSubscription`, and a dispatch function is
/// handed out only while the authorization gate allows writes. Without a
/// URI it runs in local mode: state lives in a local reducer slot, every
/// change is mirrored to the host backend as a `setSortingCuration` message,
/// and `setSortingCuration` messages from the backend are applied through
/// the same reducer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use crate::auth::{AuthorizationGate, AuthorizationWatch};
use crate::config::SessionConfig;
use crate::curation::{
    admit_action, reduce, CurationAction, CurationReducer, CurationState, FeedReplayEngine,
    FeedUriError, Projection, ReplayError,
};
use crate::dispatch::{DispatchStatsSnapshot, MutationDispatcher};
use crate::identity::IdentityContext;
use crate::network::feed::{parse_feed_uri, FeedManager, FeedSubscription};
use crate::network::remote::{MutableStore, TaskRunner};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid curation URI: {0}")]
    FeedUri(#[from] FeedUriError),

    #[error("Replay engine could not start: {0}")]
    Replay(#[from] ReplayError),

    #[error("No async runtime available for session")]
    NoRuntime,
}

/// Messages exchanged with the host backend in local mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BackendMessage {
    #[serde(rename_all = "camelCase")]
    SetSortingCuration { sorting_curation: CurationState },
    /// Any other message type; ignored.
    #[serde(other)]
    Unknown,
}

/// Callback that submits a curation action.
pub type Dispatch = Arc<dyn Fn(CurationAction) + Send + Sync>;

/// What a view renders from: the current state, and a dispatch function if
/// the view may write.
#[derive(Clone)]
pub struct CurationHandle {
    pub state: Projection<CurationState>,
    pub dispatch: Option<Dispatch>,
}

impl CurationHandle {
    pub fn is_read_only(&self) -> bool {
        self.dispatch.is_none()
    }

    /// Submit `action` if writable. Returns whether it was submitted.
    pub fn dispatch(&self, action: CurationAction) -> bool {
        match &self.dispatch {
            Some(dispatch) => {
                dispatch(action);
                true
            }
            None => false,
        }
    }
}

/// Remote collaborators a session needs.
#[derive(Clone)]
pub struct CurationServices {
    pub feeds: Arc<FeedManager>,
    pub store: Arc<dyn MutableStore>,
    pub tasks: Arc<dyn TaskRunner>,
}

// ---------------------------------------------------------------------------
// Local mode
// ---------------------------------------------------------------------------

struct LocalSlot {
    state: watch::Sender<Projection<CurationState>>,
    backend: Option<mpsc::UnboundedSender<BackendMessage>>,
}

impl LocalSlot {
    fn apply(&self, action: &CurationAction) {
        let mut published = None;
        self.state.send_if_modified(|current| {
            let prev = current.snapshot();
            let next = reduce(&prev, action);
            if Arc::ptr_eq(&prev, &next) {
                return false;
            }
            *current = Projection::new(next);
            published = Some(current.clone());
            true
        });
        if let Some(state) = published {
            self.publish(&state);
        }
    }

    fn publish(&self, state: &CurationState) {
        if let Some(backend) = &self.backend {
            let msg = BackendMessage::SetSortingCuration {
                sorting_curation: state.clone(),
            };
            if backend.send(msg).is_err() {
                log::debug!("Backend channel closed; local curation not mirrored");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

enum Mode {
    Feed {
        subscription: FeedSubscription<CurationState>,
        auth: AuthorizationWatch,
        dispatcher: Arc<MutationDispatcher>,
    },
    Local {
        slot: Arc<LocalSlot>,
        rx: watch::Receiver<Projection<CurationState>>,
    },
}

pub struct CurationSession {
    mode: Mode,
}

impl CurationSession {
    /// Open a session. Must be called from within a tokio runtime.
    pub fn open(
        config: SessionConfig,
        services: CurationServices,
        identity: &IdentityContext,
        curation_uri: Option<String>,
        backend: Option<mpsc::UnboundedSender<BackendMessage>>,
    ) -> Result<Self, SessionError> {
        if Handle::try_current().is_err() {
            return Err(SessionError::NoRuntime);
        }
        let config = Arc::new(config);

        let Some(uri) = curation_uri else {
            let (tx, rx) = watch::channel(Projection::new(Arc::new(CurationState::new())));
            let slot = Arc::new(LocalSlot { state: tx, backend });
            slot.publish(&CurationState::new());
            return Ok(Self {
                mode: Mode::Local { slot, rx },
            });
        };

        let feed_id = parse_feed_uri(&uri)?;
        let engine = FeedReplayEngine::new(
            feed_id.clone(),
            CurationReducer,
            &CurationState::new(),
            config.feed_encoding,
        )?;
        let subscription = FeedSubscription::spawn(Arc::clone(&services.feeds), engine, &config);

        let gate = Arc::new(AuthorizationGate::new(services.store, Arc::clone(&config)));
        let auth = gate.watch(identity.subscribe(), Some(feed_id));

        let dispatcher = Arc::new(MutationDispatcher::new(
            services.tasks,
            Some(uri),
            identity.subscribe(),
            config,
        ));

        Ok(Self {
            mode: Mode::Feed {
                subscription,
                auth,
                dispatcher,
            },
        })
    }

    pub fn is_local(&self) -> bool {
        matches!(self.mode, Mode::Local { .. })
    }

    pub fn can_curate(&self) -> bool {
        match &self.mode {
            Mode::Feed { auth, .. } => auth.can_write(),
            Mode::Local { .. } => true,
        }
    }

    pub fn state(&self) -> Projection<CurationState> {
        match &self.mode {
            Mode::Feed { subscription, .. } => subscription.state(),
            Mode::Local { rx, .. } => rx.borrow().clone(),
        }
    }

    /// Stream of state versions.
    pub fn subscribe(&self) -> watch::Receiver<Projection<CurationState>> {
        match &self.mode {
            Mode::Feed { subscription, .. } => subscription.subscribe(),
            Mode::Local { rx, .. } => rx.clone(),
        }
    }

    /// Stream of write permission. Always `true` in local mode.
    pub fn subscribe_can_curate(&self) -> watch::Receiver<bool> {
        match &self.mode {
            Mode::Feed { auth, .. } => auth.subscribe(),
            Mode::Local { .. } => watch::channel(true).1,
        }
    }

    pub fn dispatch_stats(&self) -> Option<DispatchStatsSnapshot> {
        match &self.mode {
            Mode::Feed { dispatcher, .. } => Some(dispatcher.stats()),
            Mode::Local { .. } => None,
        }
    }

    /// Snapshot for rendering.
    pub fn handle(&self) -> CurationHandle {
        let dispatch: Option<Dispatch> = match &self.mode {
            Mode::Feed {
                auth, dispatcher, ..
            } => auth.can_write().then(|| {
                let dispatcher = Arc::clone(dispatcher);
                Arc::new(move |action: CurationAction| {
                    dispatcher.dispatch(action);
                }) as Dispatch
            }),
            Mode::Local { slot, .. } => {
                let slot = Arc::clone(slot);
                Some(Arc::new(move |action: CurationAction| slot.apply(&action)) as Dispatch)
            }
        };
        CurationHandle {
            state: self.state(),
            dispatch,
        }
    }

    /// Apply a message from the host backend. Only local sessions accept
    /// backend curation.
    pub fn handle_backend_message(&self, msg: BackendMessage) {
        let Mode::Local { slot, .. } = &self.mode else {
            log::debug!("Ignoring backend message for feed-backed session");
            return;
        };
        match msg {
            BackendMessage::SetSortingCuration { sorting_curation } => {
                let action = admit_action(CurationAction::SetCuration {
                    curation: sorting_curation,
                });
                slot.apply(&action);
            }
            BackendMessage::Unknown => {}
        }
    }
}
