/// Feed replay engine: derives document state by folding a reducer over a
/// feed's messages.
///
/// The feed is the source of truth; the engine only holds a projection of
/// it. Progress is memoized in a `ReplayCache` so that when the feed grows
/// from `n` to `n + k` messages only the `k` new ones are reduced.
///
/// **Split invariance:** for a pure reducer, folding `[0..n)` and then
/// `[n..n+k)` yields the same state as folding `[0..n+k)` in one pass. The
/// cache is only sound because of this, so it is covered by tests at every
/// split point.
///
/// The cache is keyed by `(feed id, reducer name, initial-state
/// fingerprint)`. The fingerprint is BLAKE3 over the canonical (sorted-key)
/// JSON of the initial state, so a deep-equal initial state never forces a
/// re-fold while any real change does.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

use crate::curation::actions::{ActionError, CurationAction};
use crate::curation::ids::FeedId;
use crate::curation::limits::{check_feed_limits, FeedLimitStatus};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Initial state serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

/// A pure state transition function plus the decoder for its actions.
///
/// `name` identifies the reducer's semantics: engines invalidate their
/// cache when it changes.
pub trait Reducer {
    type State: Clone + Serialize + DeserializeOwned;
    type Action;

    fn name(&self) -> &'static str;

    fn reduce(&self, state: &Arc<Self::State>, action: &Self::Action) -> Arc<Self::State>;

    fn decode_action(&self, value: &Value) -> Result<Self::Action, ActionError>;
}

/// Fold `actions` over `initial` in order.
pub fn fold<R: Reducer>(reducer: &R, initial: &Arc<R::State>, actions: &[R::Action]) -> Arc<R::State> {
    actions
        .iter()
        .fold(Arc::clone(initial), |state, action| reducer.reduce(&state, action))
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Read-only view of a derived state version.
///
/// There is deliberately no way to get `&mut T` out of a projection: the
/// only way to change curation state is to append to the feed.
pub struct Projection<T>(Arc<T>);

impl<T> Projection<T> {
    pub fn new(state: Arc<T>) -> Self {
        Projection(state)
    }

    /// True if both projections are the very same version.
    pub fn same_version(&self, other: &Projection<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Shared handle to this version.
    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.0)
    }
}

impl<T> Clone for Projection<T> {
    fn clone(&self) -> Self {
        Projection(Arc::clone(&self.0))
    }
}

impl<T> Deref for Projection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Projection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Projection").field(&self.0).finish()
    }
}

impl<T: PartialEq> PartialEq for Projection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

// ---------------------------------------------------------------------------
// Feed messages
// ---------------------------------------------------------------------------

/// One item of a feed, as delivered by the remote log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedMessage(Value);

impl FeedMessage {
    pub fn new(value: Value) -> Self {
        FeedMessage(value)
    }

    pub fn as_json(&self) -> &Value {
        &self.0
    }

    /// Wrap an action the way `encoding` stores it.
    pub fn from_action(action: &CurationAction, encoding: FeedEncoding) -> Self {
        match encoding {
            FeedEncoding::ActionField => {
                let mut obj = Map::new();
                obj.insert("action".to_string(), action.to_json());
                FeedMessage(Value::Object(obj))
            }
            FeedEncoding::Bare => FeedMessage(action.to_json()),
        }
    }
}

/// How an action is carried inside a feed message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FeedEncoding {
    /// `{"action": {...}}`; messages without an `action` field are skipped.
    #[default]
    ActionField,
    /// Legacy: the message is the action itself.
    Bare,
}

impl FeedEncoding {
    /// The action payload of `msg`, or `None` if it carries no action.
    pub fn extract<'a>(&self, msg: &'a FeedMessage) -> Option<&'a Value> {
        match self {
            FeedEncoding::ActionField => msg.0.get("action").filter(|v| !v.is_null()),
            FeedEncoding::Bare => Some(&msg.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical serialization
// ---------------------------------------------------------------------------

/// Serialize `value` to JSON with every object's keys sorted.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = canonicalize(serde_json::to_value(value)?);
    serde_json::to_string(&v)
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Hex BLAKE3 digest of a state's canonical JSON.
pub fn state_fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(value)?;
    Ok(hex::encode(blake3::hash(canonical.as_bytes()).as_bytes()))
}

// ---------------------------------------------------------------------------
// FeedReplayEngine
// ---------------------------------------------------------------------------

/// Identity of a replay cache.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ReplayKey {
    pub feed_id: FeedId,
    pub reducer: &'static str,
    pub initial_fingerprint: String,
}

struct ReplayCache<S> {
    processed_count: usize,
    skipped_count: usize,
    state: Arc<S>,
}

pub struct FeedReplayEngine<R: Reducer> {
    feed_id: FeedId,
    reducer: R,
    encoding: FeedEncoding,
    initial_state: Arc<R::State>,
    initial_fingerprint: String,
    cache: Option<ReplayCache<R::State>>,
}

impl<R: Reducer> FeedReplayEngine<R> {
    /// Create an engine for one feed. Nothing is folded until `apply`.
    pub fn new(
        feed_id: FeedId,
        reducer: R,
        initial_state: &R::State,
        encoding: FeedEncoding,
    ) -> Result<Self, ReplayError> {
        let initial_fingerprint = state_fingerprint(initial_state)?;
        Ok(FeedReplayEngine {
            feed_id,
            reducer,
            encoding,
            initial_state: Arc::new(initial_state.clone()),
            initial_fingerprint,
            cache: None,
        })
    }

    pub fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    pub fn key(&self) -> ReplayKey {
        ReplayKey {
            feed_id: self.feed_id.clone(),
            reducer: self.reducer.name(),
            initial_fingerprint: self.initial_fingerprint.clone(),
        }
    }

    /// Number of feed messages folded into the cached state.
    pub fn processed_count(&self) -> usize {
        self.cache.as_ref().map(|c| c.processed_count).unwrap_or(0)
    }

    /// Number of folded messages that did not decode and were skipped.
    pub fn skipped_count(&self) -> usize {
        self.cache.as_ref().map(|c| c.skipped_count).unwrap_or(0)
    }

    /// Current projection: the cached fold, or the initial state before the
    /// first delivery.
    pub fn state(&self) -> Projection<R::State> {
        match &self.cache {
            Some(cache) => Projection::new(Arc::clone(&cache.state)),
            None => Projection::new(Arc::clone(&self.initial_state)),
        }
    }

    /// Replace the initial state. The cache is dropped only if the new value
    /// differs from the old one by canonical serialization. Returns whether
    /// the cache was invalidated.
    pub fn set_initial_state(&mut self, initial_state: &R::State) -> Result<bool, ReplayError> {
        let fingerprint = state_fingerprint(initial_state)?;
        if fingerprint == self.initial_fingerprint {
            return Ok(false);
        }
        log::debug!("Initial state changed for feed {}, replaying from scratch", self.feed_id);
        self.initial_state = Arc::new(initial_state.clone());
        self.initial_fingerprint = fingerprint;
        self.cache = None;
        Ok(true)
    }

    /// Replace the reducer. The cache is dropped if its name differs.
    pub fn set_reducer(&mut self, reducer: R) -> bool {
        let invalidate = reducer.name() != self.reducer.name();
        self.reducer = reducer;
        if invalidate {
            log::debug!("Reducer changed for feed {}, replaying from scratch", self.feed_id);
            self.cache = None;
        }
        invalidate
    }

    /// Point the engine at a different feed, discarding all derived state.
    pub fn reset_feed(&mut self, feed_id: FeedId) {
        if feed_id != self.feed_id {
            self.feed_id = feed_id;
            self.cache = None;
        }
    }

    /// Fold the full current message sequence of the feed.
    ///
    /// Only messages beyond the cached `processed_count` are reduced. A
    /// message that does not decode is logged and skipped so that every
    /// client folding the same feed keeps applying what follows it.
    pub fn apply(&mut self, messages: &[FeedMessage]) -> Projection<R::State> {
        let (mut index, mut skipped, mut state) = match self.cache.take() {
            Some(cache) if cache.processed_count <= messages.len() => {
                (cache.processed_count, cache.skipped_count, cache.state)
            }
            Some(cache) => {
                log::warn!(
                    "Feed {} shrank from {} to {} messages, replaying from scratch",
                    self.feed_id,
                    cache.processed_count,
                    messages.len()
                );
                (0, 0, Arc::clone(&self.initial_state))
            }
            None => (0, 0, Arc::clone(&self.initial_state)),
        };

        if index == 0 {
            match check_feed_limits(messages.len()) {
                FeedLimitStatus::Ok => {}
                FeedLimitStatus::NeedsCompaction => log::info!(
                    "Feed {} has {} messages and needs compaction",
                    self.feed_id,
                    messages.len()
                ),
                FeedLimitStatus::Oversized => log::warn!(
                    "Full replay of oversized feed {} ({} messages)",
                    self.feed_id,
                    messages.len()
                ),
            }
        }

        while index < messages.len() {
            if let Some(payload) = self.encoding.extract(&messages[index]) {
                match self.reducer.decode_action(payload) {
                    Ok(action) => state = self.reducer.reduce(&state, &action),
                    Err(e) => {
                        log::warn!(
                            "Skipping feed {} message {}: not a valid action: {}",
                            self.feed_id,
                            index,
                            e
                        );
                        skipped += 1;
                    }
                }
            }
            index += 1;
        }

        self.cache = Some(ReplayCache {
            processed_count: index,
            skipped_count: skipped,
            state: Arc::clone(&state),
        });
        Projection::new(state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
