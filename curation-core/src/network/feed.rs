/// Feed delivery: local feed buffers, the feed manager, and the
/// subscription loop that drives a replay engine.
///
/// A `Feed` is the local copy of one remote log. Deliveries may overlap
/// what is already held; only the unseen suffix is appended, so the local
/// buffer only ever grows. `FeedSubscription` long-polls the source while
/// also waiting on the buffer for push deliveries, hands the full sequence to
/// a `FeedReplayEngine`, and publishes each new projection on a `watch`
/// channel.

use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::curation::{FeedId, FeedMessage, FeedReplayEngine, FeedUriError, Projection, Reducer};
use crate::network::remote::{FeedSource, RemoteError};

/// Feed id of a `feed://<id>/...` URI.
pub fn parse_feed_uri(uri: &str) -> Result<FeedId, FeedUriError> {
    FeedId::from_uri(uri)
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

pub struct Feed {
    feed_id: FeedId,
    messages: RwLock<Vec<FeedMessage>>,
    notify: Notify,
}

impl Feed {
    pub fn new(feed_id: FeedId) -> Self {
        Self {
            feed_id,
            messages: RwLock::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    pub fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of every message held locally.
    pub async fn local_messages(&self) -> Vec<FeedMessage> {
        self.messages.read().await.clone()
    }

    /// Accept a delivery of `messages` starting at feed index `position`.
    ///
    /// Messages already held are skipped. A delivery that starts beyond the
    /// local end would leave a gap and is dropped. Returns the number of
    /// messages appended.
    pub async fn handle_new_messages(&self, position: usize, messages: Vec<FeedMessage>) -> usize {
        let mut local = self.messages.write().await;
        if position > local.len() {
            log::warn!(
                "Dropping delivery for feed {} at position {} (local length {})",
                self.feed_id,
                position,
                local.len()
            );
            return 0;
        }
        let skip = local.len() - position;
        if messages.len() <= skip {
            return 0;
        }
        let appended = messages.len() - skip;
        local.extend(messages.into_iter().skip(skip));
        drop(local);

        log::debug!("Feed {} received {} new messages", self.feed_id, appended);
        self.notify.notify_waiters();
        appended
    }

    /// Messages beyond `position`. If there are none yet, waits up to `wait`
    /// for a delivery; returns an empty list on timeout.
    pub async fn wait_for_messages(&self, position: usize, wait: Duration) -> Vec<FeedMessage> {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if let Some(found) = self.messages_after(position).await {
            return found;
        }
        if tokio::time::timeout(wait, notified).await.is_err() {
            return Vec::new();
        }
        self.messages_after(position).await.unwrap_or_default()
    }

    async fn messages_after(&self, position: usize) -> Option<Vec<FeedMessage>> {
        let local = self.messages.read().await;
        if local.len() > position {
            Some(local[position..].to_vec())
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// FeedManager
// ---------------------------------------------------------------------------

struct FeedTable {
    cache: LruCache<FeedId, Arc<Feed>>,
    // Every feed handed out. An evicted feed that a subscriber still holds
    // is found here, so pushes reach it and later loads share it.
    handed_out: HashMap<FeedId, Weak<Feed>>,
}

impl FeedTable {
    fn held(&self, feed_id: &FeedId) -> Option<Arc<Feed>> {
        self.handed_out.get(feed_id).and_then(Weak::upgrade)
    }
}

/// Loads feeds by id, one `Feed` per id, keeping the most recently used
/// feeds resident.
pub struct FeedManager {
    source: Arc<dyn FeedSource>,
    feeds: Mutex<FeedTable>,
}

impl FeedManager {
    pub fn new(source: Arc<dyn FeedSource>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            feeds: Mutex::new(FeedTable {
                cache: LruCache::new(capacity),
                handed_out: HashMap::new(),
            }),
        }
    }

    pub fn with_config(source: Arc<dyn FeedSource>, config: &SessionConfig) -> Self {
        Self::new(source, config.feed_cache_capacity)
    }

    /// The feed for `feed_id`, created empty on first use.
    pub async fn load_feed(&self, feed_id: &FeedId) -> Arc<Feed> {
        let mut feeds = self.feeds.lock().await;
        if let Some(feed) = feeds.cache.get(feed_id) {
            return Arc::clone(feed);
        }
        let feed = match feeds.held(feed_id) {
            Some(feed) => {
                log::debug!("Feed {} reloaded from a live subscriber", feed_id);
                feed
            }
            None => {
                feeds.handed_out.retain(|_, weak| weak.strong_count() > 0);
                let feed = Arc::new(Feed::new(feed_id.clone()));
                feeds.handed_out.insert(feed_id.clone(), Arc::downgrade(&feed));
                feed
            }
        };
        if let Some((evicted, _)) = feeds.cache.push(feed_id.clone(), Arc::clone(&feed)) {
            if &evicted != feed_id {
                log::debug!("Evicted feed {} from cache", evicted);
            }
        }
        feed
    }

    /// Pull everything beyond the feed's local end from the source. If the
    /// source has nothing new it may hold the request for up to `wait`.
    pub async fn sync_feed(&self, feed: &Feed, wait: Duration) -> Result<usize, RemoteError> {
        let position = feed.len().await;
        let messages = self
            .source
            .load_messages(feed.feed_id(), position, wait)
            .await?;
        Ok(feed.handle_new_messages(position, messages).await)
    }

    /// Push-style delivery. Reaches every feed still resident or held by a
    /// subscriber; anything else is ignored.
    pub async fn handle_new_feed_messages(
        &self,
        feed_id: &FeedId,
        position: usize,
        messages: Vec<FeedMessage>,
    ) -> usize {
        let feed = {
            let feeds = self.feeds.lock().await;
            feeds.cache.peek(feed_id).cloned().or_else(|| feeds.held(feed_id))
        };
        match feed {
            Some(feed) => feed.handle_new_messages(position, messages).await,
            None => {
                log::debug!("Ignoring push for unloaded feed {}", feed_id);
                0
            }
        }
    }

    pub async fn loaded_count(&self) -> usize {
        self.feeds.lock().await.cache.len()
    }
}

// ---------------------------------------------------------------------------
// FeedSubscription
// ---------------------------------------------------------------------------

/// Background loop keeping a replay engine in step with its feed.
///
/// The loop stops when the subscription is dropped.
pub struct FeedSubscription<S> {
    feed_id: FeedId,
    state: watch::Receiver<Projection<S>>,
    handle: JoinHandle<()>,
}

impl<S: Send + Sync + 'static> FeedSubscription<S> {
    pub fn spawn<R>(
        manager: Arc<FeedManager>,
        mut engine: FeedReplayEngine<R>,
        config: &SessionConfig,
    ) -> Self
    where
        R: Reducer<State = S> + Send + 'static,
    {
        let feed_id = engine.feed_id().clone();
        let (tx, rx) = watch::channel(engine.state());
        let poll_wait = config.feed_poll_wait;
        let idle_backoff = config.idle_backoff;
        let loop_feed_id = feed_id.clone();

        let handle = tokio::spawn(async move {
            let feed = manager.load_feed(&loop_feed_id).await;
            let mut position = 0;
            loop {
                if feed.len().await <= position {
                    // Whichever comes first: the source's long poll or a push.
                    tokio::select! {
                        synced = manager.sync_feed(&feed, poll_wait) => match synced {
                            Ok(0) => tokio::time::sleep(idle_backoff).await,
                            Ok(_) => {}
                            Err(e) => {
                                log::warn!("Failed to load feed {}: {}", loop_feed_id, e);
                                tokio::time::sleep(idle_backoff).await;
                            }
                        },
                        _ = feed.wait_for_messages(position, poll_wait) => {}
                    }
                }

                let messages = feed.local_messages().await;
                if messages.len() <= position {
                    continue;
                }
                position = messages.len();
                let projection = engine.apply(&messages);
                tx.send_if_modified(|current| {
                    if current.same_version(&projection) {
                        false
                    } else {
                        *current = projection;
                        true
                    }
                });
                if tx.is_closed() {
                    break;
                }
            }
        });

        Self {
            feed_id,
            state: rx,
            handle,
        }
    }
}

impl<S> FeedSubscription<S> {
    pub fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    /// Latest projection.
    pub fn state(&self) -> Projection<S> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Projection<S>> {
        self.state.clone()
    }
}

impl<S> Drop for FeedSubscription<S> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::{
        unit_ids, CurationAction, CurationReducer, CurationState, FeedEncoding, UnitId,
    };
    use crate::network::memory::InMemoryService;
    use serde_json::json;

    fn msg(n: i64) -> FeedMessage {
        FeedMessage::new(json!({ "n": n }))
    }

    fn msgs(range: std::ops::Range<i64>) -> Vec<FeedMessage> {
        range.map(msg).collect()
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            feed_poll_wait: Duration::from_millis(20),
            idle_backoff: Duration::from_millis(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_feed_uri() {
        assert_eq!(parse_feed_uri("feed://abc123/x/y").unwrap(), FeedId::new("abc123"));
        assert_eq!(parse_feed_uri("feed://abc123").unwrap(), FeedId::new("abc123"));
        assert!(matches!(parse_feed_uri("abc"), Err(FeedUriError::MissingFeedId(_))));
        assert!(matches!(parse_feed_uri("feed:///x"), Err(FeedUriError::MissingFeedId(_))));
    }

    // -------------------------------------------------------------------
    // Feed
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_overlapping_delivery_appends_suffix() {
        let feed = Feed::new(FeedId::new("f"));
        assert_eq!(feed.handle_new_messages(0, msgs(0..3)).await, 3);
        assert_eq!(feed.handle_new_messages(0, msgs(0..5)).await, 2);
        assert_eq!(feed.handle_new_messages(2, msgs(2..5)).await, 0);
        assert_eq!(feed.local_messages().await, msgs(0..5));
    }

    #[tokio::test]
    async fn test_gap_delivery_dropped() {
        let feed = Feed::new(FeedId::new("f"));
        feed.handle_new_messages(0, msgs(0..2)).await;
        assert_eq!(feed.handle_new_messages(5, msgs(5..7)).await, 0);
        assert_eq!(feed.len().await, 2);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_available() {
        let feed = Feed::new(FeedId::new("f"));
        feed.handle_new_messages(0, msgs(0..3)).await;
        let got = feed.wait_for_messages(1, Duration::from_secs(60)).await;
        assert_eq!(got, msgs(1..3));
    }

    #[tokio::test]
    async fn test_wait_times_out_empty() {
        let feed = Feed::new(FeedId::new("f"));
        let got = feed.wait_for_messages(0, Duration::from_millis(10)).await;
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_wait_wakes_on_delivery() {
        let feed = Arc::new(Feed::new(FeedId::new("f")));
        let waiter = {
            let feed = Arc::clone(&feed);
            tokio::spawn(async move { feed.wait_for_messages(0, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        feed.handle_new_messages(0, msgs(0..2)).await;
        assert_eq!(waiter.await.unwrap(), msgs(0..2));
    }

    // -------------------------------------------------------------------
    // FeedManager
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_manager_returns_same_feed() {
        let service = Arc::new(InMemoryService::new());
        let manager = FeedManager::new(service, 4);
        let a = manager.load_feed(&FeedId::new("a")).await;
        let again = manager.load_feed(&FeedId::new("a")).await;
        assert!(Arc::ptr_eq(&a, &again));
    }

    #[tokio::test]
    async fn test_manager_evicts_least_recent() {
        let service = Arc::new(InMemoryService::new());
        let manager = FeedManager::new(service, 2);
        let a = manager.load_feed(&FeedId::new("a")).await;
        a.handle_new_messages(0, msgs(0..2)).await;
        let released = Arc::downgrade(&a);
        drop(a);
        manager.load_feed(&FeedId::new("b")).await;
        manager.load_feed(&FeedId::new("c")).await;
        assert_eq!(manager.loaded_count().await, 2);
        assert!(released.upgrade().is_none());
        let a2 = manager.load_feed(&FeedId::new("a")).await;
        assert!(a2.is_empty().await);
    }

    #[tokio::test]
    async fn test_evicted_feed_held_by_subscriber_stays_shared() {
        let service = Arc::new(InMemoryService::new());
        let manager = FeedManager::new(service, 1);
        let a = manager.load_feed(&FeedId::new("a")).await;
        manager.load_feed(&FeedId::new("b")).await;
        assert_eq!(manager.loaded_count().await, 1);

        assert_eq!(
            manager.handle_new_feed_messages(&FeedId::new("a"), 0, msgs(0..2)).await,
            2
        );
        assert_eq!(a.len().await, 2);

        let again = manager.load_feed(&FeedId::new("a")).await;
        assert!(Arc::ptr_eq(&a, &again));
    }

    #[tokio::test]
    async fn test_sync_pulls_from_source() {
        let service = Arc::new(InMemoryService::new());
        let id = FeedId::new("a");
        service.append_messages(&id, msgs(0..3)).await;
        let manager = FeedManager::new(service.clone(), 4);
        let feed = manager.load_feed(&id).await;
        assert_eq!(manager.sync_feed(&feed, Duration::ZERO).await.unwrap(), 3);
        service.append_messages(&id, msgs(3..4)).await;
        assert_eq!(manager.sync_feed(&feed, Duration::ZERO).await.unwrap(), 1);
        assert_eq!(feed.len().await, 4);
    }

    #[tokio::test]
    async fn test_push_delivery_only_for_loaded_feeds() {
        let service = Arc::new(InMemoryService::new());
        let manager = FeedManager::new(service, 4);
        assert_eq!(
            manager.handle_new_feed_messages(&FeedId::new("x"), 0, msgs(0..2)).await,
            0
        );
        manager.load_feed(&FeedId::new("x")).await;
        assert_eq!(
            manager.handle_new_feed_messages(&FeedId::new("x"), 0, msgs(0..2)).await,
            2
        );
    }

    // -------------------------------------------------------------------
    // FeedSubscription
    // -------------------------------------------------------------------

    async fn wait_until<S, F>(rx: &mut watch::Receiver<Projection<S>>, pred: F) -> Projection<S>
    where
        F: Fn(&S) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let current = rx.borrow_and_update();
                    if pred(&current) {
                        return current.clone();
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_subscription_tracks_feed() {
        let service = Arc::new(InMemoryService::new());
        let id = FeedId::new("curation");
        let encoding = FeedEncoding::Bare;
        service
            .append_action(&id, &CurationAction::merge(unit_ids([1, 2])), encoding)
            .await;

        let config = fast_config();
        let manager = Arc::new(FeedManager::with_config(service.clone(), &config));
        let engine =
            FeedReplayEngine::new(id.clone(), CurationReducer, &CurationState::new(), encoding)
                .unwrap();
        let sub = FeedSubscription::spawn(manager, engine, &config);
        let mut rx = sub.subscribe();

        let s = wait_until(&mut rx, |s: &CurationState| !s.merge_groups().is_empty()).await;
        assert_eq!(s.merge_groups(), [unit_ids([1, 2])]);

        service
            .append_action(&id, &CurationAction::add_label(UnitId::Int(1), "accept"), encoding)
            .await;
        let s = wait_until(&mut rx, |s: &CurationState| s.has_label(&UnitId::Int(1), "accept"))
            .await;
        assert_eq!(s.merge_groups(), [unit_ids([1, 2])]);
        assert_eq!(sub.feed_id(), &id);
    }

    #[tokio::test]
    async fn test_subscription_sees_remote_append_with_default_config() {
        let service = Arc::new(InMemoryService::new());
        let id = FeedId::new("curation");
        let config = SessionConfig::default();
        let manager = Arc::new(FeedManager::with_config(service.clone(), &config));
        let engine =
            FeedReplayEngine::new(id.clone(), CurationReducer, &CurationState::new(), config.feed_encoding)
                .unwrap();
        let sub = FeedSubscription::spawn(manager, engine, &config);
        let mut rx = sub.subscribe();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let appended_at = tokio::time::Instant::now();
        service
            .append_action(&id, &CurationAction::merge(unit_ids([1, 2])), config.feed_encoding)
            .await;
        wait_until(&mut rx, |s: &CurationState| !s.merge_groups().is_empty()).await;
        assert!(appended_at.elapsed() < Duration::from_secs(1));
    }

    /// Source that answers at once and never holds a request open.
    struct ImmediateSource(Arc<InMemoryService>);

    #[async_trait::async_trait]
    impl FeedSource for ImmediateSource {
        async fn load_messages(
            &self,
            feed_id: &FeedId,
            position: usize,
            _wait: Duration,
        ) -> Result<Vec<FeedMessage>, RemoteError> {
            self.0.load_messages(feed_id, position, Duration::ZERO).await
        }
    }

    #[tokio::test]
    async fn test_subscription_polls_source_without_long_poll() {
        let service = Arc::new(InMemoryService::new());
        let id = FeedId::new("curation");
        let config = SessionConfig::default();
        let source = Arc::new(ImmediateSource(service.clone()));
        let manager = Arc::new(FeedManager::with_config(source, &config));
        let engine =
            FeedReplayEngine::new(id.clone(), CurationReducer, &CurationState::new(), config.feed_encoding)
                .unwrap();
        let sub = FeedSubscription::spawn(manager, engine, &config);
        let mut rx = sub.subscribe();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let appended_at = tokio::time::Instant::now();
        service
            .append_action(&id, &CurationAction::CloseCuration, config.feed_encoding)
            .await;
        wait_until(&mut rx, |s: &CurationState| s.is_closed()).await;
        assert!(appended_at.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_subscription_starts_at_initial_state() {
        let service = Arc::new(InMemoryService::new());
        let config = fast_config();
        let manager = Arc::new(FeedManager::with_config(service, &config));
        let initial = CurationState {
            label_choices: Some(vec!["good".into()]),
            ..Default::default()
        };
        let engine =
            FeedReplayEngine::new(FeedId::new("empty"), CurationReducer, &initial, FeedEncoding::Bare)
                .unwrap();
        let sub = FeedSubscription::spawn(manager, engine, &config);
        assert_eq!(*sub.state(), initial);
    }
}
