/// Authorization gate for curation writes.
///
/// A user may write to a curation feed only if they are signed in and their
/// user id appears in the JSON array stored under
/// `<namespace>/<authorized-users-key>/<feedId>` in the mutable store.
/// Every failure along the way (no identity, no feed, missing key, bad
/// JSON, store error) denies.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::curation::FeedId;
use crate::identity::SignedInUser;
use crate::network::remote::MutableStore;

/// Full mutable-store key for a feed's authorized-user list.
pub fn authorized_users_key(config: &SessionConfig, feed_id: &FeedId) -> String {
    format!(
        "{}/{}/{}",
        config.namespace,
        config.authorized_users_key,
        feed_id.as_str()
    )
}

/// Parse a stored authorized-users value. Anything but a JSON array of
/// strings yields `None`.
pub fn parse_authorized_users(raw: &str) -> Option<Vec<String>> {
    serde_json::from_str::<Vec<String>>(raw).ok()
}

pub struct AuthorizationGate {
    store: Arc<dyn MutableStore>,
    config: Arc<SessionConfig>,
}

impl AuthorizationGate {
    pub fn new(store: Arc<dyn MutableStore>, config: Arc<SessionConfig>) -> Self {
        Self { store, config }
    }

    /// One evaluation, no caching.
    pub async fn may_write(&self, identity: &SignedInUser, feed_id: Option<&FeedId>) -> bool {
        let Some(feed_id) = feed_id else {
            return false;
        };
        let Some((user_id, _token)) = identity.credentials() else {
            return false;
        };

        let key = authorized_users_key(&self.config, feed_id);
        let raw = match self.store.get_mutable(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::debug!("No authorized-users list at {}", key);
                return false;
            }
            Err(e) => {
                log::warn!("Authorization lookup for {} failed: {}", key, e);
                return false;
            }
        };

        match parse_authorized_users(&raw) {
            Some(users) => users.iter().any(|u| u == user_id.as_str()),
            None => {
                log::warn!("Authorized-users value at {} is not a JSON array of strings", key);
                false
            }
        }
    }

    /// Re-evaluate whenever the identity changes, publishing the result.
    ///
    /// The published value drops to `false` at the start of each
    /// evaluation. The loop stops when the watch is dropped or the identity
    /// source goes away.
    pub fn watch(
        self: Arc<Self>,
        mut identity: watch::Receiver<SignedInUser>,
        feed_id: Option<FeedId>,
    ) -> AuthorizationWatch {
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            loop {
                let user = identity.borrow_and_update().clone();
                tx.send_if_modified(|v| std::mem::replace(v, false));

                let allowed = self.may_write(&user, feed_id.as_ref()).await;
                if identity.has_changed().unwrap_or(false) {
                    // Stale result for a previous identity.
                    continue;
                }
                tx.send_if_modified(|v| {
                    let changed = *v != allowed;
                    *v = allowed;
                    changed
                });

                if tx.is_closed() || identity.changed().await.is_err() {
                    break;
                }
            }
        });

        AuthorizationWatch { rx, handle }
    }
}

/// Live authorization result for one identity stream and feed.
pub struct AuthorizationWatch {
    rx: watch::Receiver<bool>,
    handle: JoinHandle<()>,
}

impl AuthorizationWatch {
    pub fn can_write(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

impl Drop for AuthorizationWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityContext;
    use crate::network::memory::InMemoryService;
    use std::time::Duration;

    const KEY: &str = "@sortingview/@sortingCurationAuthorizedUsers/feed-1";

    async fn gate_with(value: Option<&str>) -> AuthorizationGate {
        let service = Arc::new(InMemoryService::new());
        if let Some(v) = value {
            service.set_mutable(KEY, v).await;
        }
        AuthorizationGate::new(service, Arc::new(SessionConfig::default()))
    }

    fn alice() -> SignedInUser {
        SignedInUser::signed_in("alice", "tok")
    }

    #[test]
    fn test_key_layout() {
        let key = authorized_users_key(&SessionConfig::default(), &FeedId::new("feed-1"));
        assert_eq!(key, KEY);
    }

    #[test]
    fn test_parse_authorized_users() {
        assert_eq!(parse_authorized_users(r#"["a","b"]"#), Some(vec!["a".into(), "b".into()]));
        assert_eq!(parse_authorized_users(r#"{"a":1}"#), None);
        assert_eq!(parse_authorized_users(r#"[1,2]"#), None);
        assert_eq!(parse_authorized_users("not json"), None);
    }

    #[tokio::test]
    async fn test_listed_user_may_write() {
        let gate = gate_with(Some(r#"["bob","alice"]"#)).await;
        assert!(gate.may_write(&alice(), Some(&FeedId::new("feed-1"))).await);
    }

    #[tokio::test]
    async fn test_denials() {
        let feed = FeedId::new("feed-1");
        let listed = gate_with(Some(r#"["alice"]"#)).await;
        assert!(!listed.may_write(&SignedInUser::anonymous(), Some(&feed)).await);
        assert!(!listed.may_write(&SignedInUser::signed_in("alice", ""), Some(&feed)).await);
        assert!(!listed.may_write(&SignedInUser::signed_in("carol", "t"), Some(&feed)).await);
        assert!(!listed.may_write(&alice(), None).await);
        assert!(!listed.may_write(&alice(), Some(&FeedId::new("feed-2"))).await);

        assert!(!gate_with(None).await.may_write(&alice(), Some(&feed)).await);
        assert!(!gate_with(Some("garbage")).await.may_write(&alice(), Some(&feed)).await);
        assert!(!gate_with(Some(r#""alice""#)).await.may_write(&alice(), Some(&feed)).await);
    }

    #[tokio::test]
    async fn test_watch_follows_identity() {
        let gate = Arc::new(gate_with(Some(r#"["alice"]"#)).await);
        let identity = IdentityContext::anonymous();
        let auth = gate.watch(identity.subscribe(), Some(FeedId::new("feed-1")));
        let mut rx = auth.subscribe();
        assert!(!auth.can_write());

        identity.set(alice());
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| *v))
            .await
            .unwrap()
            .unwrap();
        assert!(auth.can_write());

        identity.set(SignedInUser::anonymous());
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| !*v))
            .await
            .unwrap()
            .unwrap();
        assert!(!auth.can_write());
    }
}
