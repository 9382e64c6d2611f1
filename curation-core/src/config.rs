/// Session configuration.
///
/// Every knob the async layer reads lives here. Defaults match the
/// sortingview deployment; tests override single fields with struct-update
/// syntax.

use std::time::Duration;

use crate::curation::FeedEncoding;

/// Remote task that appends a curation action to its feed.
pub const DEFAULT_TASK_NAME: &str = "spikesortingview.sorting_curation_action.1";

/// Namespace of the mutable key/value store.
pub const DEFAULT_NAMESPACE: &str = "@sortingview";

/// Key (under the namespace) listing users allowed to curate a feed.
pub const DEFAULT_AUTHORIZED_USERS_KEY: &str = "@sortingCurationAuthorizedUsers";

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Mutable-store namespace used for authorization lookups.
    pub namespace: String,
    /// Authorized-users key; the full key is `<namespace>/<key>/<feedId>`.
    pub authorized_users_key: String,
    /// Remote task name for curation actions.
    pub task_name: String,
    /// Upper bound on one long poll of the feed source, and on one wait for
    /// a push delivery.
    pub feed_poll_wait: Duration,
    /// Pause after a source poll that returned nothing new or failed.
    pub idle_backoff: Duration,
    /// How long a dispatched submission is observed before it counts as
    /// timed out.
    pub dispatch_timeout: Duration,
    /// Number of feeds kept loaded by the `FeedManager`.
    pub feed_cache_capacity: usize,
    /// How actions are carried in feed messages.
    pub feed_encoding: FeedEncoding,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            authorized_users_key: DEFAULT_AUTHORIZED_USERS_KEY.to_string(),
            task_name: DEFAULT_TASK_NAME.to_string(),
            feed_poll_wait: Duration::from_secs(10),
            idle_backoff: Duration::from_millis(100),
            dispatch_timeout: Duration::from_secs(30),
            feed_cache_capacity: 64,
            // Curation feeds store the action itself as the message.
            feed_encoding: FeedEncoding::Bare,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.task_name, "spikesortingview.sorting_curation_action.1");
        assert_eq!(config.feed_poll_wait, Duration::from_secs(10));
        assert_eq!(config.idle_backoff, Duration::from_millis(100));
        assert_eq!(config.feed_encoding, FeedEncoding::Bare);
    }

    #[test]
    fn test_struct_update() {
        let config = SessionConfig {
            dispatch_timeout: Duration::from_millis(5),
            ..Default::default()
        };
        assert_eq!(config.dispatch_timeout, Duration::from_millis(5));
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }
}
