/// Feed size guardrails.
///
/// Actions are never rejected for size; these thresholds only decide when a
/// feed has grown large enough that replay cost is worth surfacing.

/// Feed length at which replay logs a "needs compaction" warning.
pub const FEED_SOFT_CAP_MESSAGES: usize = 50_000;

/// Feed length past which every full replay is logged at warn level.
pub const FEED_WARN_CAP_MESSAGES: usize = 250_000;

/// Feed size status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedLimitStatus {
    Ok,
    /// Replay is still correct but the feed should be compacted into a
    /// `SET_CURATION` snapshot.
    NeedsCompaction,
    /// Full replays are expensive enough to warn on every one.
    Oversized,
}

/// Classify a feed by its message count.
pub fn check_feed_limits(message_count: usize) -> FeedLimitStatus {
    if message_count >= FEED_WARN_CAP_MESSAGES {
        FeedLimitStatus::Oversized
    } else if message_count >= FEED_SOFT_CAP_MESSAGES {
        FeedLimitStatus::NeedsCompaction
    } else {
        FeedLimitStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_limits_ok() {
        assert_eq!(check_feed_limits(0), FeedLimitStatus::Ok);
        assert_eq!(check_feed_limits(49_999), FeedLimitStatus::Ok);
    }

    #[test]
    fn test_feed_limits_needs_compaction() {
        assert_eq!(check_feed_limits(50_000), FeedLimitStatus::NeedsCompaction);
        assert_eq!(check_feed_limits(249_999), FeedLimitStatus::NeedsCompaction);
    }

    #[test]
    fn test_feed_limits_oversized() {
        assert_eq!(check_feed_limits(250_000), FeedLimitStatus::Oversized);
    }
}
