// Crate-level lint configuration. Suppress stylistic warnings that don't affect correctness.
#![allow(
    clippy::empty_line_after_doc_comments,
    clippy::doc_lazy_continuation,
    clippy::type_complexity,
    clippy::needless_range_loop
)]

// ── Re-export Curation Protocol SDK modules ─────────────────────────────────
// The document model, reducer and replay engine live in the standalone
// `curation-protocol` crate. Re-exported so `crate::curation::…` resolves
// the same way from here.
pub use curation_protocol::curation;

// ── Local modules (app layer, not part of the standalone protocol) ──────────
pub mod auth;
pub mod config;
pub mod dispatch;
pub mod identity;
pub mod network;
pub mod session;

// ── Re-export main types ────────────────────────────────────────────────────
pub use auth::{authorized_users_key, AuthorizationGate, AuthorizationWatch};
pub use config::SessionConfig;
pub use curation::{
    CurationAction, CurationReducer, CurationState, FeedId, FeedMessage, FeedReplayEngine,
    Projection, UnitId, UserId,
};
pub use dispatch::{DispatchError, DispatchStatsSnapshot, MutationDispatcher};
pub use identity::{IdentityContext, SignedInUser};
pub use network::{FeedManager, FeedSubscription, InMemoryService};
pub use session::{BackendMessage, CurationHandle, CurationServices, CurationSession, Dispatch};

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn get_version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = get_version();
        assert!(!version.is_empty());
        assert_eq!(version, curation_protocol::version());
    }
}
