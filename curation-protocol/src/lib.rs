//! # Curation Protocol SDK
//!
//! **Event-sourced, collaboratively edited spike-sorting curation documents.**
//!
//! A curation document records which units of a spike sorting carry which
//! labels, which units are merged, and whether curation is closed. Edits are
//! never applied in place: each one is an action appended to a shared feed,
//! and every participant derives the document by replaying the feed through
//! a pure reducer.
//!
//! - **Deterministic reducer** (same feed, same document, on every client)
//! - **Incremental replay** (only new feed messages are folded)
//! - **Closed lock** (a closed document accepts nothing but a reopen)
//! - **Trust-boundary repair** (remote documents are validated before use)
//!
//! ## Quick Start
//!
//! ```rust
//! use curation_protocol::curation::{reduce, unit_ids, CurationAction, CurationState, UnitId};
//! use std::sync::Arc;
//!
//! let state = Arc::new(CurationState::new());
//! let state = reduce(&state, &CurationAction::merge(unit_ids([1, 2])));
//! let state = reduce(&state, &CurationAction::add_label(UnitId::Int(1), "accept"));
//! assert!(state.has_label(&UnitId::Int(1), "accept"));
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`curation`] | Document model, actions, reducer, merge groups, replay engine |
//!
//! The async layer (feed subscriptions, authorization, dispatch) lives in
//! `curation-core`.

// Crate-level lint configuration. Suppress stylistic warnings that don't affect correctness.
#![allow(
    clippy::empty_line_after_doc_comments,
    clippy::doc_lazy_continuation,
    clippy::type_complexity,
    clippy::needless_range_loop
)]

// ── Public modules ──────────────────────────────────────────────────────────

/// Curation documents: ids, state, actions, reducer, consolidation, replay.
pub mod curation;

// ── Re-exports for convenience ──────────────────────────────────────────────

pub use curation::{
    reduce, ActionError, CurationAction, CurationReducer, CurationState, FeedEncoding, FeedId,
    FeedMessage, FeedReplayEngine, Projection, Reducer, ReplayError, UnitId, UserId,
};

// ── Library metadata ────────────────────────────────────────────────────────

/// Curation Protocol SDK version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the SDK version string.
pub fn version() -> &'static str {
    VERSION
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().contains('.'));
    }

    #[test]
    fn test_reexports_reduce() {
        let state = Arc::new(CurationState::new());
        let next = reduce(&state, &CurationAction::CloseCuration);
        assert!(next.is_closed());
    }
}
