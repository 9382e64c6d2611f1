pub mod actions;
/// Sorting curation: event-sourced curation documents.
///
/// A curation document (unit labels, merge groups, a closed flag) is never
/// stored directly. Every edit is an action appended to a feed, and every
/// client derives the document by folding the reducer over the feed in
/// order. Clients converge because they fold the same sequence with the same
/// pure reducer.
///
/// # Module structure
/// - `ids`: UnitId, FeedId, UserId identity types
/// - `state`: CurationState document
/// - `actions`: CurationAction tagged union and decoding
/// - `limits`: Guardrail constants and feed size checks
/// - `merge`: Merge-group consolidation
/// - `validate`: Trust-boundary validation and repair
/// - `reducer`: The curation reducer
/// - `replay`: Incremental feed replay engine
/// - `labels`: Label selection helpers for curation controls
pub mod ids;
pub mod labels;
pub mod limits;
pub mod merge;
pub mod reducer;
pub mod replay;
pub mod state;
pub mod validate;

// Re-export core types for convenience
pub use actions::{ActionError, ActionKind, CurationAction};
pub use ids::{unit_ids, FeedId, FeedUriError, UnitId, UnitIdArg, UserId};
pub use labels::{
    abbreviated_unit_ids, all_label_choices, label_checkbox_states, toggle_label_action,
    LabelCheckboxState, STANDARD_LABEL_CHOICES,
};
pub use limits::{check_feed_limits, FeedLimitStatus};
pub use merge::{consolidate, is_partition, merge_group_for_unit, units_are_in_merge_groups};
pub use reducer::{reduce, CurationReducer};
pub use replay::{
    canonical_json, fold, state_fingerprint, FeedEncoding, FeedMessage, FeedReplayEngine,
    Projection, Reducer, ReplayError, ReplayKey,
};
pub use state::{CurationState, DocumentPhase};
pub use validate::{admit_action, repair, validate, ValidationError};
