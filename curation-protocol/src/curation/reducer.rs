/// The curation reducer: the single place document content changes.
///
/// `reduce` is pure and total: every `(state, action)` pair yields a state,
/// and an action that changes nothing yields the *same* `Arc` so downstream
/// consumers can skip work with `Arc::ptr_eq`.
///
/// **Closed lock:** on a closed document every action except
/// `REOPEN_CURATION` is rejected as a no-op with a warning. The check runs
/// before dispatch and dominates `SET_CURATION` too.

use serde_json::Value;
use std::sync::Arc;

use crate::curation::actions::{ActionError, CurationAction};
use crate::curation::ids::{UnitId, UnitIdArg};
use crate::curation::merge::consolidate;
use crate::curation::replay::Reducer;
use crate::curation::state::CurationState;
use crate::curation::validate::admit_action;

/// Apply one action to a document.
pub fn reduce(state: &Arc<CurationState>, action: &CurationAction) -> Arc<CurationState> {
    let kind = action.kind();
    if state.is_closed() && !kind.allowed_when_closed() {
        log::warn!(
            "Attempt to curate a closed sorting curation, rejected action: {}",
            kind.as_str()
        );
        return Arc::clone(state);
    }

    match action {
        CurationAction::SetCuration { curation } => Arc::new(curation.clone()),
        CurationAction::CloseCuration => set_closed(state, true),
        CurationAction::ReopenCuration => set_closed(state, false),
        CurationAction::AddUnitLabel { unit_id, label } => add_unit_label(state, unit_id, label),
        CurationAction::RemoveUnitLabel { unit_id, label } => {
            remove_unit_label(state, unit_id, label)
        }
        CurationAction::MergeUnits { unit_ids } => merge_units(state, unit_ids),
        CurationAction::UnmergeUnits { unit_ids } => unmerge_units(state, unit_ids),
    }
}

fn set_closed(state: &Arc<CurationState>, closed: bool) -> Arc<CurationState> {
    if state.is_closed() == closed {
        return Arc::clone(state);
    }
    let mut next = CurationState::clone(state);
    next.is_closed = Some(closed);
    Arc::new(next)
}

fn add_unit_label(state: &Arc<CurationState>, targets: &UnitIdArg, label: &str) -> Arc<CurationState> {
    let mut next = CurationState::clone(state);
    let mut changed = false;
    for unit in targets.to_vec() {
        let labels = next.labels_by_unit.entry(unit.label_key()).or_default();
        if !labels.iter().any(|l| l == label) {
            labels.push(label.to_string());
            labels.sort();
            changed = true;
        }
    }
    if changed {
        Arc::new(next)
    } else {
        Arc::clone(state)
    }
}

fn remove_unit_label(
    state: &Arc<CurationState>,
    targets: &UnitIdArg,
    label: &str,
) -> Arc<CurationState> {
    let mut next = CurationState::clone(state);
    let mut changed = false;
    for unit in targets.to_vec() {
        if let Some(labels) = next.labels_by_unit.get_mut(&unit.label_key()) {
            let before = labels.len();
            labels.retain(|l| l != label);
            changed |= labels.len() != before;
        }
    }
    if changed {
        Arc::new(next)
    } else {
        Arc::clone(state)
    }
}

fn merge_units(state: &Arc<CurationState>, unit_ids: &[UnitId]) -> Arc<CurationState> {
    let mut groups = state.merge_groups().to_vec();
    groups.push(unit_ids.to_vec());
    with_merge_groups(state, consolidate(groups))
}

fn unmerge_units(state: &Arc<CurationState>, unit_ids: &[UnitId]) -> Arc<CurationState> {
    let groups = state
        .merge_groups()
        .iter()
        .map(|g| g.iter().filter(|u| !unit_ids.contains(u)).cloned().collect())
        .collect();
    with_merge_groups(state, consolidate(groups))
}

fn with_merge_groups(state: &Arc<CurationState>, groups: Vec<Vec<UnitId>>) -> Arc<CurationState> {
    if groups.as_slice() == state.merge_groups() {
        return Arc::clone(state);
    }
    let mut next = CurationState::clone(state);
    next.merge_groups = Some(groups);
    Arc::new(next)
}

// ---------------------------------------------------------------------------
// Reducer impl
// ---------------------------------------------------------------------------

/// The sorting-curation reducer, pluggable into `FeedReplayEngine`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurationReducer;

impl Reducer for CurationReducer {
    type State = CurationState;
    type Action = CurationAction;

    fn name(&self) -> &'static str {
        "sorting-curation/1"
    }

    fn reduce(&self, state: &Arc<CurationState>, action: &CurationAction) -> Arc<CurationState> {
        reduce(state, action)
    }

    fn decode_action(&self, value: &Value) -> Result<CurationAction, ActionError> {
        CurationAction::from_json(value).map(admit_action)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
