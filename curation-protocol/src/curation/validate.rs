/// Trust-boundary validation for curation documents.
///
/// Documents that arrive from remote data (`SET_CURATION` payloads) are
/// checked against the document invariants before they reach the reducer:
/// label lists sorted and duplicate-free, merge groups a disjoint partition
/// of groups with at least two members. `repair` brings any document into
/// that shape.

use thiserror::Error;

use crate::curation::actions::CurationAction;
use crate::curation::merge::{consolidate, is_partition};
use crate::curation::state::CurationState;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Labels for unit {unit} are not sorted and unique")]
    UnsortedLabels { unit: String },

    #[error("Merge groups are not a disjoint partition of groups with at least two units")]
    InvalidMergeGroups,
}

/// Check a document against the invariants. Returns the first violation.
pub fn validate(state: &CurationState) -> Result<(), ValidationError> {
    for (unit, labels) in &state.labels_by_unit {
        if labels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::UnsortedLabels { unit: unit.clone() });
        }
    }
    if !is_partition(state.merge_groups()) {
        return Err(ValidationError::InvalidMergeGroups);
    }
    Ok(())
}

/// Bring a document into invariant shape.
///
/// Label lists are sorted and de-duplicated, empty lists are dropped, and
/// merge groups are consolidated. `isClosed` and
/// `labelChoices` pass through untouched.
pub fn repair(mut state: CurationState) -> CurationState {
    for labels in state.labels_by_unit.values_mut() {
        labels.sort();
        labels.dedup();
    }
    state.labels_by_unit.retain(|_, labels| !labels.is_empty());

    if let Some(groups) = state.merge_groups.take() {
        state.merge_groups = Some(consolidate(groups));
    }
    state
}

/// Admit a decoded remote action into the reducer.
///
/// `SET_CURATION` payloads are repaired before they are allowed through;
/// every other action passes unchanged.
pub fn admit_action(action: CurationAction) -> CurationAction {
    match action {
        CurationAction::SetCuration { curation } => {
            if let Err(e) = validate(&curation) {
                log::warn!("Repairing malformed SET_CURATION payload: {}", e);
            }
            CurationAction::SetCuration {
                curation: repair(curation),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::ids::{unit_ids, UnitId};
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, Vec<&str>)]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_valid_document_passes() {
        let state = CurationState {
            labels_by_unit: labels(&[("1", vec!["accept", "mua"])]),
            merge_groups: Some(vec![unit_ids([1, 2])]),
            ..Default::default()
        };
        assert_eq!(validate(&state), Ok(()));
        assert_eq!(repair(state.clone()), state);
    }

    #[test]
    fn test_unsorted_labels_detected_and_repaired() {
        let state = CurationState {
            labels_by_unit: labels(&[("3", vec!["reject", "accept", "reject"])]),
            ..Default::default()
        };
        assert_eq!(
            validate(&state),
            Err(ValidationError::UnsortedLabels { unit: "3".into() })
        );
        let fixed = repair(state);
        assert_eq!(fixed.labels_for(&UnitId::Int(3)), ["accept".to_string(), "reject".to_string()]);
        assert_eq!(validate(&fixed), Ok(()));
    }

    #[test]
    fn test_overlapping_merge_groups_repaired() {
        let state = CurationState {
            merge_groups: Some(vec![unit_ids([1, 2]), unit_ids([2, 3]), unit_ids([9])]),
            is_closed: Some(true),
            ..Default::default()
        };
        assert_eq!(validate(&state), Err(ValidationError::InvalidMergeGroups));
        let fixed = repair(state);
        assert_eq!(fixed.merge_groups(), [unit_ids([1, 2, 3])]);
        assert!(fixed.is_closed());
    }

    #[test]
    fn test_empty_label_lists_dropped() {
        let state = CurationState {
            labels_by_unit: labels(&[("1", vec![]), ("2", vec!["noise"])]),
            ..Default::default()
        };
        let fixed = repair(state);
        assert_eq!(fixed.labels_by_unit.len(), 1);
        assert!(fixed.labels_by_unit.contains_key("2"));
    }

    #[test]
    fn test_long_label_survives_repair() {
        let big = "y".repeat(4096);
        let state = CurationState {
            labels_by_unit: labels(&[("1", vec![big.as_str()])]),
            ..Default::default()
        };
        assert_eq!(validate(&state), Ok(()));
        assert_eq!(repair(state).labels_by_unit["1"], [big]);
    }

    #[test]
    fn test_admit_action_only_touches_set_curation() {
        let merge = CurationAction::merge(unit_ids([2, 1]));
        assert_eq!(admit_action(merge.clone()), merge);

        let admitted = admit_action(CurationAction::SetCuration {
            curation: CurationState {
                merge_groups: Some(vec![unit_ids([2, 1])]),
                ..Default::default()
            },
        });
        assert_eq!(
            admitted,
            CurationAction::SetCuration {
                curation: CurationState {
                    merge_groups: Some(vec![unit_ids([1, 2])]),
                    ..Default::default()
                },
            }
        );
    }
}
