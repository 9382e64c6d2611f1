/// Label selection helpers for curation controls.
///
/// These are pure derivations from a `CurationState` and the current unit
/// selection: which labels to offer, what each checkbox shows, and which
/// action a click on it produces.

use crate::curation::actions::CurationAction;
use crate::curation::ids::UnitId;
use crate::curation::state::CurationState;

/// Labels offered on every document.
pub const STANDARD_LABEL_CHOICES: [&str; 5] = ["accept", "reject", "noise", "artifact", "mua"];

/// Display state of one label checkbox for the current selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelCheckboxState {
    /// Every selected unit carries the label.
    Checked,
    /// No selected unit carries the label.
    Unchecked,
    /// Some, but not all, selected units carry the label.
    Indeterminate,
    /// Read-only document or empty selection.
    Disabled,
}

/// Standard choices, then the document's `labelChoices`, then every label in
/// use. No duplicates; first-seen order.
pub fn all_label_choices(state: &CurationState) -> Vec<String> {
    let mut out: Vec<String> = STANDARD_LABEL_CHOICES.iter().map(|s| s.to_string()).collect();
    let extra = state
        .label_choices
        .iter()
        .flatten()
        .chain(state.labels_by_unit.values().flatten());
    for label in extra {
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    out
}

/// Checkbox state for each of `choices`, in the same order.
pub fn label_checkbox_states(
    choices: &[String],
    state: &CurationState,
    selected: &[UnitId],
    read_only: bool,
) -> Vec<(String, LabelCheckboxState)> {
    choices
        .iter()
        .map(|label| {
            let cb = if read_only || selected.is_empty() {
                LabelCheckboxState::Disabled
            } else {
                let with_label = selected.iter().filter(|u| state.has_label(u, label)).count();
                if with_label == 0 {
                    LabelCheckboxState::Unchecked
                } else if with_label == selected.len() {
                    LabelCheckboxState::Checked
                } else {
                    LabelCheckboxState::Indeterminate
                }
            };
            (label.clone(), cb)
        })
        .collect()
}

/// Action produced by clicking a checkbox, if any.
pub fn toggle_label_action(
    label: &str,
    checkbox: LabelCheckboxState,
    selected: &[UnitId],
) -> Option<CurationAction> {
    match checkbox {
        LabelCheckboxState::Unchecked | LabelCheckboxState::Indeterminate => {
            Some(CurationAction::add_label(selected.to_vec(), label))
        }
        LabelCheckboxState::Checked => Some(CurationAction::remove_label(selected.to_vec(), label)),
        LabelCheckboxState::Disabled => None,
    }
}

/// Space-separated ids, cut off with `...` once the text passes
/// `max_len - 3` characters.
pub fn abbreviated_unit_ids(ids: &[UnitId], max_len: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut width = 0;
    for id in ids {
        if width > max_len.saturating_sub(3) {
            parts.push("...".to_string());
            break;
        }
        let s = id.to_string();
        width += s.len() + 1;
        parts.push(s);
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::ids::unit_ids;

    fn labelled() -> CurationState {
        CurationState {
            labels_by_unit: [
                ("1".to_string(), vec!["accept".to_string(), "good".to_string()]),
                ("2".to_string(), vec!["accept".to_string()]),
            ]
            .into(),
            label_choices: Some(vec!["maybe".into(), "accept".into()]),
            ..Default::default()
        }
    }

    fn state_of(states: &[(String, LabelCheckboxState)], label: &str) -> LabelCheckboxState {
        states
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, s)| *s)
            .unwrap()
    }

    #[test]
    fn test_all_label_choices_order() {
        assert_eq!(
            all_label_choices(&labelled()),
            vec!["accept", "reject", "noise", "artifact", "mua", "maybe", "good"]
        );
        assert_eq!(all_label_choices(&CurationState::new()).len(), 5);
    }

    #[test]
    fn test_checkbox_states() {
        let state = labelled();
        let choices = all_label_choices(&state);
        let states = label_checkbox_states(&choices, &state, &unit_ids([1, 2]), false);
        assert_eq!(state_of(&states, "accept"), LabelCheckboxState::Checked);
        assert_eq!(state_of(&states, "good"), LabelCheckboxState::Indeterminate);
        assert_eq!(state_of(&states, "noise"), LabelCheckboxState::Unchecked);
    }

    #[test]
    fn test_checkbox_disabled_when_read_only_or_empty() {
        let state = labelled();
        let choices = all_label_choices(&state);
        for (_, s) in label_checkbox_states(&choices, &state, &unit_ids([1]), true) {
            assert_eq!(s, LabelCheckboxState::Disabled);
        }
        for (_, s) in label_checkbox_states(&choices, &state, &[], false) {
            assert_eq!(s, LabelCheckboxState::Disabled);
        }
    }

    #[test]
    fn test_toggle_action() {
        let sel = unit_ids([1, 2]);
        assert_eq!(
            toggle_label_action("noise", LabelCheckboxState::Indeterminate, &sel),
            Some(CurationAction::add_label(sel.clone(), "noise"))
        );
        assert_eq!(
            toggle_label_action("noise", LabelCheckboxState::Checked, &sel),
            Some(CurationAction::remove_label(sel.clone(), "noise"))
        );
        assert_eq!(toggle_label_action("noise", LabelCheckboxState::Disabled, &sel), None);
    }

    #[test]
    fn test_abbreviated_unit_ids() {
        assert_eq!(abbreviated_unit_ids(&unit_ids([1, 2, 3]), 25), "1 2 3");
        assert_eq!(abbreviated_unit_ids(&unit_ids(10..30), 12), "10 11 12 13 ...");
        assert_eq!(abbreviated_unit_ids(&[], 10), "");
    }
}
