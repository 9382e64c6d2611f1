/// Curation actions: the closed set of operations a feed message can carry.
///
/// JSON shape is a `type`-tagged object, e.g.
/// `{"type": "ADD_UNIT_LABEL", "unitId": [5, 7], "label": "noise"}`.
/// Decoding goes through `CurationAction::from_json`, which rejects unknown
/// `type` tags explicitly instead of letting them fall through.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::curation::ids::{UnitId, UnitIdArg};
use crate::curation::state::CurationState;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Action is not a JSON object with a string `type` field")]
    MissingType,

    #[error("Unknown curation action type: {0}")]
    UnknownType(String),

    #[error("Malformed {kind} action: {reason}")]
    Malformed { kind: &'static str, reason: String },
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// Discriminant of a `CurationAction`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    AddUnitLabel,
    RemoveUnitLabel,
    MergeUnits,
    UnmergeUnits,
    SetCuration,
    CloseCuration,
    ReopenCuration,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::AddUnitLabel,
        ActionKind::RemoveUnitLabel,
        ActionKind::MergeUnits,
        ActionKind::UnmergeUnits,
        ActionKind::SetCuration,
        ActionKind::CloseCuration,
        ActionKind::ReopenCuration,
    ];

    /// Wire name (the JSON `type` tag).
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::AddUnitLabel => "ADD_UNIT_LABEL",
            ActionKind::RemoveUnitLabel => "REMOVE_UNIT_LABEL",
            ActionKind::MergeUnits => "MERGE_UNITS",
            ActionKind::UnmergeUnits => "UNMERGE_UNITS",
            ActionKind::SetCuration => "SET_CURATION",
            ActionKind::CloseCuration => "CLOSE_CURATION",
            ActionKind::ReopenCuration => "REOPEN_CURATION",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Everything except `REOPEN_CURATION` is blocked on a closed document.
    pub fn allowed_when_closed(&self) -> bool {
        matches!(self, ActionKind::ReopenCuration)
    }
}

// ---------------------------------------------------------------------------
// CurationAction
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CurationAction {
    AddUnitLabel {
        #[serde(rename = "unitId")]
        unit_id: UnitIdArg,
        label: String,
    },
    RemoveUnitLabel {
        #[serde(rename = "unitId")]
        unit_id: UnitIdArg,
        label: String,
    },
    MergeUnits {
        #[serde(rename = "unitIds")]
        unit_ids: Vec<UnitId>,
    },
    UnmergeUnits {
        #[serde(rename = "unitIds")]
        unit_ids: Vec<UnitId>,
    },
    SetCuration {
        curation: CurationState,
    },
    CloseCuration,
    ReopenCuration,
}

impl CurationAction {
    pub fn add_label(unit_id: impl Into<UnitIdArg>, label: impl Into<String>) -> Self {
        CurationAction::AddUnitLabel {
            unit_id: unit_id.into(),
            label: label.into(),
        }
    }

    pub fn remove_label(unit_id: impl Into<UnitIdArg>, label: impl Into<String>) -> Self {
        CurationAction::RemoveUnitLabel {
            unit_id: unit_id.into(),
            label: label.into(),
        }
    }

    pub fn merge(unit_ids: Vec<UnitId>) -> Self {
        CurationAction::MergeUnits { unit_ids }
    }

    pub fn unmerge(unit_ids: Vec<UnitId>) -> Self {
        CurationAction::UnmergeUnits { unit_ids }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            CurationAction::AddUnitLabel { .. } => ActionKind::AddUnitLabel,
            CurationAction::RemoveUnitLabel { .. } => ActionKind::RemoveUnitLabel,
            CurationAction::MergeUnits { .. } => ActionKind::MergeUnits,
            CurationAction::UnmergeUnits { .. } => ActionKind::UnmergeUnits,
            CurationAction::SetCuration { .. } => ActionKind::SetCuration,
            CurationAction::CloseCuration => ActionKind::CloseCuration,
            CurationAction::ReopenCuration => ActionKind::ReopenCuration,
        }
    }

    /// Decode an action from JSON.
    ///
    /// The `type` tag is checked against the known union first so that an
    /// unrecognized action surfaces as `UnknownType` rather than a generic
    /// decode failure. Labels and unit lists are accepted at any size.
    pub fn from_json(value: &Value) -> Result<Self, ActionError> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ActionError::MissingType)?;
        let kind =
            ActionKind::from_wire(tag).ok_or_else(|| ActionError::UnknownType(tag.to_string()))?;

        let action: CurationAction =
            serde_json::from_value(value.clone()).map_err(|e| ActionError::Malformed {
                kind: kind.as_str(),
                reason: e.to_string(),
            })?;
        Ok(action)
    }

    pub fn to_json(&self) -> Value {
        // Serializing a plain enum of strings/ints/maps cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::ids::unit_ids;
    use serde_json::json;

    #[test]
    fn test_decode_add_label_single_and_many() {
        let a = CurationAction::from_json(&json!({
            "type": "ADD_UNIT_LABEL", "unitId": 5, "label": "noise"
        }))
        .unwrap();
        assert_eq!(a, CurationAction::add_label(UnitId::Int(5), "noise"));

        let b = CurationAction::from_json(&json!({
            "type": "REMOVE_UNIT_LABEL", "unitId": [5, "x"], "label": "noise"
        }))
        .unwrap();
        assert_eq!(b.kind(), ActionKind::RemoveUnitLabel);
    }

    #[test]
    fn test_decode_unit_variants() {
        let close = CurationAction::from_json(&json!({"type": "CLOSE_CURATION"})).unwrap();
        assert_eq!(close, CurationAction::CloseCuration);
        let reopen = CurationAction::from_json(&json!({"type": "REOPEN_CURATION"})).unwrap();
        assert_eq!(reopen, CurationAction::ReopenCuration);
    }

    #[test]
    fn test_encode_wire_shape() {
        let v = CurationAction::merge(unit_ids([1, 2])).to_json();
        assert_eq!(v, json!({"type": "MERGE_UNITS", "unitIds": [1, 2]}));
        let v = CurationAction::add_label(unit_ids([3]), "mua").to_json();
        assert_eq!(v, json!({"type": "ADD_UNIT_LABEL", "unitId": [3], "label": "mua"}));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = CurationAction::from_json(&json!({"type": "DELETE_EVERYTHING"})).unwrap_err();
        assert!(matches!(err, ActionError::UnknownType(t) if t == "DELETE_EVERYTHING"));
    }

    #[test]
    fn test_missing_type_rejected() {
        assert!(matches!(
            CurationAction::from_json(&json!({"unitIds": [1]})),
            Err(ActionError::MissingType)
        ));
        assert!(matches!(CurationAction::from_json(&json!(42)), Err(ActionError::MissingType)));
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let err = CurationAction::from_json(&json!({"type": "MERGE_UNITS", "unitIds": "oops"}))
            .unwrap_err();
        assert!(matches!(err, ActionError::Malformed { kind: "MERGE_UNITS", .. }));
    }

    #[test]
    fn test_long_label_accepted() {
        let label = "x".repeat(4096);
        let a = CurationAction::from_json(&json!({
            "type": "ADD_UNIT_LABEL", "unitId": 1, "label": label
        }))
        .unwrap();
        assert_eq!(a, CurationAction::add_label(UnitId::Int(1), label));
    }

    #[test]
    fn test_kind_wire_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::from_wire(kind.as_str()), Some(kind));
        }
        assert!(ActionKind::ReopenCuration.allowed_when_closed());
        assert!(!ActionKind::SetCuration.allowed_when_closed());
    }
}
