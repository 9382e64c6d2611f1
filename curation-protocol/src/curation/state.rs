/// The curation document.
///
/// `CurationState` is what every client derives by folding the feed. Values
/// are immutable once built: the reducer shares them through `Arc` and
/// produces a fresh value for every change, so readers holding an older
/// version are never disturbed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::curation::ids::UnitId;

/// Open/Closed lifecycle of a curation document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentPhase {
    Open,
    Closed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurationState {
    /// Labels per unit, keyed by the stringified `UnitId`. Each list is
    /// sorted and duplicate-free.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels_by_unit: BTreeMap<String, Vec<String>>,

    /// Suggested labels (display hint only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_choices: Option<Vec<String>>,

    /// Disjoint groups of at least two units each.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_groups: Option<Vec<Vec<UnitId>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_closed: Option<bool>,
}

impl CurationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed.unwrap_or(false)
    }

    pub fn phase(&self) -> DocumentPhase {
        if self.is_closed() {
            DocumentPhase::Closed
        } else {
            DocumentPhase::Open
        }
    }

    /// Labels for one unit (empty if none).
    pub fn labels_for(&self, unit: &UnitId) -> &[String] {
        self.labels_by_unit
            .get(&unit.label_key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_label(&self, unit: &UnitId, label: &str) -> bool {
        self.labels_for(unit).iter().any(|l| l == label)
    }

    /// Merge groups (empty if none).
    pub fn merge_groups(&self) -> &[Vec<UnitId>] {
        self.merge_groups.as_deref().unwrap_or(&[])
    }
}
