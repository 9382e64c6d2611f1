/// Merge-group consolidation.
///
/// Merge groups are sets of units a curator has declared equivalent. The
/// consolidator turns an arbitrary list of candidate groups into a maximal
/// disjoint partition: overlapping groups are unioned until a full pass makes
/// no change, then groups with fewer than two members are dropped.
///
/// Group counts are human-scale (tens), so the O(G²·M) pairwise scan is used
/// instead of a union-find.

use std::collections::BTreeSet;

use crate::curation::ids::UnitId;
use crate::curation::state::CurationState;

/// Consolidate candidate groups into a disjoint partition of groups with at
/// least two members. Members of each output group are sorted.
pub fn consolidate(groups: Vec<Vec<UnitId>>) -> Vec<Vec<UnitId>> {
    let mut sets: Vec<BTreeSet<UnitId>> = groups
        .into_iter()
        .map(|g| g.into_iter().collect())
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..sets.len() {
            for j in (i + 1)..sets.len() {
                if sets[i].is_empty() || sets[j].is_empty() {
                    continue;
                }
                if !sets[i].is_disjoint(&sets[j]) {
                    let absorbed = std::mem::take(&mut sets[j]);
                    sets[i].extend(absorbed);
                    changed = true;
                }
            }
        }
    }

    let out: Vec<Vec<UnitId>> = sets
        .into_iter()
        .filter(|s| s.len() >= 2)
        .map(|s| s.into_iter().collect())
        .collect();

    debug_assert!(is_partition(&out), "consolidate produced overlapping groups: {:?}", out);
    out
}

/// True if every group has ≥ 2 distinct members and no unit is in two groups.
pub fn is_partition(groups: &[Vec<UnitId>]) -> bool {
    let mut seen = BTreeSet::new();
    for group in groups {
        let distinct: BTreeSet<&UnitId> = group.iter().collect();
        if distinct.len() != group.len() || group.len() < 2 {
            return false;
        }
        for id in group {
            if !seen.insert(id) {
                return false;
            }
        }
    }
    true
}

/// The merge group containing `unit`, if any.
pub fn merge_group_for_unit<'a>(state: &'a CurationState, unit: &UnitId) -> Option<&'a [UnitId]> {
    state
        .merge_groups()
        .iter()
        .find(|g| g.contains(unit))
        .map(Vec::as_slice)
}

/// True if every unit in `units` already belongs to some merge group.
///
/// Curation controls use this to offer "unmerge" instead of "merge".
pub fn units_are_in_merge_groups(state: &CurationState, units: &[UnitId]) -> bool {
    let merged: BTreeSet<&UnitId> = state.merge_groups().iter().flatten().collect();
    units.iter().all(|u| merged.contains(u))
}
