#![no_main]
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeSet;

use curation_core::curation::{consolidate, is_partition, UnitId};

/// Fuzz merge-group consolidation.
///
/// Tests:
/// - Output is always a disjoint partition of groups with at least two units
/// - Output only contains units from the input
/// - Consolidating the output again changes nothing

fuzz_target!(|groups: Vec<Vec<i8>>| {
    if groups.len() > 64 {
        return;
    }
    let input: Vec<Vec<UnitId>> = groups
        .iter()
        .map(|g| g.iter().map(|&n| UnitId::Int(n as i64)).collect())
        .collect();
    let seen: BTreeSet<&UnitId> = input.iter().flatten().collect();

    let out = consolidate(input.clone());
    assert!(is_partition(&out));
    assert!(out.iter().flatten().all(|u| seen.contains(u)));

    let mut again = consolidate(out.clone());
    let mut sorted = out.clone();
    again.sort();
    sorted.sort();
    assert_eq!(again, sorted);
});
