#![no_main]
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

use curation_core::curation::{
    unit_ids, validate, CurationAction, CurationReducer, CurationState, Reducer, UnitId,
};

/// Fuzz the feed-message trust boundary.
///
/// Tests:
/// - Arbitrary JSON never panics the decoder
/// - Decoded actions applied to a valid document keep it valid
/// - A closed document is never changed by anything but a reopen

fuzz_target!(|data: &[u8]| {
    if data.len() > 65536 {
        return;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let reducer = CurationReducer;
    let Ok(action) = reducer.decode_action(&value) else {
        return;
    };

    let open = Arc::new(CurationState {
        labels_by_unit: [("1".to_string(), vec!["accept".to_string()])].into(),
        merge_groups: Some(vec![unit_ids([1, 2]), vec![UnitId::from("a"), UnitId::Int(7)]]),
        ..Default::default()
    });
    let next = reducer.reduce(&open, &action);
    assert_eq!(validate(&next), Ok(()), "decoded action broke invariants: {:?}", action);

    let closed = Arc::new(CurationState {
        is_closed: Some(true),
        ..CurationState::clone(&open)
    });
    let after = reducer.reduce(&closed, &action);
    if action != CurationAction::ReopenCuration {
        assert!(Arc::ptr_eq(&closed, &after));
    }
});
