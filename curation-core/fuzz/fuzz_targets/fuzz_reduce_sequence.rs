#![no_main]
use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use std::sync::Arc;

use curation_core::curation::{
    fold, validate, CurationAction, CurationReducer, CurationState, FeedEncoding, FeedId,
    FeedMessage, FeedReplayEngine, UnitId,
};

/// Fuzz the reducer over arbitrary action sequences.
///
/// Tests:
/// - Every prefix leaves the document valid
/// - Incremental replay split at any point matches a single fold

#[derive(Arbitrary, Debug)]
enum Op {
    Add { units: Vec<u8>, label: u8 },
    Remove { units: Vec<u8>, label: u8 },
    Merge(Vec<u8>),
    Unmerge(Vec<u8>),
    Close,
    Reopen,
}

#[derive(Arbitrary, Debug)]
struct SequenceInput {
    ops: Vec<Op>,
    split: u16,
}

const LABELS: [&str; 4] = ["accept", "reject", "noise", "mua"];

fn ids(units: &[u8]) -> Vec<UnitId> {
    units.iter().map(|&u| UnitId::Int((u % 16) as i64)).collect()
}

fn to_action(op: &Op) -> CurationAction {
    match op {
        Op::Add { units, label } => {
            CurationAction::add_label(ids(units), LABELS[*label as usize % LABELS.len()])
        }
        Op::Remove { units, label } => {
            CurationAction::remove_label(ids(units), LABELS[*label as usize % LABELS.len()])
        }
        Op::Merge(units) => CurationAction::merge(ids(units)),
        Op::Unmerge(units) => CurationAction::unmerge(ids(units)),
        Op::Close => CurationAction::CloseCuration,
        Op::Reopen => CurationAction::ReopenCuration,
    }
}

fuzz_target!(|input: SequenceInput| {
    if input.ops.len() > 256 {
        return;
    }
    let actions: Vec<CurationAction> = input.ops.iter().map(to_action).collect();

    let mut state = Arc::new(CurationState::new());
    for action in &actions {
        state = curation_core::curation::reduce(&state, action);
        assert_eq!(validate(&state), Ok(()));
    }
    assert_eq!(*fold(&CurationReducer, &Arc::new(CurationState::new()), &actions), *state);

    let messages: Vec<FeedMessage> = actions
        .iter()
        .map(|a| FeedMessage::from_action(a, FeedEncoding::Bare))
        .collect();
    let split = input.split as usize % (messages.len() + 1);
    let Ok(mut engine) = FeedReplayEngine::new(
        FeedId::new("fuzz"),
        CurationReducer,
        &CurationState::new(),
        FeedEncoding::Bare,
    ) else {
        return;
    };
    engine.apply(&messages[..split]);
    let replayed = engine.apply(&messages);
    assert_eq!(engine.skipped_count(), 0);
    assert_eq!(*replayed, *state);
});
