mod common;

use std::collections::BTreeSet;

use proptest::prelude::*;
use recall_core::Group;
use recall_experiment::{Action, Input};

use common::{answer_for, confidences, harness, responses};

#[derive(Debug, Clone)]
enum Op {
    Wait(u64),
    Act,
    ActStale,
    Double,
    Skip,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..150).prop_map(Op::Wait),
        Just(Op::Act),
        Just(Op::ActStale),
        Just(Op::Double),
        Just(Op::Skip),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_question_is_recorded_exactly_once(
        group in 1u8..=3,
        trials in 1usize..5,
        ops in prop::collection::vec(op(), 0..120),
    ) {
        let group = Group::from_number(group).unwrap();
        let (mut h, sink) = harness(group, trials);

        for op in ops {
            let step = h.session.state().step();
            let action = answer_for(h.session.state().phase());
            match op {
                Op::Wait(secs) => {
                    h.timer.advance_secs(secs);
                    h.session.tick();
                }
                Op::Act => {
                    h.session.act(Input::new(step, action));
                }
                Op::ActStale => {
                    h.session.act(Input::new(step.wrapping_sub(1), action));
                }
                Op::Double => {
                    h.session.act(Input::new(step, action.clone()));
                    h.session.act(Input::new(step, action));
                }
                Op::Skip => {
                    h.session.act(Input::new(step, Action::Skip));
                }
            }
        }
        h.run_answering();

        let records = sink.records();
        let answers = responses(&records);
        let keys: BTreeSet<_> = answers
            .iter()
            .map(|r| (r.trial_index, r.question_index))
            .collect();
        prop_assert_eq!(keys.len(), answers.len());
        prop_assert_eq!(answers.len(), trials * group.questions_per_trial());

        let ratings = confidences(&records);
        let rated: BTreeSet<_> = ratings.iter().map(|c| c.trial_index).collect();
        prop_assert_eq!(rated.len(), ratings.len());
        let expected = if group.rates_confidence() { trials } else { 0 };
        prop_assert_eq!(ratings.len(), expected);
    }
}
