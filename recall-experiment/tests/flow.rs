mod common;

use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use recall_core::{AnswerPass, Group, PhaseTag, SessionRecord};
use recall_experiment::{
    Action, Cause, ExperimentConfig, ExperimentStateMachine, Input, Outcome, Participant,
    PhaseBudgets, ScreenContent, Transition,
};
use recall_timing::{ManualTimer, Timer};

use common::{confidences, harness, harness_with, responses, trials};

#[test]
fn group_one_records_one_answer_per_trial() {
    let (mut h, sink) = harness(Group::Immediate, 12);
    h.run_answering();
    let records = sink.records();
    assert_eq!(responses(&records).len(), 12);
    assert_eq!(confidences(&records).len(), 0);
    assert!(responses(&records).iter().all(|r| r.question_index == 0));
}

#[test]
fn group_two_records_three_answers_per_trial() {
    let (mut h, sink) = harness(Group::ShortDelay, 12);
    h.run_answering();
    let records = sink.records();
    assert_eq!(responses(&records).len(), 36);
    assert_eq!(confidences(&records).len(), 0);
    assert!(
        responses(&records)
            .iter()
            .all(|r| r.pass == AnswerPass::Immediate && r.is_correct == Some(true))
    );
}

#[test]
fn group_three_rates_every_trial_and_answers_after_blackout() {
    let (mut h, sink) = harness(Group::LongDelay, 12);
    let origin = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    h.session = {
        let machine = ExperimentStateMachine::new(
            ExperimentConfig::default(),
            trials(12),
            h.timer.clone(),
        )
        .with_wall_origin(origin);
        recall_experiment::Session::new(
            machine,
            Participant::new(Group::LongDelay),
            sink.clone(),
            recall_experiment::AdminGate::default(),
        )
    };

    let mut blackout_at = None;
    while !h.session.is_finished() {
        h.timer.advance_secs(2);
        let phase = h.session.state().phase();
        if phase == PhaseTag::BlackoutAll && blackout_at.is_none() {
            blackout_at = Some(h.session.state().phase_started_at());
        }
        h.session.act_now(common::answer_for(phase));
    }

    let records = sink.records();
    let ratings = confidences(&records);
    let answers = responses(&records);
    assert_eq!(ratings.len(), 12);
    assert_eq!(answers.len(), 36);

    let blackout_at = blackout_at.unwrap();
    let blackout_wall = origin + chrono::Duration::nanoseconds(blackout_at as i64);
    assert!(answers.iter().all(|r| r.recorded_at > blackout_wall));
    assert!(ratings.iter().all(|c| c.recorded_at <= blackout_wall));
    assert!(answers.iter().all(|r| r.pass == AnswerPass::Consolidated));
}

#[test]
fn consolidated_block_is_trial_major() {
    let (mut h, sink) = harness(Group::LongDelay, 4);
    h.run_answering();
    let order: Vec<_> = responses(&sink.records())
        .iter()
        .map(|r| (r.trial_index, r.question_index))
        .collect();
    let expected: Vec<_> = (0..4).flat_map(|t| (0..3).map(move |q| (t, q))).collect();
    assert_eq!(order, expected);
}

#[test]
fn protocols_branch_by_group() {
    let phases = |group| -> BTreeSet<PhaseTag> {
        let (mut h, _) = harness(group, 3);
        h.run_answering().into_iter().collect()
    };

    let g1 = phases(Group::Immediate);
    assert!(!g1.contains(&PhaseTag::ContextPre));
    assert!(!g1.contains(&PhaseTag::Confidence));
    assert!(!g1.contains(&PhaseTag::BlackoutTrial));

    let g2 = phases(Group::ShortDelay);
    assert!(g2.contains(&PhaseTag::BlackoutTrial));
    assert!(!g2.contains(&PhaseTag::ContextPost));

    let g3 = phases(Group::LongDelay);
    assert!(!g3.contains(&PhaseTag::BlackoutTrial));
    assert!(!g3.contains(&PhaseTag::Questions));
    assert!(g3.contains(&PhaseTag::BlackoutAll));
    assert!(g3.contains(&PhaseTag::ConsolidatedQuestions));
}

#[test]
fn absent_participant_times_out_with_null_answers() {
    let config = ExperimentConfig {
        budgets: PhaseBudgets {
            answer_secs: 30,
            ..PhaseBudgets::default()
        },
        ..ExperimentConfig::default()
    };
    let sink = recall_sink::MemorySink::new();
    let mut h = harness_with(Group::ShortDelay, 2, config, sink.clone());
    h.run_absent();

    let records = sink.records();
    let answers = responses(&records);
    assert_eq!(answers.len(), 6);
    for r in answers {
        assert_eq!(r.answer, None);
        assert_eq!(r.is_correct, None);
        assert!(r.timed_out);
        assert_eq!(r.reaction_time_ms, 30_000);
    }
}

#[test]
fn absent_group_three_still_gets_one_rating_per_trial() {
    let (mut h, sink) = harness(Group::LongDelay, 3);
    h.run_absent();
    let records = sink.records();
    assert_eq!(confidences(&records).len(), 3);
    assert!(confidences(&records).iter().all(|c| c.confidence_percent.is_none()));
    assert_eq!(responses(&records).len(), 9);
}

#[test]
fn duplicate_submit_is_a_no_op() {
    let (mut h, sink) = harness(Group::ShortDelay, 2);
    while h.session.state().phase() != PhaseTag::Questions {
        h.session.act_now(Action::Continue);
    }
    let step = h.session.state().step();
    let first = h.session.act(Input::new(step, Action::Submit("y".into())));
    let second = h.session.act(Input::new(step, Action::Submit("y".into())));
    assert_eq!(first.records.len(), 1);
    assert!(second.records.is_empty());
    assert_eq!(
        second.outcome,
        Outcome::Stale {
            expected: step + 1,
            got: step
        }
    );
    assert_eq!(sink.len(), 1);
}

#[test]
fn remaining_time_resets_on_every_phase_entry() {
    let (mut h, _) = harness(Group::ShortDelay, 1);
    h.session.act_now(Action::Continue);
    let mut last = h.session.screen().remaining_secs;
    assert_eq!(last, Some(30));
    for _ in 0..29 {
        h.timer.advance_secs(1);
        let tick = h.session.tick();
        assert_eq!(tick.outcome, Outcome::Idle);
        assert!(tick.screen.remaining_secs <= last);
        last = tick.screen.remaining_secs;
    }
    assert_eq!(last, Some(1));

    h.timer.advance_secs(1);
    let tick = h.session.tick();
    assert_eq!(
        tick.outcome,
        Outcome::Advanced(Transition {
            from: PhaseTag::ContextPre,
            to: PhaseTag::Stimulus,
            cause: Cause::Timeout
        })
    );
    assert_eq!(tick.screen.remaining_secs, Some(30));

    // the old deadline must not fire again
    let tick = h.session.tick();
    assert_eq!(tick.outcome, Outcome::Idle);
    assert_eq!(h.session.state().phase(), PhaseTag::Stimulus);
}

#[test]
fn admin_jump_rearms_like_a_transition() {
    let (mut h, _) = harness(Group::LongDelay, 2);
    assert!(h.session.admin_unlock("admin"));
    h.timer.advance_secs(500);
    let screen = h.session.admin_jump(PhaseTag::BlackoutAll).unwrap();
    assert_eq!(screen.remaining_secs, Some(30));
    assert!(matches!(
        screen.content,
        ScreenContent::Blackout {
            before_consolidated: true
        }
    ));
    assert_eq!(h.session.state().phase_started_at(), h.timer.now());
}

#[test]
fn corrupted_state_is_reset_on_the_next_tick() {
    let timer = ManualTimer::new();
    let machine = ExperimentStateMachine::new(ExperimentConfig::default(), trials(2), timer.clone());
    let state = machine.start(Participant::new(Group::Immediate));
    let (state, _) = machine.tick(state, Some(Input::new(0, Action::Continue)));

    // a snapshot from a longer trial list no longer fits this one
    let mut value: serde_json::Value = serde_json::from_str(&state.snapshot().unwrap()).unwrap();
    value["trial_index"] = 7.into();
    let corrupted = serde_json::from_value(value).unwrap();
    let (fresh, tick) = machine.tick(corrupted, None);
    assert!(matches!(tick.outcome, Outcome::Reset { .. }));
    assert_eq!(fresh.phase(), PhaseTag::Intro);
    assert_ne!(fresh.participant().id, state.participant().id);
}

#[test]
fn grading_follows_letter_mapping() {
    let (mut h, sink) = harness(Group::Immediate, 2);
    h.session.act_now(Action::Continue);
    h.session.act_now(Action::Continue);
    h.session.act_now(Action::Submit("Y".into()));
    h.session.act_now(Action::Continue);
    h.session.act_now(Action::Submit("B".into()));
    let records = sink.records();
    let graded: Vec<_> = records
        .iter()
        .filter_map(SessionRecord::as_response)
        .map(|r| r.is_correct)
        .collect();
    // "B" is a letter key for the grader, not for the participant
    assert_eq!(graded, vec![Some(true), Some(false)]);
}
