#![allow(dead_code)]

use std::collections::BTreeMap;

use recall_core::{Group, PhaseTag, Question, QuestionType, SessionRecord, Trial};
use recall_experiment::{
    Action, AdminGate, ExperimentConfig, ExperimentStateMachine, Participant, Session,
};
use recall_sink::{MemorySink, ResultSink};
use recall_timing::ManualTimer;

pub fn trials(n: usize) -> Vec<Trial> {
    (0..n)
        .map(|i| Trial {
            index: i,
            source_row: i + 10,
            context_text: format!("context {i}"),
            image_ref: Some(format!("images/g{i}.png")),
            questions: (0..3)
                .map(|q| Question {
                    text: format!("trial {i} question {q}"),
                    options: vec!["x".into(), "y".into(), "z".into(), "w".into()],
                    correct_answer: Some("B".into()),
                    kind: if q == 2 {
                        QuestionType::Color
                    } else {
                        QuestionType::Content
                    },
                })
                .collect(),
            metadata: BTreeMap::new(),
        })
        .collect()
}

pub struct Harness<K: ResultSink> {
    pub session: Session<ManualTimer, K>,
    pub timer: ManualTimer,
}

pub fn harness_with<K: ResultSink>(
    group: Group,
    n: usize,
    config: ExperimentConfig,
    sink: K,
) -> Harness<K> {
    let timer = ManualTimer::new();
    let machine = ExperimentStateMachine::new(config, trials(n), timer.clone());
    let session = Session::new(
        machine,
        Participant::new(group),
        sink,
        AdminGate::new(Some("admin".into())),
    );
    Harness { session, timer }
}

pub fn harness(group: Group, n: usize) -> (Harness<MemorySink>, MemorySink) {
    let sink = MemorySink::new();
    let h = harness_with(group, n, ExperimentConfig::default(), sink.clone());
    (h, sink)
}

/// The designated action for whatever is on screen.
pub fn answer_for(phase: PhaseTag) -> Action {
    match phase {
        p if p.is_question() => Action::Submit("y".into()),
        p if p.is_confidence() => Action::Rate(70),
        _ => Action::Continue,
    }
}

impl<K: ResultSink> Harness<K> {
    /// Answers everything two seconds after it appears. Returns phases seen.
    pub fn run_answering(&mut self) -> Vec<PhaseTag> {
        let mut seen = vec![self.session.state().phase()];
        while !self.session.is_finished() {
            self.timer.advance_secs(2);
            let action = answer_for(self.session.state().phase());
            self.session.act_now(action);
            seen.push(self.session.state().phase());
        }
        seen
    }

    /// Leaves the intro, then never acts again; ticks once a second.
    pub fn run_absent(&mut self) -> Vec<PhaseTag> {
        self.session.act_now(Action::Continue);
        let mut seen = vec![self.session.state().phase()];
        while !self.session.is_finished() {
            self.timer.advance_secs(1);
            self.session.tick();
            seen.push(self.session.state().phase());
        }
        seen
    }
}

pub fn responses(records: &[SessionRecord]) -> Vec<&recall_core::ResponseRecord> {
    records.iter().filter_map(SessionRecord::as_response).collect()
}

pub fn confidences(records: &[SessionRecord]) -> Vec<&recall_core::ConfidenceRecord> {
    records.iter().filter_map(SessionRecord::as_confidence).collect()
}
