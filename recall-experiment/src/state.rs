use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use recall_core::{AnswerPass, Group, PhaseTag, QUESTIONS_PER_TRIAL, SessionRecord, Trial};
use recall_timing::{Deadline, Timer, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ExperimentConfig;
use crate::error::ControlError;
use crate::recorder::{AnswerEvent, AnswerLedger, Participant, Recorder};
use crate::screen::{Screen, ScreenContent};

/// One question in the consolidated block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRef {
    pub trial: usize,
    pub question: usize,
}

/// A participant's position in the protocol.
///
/// Only [`ExperimentStateMachine`] produces new values; every operation takes
/// the current state and returns its successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    participant: Participant,
    phase: PhaseTag,
    trial_index: usize,
    question_index: usize,
    deadline: Deadline,
    step: u64,
    consolidated_queue: Option<VecDeque<QuestionRef>>,
    ledger: AnswerLedger,
}

impl RunState {
    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn group(&self) -> Group {
        self.participant.group
    }

    pub fn phase(&self) -> PhaseTag {
        self.phase
    }

    pub fn trial_index(&self) -> usize {
        self.trial_index
    }

    pub fn question_index(&self) -> usize {
        self.question_index
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    pub fn phase_started_at(&self) -> Timestamp {
        self.deadline.armed_at()
    }

    /// Transition counter; inputs must quote it to be accepted.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Questions still to ask in the consolidated block, front first.
    pub fn consolidated_queue(&self) -> Option<&VecDeque<QuestionRef>> {
        self.consolidated_queue.as_ref()
    }

    pub fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Continue,
    Submit(String),
    /// Leaves the question or rating unanswered.
    Skip,
    Rate(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    pub step: u64,
    pub action: Action,
}

impl Input {
    pub fn new(step: u64, action: Action) -> Self {
        Self { step, action }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    Action,
    Timeout,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PhaseTag,
    pub to: PhaseTag,
    pub cause: Cause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    WrongAction(PhaseTag),
    BlankAnswer,
    ConfidenceOutOfRange(u8),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongAction(phase) => write!(f, "that action does nothing during {phase}"),
            Self::BlankAnswer => f.write_str("answer is empty"),
            Self::ConfidenceOutOfRange(p) => write!(f, "confidence must be 0-100, got {p}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing happened; the state is unchanged.
    Idle,
    Advanced(Transition),
    Stale { expected: u64, got: u64 },
    Rejected(Rejection),
    Reset { reason: String },
}

/// What one tick produced besides the successor state.
#[derive(Debug, Clone)]
pub struct Tick {
    pub screen: Screen,
    pub records: Vec<SessionRecord>,
    pub outcome: Outcome,
}

enum Reply {
    Nothing,
    Text(String),
    Percent(u8),
}

impl Reply {
    fn text(self) -> Option<String> {
        match self {
            Self::Text(t) => Some(t),
            Self::Nothing | Self::Percent(_) => None,
        }
    }

    fn percent(&self) -> Option<u8> {
        match self {
            Self::Percent(p) => Some(*p),
            Self::Nothing | Self::Text(_) => None,
        }
    }
}

fn check(phase: PhaseTag, action: &Action) -> Result<Reply, Rejection> {
    match action {
        Action::Continue if phase.allows_continue() => Ok(Reply::Nothing),
        Action::Submit(text) if phase.is_question() => match text.trim() {
            "" => Err(Rejection::BlankAnswer),
            t => Ok(Reply::Text(t.to_string())),
        },
        Action::Skip if phase.is_question() || phase.is_confidence() => Ok(Reply::Nothing),
        Action::Rate(p) if phase.is_confidence() => match *p {
            0..=100 => Ok(Reply::Percent(*p)),
            p => Err(Rejection::ConfidenceOutOfRange(p)),
        },
        _ => Err(Rejection::WrongAction(phase)),
    }
}

/// The experiment flow controller.
///
/// Holds the immutable trial sequence and the one clock every deadline and
/// timestamp is read from. It keeps no per-participant state of its own.
pub struct ExperimentStateMachine<T: Timer> {
    timer: T,
    config: ExperimentConfig,
    trials: Vec<Trial>,
    recorder: Recorder,
    mono_origin: Timestamp,
}

impl<T: Timer> ExperimentStateMachine<T> {
    pub fn new(config: ExperimentConfig, trials: Vec<Trial>, timer: T) -> Self {
        let mono_origin = timer.now();
        Self {
            recorder: Recorder::new(Utc::now(), mono_origin),
            timer,
            config,
            trials,
            mono_origin,
        }
    }

    /// Pins the wall-clock instant that `recorded_at` offsets count from.
    pub fn with_wall_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.recorder = Recorder::new(origin, self.mono_origin);
        self
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn now(&self) -> Timestamp {
        self.timer.now()
    }

    pub fn start(&self, participant: Participant) -> RunState {
        info!(
            participant_id = %participant.id,
            group = participant.group.number(),
            trials = self.trials.len(),
            "session started"
        );
        RunState {
            participant,
            phase: PhaseTag::Intro,
            trial_index: 0,
            question_index: 0,
            deadline: Deadline::unbounded(self.now()),
            step: 0,
            consolidated_queue: None,
            ledger: AnswerLedger::default(),
        }
    }

    /// Runs one render-and-check cycle.
    ///
    /// An expired deadline wins over any input arriving on the same tick, and
    /// at most one transition happens. With no expiry and no valid input the
    /// state comes back untouched.
    pub fn tick(&self, mut state: RunState, input: Option<Input>) -> (RunState, Tick) {
        let now = self.timer.now();
        if let Err(reason) = self.validate(&state) {
            warn!(
                participant_id = %state.participant.id,
                phase = %state.phase,
                %reason,
                "corrupted run state; restarting at intro"
            );
            let fresh = self.reset(&state);
            let tick = Tick {
                screen: self.screen_at(&fresh, now),
                records: Vec::new(),
                outcome: Outcome::Reset { reason },
            };
            return (fresh, tick);
        }

        let mut records = Vec::new();
        let from = state.phase;
        let outcome = if state.deadline.poll(now) {
            state = self.advance(state, Reply::Nothing, true, now, &mut records);
            Outcome::Advanced(Transition {
                from,
                to: state.phase,
                cause: Cause::Timeout,
            })
        } else if let Some(input) = input {
            if input.step != state.step {
                debug!(expected = state.step, got = input.step, "stale input dropped");
                Outcome::Stale {
                    expected: state.step,
                    got: input.step,
                }
            } else {
                match check(state.phase, &input.action) {
                    Ok(reply) => {
                        state = self.advance(state, reply, false, now, &mut records);
                        Outcome::Advanced(Transition {
                            from,
                            to: state.phase,
                            cause: Cause::Action,
                        })
                    }
                    Err(rejection) => {
                        debug!(phase = %state.phase, %rejection, "input rejected");
                        Outcome::Rejected(rejection)
                    }
                }
            }
        } else {
            Outcome::Idle
        };

        let tick = Tick {
            screen: self.screen_at(&state, now),
            records,
            outcome,
        };
        (state, tick)
    }

    fn advance(
        &self,
        state: RunState,
        reply: Reply,
        timed_out: bool,
        now: Timestamp,
        records: &mut Vec<SessionRecord>,
    ) -> RunState {
        use PhaseTag::*;
        let group = state.participant.group;
        let t = state.trial_index;
        let last_trial = t + 1 >= self.trials.len();

        match state.phase {
            Intro if self.trials.is_empty() => self.enter(state, Summary, 0, 0, now),
            Intro => self.enter(state, group.trial_entry(), 0, 0, now),
            ContextPre => self.enter(state, Stimulus, t, 0, now),
            Stimulus => {
                let next = match group {
                    Group::Immediate => Questions,
                    Group::ShortDelay => BlackoutTrial,
                    Group::LongDelay => ContextPost,
                };
                self.enter(state, next, t, 0, now)
            }
            ContextPost => self.enter(state, Confidence, t, 0, now),
            Confidence => {
                let mut state = state;
                self.record_confidence(&mut state, reply.percent(), now, records);
                if last_trial {
                    self.enter(state, BlackoutAll, t, 0, now)
                } else {
                    self.enter(state, ContextPre, t + 1, 0, now)
                }
            }
            BlackoutTrial => self.enter(state, Questions, t, 0, now),
            Questions => {
                let mut state = state;
                let q = state.question_index;
                self.record_response(&mut state, AnswerPass::Immediate, reply.text(), timed_out, now, records);
                if q + 1 < group.questions_per_trial() {
                    self.enter(state, Questions, t, q + 1, now)
                } else if last_trial {
                    self.enter(state, Summary, t, 0, now)
                } else {
                    self.enter(state, group.trial_entry(), t + 1, 0, now)
                }
            }
            BlackoutAll => self.enter_consolidated(state, now),
            ConsolidatedQuestions => {
                let mut state = state;
                self.record_response(
                    &mut state,
                    AnswerPass::Consolidated,
                    reply.text(),
                    timed_out,
                    now,
                    records,
                );
                let next = state.consolidated_queue.as_mut().and_then(|queue| {
                    queue.pop_front();
                    queue.front().copied()
                });
                match next {
                    Some(r) => self.enter(state, ConsolidatedQuestions, r.trial, r.question, now),
                    None => self.enter(state, Summary, t, 0, now),
                }
            }
            Summary => state,
        }
    }

    /// Arms the deadline for `phase`; the only place a phase is entered.
    fn enter(
        &self,
        mut state: RunState,
        phase: PhaseTag,
        trial: usize,
        question: usize,
        now: Timestamp,
    ) -> RunState {
        let from = state.phase;
        state.phase = phase;
        state.trial_index = trial;
        state.question_index = question;
        state.deadline = Deadline::arm(now, self.config.budgets.for_phase(phase));
        state.step += 1;
        if phase != PhaseTag::ConsolidatedQuestions {
            state.consolidated_queue = None;
        }

        if from == phase {
            debug!(phase = %phase, trial, question, "next question");
        } else {
            info!(
                participant_id = %state.participant.id,
                from = %from,
                to = %phase,
                trial,
                "phase changed"
            );
        }
        state
    }

    fn full_queue(&self) -> VecDeque<QuestionRef> {
        (0..self.trials.len())
            .flat_map(|trial| (0..QUESTIONS_PER_TRIAL).map(move |question| QuestionRef { trial, question }))
            .collect()
    }

    /// Queues every question not yet answered, trial-major.
    fn enter_consolidated(&self, mut state: RunState, now: Timestamp) -> RunState {
        let mut queue = self.full_queue();
        queue.retain(|r| !state.ledger.has_response(r.trial, r.question));
        match queue.front().copied() {
            Some(first) => {
                state.consolidated_queue = Some(queue);
                self.enter(state, PhaseTag::ConsolidatedQuestions, first.trial, first.question, now)
            }
            None => self.enter(state, PhaseTag::Summary, 0, 0, now),
        }
    }

    fn record_response(
        &self,
        state: &mut RunState,
        pass: AnswerPass,
        answer: Option<String>,
        timed_out: bool,
        now: Timestamp,
        records: &mut Vec<SessionRecord>,
    ) {
        let Some(trial) = self.trials.get(state.trial_index) else {
            return;
        };
        let event = AnswerEvent {
            trial,
            question_index: state.question_index,
            pass,
            answer,
            timed_out,
            reaction: state.deadline.elapsed(now),
            at: now,
        };
        if let Some(record) = self
            .recorder
            .response(&mut state.ledger, &state.participant, event)
        {
            info!(
                trial = record.trial_index,
                question = record.question_index,
                timed_out,
                correct = ?record.is_correct,
                rt_ms = record.reaction_time_ms,
                "answer recorded"
            );
            records.push(SessionRecord::Response(record));
        }
    }

    fn record_confidence(
        &self,
        state: &mut RunState,
        percent: Option<u8>,
        now: Timestamp,
        records: &mut Vec<SessionRecord>,
    ) {
        let Some(trial) = self.trials.get(state.trial_index) else {
            return;
        };
        if let Some(record) =
            self.recorder
                .confidence(&mut state.ledger, &state.participant, trial, percent, now)
        {
            info!(trial = record.trial_index, confidence = ?percent, "confidence recorded");
            records.push(SessionRecord::Confidence(record));
        }
    }

    /// Admin override. Re-arms the deadline exactly like a normal transition.
    pub fn jump(&self, state: RunState, phase: PhaseTag) -> Result<RunState, ControlError> {
        let group = state.participant.group;
        if !group.visits(phase) {
            return Err(ControlError::PhaseNotInProtocol { phase, group });
        }
        let now = self.now();
        let from = state.phase;
        let trial = state.trial_index.min(self.trials.len().saturating_sub(1));
        let next = match phase {
            PhaseTag::Intro | PhaseTag::Summary => self.enter(state, phase, 0, 0, now),
            _ if self.trials.is_empty() => self.enter(state, PhaseTag::Summary, 0, 0, now),
            PhaseTag::ConsolidatedQuestions => self.enter_consolidated(state, now),
            _ => self.enter(state, phase, trial, 0, now),
        };
        warn!(from = %from, to = %next.phase, "admin jump");
        Ok(next)
    }

    /// Fresh `Intro` state for a new participant in the same group.
    pub fn reset(&self, state: &RunState) -> RunState {
        let participant = Participant::new(state.participant.group);
        info!(
            previous = %state.participant.id,
            participant_id = %participant.id,
            "session reset"
        );
        let mut fresh = self.start(participant);
        fresh.step = state.step + 1;
        fresh
    }

    /// Rebuilds a state from [`RunState::snapshot`] output. Anything
    /// unreadable or inconsistent restarts a new participant at `Intro`.
    pub fn restore(&self, snapshot: &str, group: Group) -> RunState {
        match serde_json::from_str::<RunState>(snapshot) {
            Ok(state) => match self.validate(&state) {
                Ok(()) => state,
                Err(reason) => {
                    warn!(%reason, "restored run state is inconsistent; restarting at intro");
                    self.reset(&state)
                }
            },
            Err(error) => {
                warn!(%error, "unreadable run state; restarting at intro");
                self.start(Participant::new(group))
            }
        }
    }

    /// Checks a state against the trial sequence and the group's protocol.
    pub fn validate(&self, state: &RunState) -> Result<(), String> {
        let group = state.participant.group;
        let phase = state.phase;
        if !group.visits(phase) {
            return Err(format!("group {group} never visits {phase}"));
        }
        if phase.is_timed() != state.deadline.is_bounded() {
            return Err(format!("deadline does not match phase {phase}"));
        }
        if !phase.is_timed() {
            return Ok(());
        }
        if state.trial_index >= self.trials.len() {
            return Err(format!(
                "trial index {} out of range for {} trials",
                state.trial_index,
                self.trials.len()
            ));
        }
        match phase {
            PhaseTag::Questions if state.question_index >= group.questions_per_trial() => {
                Err(format!("question index {} past block", state.question_index))
            }
            PhaseTag::ConsolidatedQuestions => {
                let current = QuestionRef {
                    trial: state.trial_index,
                    question: state.question_index,
                };
                match state.consolidated_queue.as_ref().and_then(|q| q.front()) {
                    Some(front) if *front == current => Ok(()),
                    _ => Err("consolidated queue out of step with indices".to_string()),
                }
            }
            _ => Ok(()),
        }
    }

    pub fn screen(&self, state: &RunState) -> Screen {
        self.screen_at(state, self.now())
    }

    fn screen_at(&self, state: &RunState, now: Timestamp) -> Screen {
        use PhaseTag::*;
        let group = state.participant.group;
        let total = self.trials.len();
        let trial = self.trials.get(state.trial_index);
        let block = total * QUESTIONS_PER_TRIAL;

        let (question_index, questions_in_block) = match state.phase {
            Questions => (state.question_index, group.questions_per_trial()),
            ConsolidatedQuestions => {
                let left = state.consolidated_queue.as_ref().map_or(0, VecDeque::len);
                (block.saturating_sub(left), block)
            }
            _ => (0, 0),
        };

        let progress = match state.phase {
            Intro => 0.0,
            Summary => 1.0,
            BlackoutAll => 0.0,
            ConsolidatedQuestions if block > 0 => question_index as f32 / block as f32,
            _ if total > 0 => state.trial_index as f32 / total as f32,
            _ => 0.0,
        };

        let content = match (state.phase, trial) {
            (Summary, _) => ScreenContent::Summary {
                responses: state.ledger.responses(),
                confidences: state.ledger.confidences(),
            },
            (BlackoutTrial, _) => ScreenContent::Blackout {
                before_consolidated: false,
            },
            (BlackoutAll, _) => ScreenContent::Blackout {
                before_consolidated: true,
            },
            (ContextPre | ContextPost, Some(t)) => ScreenContent::Context {
                text: t.context_text.clone(),
                repeat: state.phase == ContextPost,
            },
            (Stimulus, Some(t)) => ScreenContent::Stimulus {
                image_ref: t.image_ref.clone(),
            },
            (Questions | ConsolidatedQuestions, Some(t)) => {
                let q = t.question(state.question_index);
                ScreenContent::Question {
                    text: q.map(|q| q.text.clone()).unwrap_or_default(),
                    options: q.map(|q| q.options.clone()).unwrap_or_default(),
                    kind: q.map(|q| q.kind).unwrap_or_default(),
                    // groups 1 and 2 keep the graph up while answering
                    image_ref: if state.phase == Questions {
                        t.image_ref.clone()
                    } else {
                        None
                    },
                }
            }
            (Confidence, Some(_)) => ScreenContent::Confidence,
            (Intro, _) | (_, None) => ScreenContent::Intro,
        };

        Screen {
            step: state.step,
            phase: state.phase,
            group,
            trial_index: state.trial_index,
            total_trials: total,
            question_index,
            questions_in_block,
            remaining_secs: state.deadline.remaining_secs(now),
            budget_secs: state.deadline.budget().map(|b| b.as_secs()),
            progress,
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::{Question, QuestionType};
    use recall_timing::ManualTimer;
    use std::collections::BTreeMap;

    fn trials(n: usize) -> Vec<Trial> {
        (0..n)
            .map(|i| Trial {
                index: i,
                source_row: i,
                context_text: format!("context {i}"),
                image_ref: Some(format!("g{i}.png")),
                questions: (0..3)
                    .map(|q| Question {
                        text: format!("t{i}q{q}"),
                        options: vec!["x".into(), "y".into(), "z".into(), "w".into()],
                        correct_answer: Some("B".into()),
                        kind: QuestionType::Content,
                    })
                    .collect(),
                metadata: BTreeMap::new(),
            })
            .collect()
    }

    fn machine(n: usize) -> (ExperimentStateMachine<ManualTimer>, ManualTimer) {
        let timer = ManualTimer::new();
        let m = ExperimentStateMachine::new(ExperimentConfig::default(), trials(n), timer.clone());
        (m, timer)
    }

    fn act(m: &ExperimentStateMachine<ManualTimer>, state: RunState, action: Action) -> (RunState, Tick) {
        let step = state.step();
        m.tick(state, Some(Input::new(step, action)))
    }

    #[test]
    fn idle_tick_leaves_state_untouched() {
        let (m, timer) = machine(2);
        let state = m.start(Participant::new(Group::ShortDelay));
        let (state, _) = act(&m, state, Action::Continue);
        timer.advance_secs(10);
        let before = state.clone();
        let (after, tick) = m.tick(state, None);
        assert_eq!(after, before);
        assert_eq!(tick.outcome, Outcome::Idle);
        assert_eq!(tick.screen.remaining_secs, Some(20));
    }

    #[test]
    fn intro_waits_forever() {
        let (m, timer) = machine(1);
        let state = m.start(Participant::new(Group::Immediate));
        timer.advance_secs(3600);
        let (state, tick) = m.tick(state, None);
        assert_eq!(state.phase(), PhaseTag::Intro);
        assert_eq!(tick.screen.remaining_secs, None);
    }

    #[test]
    fn timeout_and_continue_lead_to_the_same_phase() {
        let (m, timer) = machine(2);
        let start = m.start(Participant::new(Group::LongDelay));
        let (ctx, _) = act(&m, start, Action::Continue);
        assert_eq!(ctx.phase(), PhaseTag::ContextPre);

        let (by_action, _) = act(&m, ctx.clone(), Action::Continue);
        timer.advance_secs(30);
        let (by_timeout, tick) = m.tick(ctx, None);
        assert_eq!(by_action.phase(), PhaseTag::Stimulus);
        assert_eq!(by_timeout.phase(), PhaseTag::Stimulus);
        assert!(matches!(
            tick.outcome,
            Outcome::Advanced(Transition { cause: Cause::Timeout, .. })
        ));
        assert_eq!(tick.screen.remaining_secs, Some(30));
    }

    #[test]
    fn timeout_beats_input_on_the_same_tick() {
        let (m, timer) = machine(1);
        let state = m.start(Participant::new(Group::Immediate));
        let (state, _) = act(&m, state, Action::Continue);
        let (state, _) = act(&m, state, Action::Continue);
        assert_eq!(state.phase(), PhaseTag::Questions);
        timer.advance_secs(120);
        let (state, tick) = act(&m, state, Action::Submit("y".into()));
        let record = tick.records[0].as_response().unwrap();
        assert!(record.timed_out);
        assert_eq!(record.answer, None);
        assert_eq!(state.phase(), PhaseTag::Summary);
    }

    #[test]
    fn wrong_actions_are_rejected_without_mutation() {
        let (m, _) = machine(1);
        let state = m.start(Participant::new(Group::Immediate));
        let (state, tick) = act(&m, state, Action::Submit("y".into()));
        assert_eq!(tick.outcome, Outcome::Rejected(Rejection::WrongAction(PhaseTag::Intro)));
        let (state, _) = act(&m, state, Action::Continue);
        let (state, _) = act(&m, state, Action::Continue);
        let before = state.clone();
        let (state, tick) = act(&m, state, Action::Submit("   ".into()));
        assert_eq!(tick.outcome, Outcome::Rejected(Rejection::BlankAnswer));
        let (state, tick) = act(&m, state, Action::Rate(50));
        assert!(matches!(tick.outcome, Outcome::Rejected(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn rating_above_100_is_rejected() {
        let (m, _) = machine(1);
        let mut state = m.start(Participant::new(Group::LongDelay));
        while state.phase() != PhaseTag::Confidence {
            state = act(&m, state, Action::Continue).0;
        }
        let (state, tick) = act(&m, state, Action::Rate(101));
        assert_eq!(tick.outcome, Outcome::Rejected(Rejection::ConfidenceOutOfRange(101)));
        let (state, tick) = act(&m, state, Action::Rate(100));
        let rating = tick.records[0].as_confidence().unwrap();
        assert_eq!(rating.confidence_percent, Some(100));
        assert_eq!(state.phase(), PhaseTag::BlackoutAll);
    }

    #[test]
    fn stale_step_is_ignored() {
        let (m, _) = machine(1);
        let state = m.start(Participant::new(Group::Immediate));
        let (state, _) = m.tick(state, Some(Input::new(0, Action::Continue)));
        assert_eq!(state.step(), 1);
        let (state, tick) = m.tick(state, Some(Input::new(0, Action::Continue)));
        assert_eq!(tick.outcome, Outcome::Stale { expected: 1, got: 0 });
        assert_eq!(state.phase(), PhaseTag::Stimulus);
    }

    #[test]
    fn jump_rearms_and_respects_protocol() {
        let (m, timer) = machine(3);
        let state = m.start(Participant::new(Group::Immediate));
        assert_eq!(
            m.jump(state.clone(), PhaseTag::Confidence),
            Err(ControlError::PhaseNotInProtocol {
                phase: PhaseTag::Confidence,
                group: Group::Immediate
            })
        );
        timer.advance_secs(5);
        let jumped = m.jump(state, PhaseTag::Questions).unwrap();
        assert_eq!(jumped.phase(), PhaseTag::Questions);
        assert_eq!(jumped.phase_started_at(), timer.now());
        assert_eq!(m.screen(&jumped).remaining_secs, Some(120));
    }

    #[test]
    fn jump_into_consolidated_builds_the_queue() {
        let (m, _) = machine(2);
        let state = m.start(Participant::new(Group::LongDelay));
        let state = m.jump(state, PhaseTag::ConsolidatedQuestions).unwrap();
        assert_eq!(state.consolidated_queue().map(VecDeque::len), Some(6));
        assert!(m.validate(&state).is_ok());
    }

    #[test]
    fn jump_back_into_consolidated_skips_answered_questions() {
        let (m, _) = machine(2);
        let state = m.start(Participant::new(Group::LongDelay));
        let state = m.jump(state, PhaseTag::ConsolidatedQuestions).unwrap();
        let (state, _) = act(&m, state, Action::Submit("x".into()));
        let (state, _) = act(&m, state, Action::Submit("y".into()));
        assert!(state.ledger().has_response(0, 1));

        let state = m.jump(state, PhaseTag::BlackoutAll).unwrap();
        let state = m.jump(state, PhaseTag::ConsolidatedQuestions).unwrap();
        assert_eq!(state.consolidated_queue().map(VecDeque::len), Some(4));
        assert_eq!((state.trial_index(), state.question_index()), (0, 2));
        assert_eq!(m.screen(&state).question_index, 2);
    }

    #[test]
    fn reset_starts_a_new_participant_in_the_same_group() {
        let (m, _) = machine(2);
        let state = m.start(Participant::new(Group::ShortDelay));
        let (state, _) = act(&m, state, Action::Continue);
        let fresh = m.reset(&state);
        assert_eq!(fresh.phase(), PhaseTag::Intro);
        assert_eq!(fresh.group(), Group::ShortDelay);
        assert_ne!(fresh.participant().id, state.participant().id);
        assert!(fresh.step() > state.step());
    }

    #[test]
    fn corrupted_snapshot_restarts_at_intro() {
        let (m, _) = machine(2);
        let state = m.start(Participant::new(Group::ShortDelay));
        let (state, _) = act(&m, state, Action::Continue);
        let mut value: serde_json::Value = serde_json::from_str(&state.snapshot().unwrap()).unwrap();
        value["phase"] = "warmup".into();
        let restored = m.restore(&value.to_string(), Group::ShortDelay);
        assert_eq!(restored.phase(), PhaseTag::Intro);

        value["phase"] = "confidence".into();
        let restored = m.restore(&value.to_string(), Group::ShortDelay);
        assert_eq!(restored.phase(), PhaseTag::Intro);

        let intact = m.restore(&state.snapshot().unwrap(), Group::ShortDelay);
        assert_eq!(intact, state);
    }

    #[test]
    fn question_screen_shows_graph_only_in_first_pass() {
        let (m, _) = machine(1);
        let mut g2 = m.start(Participant::new(Group::ShortDelay));
        while g2.phase() != PhaseTag::Questions {
            g2 = act(&m, g2, Action::Continue).0;
        }
        assert!(matches!(
            m.screen(&g2).content,
            ScreenContent::Question { image_ref: Some(_), .. }
        ));

        let g3 = m.start(Participant::new(Group::LongDelay));
        let g3 = m.jump(g3, PhaseTag::ConsolidatedQuestions).unwrap();
        assert!(matches!(
            m.screen(&g3).content,
            ScreenContent::Question { image_ref: None, .. }
        ));
    }
}
