use std::collections::VecDeque;
use std::fmt;

use recall_core::{Group, PhaseTag, SessionRecord};
use recall_sink::{ResultSink, SinkError};
use recall_timing::Timer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::admin::AdminGate;
use crate::config::PhaseBudgets;
use crate::error::ControlError;
use crate::recorder::Participant;
use crate::screen::Screen;
use crate::state::{Action, ExperimentStateMachine, Input, RunState, Tick};

/// Admin view of a running session.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub participant_id: Uuid,
    pub group: Group,
    pub phase: PhaseTag,
    pub step: u64,
    pub trial_index: usize,
    pub question_index: usize,
    pub budgets: PhaseBudgets,
    pub results: String,
    pub pending_records: usize,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "participant {} (group {})", self.participant_id, self.group)?;
        writeln!(
            f,
            "phase {} step {} trial {} question {}",
            self.phase, self.step, self.trial_index, self.question_index
        )?;
        writeln!(
            f,
            "budgets: stimulus {}s context {}s blackout {}s answer {}s confidence {}s",
            self.budgets.stimulus_secs,
            self.budgets.context_secs,
            self.budgets.blackout_secs,
            self.budgets.answer_secs,
            self.budgets.confidence_secs
        )?;
        write!(f, "results: {} ({} pending)", self.results, self.pending_records)
    }
}

/// Drives one participant: owns the current [`RunState`], swaps it for the
/// controller's successor after every call, and pushes records to the sink.
///
/// Records the sink refuses stay queued in order and are retried on the next
/// call, so a failing store never blocks the flow or loses a row.
pub struct Session<T: Timer, K: ResultSink> {
    machine: ExperimentStateMachine<T>,
    state: RunState,
    sink: K,
    pending: VecDeque<SessionRecord>,
    admin: AdminGate,
    written: usize,
}

impl<T: Timer, K: ResultSink> Session<T, K> {
    pub fn new(
        machine: ExperimentStateMachine<T>,
        participant: Participant,
        sink: K,
        admin: AdminGate,
    ) -> Self {
        let state = machine.start(participant);
        Self {
            machine,
            state,
            sink,
            pending: VecDeque::new(),
            admin,
            written: 0,
        }
    }

    pub fn machine(&self) -> &ExperimentStateMachine<T> {
        &self.machine
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn screen(&self) -> Screen {
        self.machine.screen(&self.state)
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Records produced but not yet accepted by the sink.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn tick(&mut self) -> Tick {
        self.run(None)
    }

    pub fn act(&mut self, input: Input) -> Tick {
        self.run(Some(input))
    }

    /// Acts on whatever screen is current, quoting its step.
    pub fn act_now(&mut self, action: Action) -> Tick {
        let step = self.state.step();
        self.run(Some(Input::new(step, action)))
    }

    fn run(&mut self, input: Option<Input>) -> Tick {
        let (state, tick) = self.machine.tick(self.state.clone(), input);
        self.state = state;
        self.pending.extend(tick.records.iter().cloned());
        self.drain();
        tick
    }

    /// Writes queued records in order, stopping at the first refusal.
    fn drain(&mut self) {
        while let Some(record) = self.pending.front() {
            match self.sink.append(record) {
                Ok(()) => {
                    debug!(
                        participant_id = %record.participant_id(),
                        recorded_at = %record.recorded_at(),
                        "record stored"
                    );
                    self.pending.pop_front();
                    self.written += 1;
                }
                Err(error) => {
                    warn!(
                        %error,
                        pending = self.pending.len(),
                        "result store unavailable; keeping records for retry"
                    );
                    break;
                }
            }
        }
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.drain();
        if let Some(record) = self.pending.front() {
            // one more attempt so the caller sees the real error
            self.sink.append(record)?;
            self.pending.pop_front();
            self.written += 1;
            self.drain();
        }
        self.sink.flush()
    }

    pub fn admin_unlock(&mut self, code: &str) -> bool {
        self.admin.unlock(code)
    }

    pub fn admin_lock(&mut self) {
        self.admin.lock();
    }

    fn require_admin(&self) -> Result<(), ControlError> {
        if self.admin.is_unlocked() {
            Ok(())
        } else {
            Err(ControlError::AdminLocked)
        }
    }

    pub fn admin_jump(&mut self, phase: PhaseTag) -> Result<Screen, ControlError> {
        self.require_admin()?;
        self.state = self.machine.jump(self.state.clone(), phase)?;
        Ok(self.screen())
    }

    pub fn admin_reset(&mut self) -> Result<Screen, ControlError> {
        self.require_admin()?;
        self.state = self.machine.reset(&self.state);
        debug!(participant_id = %self.state.participant().id, "admin reset");
        Ok(self.screen())
    }

    pub fn admin_status(&self) -> Result<Status, ControlError> {
        self.require_admin()?;
        Ok(Status {
            participant_id: self.state.participant().id,
            group: self.state.group(),
            phase: self.state.phase(),
            step: self.state.step(),
            trial_index: self.state.trial_index(),
            question_index: self.state.question_index(),
            budgets: self.machine.config().budgets.clone(),
            results: self.sink.describe(),
            pending_records: self.pending.len(),
        })
    }
}
