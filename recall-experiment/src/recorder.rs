use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recall_core::{AnswerPass, ConfidenceRecord, Group, Question, QuestionType, ResponseRecord, Trial};
use recall_timing::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Option letters in position order, Latin and Hebrew.
const LETTERS: [[&str; 2]; 4] = [["a", "א"], ["b", "ב"], ["c", "ג"], ["d", "ד"]];

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn letter_position(token: &str) -> Option<usize> {
    LETTERS.iter().position(|pair| pair.contains(&token))
}

/// Grades an answer against the question's configured correct value.
///
/// `None` means unscored: nothing was answered or no correct value exists.
/// A letter token maps to the option at its position when the question has
/// exactly four options; anything else is compared as literal text.
pub fn grade(question: &Question, answer: Option<&str>) -> Option<bool> {
    let answer = normalize(answer?);
    let correct = normalize(question.correct_answer.as_deref()?);
    if correct.is_empty() {
        return None;
    }
    if question.options.len() == 4 {
        if let Some(pos) = letter_position(&correct) {
            return Some(answer == normalize(&question.options[pos]));
        }
    }
    Some(answer == correct)
}

/// Who is answering. Fixed for a [`crate::RunState`]'s lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub name: Option<String>,
    pub group: Group,
}

impl Participant {
    pub fn new(group: Group) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            group,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.trim().is_empty()).then_some(name);
        self
    }
}

/// Which records a participant already produced.
///
/// Claiming is the only way a record gets emitted, so a duplicate timeout or
/// a repeated submit finds its slot taken and emits nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerLedger {
    responses: BTreeSet<(usize, usize)>,
    confidences: BTreeSet<usize>,
}

impl AnswerLedger {
    pub fn claim_response(&mut self, trial: usize, question: usize) -> bool {
        self.responses.insert((trial, question))
    }

    pub fn claim_confidence(&mut self, trial: usize) -> bool {
        self.confidences.insert(trial)
    }

    pub fn has_response(&self, trial: usize, question: usize) -> bool {
        self.responses.contains(&(trial, question))
    }

    pub fn responses(&self) -> usize {
        self.responses.len()
    }

    pub fn confidences(&self) -> usize {
        self.confidences.len()
    }
}

/// An answer, or its absence, as observed on one tick.
#[derive(Debug, Clone)]
pub struct AnswerEvent<'a> {
    pub trial: &'a Trial,
    pub question_index: usize,
    pub pass: AnswerPass,
    pub answer: Option<String>,
    pub timed_out: bool,
    pub reaction: Duration,
    pub at: Timestamp,
}

/// Builds immutable records, stamping them from the controller's clock.
#[derive(Debug, Clone)]
pub struct Recorder {
    wall_origin: DateTime<Utc>,
    mono_origin: Timestamp,
}

impl Recorder {
    /// `wall_origin` is the wall-clock instant matching `mono_origin`.
    pub fn new(wall_origin: DateTime<Utc>, mono_origin: Timestamp) -> Self {
        Self {
            wall_origin,
            mono_origin,
        }
    }

    pub fn recorded_at(&self, at: Timestamp) -> DateTime<Utc> {
        let offset = Duration::from_nanos(at.saturating_sub(self.mono_origin));
        chrono::Duration::from_std(offset)
            .ok()
            .and_then(|d| self.wall_origin.checked_add_signed(d))
            .unwrap_or(self.wall_origin)
    }

    pub fn response(
        &self,
        ledger: &mut AnswerLedger,
        who: &Participant,
        event: AnswerEvent<'_>,
    ) -> Option<ResponseRecord> {
        let trial = event.trial;
        if !ledger.claim_response(trial.index, event.question_index) {
            debug!(
                trial = trial.index,
                question = event.question_index,
                "answer already recorded; ignoring"
            );
            return None;
        }
        let question = trial.question(event.question_index);
        let is_correct = question.and_then(|q| grade(q, event.answer.as_deref()));
        Some(ResponseRecord {
            participant_id: who.id,
            participant_name: who.name.clone(),
            group: who.group,
            pass: event.pass,
            trial_index: trial.index,
            source_row: trial.source_row,
            question_index: event.question_index,
            question_text: question.map(|q| q.text.clone()).unwrap_or_default(),
            question_type: question.map_or(QuestionType::Content, |q| q.kind),
            answer: event.answer,
            is_correct,
            reaction_time_ms: event.reaction.as_millis() as u64,
            timed_out: event.timed_out,
            image_ref: trial.image_ref.clone(),
            context_text: trial.context_text.clone(),
            color_shown: trial.color_shown().to_string(),
            recorded_at: self.recorded_at(event.at),
        })
    }

    pub fn confidence(
        &self,
        ledger: &mut AnswerLedger,
        who: &Participant,
        trial: &Trial,
        percent: Option<u8>,
        at: Timestamp,
    ) -> Option<ConfidenceRecord> {
        if !ledger.claim_confidence(trial.index) {
            debug!(trial = trial.index, "confidence already recorded; ignoring");
            return None;
        }
        Some(ConfidenceRecord {
            participant_id: who.id,
            participant_name: who.name.clone(),
            group: who.group,
            trial_index: trial.index,
            source_row: trial.source_row,
            confidence_percent: percent,
            image_ref: trial.image_ref.clone(),
            context_text: trial.context_text.clone(),
            recorded_at: self.recorded_at(at),
        })
    }
}
