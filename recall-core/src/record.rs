use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::group::Group;
use crate::stimulus::QuestionType;

/// Version stamped on every output row.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which question block produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPass {
    /// Asked right after the trial (groups 1 and 2).
    Immediate,
    /// Asked in the block after every trial was shown (group 3).
    Consolidated,
}

impl AnswerPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Consolidated => "consolidated",
        }
    }
}

/// One answered (or timed-out) question. Never mutated once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub participant_id: Uuid,
    pub participant_name: Option<String>,
    pub group: Group,
    pub pass: AnswerPass,
    pub trial_index: usize,
    pub source_row: usize,
    pub question_index: usize,
    pub question_text: String,
    pub question_type: QuestionType,
    /// `None` when the question timed out or was skipped.
    pub answer: Option<String>,
    /// `None` when unscored: no answer, or no correct answer configured.
    pub is_correct: Option<bool>,
    pub reaction_time_ms: u64,
    pub timed_out: bool,
    pub image_ref: Option<String>,
    pub context_text: String,
    pub color_shown: String,
    pub recorded_at: DateTime<Utc>,
}

/// Group 3's memory-confidence rating, one per trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRecord {
    pub participant_id: Uuid,
    pub participant_name: Option<String>,
    pub group: Group,
    pub trial_index: usize,
    pub source_row: usize,
    /// 0..=100, or `None` when the rating screen timed out or was skipped.
    pub confidence_percent: Option<u8>,
    pub image_ref: Option<String>,
    pub context_text: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum SessionRecord {
    Response(ResponseRecord),
    Confidence(ConfidenceRecord),
}

impl SessionRecord {
    pub fn participant_id(&self) -> Uuid {
        match self {
            Self::Response(r) => r.participant_id,
            Self::Confidence(c) => c.participant_id,
        }
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::Response(r) => r.recorded_at,
            Self::Confidence(c) => c.recorded_at,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseRecord> {
        match self {
            Self::Response(r) => Some(r),
            Self::Confidence(_) => None,
        }
    }

    pub fn as_confidence(&self) -> Option<&ConfidenceRecord> {
        match self {
            Self::Confidence(c) => Some(c),
            Self::Response(_) => None,
        }
    }
}

/// Flat row shared by both record kinds; the column order is the file header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub record_type: String,
    pub recorded_at: String,
    pub app_version: String,
    pub participant_id: String,
    pub participant_name: String,
    pub group: u8,
    pub delay_category: String,
    pub pass: String,
    pub trial_index: usize,
    pub source_row: usize,
    pub question_index: Option<usize>,
    pub question_text: String,
    pub question_type: String,
    pub answer: Option<String>,
    pub is_correct: Option<bool>,
    pub reaction_time_ms: Option<u64>,
    pub timed_out: Option<bool>,
    pub confidence_percent: Option<u8>,
    pub image_ref: String,
    pub context_text: String,
    pub color_shown: String,
}

impl OutputRow {
    pub const HEADER: [&'static str; 21] = [
        "record_type",
        "recorded_at",
        "app_version",
        "participant_id",
        "participant_name",
        "group",
        "delay_category",
        "pass",
        "trial_index",
        "source_row",
        "question_index",
        "question_text",
        "question_type",
        "answer",
        "is_correct",
        "reaction_time_ms",
        "timed_out",
        "confidence_percent",
        "image_ref",
        "context_text",
        "color_shown",
    ];
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl From<&SessionRecord> for OutputRow {
    fn from(record: &SessionRecord) -> Self {
        match record {
            SessionRecord::Response(r) => Self {
                record_type: "answer".into(),
                recorded_at: timestamp(&r.recorded_at),
                app_version: APP_VERSION.into(),
                participant_id: r.participant_id.to_string(),
                participant_name: r.participant_name.clone().unwrap_or_default(),
                group: r.group.number(),
                delay_category: r.group.delay_category().into(),
                pass: r.pass.as_str().into(),
                trial_index: r.trial_index,
                source_row: r.source_row,
                question_index: Some(r.question_index),
                question_text: r.question_text.clone(),
                question_type: r.question_type.as_str().into(),
                answer: r.answer.clone(),
                is_correct: r.is_correct,
                reaction_time_ms: Some(r.reaction_time_ms),
                timed_out: Some(r.timed_out),
                confidence_percent: None,
                image_ref: r.image_ref.clone().unwrap_or_default(),
                context_text: r.context_text.clone(),
                color_shown: r.color_shown.clone(),
            },
            SessionRecord::Confidence(c) => Self {
                record_type: "confidence".into(),
                recorded_at: timestamp(&c.recorded_at),
                app_version: APP_VERSION.into(),
                participant_id: c.participant_id.to_string(),
                participant_name: c.participant_name.clone().unwrap_or_default(),
                group: c.group.number(),
                delay_category: c.group.delay_category().into(),
                pass: String::new(),
                trial_index: c.trial_index,
                source_row: c.source_row,
                question_index: None,
                question_text: String::new(),
                question_type: String::new(),
                answer: None,
                is_correct: None,
                reaction_time_ms: None,
                timed_out: None,
                confidence_percent: c.confidence_percent,
                image_ref: c.image_ref.clone().unwrap_or_default(),
                context_text: c.context_text.clone(),
                color_shown: String::new(),
            },
        }
    }
}
