use recall_core::{Group, PhaseTag, QuestionType};
use serde::{Deserialize, Serialize};

/// Everything a front end needs to draw the current tick.
///
/// Screens are derived from a `RunState` and the clock; they carry no
/// authority. Actions sent back must quote `step` to be accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub step: u64,
    pub phase: PhaseTag,
    pub group: Group,
    pub trial_index: usize,
    pub total_trials: usize,
    pub question_index: usize,
    pub questions_in_block: usize,
    /// Whole seconds left, `None` for untimed phases.
    pub remaining_secs: Option<u64>,
    pub budget_secs: Option<u64>,
    /// Fraction of the session done, in `0.0..=1.0`.
    pub progress: f32,
    pub content: ScreenContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenContent {
    Intro,
    Context {
        text: String,
        /// Second showing, after the graph (group 3).
        repeat: bool,
    },
    Stimulus {
        image_ref: Option<String>,
    },
    Blackout {
        before_consolidated: bool,
    },
    Question {
        text: String,
        options: Vec<String>,
        kind: QuestionType,
        /// Graph shown alongside the question, when the protocol keeps it visible.
        image_ref: Option<String>,
    },
    Confidence,
    Summary {
        responses: usize,
        confidences: usize,
    },
}

impl Screen {
    pub fn is_timed(&self) -> bool {
        self.remaining_secs.is_some()
    }

    /// One-based "trial x of n" label; `None` outside trial phases.
    pub fn trial_label(&self) -> Option<(usize, usize)> {
        match self.phase {
            PhaseTag::Intro | PhaseTag::BlackoutAll | PhaseTag::Summary => None,
            _ => Some((self.trial_index + 1, self.total_trials)),
        }
    }

    pub fn question_label(&self) -> Option<(usize, usize)> {
        self.phase
            .is_question()
            .then_some((self.question_index + 1, self.questions_in_block))
    }
}
