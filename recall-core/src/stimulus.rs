use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What a question probes about the graph it follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    #[default]
    Content,
    Color,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Color => "color",
        }
    }

    /// Classifies a question from an explicit type cell, falling back to its text.
    pub fn classify(text: &str, explicit: Option<&str>) -> Self {
        if let Some(t) = explicit {
            match t.trim().to_lowercase().as_str() {
                "color" | "colour" | "צבע" => return Self::Color,
                "content" | "תוכן" => return Self::Content,
                _ => {}
            }
        }
        if text.to_lowercase().contains("color") || text.contains("צבע") {
            Self::Color
        } else {
            Self::Content
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    /// Either empty (open answer) or exactly four choices.
    pub options: Vec<String>,
    /// A letter (`A`..`D`, `א`..`ד`) or the literal answer text.
    pub correct_answer: Option<String>,
    pub kind: QuestionType,
}

/// One stimulus presentation: context, graph and its questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Position in the session's sequence.
    pub index: usize,
    /// Row of the stimulus table this trial came from.
    pub source_row: usize,
    pub context_text: String,
    pub image_ref: Option<String>,
    pub questions: Vec<Question>,
    pub metadata: BTreeMap<String, String>,
}

impl Trial {
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn color_shown(&self) -> &str {
        self.metadata.get("color_value").map_or("", String::as_str)
    }
}
