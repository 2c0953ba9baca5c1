use std::fmt;

use serde::{Deserialize, Serialize};

use crate::phase::PhaseTag;

/// Questions asked about a single trial, whatever the group.
pub const QUESTIONS_PER_TRIAL: usize = 3;

/// Experimental protocol a participant is assigned to.
///
/// Serialized as its number (1, 2 or 3) to match the output files.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Group {
    /// Stimulus followed immediately by a single question.
    Immediate,
    /// Context, stimulus, a black-out, then three questions.
    ShortDelay,
    /// Every trial first, with confidence ratings, then all questions at once.
    LongDelay,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Immediate, Group::ShortDelay, Group::LongDelay];

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::Immediate),
            2 => Some(Self::ShortDelay),
            3 => Some(Self::LongDelay),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::Immediate => 1,
            Self::ShortDelay => 2,
            Self::LongDelay => 3,
        }
    }

    pub fn questions_per_trial(&self) -> usize {
        match self {
            Self::Immediate => 1,
            Self::ShortDelay | Self::LongDelay => QUESTIONS_PER_TRIAL,
        }
    }

    pub fn rates_confidence(&self) -> bool {
        matches!(self, Self::LongDelay)
    }

    /// Label written next to every response row.
    pub fn delay_category(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::ShortDelay => "short",
            Self::LongDelay => "long",
        }
    }

    /// First phase of every trial in the first pass.
    pub fn trial_entry(&self) -> PhaseTag {
        match self {
            Self::Immediate => PhaseTag::Stimulus,
            Self::ShortDelay | Self::LongDelay => PhaseTag::ContextPre,
        }
    }

    /// Whether the protocol ever enters `phase`.
    pub fn visits(&self, phase: PhaseTag) -> bool {
        use PhaseTag::*;
        match phase {
            Intro | Stimulus | Summary => true,
            ContextPre => !matches!(self, Self::Immediate),
            Questions => !matches!(self, Self::LongDelay),
            BlackoutTrial => matches!(self, Self::ShortDelay),
            ContextPost | Confidence | BlackoutAll | ConsolidatedQuestions => {
                matches!(self, Self::LongDelay)
            }
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl From<Group> for u8 {
    fn from(g: Group) -> u8 {
        g.number()
    }
}

impl TryFrom<u8> for Group {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::from_number(n).ok_or_else(|| format!("group must be 1, 2 or 3, got {n}"))
    }
}
