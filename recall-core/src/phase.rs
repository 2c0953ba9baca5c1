use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Screens a participant moves through.
///
/// The set is closed: every transition is decided by an exhaustive match on
/// this enum, so adding a phase forces every table to be revisited.
#[derive(
    Copy, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PhaseTag {
    #[default]
    Intro,
    ContextPre,
    Stimulus,
    ContextPost,
    Confidence,
    BlackoutTrial,
    Questions,
    BlackoutAll,
    ConsolidatedQuestions,
    Summary,
}

impl PhaseTag {
    pub const ALL: [PhaseTag; 10] = [
        PhaseTag::Intro,
        PhaseTag::ContextPre,
        PhaseTag::Stimulus,
        PhaseTag::ContextPost,
        PhaseTag::Confidence,
        PhaseTag::BlackoutTrial,
        PhaseTag::Questions,
        PhaseTag::BlackoutAll,
        PhaseTag::ConsolidatedQuestions,
        PhaseTag::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::ContextPre => "context_pre",
            Self::Stimulus => "stimulus",
            Self::ContextPost => "context_post",
            Self::Confidence => "confidence",
            Self::BlackoutTrial => "blackout_trial",
            Self::Questions => "questions",
            Self::BlackoutAll => "blackout_all",
            Self::ConsolidatedQuestions => "consolidated_questions",
            Self::Summary => "summary",
        }
    }

    /// Phases that run against a deadline. `Intro` and `Summary` wait forever.
    pub fn is_timed(&self) -> bool {
        !matches!(self, Self::Intro | Self::Summary)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Summary)
    }

    /// Phases whose designated action is a plain "continue".
    pub fn allows_continue(&self) -> bool {
        matches!(
            self,
            Self::Intro
                | Self::ContextPre
                | Self::Stimulus
                | Self::ContextPost
                | Self::BlackoutTrial
                | Self::BlackoutAll
        )
    }

    pub fn is_question(&self) -> bool {
        matches!(self, Self::Questions | Self::ConsolidatedQuestions)
    }

    pub fn is_confidence(&self) -> bool {
        matches!(self, Self::Confidence)
    }
}

impl fmt::Display for PhaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPhase(pub String);

impl fmt::Display for UnknownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown phase tag `{}`", self.0)
    }
}

impl std::error::Error for UnknownPhase {}

impl FromStr for PhaseTag {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        // older deployments called the stimulus screen "graph"
        match key.as_str() {
            "graph" => return Ok(Self::Stimulus),
            "all_questions" => return Ok(Self::ConsolidatedQuestions),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}
