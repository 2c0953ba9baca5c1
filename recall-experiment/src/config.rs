use std::path::PathBuf;
use std::time::Duration;

use recall_core::PhaseTag;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Time budget per phase, in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseBudgets {
    pub stimulus_secs: u64,
    pub context_secs: u64,
    pub blackout_secs: u64,
    pub answer_secs: u64,
    pub confidence_secs: u64,
}

impl Default for PhaseBudgets {
    fn default() -> Self {
        Self {
            stimulus_secs: 30,
            context_secs: 30,
            blackout_secs: 30,
            answer_secs: 120,
            confidence_secs: 120,
        }
    }
}

impl PhaseBudgets {
    /// `None` for the phases that wait for the participant indefinitely.
    pub fn for_phase(&self, phase: PhaseTag) -> Option<Duration> {
        use PhaseTag::*;
        let secs = match phase {
            Intro | Summary => return None,
            ContextPre | ContextPost => self.context_secs,
            Stimulus => self.stimulus_secs,
            BlackoutTrial | BlackoutAll => self.blackout_secs,
            Questions | ConsolidatedQuestions => self.answer_secs,
            Confidence => self.confidence_secs,
        };
        Some(Duration::from_secs(secs))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("stimulus", self.stimulus_secs),
            ("context", self.context_secs),
            ("blackout", self.blackout_secs),
            ("answer", self.answer_secs),
            ("confidence", self.confidence_secs),
        ];
        match named.iter().find(|(_, secs)| *secs == 0) {
            Some((phase, _)) => Err(ConfigError::ZeroBudget { phase: *phase }),
            None => Ok(()),
        }
    }
}

/// Everything read once at process start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub budgets: PhaseBudgets,
    pub max_trials: usize,
    pub shuffle: bool,
    pub tick_interval_ms: u64,
    pub admin_code: Option<String>,
    pub images_dir: PathBuf,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            budgets: PhaseBudgets::default(),
            max_trials: 12,
            shuffle: false,
            tick_interval_ms: 1000,
            admin_code: None,
            images_dir: PathBuf::from("images"),
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.budgets.validate()?;
        if self.max_trials == 0 {
            return Err(ConfigError::ZeroMaxTrials);
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
