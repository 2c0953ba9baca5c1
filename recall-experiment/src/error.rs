use std::path::PathBuf;

use recall_core::{Group, PhaseTag, UnknownPhase};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{phase} budget must be at least one second")]
    ZeroBudget { phase: &'static str },

    #[error("max trial count must be at least one")]
    ZeroMaxTrials,

    #[error("tick interval must be at least one millisecond")]
    ZeroTickInterval,
}

/// Failures that stop the trial sequence from being built at all.
/// Individual bad rows never end up here; they degrade to placeholders.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot read stimulus table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed stimulus table: {0}")]
    Csv(#[from] csv::Error),

    #[error("stimulus table has no data rows")]
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("admin mode is locked")]
    AdminLocked,

    #[error("group {group} never visits phase {phase}")]
    PhaseNotInProtocol { phase: PhaseTag, group: Group },

    #[error(transparent)]
    UnknownPhase(#[from] UnknownPhase),
}
