//! Experiment flow control: trial building, the per-group phase machine,
//! answer recording and the session driver that feeds a result sink.

pub mod admin;
pub mod config;
pub mod error;
pub mod group;
pub mod images;
pub mod recorder;
pub mod schema;
pub mod screen;
pub mod session;
pub mod state;
pub mod table;
pub mod trial;

pub use admin::AdminGate;
pub use config::{ExperimentConfig, PhaseBudgets};
pub use error::{BuildError, ConfigError, ControlError};
pub use group::GroupAssignment;
pub use images::ImageResolver;
pub use recorder::{AnswerLedger, Participant, Recorder, grade};
pub use schema::{Schema, SchemaWarning};
pub use screen::{Screen, ScreenContent};
pub use session::{Session, Status};
pub use state::{
    Action, Cause, ExperimentStateMachine, Input, Outcome, QuestionRef, Rejection, RunState,
    Tick, Transition,
};
pub use table::StimulusTable;
pub use trial::TrialBuilder;
