pub mod group;
pub mod phase;
pub mod record;
pub mod stimulus;

pub use group::{Group, QUESTIONS_PER_TRIAL};
pub use phase::{PhaseTag, UnknownPhase};
pub use record::{
    APP_VERSION, AnswerPass, ConfidenceRecord, OutputRow, ResponseRecord, SessionRecord,
};
pub use stimulus::{Question, QuestionType, Trial};
