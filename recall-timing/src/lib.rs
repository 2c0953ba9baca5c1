pub mod deadline;
pub mod timer;

pub use deadline::Deadline;
pub use timer::{ManualTimer, MonotonicTimer, Timer, Timestamp, saturating_nanos};
