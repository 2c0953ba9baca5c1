//! Append-only stores for session records.
//!
//! Every store implements [`ResultSink`]. Records are only ever appended;
//! nothing here rewrites or deletes a row that was accepted.

pub mod csv_file;
pub mod error;
pub mod fallback;
pub mod jsonl;
pub mod memory;

pub use csv_file::CsvSink;
pub use error::SinkError;
pub use fallback::FallbackSink;
pub use jsonl::JsonlSink;
pub use memory::MemorySink;

use recall_core::SessionRecord;

pub trait ResultSink {
    fn append(&mut self, record: &SessionRecord) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Short human description for logs ("csv:results/results_local.csv").
    fn describe(&self) -> String;
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn append(&mut self, record: &SessionRecord) -> Result<(), SinkError> {
        (**self).append(record)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
