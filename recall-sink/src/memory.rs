use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use recall_core::SessionRecord;

use crate::{ResultSink, SinkError};

/// In-memory store. Clones share the same buffer, so a caller can keep a
/// handle after moving the sink into a session.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<SessionRecord>>>,
    failing: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every append fails with [`SinkError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for MemorySink {
    fn append(&mut self, record: &SessionRecord) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable(self.describe()));
        }
        self.records
            .lock()
            .map_err(|_| SinkError::Unavailable(self.describe()))?
            .push(record.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
