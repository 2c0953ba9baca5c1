use recall_core::SessionRecord;
use tracing::warn;

use crate::{ResultSink, SinkError};

/// Writes to `primary`, and to `secondary` whenever the primary refuses.
///
/// A record lands in exactly one of the two stores. When both refuse, the
/// error is returned so the caller can keep the record and retry later.
pub struct FallbackSink<P, S> {
    primary: P,
    secondary: S,
    fallbacks: u64,
}

impl<P: ResultSink, S: ResultSink> FallbackSink<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self {
            primary,
            secondary,
            fallbacks: 0,
        }
    }

    /// Records that went to the secondary store.
    pub fn fallbacks(&self) -> u64 {
        self.fallbacks
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }
}

impl<P: ResultSink, S: ResultSink> ResultSink for FallbackSink<P, S> {
    fn append(&mut self, record: &SessionRecord) -> Result<(), SinkError> {
        let primary_err = match self.primary.append(record) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        warn!(
            primary = %self.primary.describe(),
            secondary = %self.secondary.describe(),
            error = %primary_err,
            "primary results store failed, writing to fallback"
        );
        match self.secondary.append(record) {
            Ok(()) => {
                self.fallbacks += 1;
                Ok(())
            }
            Err(secondary_err) => Err(SinkError::Exhausted {
                primary: Box::new(primary_err),
                secondary: Box::new(secondary_err),
            }),
        }
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let primary = self.primary.flush();
        self.secondary.flush()?;
        primary
    }

    fn describe(&self) -> String {
        format!("{} (fallback {})", self.primary.describe(), self.secondary.describe())
    }
}
