//! Batch and stream drivers: feed records through validate, normalize and
//! load, and tally what happened to each one.

use std::fmt;

use anyhow::Result;
use serde::Serialize;
use tracing::error;

use crate::error::{LoadError, ResolutionError, StorageError};
use crate::loader::{LoadOutcome, Loader};
use crate::normalize::normalize;
use crate::types::RawRecord;
use crate::validation::{validate, ValidationError};

pub mod batch;
pub mod stream;

pub use batch::run_batch;
pub use stream::{run_stream, CapMode, ParseCapModeError, StreamOptions, StreamSummary};

/// What happened to one record.
#[derive(Debug)]
pub enum RowReport {
    Loaded(LoadOutcome),
    Invalid(ValidationError),
    Unresolved(ResolutionError),
    /// Non-fatal storage failure; only this row was lost.
    Failed(StorageError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub invalid: usize,
    pub unresolved: usize,
    pub failed: usize,
}

impl LoadSummary {
    pub fn record(&mut self, report: &RowReport) {
        match report {
            RowReport::Loaded(LoadOutcome::Inserted) => self.inserted += 1,
            RowReport::Loaded(LoadOutcome::Skipped) => self.skipped += 1,
            RowReport::Invalid(_) => self.invalid += 1,
            RowReport::Unresolved(_) => self.unresolved += 1,
            RowReport::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.invalid + self.unresolved + self.failed
    }

    pub fn skipped_message(&self) -> String {
        format!("{} rows skipped.", self.skipped)
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} skipped, {} invalid, {} unresolved, {} failed",
            self.inserted, self.skipped, self.invalid, self.unresolved, self.failed
        )
    }
}

/// Validate, normalize and load one record.
///
/// Validation failures come back as [`RowReport::Invalid`] for the caller to
/// log in its own wording. Losing the database connection is the only error
/// returned; it ends the run.
pub async fn load_record(loader: &Loader, raw: &RawRecord) -> Result<RowReport> {
    let record = match validate(raw) {
        Ok(record) => record,
        Err(err) => return Ok(RowReport::Invalid(err)),
    };
    let row = normalize(&record);

    match loader.load(&row).await {
        Ok(outcome) => Ok(RowReport::Loaded(outcome)),
        Err(LoadError::Resolution(err)) => {
            error!(
                site = %row.site,
                event_at = %row.event_at_string(),
                "Dropping unresolvable row: {err}"
            );
            Ok(RowReport::Unresolved(err))
        }
        Err(LoadError::Storage(err)) if err.is_connection_loss() => {
            Err(anyhow::Error::new(err).context("lost connection to the database"))
        }
        Err(LoadError::Storage(err)) => {
            error!(
                site = %row.site,
                event_at = %row.event_at_string(),
                "Failed to store row: {err}"
            );
            Ok(RowReport::Failed(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = LoadSummary::default();
        summary.record(&RowReport::Loaded(LoadOutcome::Inserted));
        summary.record(&RowReport::Loaded(LoadOutcome::Skipped));
        summary.record(&RowReport::Loaded(LoadOutcome::Skipped));
        summary.record(&RowReport::Invalid(ValidationError::MissingKey("at")));

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.skipped_message(), "2 rows skipped.");
        assert_eq!(
            summary.to_string(),
            "1 inserted, 2 skipped, 1 invalid, 0 unresolved, 0 failed"
        );
    }
}
