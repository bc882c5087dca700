use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::LoadError;
use crate::lookup;
use crate::store::{DedupKey, InteractionStore};
use crate::types::NormalizedRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadOutcome {
    Inserted,
    /// The dedup key was already stored.
    Skipped,
}

/// Commits normalized rows, at most once per dedup key.
#[derive(Clone)]
pub struct Loader {
    store: Arc<dyn InteractionStore>,
}

impl Loader {
    pub fn new(store: Arc<dyn InteractionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn InteractionStore {
        self.store.as_ref()
    }

    /// Resolve the row's foreign keys, then check-and-insert it in one unit.
    ///
    /// A lookup miss is returned as [`LoadError::Resolution`] and nothing is
    /// written.
    pub async fn load(&self, row: &NormalizedRow) -> Result<LoadOutcome, LoadError> {
        let key = self.resolve_key(row).await?;
        let kind = key.kind;

        let outcome = self.store.insert_if_absent(&key).await?;
        match outcome {
            LoadOutcome::Inserted => {
                info!(
                    site = %row.site,
                    event_at = %row.event_at_string(),
                    "Row has been uploaded as {kind} entry"
                );
            }
            LoadOutcome::Skipped => {
                warn!(
                    site = %row.site,
                    event_at = %row.event_at_string(),
                    "Skipping row: already exists in {} table",
                    kind.interaction_table()
                );
            }
        }
        Ok(outcome)
    }

    /// Whether the row's dedup key is already stored, without writing.
    pub async fn is_duplicate(&self, row: &NormalizedRow) -> Result<bool, LoadError> {
        let key = self.resolve_key(row).await?;
        Ok(self.store.is_duplicate(&key).await?)
    }

    async fn resolve_key(&self, row: &NormalizedRow) -> Result<DedupKey, LoadError> {
        let value_id = lookup::resolve_value_id(self.store(), &row.value).await?;
        let exhibition_id = lookup::resolve_exhibition(self.store(), row.site).await?;
        Ok(DedupKey {
            kind: row.kind(),
            exhibition_id,
            value_id,
            event_at: row.event_at,
        })
    }
}
