//! Persistence behind the loader: lookup tables, dedup queries and inserts.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::StorageError;
use crate::loader::LoadOutcome;
use crate::types::{InteractionKind, Site, EVENT_AT_FORMAT};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgInteractionStore;

/// Identity of a stored interaction. Two rows with the same key are the same
/// event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DedupKey {
    pub kind: InteractionKind,
    pub exhibition_id: i32,
    pub value_id: i32,
    pub event_at: NaiveDateTime,
}

impl DedupKey {
    /// Text form hashed into the advisory lock taken around check-then-insert.
    pub fn lock_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.kind.interaction_table(),
            self.exhibition_id,
            self.value_id,
            self.event_at.format(EVENT_AT_FORMAT)
        )
    }
}

#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// `exhibition_id` for the exhibition at `site`, if one is registered.
    async fn resolve_exhibition(&self, site: Site) -> Result<Option<i32>, StorageError>;

    /// `rating_id` / `request_id` for a lookup value, if one is registered.
    async fn resolve_value_id(
        &self,
        kind: InteractionKind,
        value: i16,
    ) -> Result<Option<i32>, StorageError>;

    /// Point lookup on the full dedup key.
    async fn is_duplicate(&self, key: &DedupKey) -> Result<bool, StorageError>;

    /// Duplicate check and insert as one unit. Implementations must make sure
    /// two concurrent calls with the same key cannot both insert.
    async fn insert_if_absent(&self, key: &DedupKey) -> Result<LoadOutcome, StorageError>;
}
