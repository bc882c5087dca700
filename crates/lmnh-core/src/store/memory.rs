use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::loader::LoadOutcome;
use crate::seed::{EXHIBITION_PUBLIC_IDS, RATINGS, REQUESTS};
use crate::types::{InteractionKind, Site};

use super::{DedupKey, InteractionStore};

/// Process-local store used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    exhibitions: HashMap<String, i32>,
    ratings: HashMap<i16, i32>,
    requests: HashMap<i16, i32>,
    keys: HashSet<DedupKey>,
    rows: Vec<DedupKey>,
    offline: bool,
    rejected_exhibitions: HashSet<i32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the same reference rows `seed::run` writes to Postgres.
    pub fn seeded() -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            for public_id in EXHIBITION_PUBLIC_IDS {
                state.add_exhibition(public_id);
            }
            for (value, _) in RATINGS {
                state.add_value(InteractionKind::Rating, value);
            }
            for (value, _) in REQUESTS {
                state.add_value(InteractionKind::Request, value);
            }
        }
        store
    }

    pub fn add_exhibition(&self, public_id: &str) -> Result<i32, StorageError> {
        Ok(self.lock()?.add_exhibition(public_id))
    }

    pub fn add_value(&self, kind: InteractionKind, value: i16) -> Result<i32, StorageError> {
        Ok(self.lock()?.add_value(kind, value))
    }

    /// Every committed interaction, in insertion order.
    pub fn rows(&self) -> Result<Vec<DedupKey>, StorageError> {
        Ok(self.lock()?.rows.clone())
    }

    /// Simulate losing the backend; every call fails until brought back.
    pub fn set_offline(&self, offline: bool) -> Result<(), StorageError> {
        self.lock()?.offline = offline;
        Ok(())
    }

    /// Make inserts for one exhibition fail as a rejected statement would,
    /// while the store stays reachable.
    pub fn reject_inserts_for(&self, exhibition_id: i32) -> Result<(), StorageError> {
        self.lock()?.rejected_exhibitions.insert(exhibition_id);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".into()))
    }

    fn online(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        let state = self.lock()?;
        if state.offline {
            return Err(StorageError::Unavailable("memory store is offline".into()));
        }
        Ok(state)
    }
}

impl MemoryState {
    fn add_exhibition(&mut self, public_id: &str) -> i32 {
        let next = self.exhibitions.len() as i32 + 1;
        *self.exhibitions.entry(public_id.to_string()).or_insert(next)
    }

    fn add_value(&mut self, kind: InteractionKind, value: i16) -> i32 {
        let table = match kind {
            InteractionKind::Rating => &mut self.ratings,
            InteractionKind::Request => &mut self.requests,
        };
        let next = table.len() as i32 + 1;
        *table.entry(value).or_insert(next)
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn resolve_exhibition(&self, site: Site) -> Result<Option<i32>, StorageError> {
        Ok(self.online()?.exhibitions.get(&site.public_id()).copied())
    }

    async fn resolve_value_id(
        &self,
        kind: InteractionKind,
        value: i16,
    ) -> Result<Option<i32>, StorageError> {
        let state = self.online()?;
        let table = match kind {
            InteractionKind::Rating => &state.ratings,
            InteractionKind::Request => &state.requests,
        };
        Ok(table.get(&value).copied())
    }

    async fn is_duplicate(&self, key: &DedupKey) -> Result<bool, StorageError> {
        Ok(self.online()?.keys.contains(key))
    }

    async fn insert_if_absent(&self, key: &DedupKey) -> Result<LoadOutcome, StorageError> {
        // The guard spans check and insert.
        let mut state = self.online()?;
        if state.rejected_exhibitions.contains(&key.exhibition_id) {
            return Err(StorageError::Sqlx(sqlx::Error::RowNotFound));
        }
        if !state.keys.insert(key.clone()) {
            return Ok(LoadOutcome::Skipped);
        }
        state.rows.push(key.clone());
        Ok(LoadOutcome::Inserted)
    }
}
