use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::debug;

use crate::db::DbPool;
use crate::error::StorageError;
use crate::loader::LoadOutcome;
use crate::types::{InteractionKind, Site};

use super::{DedupKey, InteractionStore};

#[derive(Debug, Clone)]
pub struct PgInteractionStore {
    pool: DbPool,
}

impl PgInteractionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn value_lookup_sql(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Rating => "SELECT rating_id FROM rating WHERE rating_value = $1",
        InteractionKind::Request => "SELECT request_id FROM request WHERE request_value = $1",
    }
}

fn exists_sql(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Rating => {
            r#"
            SELECT EXISTS (
                SELECT 1 FROM rating_interaction
                WHERE rating_id = $1 AND exhibition_id = $2 AND event_at = $3
            )
            "#
        }
        InteractionKind::Request => {
            r#"
            SELECT EXISTS (
                SELECT 1 FROM request_interaction
                WHERE request_id = $1 AND exhibition_id = $2 AND event_at = $3
            )
            "#
        }
    }
}

fn insert_sql(kind: InteractionKind) -> &'static str {
    match kind {
        InteractionKind::Rating => {
            r#"
            INSERT INTO rating_interaction (exhibition_id, rating_id, event_at)
            VALUES ($1, $2, $3)
            "#
        }
        InteractionKind::Request => {
            r#"
            INSERT INTO request_interaction (exhibition_id, request_id, event_at)
            VALUES ($1, $2, $3)
            "#
        }
    }
}

async fn interaction_exists(conn: &mut PgConnection, key: &DedupKey) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(exists_sql(key.kind))
        .bind(key.value_id)
        .bind(key.exhibition_id)
        .bind(key.event_at)
        .fetch_one(conn)
        .await
}

#[async_trait]
impl InteractionStore for PgInteractionStore {
    async fn resolve_exhibition(&self, site: Site) -> Result<Option<i32>, StorageError> {
        let id = sqlx::query_scalar::<_, i32>(
            "SELECT exhibition_id FROM exhibition WHERE public_id = $1",
        )
        .bind(site.public_id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn resolve_value_id(
        &self,
        kind: InteractionKind,
        value: i16,
    ) -> Result<Option<i32>, StorageError> {
        let id = sqlx::query_scalar::<_, i32>(value_lookup_sql(kind))
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn is_duplicate(&self, key: &DedupKey) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await?;
        Ok(interaction_exists(&mut conn, key).await?)
    }

    async fn insert_if_absent(&self, key: &DedupKey) -> Result<LoadOutcome, StorageError> {
        let mut tx = self.pool.begin().await?;

        // Held until commit/rollback; serializes writers of the same key.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(key.lock_key())
            .execute(&mut *tx)
            .await?;

        if interaction_exists(&mut *tx, key).await? {
            tx.rollback().await?;
            debug!(lock_key = %key.lock_key(), "Dedup key already stored");
            return Ok(LoadOutcome::Skipped);
        }

        sqlx::query(insert_sql(key.kind))
            .bind(key.exhibition_id)
            .bind(key.value_id)
            .bind(key.event_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(LoadOutcome::Inserted)
    }
}
