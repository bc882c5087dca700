use anyhow::Result;
use sqlx::postgres::PgQueryResult;
use tracing::info;

use crate::db::DbPool;

/// Public ids of the exhibitions at sites 0 through 5.
pub const EXHIBITION_PUBLIC_IDS: [&str; 6] =
    ["EXH_00", "EXH_01", "EXH_02", "EXH_03", "EXH_04", "EXH_05"];

pub const RATINGS: [(i16, &str); 5] = [
    (0, "Terrible"),
    (1, "Bad"),
    (2, "Neutral"),
    (3, "Good"),
    (4, "Amazing"),
];

pub const REQUESTS: [(i16, &str); 2] = [(0, "assistance"), (1, "emergency")];

/// Insert the lookup rows the loader resolves against. Safe to re-run.
pub async fn run(pool: &DbPool) -> Result<()> {
    seed_exhibitions(pool).await?;
    seed_ratings(pool).await?;
    seed_requests(pool).await?;
    Ok(())
}

async fn seed_exhibitions(pool: &DbPool) -> Result<()> {
    for public_id in EXHIBITION_PUBLIC_IDS {
        let result: PgQueryResult = sqlx::query::<sqlx::Postgres>(
            r#"
            INSERT INTO exhibition (public_id)
            VALUES ($1)
            ON CONFLICT (public_id) DO NOTHING
            "#,
        )
        .bind(public_id)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(public_id, "Seeded exhibition");
        }
    }
    Ok(())
}

async fn seed_ratings(pool: &DbPool) -> Result<()> {
    for (value, description) in RATINGS {
        let result: PgQueryResult = sqlx::query::<sqlx::Postgres>(
            r#"
            INSERT INTO rating (rating_value, rating_description)
            VALUES ($1, $2)
            ON CONFLICT (rating_value) DO NOTHING
            "#,
        )
        .bind(value)
        .bind(description)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(value, description, "Seeded rating");
        }
    }
    Ok(())
}

async fn seed_requests(pool: &DbPool) -> Result<()> {
    for (value, description) in REQUESTS {
        let result: PgQueryResult = sqlx::query::<sqlx::Postgres>(
            r#"
            INSERT INTO request (request_value, request_description)
            VALUES ($1, $2)
            ON CONFLICT (request_value) DO NOTHING
            "#,
        )
        .bind(value)
        .bind(description)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(value, description, "Seeded request");
        }
    }
    Ok(())
}
