//! # Database Persistence Layer
//!
//! PostgreSQL persistence for the engine tables using SQLx.
//!
//! The engine stays the source of truth while the process runs: commands
//! execute in memory and handlers write the touched project through to
//! Postgres afterwards (see [`save_snapshot`]). On startup the whole state
//! is loaded back with [`load_snapshot`] and handed to `Engine::restore`,
//! which re-checks referential integrity and the escrow invariants.
//!
//! When `DATABASE_URL` is unset the API runs in-memory only.

pub mod contracts;
pub mod disputes;
pub mod projects;

use std::collections::HashMap;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use guild_engine::EngineSnapshot;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only. State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Upsert every record of `snapshot` in one transaction.
///
/// Parents are written before children so foreign keys hold.
pub async fn save_snapshot(pool: &PgPool, snapshot: &EngineSnapshot) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    projects::upsert_projects(&mut tx, &snapshot.projects).await?;
    projects::upsert_proposals(&mut tx, &snapshot.proposals).await?;
    contracts::upsert_contracts(&mut tx, &snapshot.contracts).await?;
    contracts::upsert_milestones(&mut tx, &snapshot.milestones).await?;
    contracts::upsert_submissions(&mut tx, &snapshot.submissions).await?;
    contracts::upsert_reviews(&mut tx, &snapshot.reviews).await?;
    disputes::upsert_disputes(&mut tx, &snapshot.disputes).await?;
    tx.commit().await
}

/// Load every table.
pub async fn load_snapshot(pool: &PgPool) -> Result<EngineSnapshot, sqlx::Error> {
    Ok(EngineSnapshot {
        projects: projects::load_projects(pool).await?,
        proposals: projects::load_proposals(pool).await?,
        contracts: contracts::load_contracts(pool).await?,
        milestones: contracts::load_milestones(pool).await?,
        submissions: contracts::load_submissions(pool).await?,
        reviews: contracts::load_reviews(pool).await?,
        disputes: disputes::load_disputes(pool).await?,
    })
}

/// Serialize a record into the `body` column.
fn to_body<T: Serialize>(value: &T, table: &'static str) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, table, "failed to serialize record");
        sqlx::Error::Encode(Box::new(e))
    })
}

/// Deserialize `body` columns, failing on the first corrupt row.
fn from_bodies<T: DeserializeOwned>(
    bodies: Vec<serde_json::Value>,
    table: &'static str,
) -> Result<Vec<T>, sqlx::Error> {
    bodies
        .into_iter()
        .map(|body| {
            serde_json::from_value(body).map_err(|e| {
                tracing::error!(error = %e, table, "corrupt record body");
                sqlx::Error::Decode(Box::new(e))
            })
        })
        .collect()
}

/// Position of each item among the items sharing its parent, in slice order.
fn positions<T, K: Hash + Eq>(items: &[T], parent: impl Fn(&T) -> K) -> Vec<i32> {
    let mut seen: HashMap<K, i32> = HashMap::new();
    items
        .iter()
        .map(|item| {
            let next = seen.entry(parent(item)).or_insert(0);
            let position = *next;
            *next += 1;
            position
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_count_per_parent() {
        let items = [("a", 1), ("b", 2), ("a", 3), ("a", 4), ("b", 5)];
        assert_eq!(positions(&items, |i| i.0), vec![0, 0, 1, 2, 1]);
    }

    #[test]
    fn corrupt_body_is_decode_error() {
        let result: Result<Vec<guild_engine::Project>, _> =
            from_bodies(vec![serde_json::json!({"id": 7})], "projects");
        assert!(matches!(result, Err(sqlx::Error::Decode(_))));
    }
}
