//! Dispute persistence.

use sqlx::{PgPool, Postgres, Transaction};

use guild_escrow::Dispute;

use super::{from_bodies, positions, to_body};

/// Insert or update disputes, recording their filing order per contract.
pub async fn upsert_disputes(
    tx: &mut Transaction<'_, Postgres>,
    disputes: &[Dispute],
) -> Result<(), sqlx::Error> {
    let order = positions(disputes, |d| d.contract_id);
    for (dispute, position) in disputes.iter().zip(order) {
        let body = to_body(dispute, "disputes")?;
        sqlx::query(
            "INSERT INTO disputes (id, contract_id, position, status, body, filed_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, body = EXCLUDED.body",
        )
        .bind(*dispute.id.as_uuid())
        .bind(*dispute.contract_id.as_uuid())
        .bind(position)
        .bind(dispute.status().to_string())
        .bind(&body)
        .bind(*dispute.filed_at.as_datetime())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Load all disputes in filing order per contract.
pub async fn load_disputes(pool: &PgPool) -> Result<Vec<Dispute>, sqlx::Error> {
    let bodies = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT body FROM disputes ORDER BY contract_id, position",
    )
    .fetch_all(pool)
    .await?;
    from_bodies(bodies, "disputes")
}
