//! Project and proposal persistence.

use sqlx::{PgPool, Postgres, Transaction};

use guild_engine::{Project, Proposal};

use super::{from_bodies, positions, to_body};

/// Insert or update projects.
pub async fn upsert_projects(
    tx: &mut Transaction<'_, Postgres>,
    projects: &[Project],
) -> Result<(), sqlx::Error> {
    for project in projects {
        let body = to_body(project, "projects")?;
        sqlx::query(
            "INSERT INTO projects (id, client_id, status, body, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, body = EXCLUDED.body",
        )
        .bind(*project.id.as_uuid())
        .bind(*project.client_id.as_uuid())
        .bind(project.status().to_string())
        .bind(&body)
        .bind(*project.created_at.as_datetime())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Insert or update proposals, recording their order within each project.
pub async fn upsert_proposals(
    tx: &mut Transaction<'_, Postgres>,
    proposals: &[Proposal],
) -> Result<(), sqlx::Error> {
    let order = positions(proposals, |p| p.project_id);
    for (proposal, position) in proposals.iter().zip(order) {
        let body = to_body(proposal, "proposals")?;
        sqlx::query(
            "INSERT INTO proposals (id, project_id, team_id, status, position, body, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE
             SET status = EXCLUDED.status, position = EXCLUDED.position, body = EXCLUDED.body",
        )
        .bind(*proposal.id.as_uuid())
        .bind(*proposal.project_id.as_uuid())
        .bind(*proposal.team_id.as_uuid())
        .bind(proposal.status().to_string())
        .bind(position)
        .bind(&body)
        .bind(*proposal.created_at.as_datetime())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Load all projects.
pub async fn load_projects(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
    let bodies = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT body FROM projects ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;
    from_bodies(bodies, "projects")
}

/// Load all proposals, grouped by project in submission order.
pub async fn load_proposals(pool: &PgPool) -> Result<Vec<Proposal>, sqlx::Error> {
    let bodies = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT body FROM proposals ORDER BY project_id, position",
    )
    .fetch_all(pool)
    .await?;
    from_bodies(bodies, "proposals")
}
