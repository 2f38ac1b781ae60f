//! Contract, milestone, submission, and review persistence.
//!
//! The escrow account is part of the contract body; the `escrow_status`
//! column mirrors it for queries.

use sqlx::{PgPool, Postgres, Transaction};

use guild_engine::{Contract, Milestone, Review, Submission};

use super::{from_bodies, positions, to_body};

/// Insert or update contracts.
pub async fn upsert_contracts(
    tx: &mut Transaction<'_, Postgres>,
    contracts: &[Contract],
) -> Result<(), sqlx::Error> {
    for contract in contracts {
        let body = to_body(contract, "contracts")?;
        sqlx::query(
            "INSERT INTO contracts (id, project_id, proposal_id, status, escrow_status, body, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE
             SET status = EXCLUDED.status, escrow_status = EXCLUDED.escrow_status, body = EXCLUDED.body",
        )
        .bind(*contract.id.as_uuid())
        .bind(*contract.project_id.as_uuid())
        .bind(*contract.proposal_id.as_uuid())
        .bind(contract.status().to_string())
        .bind(contract.escrow_status().to_string())
        .bind(&body)
        .bind(*contract.created_at.as_datetime())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Insert or update milestones.
pub async fn upsert_milestones(
    tx: &mut Transaction<'_, Postgres>,
    milestones: &[Milestone],
) -> Result<(), sqlx::Error> {
    for milestone in milestones {
        let body = to_body(milestone, "milestones")?;
        let order_index = i32::try_from(milestone.order_index)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        sqlx::query(
            "INSERT INTO milestones (id, contract_id, order_index, status, body)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, body = EXCLUDED.body",
        )
        .bind(*milestone.id.as_uuid())
        .bind(*milestone.contract_id.as_uuid())
        .bind(order_index)
        .bind(milestone.status().to_string())
        .bind(&body)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Insert submissions not yet stored. Submissions are immutable.
pub async fn upsert_submissions(
    tx: &mut Transaction<'_, Postgres>,
    submissions: &[Submission],
) -> Result<(), sqlx::Error> {
    let order = positions(submissions, |s| s.milestone_id);
    for (submission, position) in submissions.iter().zip(order) {
        let body = to_body(submission, "submissions")?;
        sqlx::query(
            "INSERT INTO submissions (id, milestone_id, position, body, submitted_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(*submission.id.as_uuid())
        .bind(*submission.milestone_id.as_uuid())
        .bind(position)
        .bind(&body)
        .bind(*submission.submitted_at.as_datetime())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Insert reviews not yet stored. Reviews are immutable.
pub async fn upsert_reviews(
    tx: &mut Transaction<'_, Postgres>,
    reviews: &[Review],
) -> Result<(), sqlx::Error> {
    let order = positions(reviews, |r| r.milestone_id);
    for (review, position) in reviews.iter().zip(order) {
        let body = to_body(review, "reviews")?;
        sqlx::query(
            "INSERT INTO reviews (submission_id, milestone_id, position, approved, body, reviewed_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (submission_id) DO NOTHING",
        )
        .bind(*review.submission_id.as_uuid())
        .bind(*review.milestone_id.as_uuid())
        .bind(position)
        .bind(review.approved)
        .bind(&body)
        .bind(*review.reviewed_at.as_datetime())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Load all contracts.
pub async fn load_contracts(pool: &PgPool) -> Result<Vec<Contract>, sqlx::Error> {
    let bodies = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT body FROM contracts ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await?;
    from_bodies(bodies, "contracts")
}

/// Load all milestones.
pub async fn load_milestones(pool: &PgPool) -> Result<Vec<Milestone>, sqlx::Error> {
    let bodies = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT body FROM milestones ORDER BY contract_id, order_index",
    )
    .fetch_all(pool)
    .await?;
    from_bodies(bodies, "milestones")
}

/// Load all submissions, oldest first per milestone.
pub async fn load_submissions(pool: &PgPool) -> Result<Vec<Submission>, sqlx::Error> {
    let bodies = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT body FROM submissions ORDER BY milestone_id, position",
    )
    .fetch_all(pool)
    .await?;
    from_bodies(bodies, "submissions")
}

/// Load all reviews, oldest first per milestone.
pub async fn load_reviews(pool: &PgPool) -> Result<Vec<Review>, sqlx::Error> {
    let bodies = sqlx::query_scalar::<_, serde_json::Value>(
        "SELECT body FROM reviews ORDER BY milestone_id, position",
    )
    .fetch_all(pool)
    .await?;
    from_bodies(bodies, "reviews")
}
