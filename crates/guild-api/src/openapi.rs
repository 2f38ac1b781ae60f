//! # OpenAPI Document
//!
//! Collects every documented handler and schema into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("{role}:{user_id}:{secret}")
                        .description(Some(
                            "Role is `user` or `arbitrator`. The secret is checked when AUTH_TOKEN is set.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI document for the whole `/v1` surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Guild Marketplace API",
        version = "0.1.0",
        description = "Projects, competing proposals, contracts with milestone escrow, and arbitration.\n\nAll `/v1/*` endpoints require `Authorization: Bearer {role}:{user_id}:{secret}`. Health checks and `/metrics` are unauthenticated.\n\nAmounts are integer minor units. A `409` carrying `retry: true` in its details is a lock timeout and may be retried unchanged."
    ),
    servers((url = "http://localhost:8080", description = "Local development server")),
    security(("bearer_auth" = [])),
    paths(
        crate::routes::projects::create_project,
        crate::routes::projects::list_projects,
        crate::routes::projects::get_project,
        crate::routes::projects::list_project_contracts,
        crate::routes::proposals::submit_proposal,
        crate::routes::proposals::list_proposals,
        crate::routes::proposals::suggest_proposal,
        crate::routes::proposals::accept_proposal,
        crate::routes::proposals::get_proposal,
        crate::routes::proposals::withdraw_proposal,
        crate::routes::contracts::get_contract,
        crate::routes::contracts::get_escrow,
        crate::routes::contracts::fund_escrow,
        crate::routes::contracts::hold_escrow,
        crate::routes::contracts::release_hold,
        crate::routes::contracts::refund_escrow,
        crate::routes::contracts::list_milestones,
        crate::routes::contracts::add_milestone,
        crate::routes::milestones::get_milestone,
        crate::routes::milestones::start_milestone,
        crate::routes::milestones::submit_milestone,
        crate::routes::milestones::list_submissions,
        crate::routes::milestones::review_milestone,
        crate::routes::milestones::list_reviews,
        crate::routes::disputes::file_dispute,
        crate::routes::disputes::list_disputes,
        crate::routes::disputes::list_open_disputes,
        crate::routes::disputes::get_dispute,
        crate::routes::disputes::begin_review,
        crate::routes::disputes::resolve_dispute,
        crate::routes::events::list_events,
        crate::routes::teams::list_teams,
        crate::routes::teams::get_team,
        crate::routes::teams::upsert_team,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::views::ProjectView,
        crate::routes::views::ProposalView,
        crate::routes::views::ContractView,
        crate::routes::views::EscrowView,
        crate::routes::views::TransactionView,
        crate::routes::views::MilestoneView,
        crate::routes::views::SubmissionView,
        crate::routes::views::ReviewView,
        crate::routes::views::DisputeView,
        crate::routes::views::TeamView,
        crate::routes::views::EventView,
        crate::routes::projects::CreateProjectRequest,
        crate::routes::proposals::SubmitProposalRequest,
        crate::routes::proposals::AcceptProposalRequest,
        crate::routes::proposals::PlanItem,
        crate::routes::contracts::FundEscrowRequest,
        crate::routes::contracts::EscrowReasonRequest,
        crate::routes::contracts::AddMilestoneRequest,
        crate::routes::milestones::SubmitMilestoneRequest,
        crate::routes::milestones::ReviewMilestoneRequest,
        crate::routes::disputes::FileDisputeRequest,
        crate::routes::disputes::ResolveDisputeRequest,
        crate::routes::teams::UpsertTeamRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "projects", description = "Client projects and their lifecycle"),
        (name = "proposals", description = "Team bids, ranking, and acceptance"),
        (name = "contracts", description = "Contracts created from accepted proposals"),
        (name = "escrow", description = "Funding, holds, releases, and refunds"),
        (name = "milestones", description = "Milestone plan, submissions, and reviews"),
        (name = "disputes", description = "Arbitration of contracts and milestones"),
        (name = "events", description = "Change feed for notification consumers"),
        (name = "teams", description = "Team directory"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_has_every_component_area() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "Guild Marketplace API");
        for path in [
            "/v1/projects",
            "/v1/projects/{project_id}/proposals/{proposal_id}/accept",
            "/v1/contracts/{contract_id}/escrow/fund",
            "/v1/milestones/{milestone_id}/review",
            "/v1/disputes/{dispute_id}/resolve",
            "/v1/events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn document_declares_bearer_auth() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("ErrorBody"));
    }

    #[test]
    fn error_responses_reference_error_body() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let fund = &doc["paths"]["/v1/contracts/{contract_id}/escrow/fund"]["post"];
        for status in ["403", "409", "422"] {
            assert_eq!(
                fund["responses"][status]["content"]["application/json"]["schema"]["$ref"],
                "#/components/schemas/ErrorBody",
                "status {status}"
            );
        }
    }
}
