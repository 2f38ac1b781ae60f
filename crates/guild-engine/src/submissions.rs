//! # SubmissionTracker
//!
//! Teams submit results against a milestone; the client reviews the latest
//! one. Approval pays the milestone out of escrow before the milestone is
//! marked approved, and both changes commit together: if the release is
//! refused (escrow on hold, not funded, bound exceeded) the milestone stays
//! in review.
//!
//! Both commands hold the per-milestone lock, so two reviews of the same
//! milestone serialize and the loser sees `InvalidState`.

use guild_core::{Actor, MilestoneId, SubmissionId, Timestamp};
use guild_state::{Lifecycle, MilestoneStatus, MilestoneTrigger};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::escrow::stage_release;
use crate::events::EngineEvent;
use crate::milestones::{apply_trigger, require_active};
use crate::records::{Milestone, Review, Submission};

impl Engine {
    /// Submit a result for a milestone that is in progress or was rejected.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `actor` is on the contract's team.
    /// - `InvalidState` unless the milestone is `in_progress` or `rejected`
    ///   and the contract is active.
    pub fn submit_milestone(
        &self,
        milestone_id: MilestoneId,
        note: &str,
        files: Vec<String>,
        actor: &Actor,
    ) -> Result<Submission, EngineError> {
        let _guard = self.lock_milestone(milestone_id)?;
        let submission = self.commit(|t| {
            let mut milestone = t.milestone(&milestone_id)?.clone();
            let contract = t.contract(&milestone.contract_id)?;
            if !actor.is_member_of(&contract.team_id) {
                return Err(EngineError::Forbidden {
                    operation: "submit_milestone",
                    required: "contract's team",
                });
            }
            require_active(contract, "submit_milestone")?;
            if !milestone.status().accepts_submission() {
                return Err(EngineError::InvalidState {
                    entity: "milestone",
                    id: milestone_id.to_string(),
                    current: milestone.status().as_str().to_string(),
                    required: "in_progress or rejected".to_string(),
                    operation: "submit_milestone",
                });
            }
            apply_trigger(&mut milestone, MilestoneTrigger::Submit, "result submitted")?;

            let submission = Submission {
                id: SubmissionId::new(),
                milestone_id,
                submitted_by: actor.user_id,
                submitted_at: Timestamp::now(),
                note: note.trim().to_string(),
                files,
            };
            let contract_id = milestone.contract_id;
            t.put_milestone(milestone);
            t.append_submission(submission.clone());
            let submitted = EngineEvent::MilestoneSubmitted {
                contract_id,
                milestone_id,
                submission_id: submission.id,
            };
            Ok((submission, vec![submitted]))
        })?;

        tracing::info!(
            milestone_id = %milestone_id,
            submission_id = %submission.id,
            files = submission.files.len(),
            "milestone submitted for review"
        );
        Ok(submission)
    }

    /// Approve or reject the latest submission of a milestone in review.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `actor` is the contract's client.
    /// - `InvalidState` unless the milestone is in `review`.
    /// - On approval, any escrow error from the release
    ///   (`InvalidTransition` while on hold, `InsufficientFunds`,
    ///   `InvalidAmount`); the milestone then stays in review.
    pub fn review_milestone(
        &self,
        milestone_id: MilestoneId,
        approved: bool,
        note: &str,
        actor: &Actor,
    ) -> Result<Milestone, EngineError> {
        let _guard = self.lock_milestone(milestone_id)?;
        let milestone = self.commit(|t| {
            let mut milestone = t.milestone(&milestone_id)?.clone();
            let mut contract = t.contract(&milestone.contract_id)?.clone();
            if !actor.is_client_of(&contract.client_id) {
                return Err(EngineError::Forbidden {
                    operation: "review_milestone",
                    required: "contract's client",
                });
            }
            if milestone.status() != MilestoneStatus::Review {
                return Err(EngineError::InvalidState {
                    entity: "milestone",
                    id: milestone_id.to_string(),
                    current: milestone.status().as_str().to_string(),
                    required: "review".to_string(),
                    operation: "review_milestone",
                });
            }
            require_active(&contract, "review_milestone")?;
            let submission_id = t
                .submissions
                .get(&milestone_id)
                .and_then(|subs| subs.last())
                .map(|s| s.id)
                .ok_or_else(|| EngineError::not_found("submission for milestone", milestone_id))?;
            let mut project = t.project(&contract.project_id)?.clone();

            let mut events = Vec::new();
            if approved {
                stage_release(&mut contract, &mut project, &milestone, &mut events)?;
                apply_trigger(&mut milestone, MilestoneTrigger::Approve, "approved by client")?;
            } else {
                apply_trigger(&mut milestone, MilestoneTrigger::Reject, "rejected by client")?;
            }
            events.insert(
                0,
                EngineEvent::MilestoneReviewed {
                    contract_id: contract.id,
                    milestone_id,
                    approved,
                },
            );

            t.append_review(Review {
                submission_id,
                milestone_id,
                reviewer: actor.user_id,
                approved,
                note: note.trim().to_string(),
                reviewed_at: Timestamp::now(),
            });
            t.put_milestone(milestone.clone());
            if approved {
                t.put_contract(contract);
                t.put_project(project);
            }
            Ok((milestone, events))
        })?;

        tracing::info!(
            milestone_id = %milestone_id,
            approved,
            status = %milestone.status(),
            "milestone reviewed"
        );
        Ok(milestone)
    }
}
