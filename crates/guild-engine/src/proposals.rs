//! # ProposalRegistry
//!
//! Teams bid on open projects; the owning team may withdraw a pending bid.
//! Both commands run under the per-project lock so they cannot interleave
//! with an acceptance cascade on the same project.
//!
//! Ranking is a presentation aid. [`Engine::suggest_best`] names the
//! cheapest pending bid but never accepts anything.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use guild_core::{Actor, Amount, ProjectId, ProposalId, TeamId, Timestamp, ValidationError};
use guild_state::{Lifecycle, ProjectStatus, ProposalStatus, StateTrail};

use crate::directory::TeamDirectory;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::records::Proposal;

/// Orderings offered to clients comparing proposals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalSort {
    /// Cheapest first.
    #[default]
    BudgetAsc,
    /// Most expensive first.
    BudgetDesc,
    /// Fastest first.
    TimelineAsc,
    /// Best-rated team first.
    RatingDesc,
    /// Highest-level team first.
    LevelDesc,
}

impl std::str::FromStr for ProposalSort {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "budget_asc" => Ok(Self::BudgetAsc),
            "budget_desc" => Ok(Self::BudgetDesc),
            "timeline_asc" => Ok(Self::TimelineAsc),
            "rating_desc" => Ok(Self::RatingDesc),
            "level_desc" => Ok(Self::LevelDesc),
            other => Err(EngineError::Validation(format!(
                "unknown proposal sort '{other}'"
            ))),
        }
    }
}

/// Sort `proposals` in place. Ties fall back to submission time.
pub fn rank_proposals(proposals: &mut [Proposal], sort: ProposalSort, directory: &dyn TeamDirectory) {
    let rating = |team: &TeamId| directory.profile(team).map(|p| p.rating).unwrap_or(0);
    let level = |team: &TeamId| directory.profile(team).map(|p| p.level).unwrap_or(0);

    proposals.sort_by(|a, b| {
        let primary = match sort {
            ProposalSort::BudgetAsc => a.proposed_budget.cmp(&b.proposed_budget),
            ProposalSort::BudgetDesc => b.proposed_budget.cmp(&a.proposed_budget),
            ProposalSort::TimelineAsc => a
                .proposed_timeline_weeks
                .cmp(&b.proposed_timeline_weeks),
            ProposalSort::RatingDesc => rating(&b.team_id).cmp(&rating(&a.team_id)),
            ProposalSort::LevelDesc => level(&b.team_id).cmp(&level(&a.team_id)),
        };
        match primary {
            Ordering::Equal => a.created_at.cmp(&b.created_at),
            other => other,
        }
    });
}

impl Engine {
    /// Proposals of a project in submission order.
    pub fn list_proposals(&self, project_id: &ProjectId) -> Result<Vec<Proposal>, EngineError> {
        self.store.read(|t| {
            t.project(project_id)?;
            Ok(t.proposals_of(project_id).into_iter().cloned().collect())
        })
    }

    /// Proposals of a project in the requested order.
    pub fn list_proposals_ranked(
        &self,
        project_id: &ProjectId,
        sort: ProposalSort,
    ) -> Result<Vec<Proposal>, EngineError> {
        let mut proposals = self.list_proposals(project_id)?;
        rank_proposals(&mut proposals, sort, self.directory().as_ref());
        Ok(proposals)
    }

    /// The cheapest pending proposal. A suggestion only.
    pub fn suggest_best(&self, project_id: &ProjectId) -> Result<Option<Proposal>, EngineError> {
        Ok(self
            .list_proposals_ranked(project_id, ProposalSort::BudgetAsc)?
            .into_iter()
            .find(|p| p.status() == ProposalStatus::Pending))
    }

    /// Submit a bid for `team_id` on an open project.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project does not exist.
    /// - `Forbidden` unless `actor` is a member of `team_id`.
    /// - `InvalidAmount` if `budget <= 0`; `Validation` if `timeline_weeks == 0`.
    /// - `InvalidState` unless the project is open.
    pub fn submit_proposal(
        &self,
        project_id: ProjectId,
        team_id: TeamId,
        budget: i64,
        timeline_weeks: u32,
        actor: &Actor,
    ) -> Result<Proposal, EngineError> {
        if !actor.is_member_of(&team_id) {
            return Err(EngineError::Forbidden {
                operation: "submit_proposal",
                required: "submitting team's membership",
            });
        }
        let proposed_budget = Amount::positive(budget)?;
        if timeline_weeks == 0 {
            return Err(ValidationError::ZeroCount("timeline_weeks").into());
        }

        let _guard = self.lock_project(project_id)?;
        let proposal = self.commit(|t| {
            let project = t.project(&project_id)?;
            if project.status() != ProjectStatus::Open {
                return Err(EngineError::InvalidState {
                    entity: "project",
                    id: project_id.to_string(),
                    current: project.status().as_str().to_string(),
                    required: "open".to_string(),
                    operation: "submit_proposal",
                });
            }
            let proposal = Proposal {
                id: ProposalId::new(),
                project_id,
                team_id,
                submitted_by: actor.user_id,
                proposed_budget,
                proposed_timeline_weeks: timeline_weeks,
                trail: StateTrail::new(ProposalStatus::Pending),
                created_at: Timestamp::now(),
            };
            t.put_proposal(proposal.clone());
            let submitted = EngineEvent::ProposalSubmitted {
                project_id,
                proposal_id: proposal.id,
                team_id,
            };
            Ok((proposal, vec![submitted]))
        })?;

        tracing::info!(
            project_id = %project_id,
            proposal_id = %proposal.id,
            team_id = %team_id,
            budget,
            "proposal submitted"
        );
        Ok(proposal)
    }

    /// Withdraw a pending proposal on behalf of its team.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless `actor` is a member of the submitting team.
    /// - `InvalidState` unless the proposal is pending.
    pub fn withdraw_proposal(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> Result<Proposal, EngineError> {
        let project_id = self.get_proposal(&proposal_id)?.project_id;
        let _guard = self.lock_project(project_id)?;

        let proposal = self.commit(|t| {
            let mut proposal = t.proposal(&proposal_id)?.clone();
            if !actor.is_member_of(&proposal.team_id) {
                return Err(EngineError::Forbidden {
                    operation: "withdraw_proposal",
                    required: "submitting team's membership",
                });
            }
            proposal
                .trail
                .advance(ProposalStatus::Withdrawn, "withdrawn by team")
                .map_err(|e| {
                    EngineError::invalid_state("proposal", proposal_id, "withdraw", "pending", &e)
                })?;
            t.put_proposal(proposal.clone());
            let withdrawn = EngineEvent::ProposalWithdrawn {
                project_id,
                proposal_id,
                team_id: proposal.team_id,
            };
            Ok((proposal, vec![withdrawn]))
        })?;

        tracing::info!(proposal_id = %proposal_id, team_id = %proposal.team_id, "proposal withdrawn");
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryTeamDirectory, TeamProfile};
    use guild_core::{BudgetRange, UserId};

    struct Fixture {
        engine: Engine,
        client: Actor,
        member: Actor,
        team: TeamId,
        project: ProjectId,
    }

    fn fixture() -> Fixture {
        let engine = Engine::in_memory();
        let client = Actor::user(UserId::new());
        let team = TeamId::new();
        let member = Actor::user(UserId::new()).with_team(team);
        let project = engine
            .register_project("App", BudgetRange::new(1, 10_000_000).unwrap(), &client)
            .unwrap()
            .id;
        Fixture {
            engine,
            client,
            member,
            team,
            project,
        }
    }

    #[test]
    fn submit_creates_pending_proposal() {
        let f = fixture();
        let p = f
            .engine
            .submit_proposal(f.project, f.team, 5_000_000, 4, &f.member)
            .unwrap();
        assert_eq!(p.status(), ProposalStatus::Pending);
        assert_eq!(f.engine.list_proposals(&f.project).unwrap(), vec![p]);
    }

    #[test]
    fn submit_requires_membership() {
        let f = fixture();
        let err = f
            .engine
            .submit_proposal(f.project, f.team, 100, 1, &f.client)
            .unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
    }

    #[test]
    fn submit_validates_budget_and_timeline() {
        let f = fixture();
        assert_eq!(
            f.engine
                .submit_proposal(f.project, f.team, 0, 4, &f.member)
                .unwrap_err()
                .code(),
            "INVALID_AMOUNT"
        );
        assert_eq!(
            f.engine
                .submit_proposal(f.project, f.team, 100, 0, &f.member)
                .unwrap_err()
                .code(),
            "VALIDATION_ERROR"
        );
    }

    #[test]
    fn submit_to_unknown_project_is_not_found() {
        let f = fixture();
        let err = f
            .engine
            .submit_proposal(ProjectId::new(), f.team, 100, 1, &f.member)
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn withdraw_by_owner() {
        let f = fixture();
        let p = f
            .engine
            .submit_proposal(f.project, f.team, 100, 1, &f.member)
            .unwrap();
        let withdrawn = f.engine.withdraw_proposal(p.id, &f.member).unwrap();
        assert_eq!(withdrawn.status(), ProposalStatus::Withdrawn);
    }

    #[test]
    fn withdraw_by_other_team_forbidden() {
        let f = fixture();
        let p = f
            .engine
            .submit_proposal(f.project, f.team, 100, 1, &f.member)
            .unwrap();
        let outsider = Actor::user(UserId::new()).with_team(TeamId::new());
        let err = f.engine.withdraw_proposal(p.id, &outsider).unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");
        assert_eq!(
            f.engine.get_proposal(&p.id).unwrap().status(),
            ProposalStatus::Pending
        );
    }

    #[test]
    fn withdraw_twice_is_invalid_state() {
        let f = fixture();
        let p = f
            .engine
            .submit_proposal(f.project, f.team, 100, 1, &f.member)
            .unwrap();
        f.engine.withdraw_proposal(p.id, &f.member).unwrap();
        let err = f.engine.withdraw_proposal(p.id, &f.member).unwrap_err();
        match err {
            EngineError::InvalidState {
                current, required, ..
            } => {
                assert_eq!(current, "withdrawn");
                assert_eq!(required, "pending");
            }
            other => panic!("expected InvalidState, got {other:?}"),
        }
    }

    #[test]
    fn ranking_by_budget_timeline_and_reputation() {
        let t1 = TeamId::new();
        let t2 = TeamId::new();
        let t3 = TeamId::new();
        let dir = InMemoryTeamDirectory::with_profiles([
            TeamProfile { team_id: t1, name: "a".into(), rating: 350, level: 9, members: Default::default() },
            TeamProfile { team_id: t2, name: "b".into(), rating: 490, level: 2, members: Default::default() },
            TeamProfile { team_id: t3, name: "c".into(), rating: 410, level: 5, members: Default::default() },
        ]);
        let engine = Engine::new(
            crate::config::EngineConfig::default(),
            std::sync::Arc::new(crate::events::FanoutSink::new()),
            std::sync::Arc::new(dir),
        )
        .unwrap();
        let client = Actor::user(UserId::new());
        let project = engine
            .register_project("Ranked", BudgetRange::new(1, 10_000_000).unwrap(), &client)
            .unwrap()
            .id;
        let member = |t| Actor::user(UserId::new()).with_team(t);
        let x = engine.submit_proposal(project, t1, 5_000_000, 4, &member(t1)).unwrap();
        let y = engine.submit_proposal(project, t2, 4_500_000, 6, &member(t2)).unwrap();
        let z = engine.submit_proposal(project, t3, 6_000_000, 3, &member(t3)).unwrap();

        let order = |sort| -> Vec<ProposalId> {
            engine
                .list_proposals_ranked(&project, sort)
                .unwrap()
                .into_iter()
                .map(|p| p.id)
                .collect()
        };
        assert_eq!(order(ProposalSort::BudgetAsc), vec![y.id, x.id, z.id]);
        assert_eq!(order(ProposalSort::BudgetDesc), vec![z.id, x.id, y.id]);
        assert_eq!(order(ProposalSort::TimelineAsc), vec![z.id, x.id, y.id]);
        assert_eq!(order(ProposalSort::RatingDesc), vec![y.id, z.id, x.id]);
        assert_eq!(order(ProposalSort::LevelDesc), vec![x.id, z.id, y.id]);

        assert_eq!(engine.suggest_best(&project).unwrap().unwrap().id, y.id);
        // Suggesting never accepts.
        assert_eq!(
            engine.get_proposal(&y.id).unwrap().status(),
            ProposalStatus::Pending
        );
    }

    #[test]
    fn sort_parses_from_query_string() {
        assert_eq!("rating_desc".parse::<ProposalSort>().unwrap(), ProposalSort::RatingDesc);
        assert!("cheapest".parse::<ProposalSort>().is_err());
    }
}
