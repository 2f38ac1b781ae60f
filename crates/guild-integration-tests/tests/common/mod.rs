//! Shared fixtures for the cross-crate tests.

#![allow(dead_code)]

use std::sync::Arc;

use guild_core::{Actor, BudgetRange, ContractId, MilestoneId, ProjectId, TeamId, UserId};
use guild_engine::{
    Engine, EngineConfig, EventFeed, EventSink, FanoutSink, InMemoryTeamDirectory, MilestoneDraft,
    Proposal,
};

/// One client's project on a fresh engine.
pub struct Market {
    pub engine: Arc<Engine>,
    pub feed: Arc<EventFeed>,
    pub client: Actor,
    pub arbitrator: Actor,
    pub project: ProjectId,
}

/// A contract with milestones, accepted but not yet funded.
pub struct Deal {
    pub contract: ContractId,
    pub member: Actor,
    pub milestones: Vec<MilestoneId>,
}

pub fn market() -> Market {
    market_with(EngineConfig::default(), None)
}

/// Engine publishing to a feed and, if given, one extra sink after it.
pub fn market_with(config: EngineConfig, extra: Option<Arc<dyn EventSink>>) -> Market {
    let feed = Arc::new(EventFeed::default());
    let mut sink = FanoutSink::new().with(feed.clone());
    if let Some(extra) = extra {
        sink = sink.with(extra);
    }
    let engine = Engine::new(
        config,
        Arc::new(sink),
        Arc::new(InMemoryTeamDirectory::new()),
    )
    .expect("valid engine config");
    let client = Actor::user(UserId::new());
    let project = engine
        .register_project("Storefront", BudgetRange::new(1, 10_000_000).unwrap(), &client)
        .expect("project registers")
        .id;
    Market {
        engine: Arc::new(engine),
        feed,
        client,
        arbitrator: Actor::arbitrator(UserId::new()),
        project,
    }
}

/// A new team with one member, bidding on the market's project.
pub fn bid(m: &Market, budget: i64, weeks: u32) -> (Proposal, Actor) {
    let team = TeamId::new();
    let member = Actor::user(UserId::new()).with_team(team);
    let proposal = m
        .engine
        .submit_proposal(m.project, team, budget, weeks, &member)
        .expect("proposal submits");
    (proposal, member)
}

/// Accept a single bid for the sum of `amounts`, one milestone per amount.
pub fn deal(m: &Market, amounts: &[i64]) -> Deal {
    let total: i64 = amounts.iter().sum();
    let (proposal, member) = bid(m, total, 4);
    let plan: Vec<MilestoneDraft> = amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| MilestoneDraft::new(format!("M{}", i + 1), *amount))
        .collect();
    let contract = m
        .engine
        .accept_proposal_with_plan(m.project, proposal.id, &plan, &m.client)
        .expect("proposal accepts")
        .id;
    let milestones = m
        .engine
        .list_milestones(&contract)
        .expect("milestones listed")
        .into_iter()
        .map(|ms| ms.id)
        .collect();
    Deal {
        contract,
        member,
        milestones,
    }
}

/// Accepted and fully funded.
pub fn funded_deal(m: &Market, amounts: &[i64]) -> Deal {
    let d = deal(m, amounts);
    m.engine
        .fund_escrow(d.contract, amounts.iter().sum(), &m.client)
        .expect("escrow funds");
    d
}

/// Move a pending milestone into review.
pub fn to_review(m: &Market, d: &Deal, milestone: MilestoneId) {
    m.engine
        .start_milestone(milestone, &d.member)
        .expect("milestone starts");
    m.engine
        .submit_milestone(milestone, "ready", vec!["build.zip".into()], &d.member)
        .expect("milestone submits");
}
