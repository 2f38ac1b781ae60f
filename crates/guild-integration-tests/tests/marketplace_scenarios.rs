//! # End-to-End Marketplace Flows
//!
//! Drives the engine through the four reference engagements: choosing a
//! bid, paying out milestones, resubmitting rejected work, and refunding a
//! disputed contract.

mod common;

use common::{bid, deal, funded_deal, market, to_review};
use guild_engine::{DisputeOutcome, EngineError};
use guild_state::{
    ContractStatus, DisputeStatus, EscrowStatus, MilestoneStatus, ProjectStatus, ProposalStatus,
};

#[test]
fn accepting_one_bid_rejects_the_others() {
    let m = market();
    let (x, _) = bid(&m, 5_000_000, 4);
    let (y, _) = bid(&m, 4_500_000, 6);
    let (z, _) = bid(&m, 6_000_000, 3);

    let contract = m.engine.accept_proposal(m.project, y.id, &m.client).unwrap();

    let status = |id| m.engine.get_proposal(&id).unwrap().status();
    assert_eq!(status(y.id), ProposalStatus::Accepted);
    assert_eq!(status(x.id), ProposalStatus::Rejected);
    assert_eq!(status(z.id), ProposalStatus::Rejected);
    assert_eq!(
        m.engine.get_project(&m.project).unwrap().status(),
        ProjectStatus::Negotiating
    );
    assert_eq!(contract.total_amount.minor_units(), 4_500_000);
    assert_eq!(contract.escrow_status(), EscrowStatus::NotFunded);
    assert_eq!(contract.status(), ContractStatus::Draft);

    let contracts = m.engine.contracts_of_project(&m.project);
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0].proposal_id, y.id);
}

#[test]
fn acceptance_events_follow_the_cascade() {
    let m = market();
    let (x, _) = bid(&m, 5_000_000, 4);
    let (y, _) = bid(&m, 4_500_000, 6);
    let before = m.feed.last_sequence();

    m.engine.accept_proposal(m.project, y.id, &m.client).unwrap();

    let topics: Vec<_> = m
        .feed
        .since(before)
        .into_iter()
        .map(|e| e.event.topic())
        .collect();
    assert!(topics.contains(&"proposal.accepted"));
    assert!(topics.contains(&"proposal.rejected"));
    assert!(topics.contains(&"contract.created"));
    assert!(topics.contains(&"project.status_changed"));
    let rejected = m
        .feed
        .since(before)
        .into_iter()
        .filter(|e| e.event.topic() == "proposal.rejected")
        .count();
    assert_eq!(rejected, 1, "only {} was pending besides the winner", x.id);
}

#[test]
fn repeated_acceptance_returns_the_same_contract() {
    let m = market();
    let (y, _) = bid(&m, 4_500_000, 6);
    let first = m.engine.accept_proposal(m.project, y.id, &m.client).unwrap();
    let events = m.feed.last_sequence();

    let second = m.engine.accept_proposal(m.project, y.id, &m.client).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(m.engine.contracts_of_project(&m.project).len(), 1);
    assert_eq!(m.feed.last_sequence(), events, "no events on a repeat");
}

#[test]
fn milestone_approvals_release_escrow_until_empty() {
    let m = market();
    let d = funded_deal(&m, &[1_000_000, 2_000_000]);
    let summary = m.engine.get_escrow_summary(&d.contract).unwrap();
    assert_eq!(summary.status, EscrowStatus::Funded);
    assert_eq!(
        m.engine.get_contract(&d.contract).unwrap().status(),
        ContractStatus::Active
    );

    to_review(&m, &d, d.milestones[0]);
    m.engine
        .review_milestone(d.milestones[0], true, "looks good", &m.client)
        .unwrap();
    let summary = m.engine.get_escrow_summary(&d.contract).unwrap();
    assert_eq!(summary.released.minor_units(), 1_000_000);
    assert_eq!(summary.held.minor_units(), 2_000_000);
    assert_eq!(summary.status, EscrowStatus::Funded);

    to_review(&m, &d, d.milestones[1]);
    m.engine
        .review_milestone(d.milestones[1], true, "ship it", &m.client)
        .unwrap();
    let summary = m.engine.get_escrow_summary(&d.contract).unwrap();
    assert_eq!(summary.released.minor_units(), 3_000_000);
    assert_eq!(summary.held.minor_units(), 0);
    assert_eq!(summary.status, EscrowStatus::Released);
    assert_eq!(summary.platform_fee.minor_units(), 300_000);
    assert_eq!(summary.team_payout.minor_units(), 2_700_000);

    assert_eq!(
        m.engine.get_contract(&d.contract).unwrap().status(),
        ContractStatus::Completed
    );
    assert_eq!(
        m.engine.get_project(&m.project).unwrap().status(),
        ProjectStatus::Completed
    );
    assert_eq!(m.feed.topics().last(), Some(&"project.status_changed"));
}

#[test]
fn rejected_work_is_resubmitted_into_review() {
    let m = market();
    let d = funded_deal(&m, &[1_000_000]);
    let ms = d.milestones[0];
    to_review(&m, &d, ms);

    let rejected = m
        .engine
        .review_milestone(ms, false, "missing tests", &m.client)
        .unwrap();
    assert_eq!(rejected.status(), MilestoneStatus::Rejected);
    assert_eq!(
        m.engine.get_escrow_summary(&d.contract).unwrap().released.minor_units(),
        0
    );

    let second = m
        .engine
        .submit_milestone(ms, "tests added", vec!["tests.zip".into()], &d.member)
        .unwrap();
    let milestone = m.engine.get_milestone(&ms).unwrap();
    assert_eq!(milestone.status(), MilestoneStatus::Review);
    let last = milestone.history().last().unwrap();
    assert_eq!(last.from_state, MilestoneStatus::Rejected);
    assert_eq!(last.to_state, MilestoneStatus::Review);

    let submissions = m.engine.list_submissions(&ms).unwrap();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].id, second.id, "newest first");
    let reviews = m.engine.list_reviews(&ms).unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].note, "missing tests");
}

#[test]
fn disputes_resume_work_then_refund_the_contract() {
    let m = market();
    let d = funded_deal(&m, &[1_000_000, 2_000_000]);
    to_review(&m, &d, d.milestones[0]);
    m.engine
        .review_milestone(d.milestones[0], true, "", &m.client)
        .unwrap();
    m.engine.start_milestone(d.milestones[1], &d.member).unwrap();

    let stalled = m
        .engine
        .file_dispute(
            d.contract,
            Some(d.milestones[1]),
            "scope disagreement",
            vec![],
            &d.member,
        )
        .unwrap();
    assert_eq!(
        m.engine.get_milestone(&d.milestones[1]).unwrap().status(),
        MilestoneStatus::Dispute
    );
    m.engine
        .resolve_dispute(stalled.id, DisputeOutcome::ResumeMilestone, None, &m.arbitrator)
        .unwrap();
    assert_eq!(
        m.engine.get_milestone(&d.milestones[1]).unwrap().status(),
        MilestoneStatus::InProgress
    );

    let dispute = m
        .engine
        .file_dispute(
            d.contract,
            None,
            "team went silent",
            vec!["chat-log.txt".into()],
            &m.client,
        )
        .unwrap();
    assert!(m.engine.get_contract(&d.contract).unwrap().flagged);

    let err = m
        .engine
        .resolve_dispute(dispute.id, DisputeOutcome::Refund, None, &m.client)
        .unwrap_err();
    assert_eq!(err.code(), "FORBIDDEN");

    m.engine
        .begin_dispute_review(dispute.id, &m.arbitrator)
        .unwrap();
    let resolved = m
        .engine
        .resolve_dispute(
            dispute.id,
            DisputeOutcome::Refund,
            Some("no delivery".into()),
            &m.arbitrator,
        )
        .unwrap();
    assert_eq!(resolved.status(), DisputeStatus::Resolved);

    let summary = m.engine.get_escrow_summary(&d.contract).unwrap();
    assert_eq!(summary.status, EscrowStatus::Refunded);
    assert_eq!(summary.released.minor_units(), 1_000_000, "paid work stays paid");
    let contract = m.engine.get_contract(&d.contract).unwrap();
    assert_eq!(contract.status(), ContractStatus::Terminated);
    assert!(!contract.flagged);
    assert_eq!(
        m.engine.get_project(&m.project).unwrap().status(),
        ProjectStatus::Cancelled
    );
    assert!(m
        .engine
        .list_open_disputes(chrono::Duration::zero())
        .is_empty());
}

#[test]
fn deposit_must_match_the_contract_total() {
    let m = market();
    let d = deal(&m, &[1_000_000, 2_000_000]);

    let err = m
        .engine
        .fund_escrow(d.contract, 2_999_999, &m.client)
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::AmountMismatch {
            expected: 3_000_000,
            provided: 2_999_999,
            ..
        }
    ));
    assert_eq!(
        m.engine.get_escrow_summary(&d.contract).unwrap().status,
        EscrowStatus::NotFunded
    );
}

#[test]
fn hold_blocks_release_until_lifted() {
    let m = market();
    let d = funded_deal(&m, &[1_000_000]);
    to_review(&m, &d, d.milestones[0]);
    m.engine
        .hold_escrow(d.contract, "invoice query", &m.client)
        .unwrap();

    let err = m
        .engine
        .review_milestone(d.milestones[0], true, "", &m.client)
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSITION");
    assert_eq!(
        m.engine.get_milestone(&d.milestones[0]).unwrap().status(),
        MilestoneStatus::Review
    );

    m.engine
        .release_hold(d.contract, "query answered", &m.arbitrator)
        .unwrap();
    m.engine
        .review_milestone(d.milestones[0], true, "", &m.client)
        .unwrap();
    assert_eq!(
        m.engine.get_escrow_summary(&d.contract).unwrap().status,
        EscrowStatus::Released
    );
}

#[test]
fn events_serialize_with_their_topic() {
    let m = market();
    let (p, _) = bid(&m, 4_500_000, 6);
    let entry = m.feed.since(0).into_iter().last().unwrap();
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["event"]["topic"], "proposal.submitted");
    assert_eq!(json["event"]["proposal_id"], p.id.to_string());
    assert_eq!(json["sequence"], 1);
}
