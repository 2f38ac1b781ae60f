//! # Escrow Bound Properties
//!
//! Random command sequences against a funded three-milestone contract. Most
//! commands in a sequence are illegal at the point they run; whatever
//! happens, the escrow never pays out more than it holds, never takes money
//! back, and only pays for approved work.

mod common;

use proptest::prelude::*;

use common::{funded_deal, market, Deal, Market};
use guild_engine::DisputeOutcome;
use guild_state::MilestoneStatus;

const AMOUNTS: [i64; 3] = [250_000, 350_000, 400_000];

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    Submit(usize),
    Approve(usize),
    Reject(usize),
    Hold,
    ReleaseHold,
    DisputeMilestone(usize),
    ResolveApprove,
    ResolveResume,
    Refund,
}

fn op() -> impl Strategy<Value = Op> {
    let idx = 0..AMOUNTS.len();
    prop_oneof![
        3 => idx.clone().prop_map(Op::Start),
        3 => idx.clone().prop_map(Op::Submit),
        4 => idx.clone().prop_map(Op::Approve),
        2 => idx.clone().prop_map(Op::Reject),
        1 => Just(Op::Hold),
        1 => Just(Op::ReleaseHold),
        1 => idx.prop_map(Op::DisputeMilestone),
        1 => Just(Op::ResolveApprove),
        1 => Just(Op::ResolveResume),
        1 => Just(Op::Refund),
    ]
}

/// Apply one command, ignoring engine errors; only the invariants matter.
fn apply(m: &Market, d: &Deal, op: &Op) {
    let e = &m.engine;
    let latest_open_dispute = || {
        e.list_disputes(&d.contract)
            .ok()
            .and_then(|ds| ds.into_iter().rev().find(|x| x.is_open()))
    };
    let _ = match op {
        Op::Start(i) => e.start_milestone(d.milestones[*i], &d.member).map(drop),
        Op::Submit(i) => e
            .submit_milestone(d.milestones[*i], "work", vec![], &d.member)
            .map(drop),
        Op::Approve(i) => e
            .review_milestone(d.milestones[*i], true, "", &m.client)
            .map(drop),
        Op::Reject(i) => e
            .review_milestone(d.milestones[*i], false, "again", &m.client)
            .map(drop),
        Op::Hold => e.hold_escrow(d.contract, "query", &m.client).map(drop),
        Op::ReleaseHold => e.release_hold(d.contract, "resolved", &m.client).map(drop),
        Op::DisputeMilestone(i) => e
            .file_dispute(d.contract, Some(d.milestones[*i]), "quality", vec![], &m.client)
            .map(drop),
        Op::ResolveApprove => match latest_open_dispute() {
            Some(x) => e
                .resolve_dispute(x.id, DisputeOutcome::ApproveMilestone, None, &m.arbitrator)
                .map(drop),
            None => Ok(()),
        },
        Op::ResolveResume => match latest_open_dispute() {
            Some(x) => e
                .resolve_dispute(x.id, DisputeOutcome::ResumeMilestone, None, &m.arbitrator)
                .map(drop),
            None => Ok(()),
        },
        Op::Refund => e.refund_escrow(d.contract, "stalled", &m.arbitrator).map(drop),
    };
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn released_stays_within_total_and_never_shrinks(ops in prop::collection::vec(op(), 1..40)) {
        let m = market();
        let d = funded_deal(&m, &AMOUNTS);
        let total: i64 = AMOUNTS.iter().sum();
        let mut last_released = 0;

        for op in &ops {
            apply(&m, &d, op);

            let summary = m.engine.get_escrow_summary(&d.contract).unwrap();
            let released = summary.released.minor_units();
            prop_assert!(released >= 0);
            prop_assert!(released <= total, "released {} > total {} after {:?}", released, total, op);
            prop_assert!(released >= last_released, "released shrank after {:?}", op);
            prop_assert_eq!(summary.total.minor_units(), total);
            prop_assert_eq!(summary.held.minor_units(), total - released);
            prop_assert_eq!(
                summary.platform_fee.minor_units() + summary.team_payout.minor_units(),
                released
            );

            let approved: i64 = m
                .engine
                .list_milestones(&d.contract)
                .unwrap()
                .iter()
                .filter(|ms| ms.status() == MilestoneStatus::Approved)
                .map(|ms| ms.amount.minor_units())
                .sum();
            prop_assert_eq!(released, approved, "payouts track approved milestones");
            last_released = released;
        }
    }
}
