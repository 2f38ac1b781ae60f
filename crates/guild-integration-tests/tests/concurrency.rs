//! # Racing Commands
//!
//! Commands issued from many threads at once against one engine. Acceptance
//! serializes on the project lock and review on the milestone lock, so
//! whatever the interleaving there is one accepted proposal per project and
//! one payout per milestone.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use common::{bid, funded_deal, market, market_with, to_review};
use guild_core::MilestoneId;
use guild_engine::{EngineConfig, EngineError, EngineEvent, EventFeed, EventSink};
use guild_state::{MilestoneStatus, ProposalStatus};

#[test]
fn racing_acceptances_produce_one_contract() {
    let m = market();
    let proposals: Vec<_> = (0..8)
        .map(|i| bid(&m, 1_000_000 + i * 10_000, 4).0)
        .collect();
    let barrier = Arc::new(Barrier::new(proposals.len()));

    let handles: Vec<_> = proposals
        .iter()
        .map(|p| {
            let engine = m.engine.clone();
            let client = m.client.clone();
            let barrier = barrier.clone();
            let (project, proposal) = (m.project, p.id);
            thread::spawn(move || {
                barrier.wait();
                engine.accept_proposal(project, proposal, &client)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1, "results: {results:?}");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err.code(), "INVALID_STATE" | "CONFLICT"),
            "unexpected {err}"
        );
    }

    let accepted: Vec<_> = m
        .engine
        .list_proposals(&m.project)
        .unwrap()
        .into_iter()
        .filter(|p| p.status() == ProposalStatus::Accepted)
        .collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].id, winners[0].proposal_id);
    assert_eq!(m.engine.contracts_of_project(&m.project).len(), 1);
}

#[test]
fn racing_repeat_acceptance_is_idempotent() {
    let m = market();
    let (p, _) = bid(&m, 2_000_000, 3);
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = m.engine.clone();
            let client = m.client.clone();
            let barrier = barrier.clone();
            let (project, proposal) = (m.project, p.id);
            thread::spawn(move || {
                barrier.wait();
                engine.accept_proposal(project, proposal, &client)
            })
        })
        .collect();

    let ids: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().expect("every repeat succeeds").id)
        .collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(m.engine.contracts_of_project(&m.project).len(), 1);
}

#[test]
fn racing_approvals_pay_a_milestone_once() {
    let m = market();
    let d = funded_deal(&m, &[1_000_000, 2_000_000]);
    let ms = d.milestones[0];
    to_review(&m, &d, ms);
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let engine = m.engine.clone();
            let client = m.client.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.review_milestone(ms, true, "approved", &client)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(
            matches!(err.code(), "INVALID_STATE" | "CONFLICT"),
            "unexpected {err}"
        );
    }
    assert_eq!(
        m.engine.get_milestone(&ms).unwrap().status(),
        MilestoneStatus::Approved
    );
    let summary = m.engine.get_escrow_summary(&d.contract).unwrap();
    assert_eq!(summary.released.minor_units(), 1_000_000);
    let releases = m
        .feed
        .topics()
        .into_iter()
        .filter(|t| *t == "escrow.milestone_released")
        .count();
    assert_eq!(releases, 1);
}

#[test]
fn different_milestones_release_concurrently() {
    let m = market();
    let d = funded_deal(&m, &[500_000, 700_000, 800_000]);
    for ms in &d.milestones {
        to_review(&m, &d, *ms);
    }
    let barrier = Arc::new(Barrier::new(d.milestones.len()));

    let handles: Vec<_> = d
        .milestones
        .iter()
        .map(|ms| {
            let engine = m.engine.clone();
            let client = m.client.clone();
            let barrier = barrier.clone();
            let ms = *ms;
            thread::spawn(move || {
                barrier.wait();
                loop {
                    match engine.review_milestone(ms, true, "", &client) {
                        Err(e) if e.is_retryable() => continue,
                        other => return other,
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap().expect("approval succeeds after retries");
    }

    let summary = m.engine.get_escrow_summary(&d.contract).unwrap();
    assert_eq!(summary.released.minor_units(), 2_000_000);
    assert_eq!(summary.held.minor_units(), 0);
}

/// Parks the first publisher of `topic` until the test lets it go. Events
/// are published inside the command's write section, so the entity lock and
/// the store's write guard both stay held meanwhile.
struct Gate {
    topic: &'static str,
    armed: AtomicBool,
    entered: Mutex<mpsc::Sender<()>>,
    proceed: Mutex<mpsc::Receiver<()>>,
}

impl EventSink for Gate {
    fn publish(&self, event: &EngineEvent) {
        if event.topic() == self.topic && self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.entered.lock().unwrap().send(());
            let _ = self.proceed.lock().unwrap().recv();
        }
    }
}

#[test]
fn lock_wait_times_out_with_conflict() {
    let (gate, entered_rx, proceed_tx) = gate_on("milestone.reviewed");
    let config = EngineConfig {
        lock_timeout_ms: 50,
        ..EngineConfig::default()
    };
    let m = market_with(config, Some(gate.clone()));
    let d = funded_deal(&m, &[1_000_000]);
    let ms = d.milestones[0];
    to_review(&m, &d, ms);
    gate.armed.store(true, Ordering::SeqCst);

    let first = {
        let engine = m.engine.clone();
        let client = m.client.clone();
        thread::spawn(move || engine.review_milestone(ms, true, "", &client))
    };
    entered_rx.recv().unwrap();

    let err = m
        .engine
        .review_milestone(ms, true, "", &m.client)
        .unwrap_err();
    assert!(err.is_retryable());
    match &err {
        EngineError::Conflict { resource } => {
            assert_eq!(resource, &format!("milestone:{ms}"));
        }
        other => panic!("expected conflict, got {other}"),
    }

    proceed_tx.send(()).unwrap();
    first.join().unwrap().expect("the lock holder finishes");

    let retry = m
        .engine
        .review_milestone(ms, true, "", &m.client)
        .unwrap_err();
    assert_eq!(retry.code(), "INVALID_STATE", "already approved");
    assert_eq!(
        m.engine
            .get_escrow_summary(&d.contract)
            .unwrap()
            .released
            .minor_units(),
        1_000_000
    );
}

fn gate_on(topic: &'static str) -> (Arc<Gate>, mpsc::Receiver<()>, mpsc::Sender<()>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (proceed_tx, proceed_rx) = mpsc::channel();
    let gate = Arc::new(Gate {
        topic,
        armed: AtomicBool::new(false),
        entered: Mutex::new(entered_tx),
        proceed: Mutex::new(proceed_rx),
    });
    (gate, entered_rx, proceed_tx)
}

fn released_in_feed(feed: &EventFeed) -> i64 {
    feed.since(0)
        .into_iter()
        .filter_map(|entry| match entry.event {
            EngineEvent::EscrowMilestoneReleased { amount, .. } => Some(amount.minor_units()),
            _ => None,
        })
        .sum()
}

#[test]
fn readers_wait_until_events_are_published() {
    let (gate, entered, proceed) = gate_on("milestone.reviewed");
    let m = market_with(EngineConfig::default(), Some(gate.clone()));
    let d = funded_deal(&m, &[1_000_000, 2_000_000]);
    let (first, second) = (d.milestones[0], d.milestones[1]);
    to_review(&m, &d, first);
    to_review(&m, &d, second);
    gate.armed.store(true, Ordering::SeqCst);

    let approve = |ms: MilestoneId| {
        let engine = m.engine.clone();
        let client = m.client.clone();
        thread::spawn(move || engine.review_milestone(ms, true, "", &client))
    };
    let first_approval = approve(first);
    entered.recv().unwrap();

    let (seen_tx, seen_rx) = mpsc::channel();
    let reader = {
        let engine = m.engine.clone();
        let feed = m.feed.clone();
        let (contract, ms) = (d.contract, first);
        thread::spawn(move || {
            let status = engine.get_milestone(&ms).unwrap().status();
            let released = engine
                .get_escrow_summary(&contract)
                .unwrap()
                .released
                .minor_units();
            seen_tx
                .send((status, released, released_in_feed(&feed)))
                .unwrap();
        })
    };
    let second_approval = approve(second);

    assert!(
        seen_rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "a reader got through while the approval was still publishing"
    );

    proceed.send(()).unwrap();
    first_approval.join().unwrap().expect("first approval");
    second_approval.join().unwrap().expect("second approval");
    reader.join().unwrap();

    let (status, released, announced) = seen_rx.recv().unwrap();
    assert_eq!(status, MilestoneStatus::Approved);
    assert!(released >= 1_000_000);
    assert!(
        announced >= released,
        "reader saw {released} released but the feed announced {announced}"
    );

    let topics = m.feed.topics();
    let position = |topic: &str| -> Vec<usize> {
        topics
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == topic)
            .map(|(i, _)| i)
            .collect()
    };
    let payouts = position("escrow.milestone_released");
    let completed = position("escrow.released");
    assert_eq!(payouts.len(), 2);
    assert_eq!(completed.len(), 1);
    assert!(
        payouts.iter().all(|p| *p < completed[0]),
        "feed order: {topics:?}"
    );
    assert_eq!(released_in_feed(&m.feed), 3_000_000);
}
