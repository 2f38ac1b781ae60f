//! # Run Subcommand
//!
//! Replays a YAML scenario against a fresh in-process engine. Scenarios
//! name their participants and records with labels; the runner assigns
//! identifiers and resolves labels as steps reference them.
//!
//! ```yaml
//! name: happy path
//! arbitrators: [judge]
//! teams:
//!   - name: rustaceans
//!     rating: 480
//!     members: [dev]
//! steps:
//!   - { action: register_project, as: client, label: site,
//!       title: Landing page, budget_min: 50000, budget_max: 150000 }
//!   - { action: submit_proposal, as: dev, label: bid,
//!       project: site, team: rustaceans, budget: 100000, weeks: 4 }
//!   - { action: fund_escrow, as: client, contract: deal, amount: 100000,
//!       expect_error: INVALID_STATE }
//! ```
//!
//! A step with `expect_error` passes only if the engine rejects it with
//! that error code. Any other outcome stops the run.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use serde::{Deserialize, Serialize};

use guild_core::{
    Actor, BudgetRange, ContractId, DisputeId, MilestoneId, ProjectId, ProposalId, TeamId, UserId,
};
use guild_engine::{
    DisputeOutcome, Engine, EngineError, EscrowSummary, EventFeed, FanoutSink,
    GuildConfig, InMemoryTeamDirectory, MilestoneDraft, TeamDirectory, TeamProfile, TracingSink,
};

/// Arguments for the `guild run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario file (YAML).
    pub scenario: PathBuf,

    /// Write the final engine snapshot (JSON) to this path.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

/// A scenario file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Participant labels that act as arbitrators.
    #[serde(default)]
    pub arbitrators: Vec<String>,
    /// Teams to register in the directory.
    #[serde(default)]
    pub teams: Vec<TeamSeed>,
    /// Commands, run in order.
    pub steps: Vec<Step>,
}

/// A team, with members given by participant label.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamSeed {
    pub name: String,
    #[serde(default)]
    pub rating: u32,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub members: Vec<String>,
}

/// One engine command and who issues it.
#[derive(Debug, Deserialize)]
pub struct Step {
    /// Participant label of the caller.
    #[serde(rename = "as")]
    pub actor: String,
    /// Label for the record the step creates.
    #[serde(default)]
    pub label: Option<String>,
    /// Error code the engine must answer with.
    #[serde(default)]
    pub expect_error: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

/// A milestone of an acceptance plan.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanStep {
    #[serde(default)]
    pub label: Option<String>,
    pub name: String,
    pub amount: i64,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Engine commands, referencing records by label.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    RegisterProject {
        title: String,
        budget_min: i64,
        budget_max: i64,
    },
    SubmitProposal {
        project: String,
        team: String,
        budget: i64,
        weeks: u32,
    },
    WithdrawProposal {
        proposal: String,
    },
    AcceptProposal {
        project: String,
        proposal: String,
        #[serde(default)]
        milestones: Vec<PlanStep>,
    },
    AddMilestone {
        contract: String,
        name: String,
        amount: i64,
        #[serde(default)]
        due_date: Option<NaiveDate>,
    },
    FundEscrow {
        contract: String,
        amount: i64,
    },
    HoldEscrow {
        contract: String,
        reason: String,
    },
    ReleaseHold {
        contract: String,
        reason: String,
    },
    RefundEscrow {
        contract: String,
        reason: String,
    },
    StartMilestone {
        milestone: String,
    },
    SubmitMilestone {
        milestone: String,
        #[serde(default)]
        note: String,
        #[serde(default)]
        files: Vec<String>,
    },
    ReviewMilestone {
        milestone: String,
        approved: bool,
        #[serde(default)]
        note: String,
    },
    FileDispute {
        contract: String,
        #[serde(default)]
        milestone: Option<String>,
        reason: String,
        #[serde(default)]
        evidence: Vec<String>,
    },
    ReviewDispute {
        dispute: String,
    },
    ResolveDispute {
        dispute: String,
        outcome: DisputeOutcome,
        #[serde(default)]
        note: Option<String>,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Self::RegisterProject { .. } => "register_project",
            Self::SubmitProposal { .. } => "submit_proposal",
            Self::WithdrawProposal { .. } => "withdraw_proposal",
            Self::AcceptProposal { .. } => "accept_proposal",
            Self::AddMilestone { .. } => "add_milestone",
            Self::FundEscrow { .. } => "fund_escrow",
            Self::HoldEscrow { .. } => "hold_escrow",
            Self::ReleaseHold { .. } => "release_hold",
            Self::RefundEscrow { .. } => "refund_escrow",
            Self::StartMilestone { .. } => "start_milestone",
            Self::SubmitMilestone { .. } => "submit_milestone",
            Self::ReviewMilestone { .. } => "review_milestone",
            Self::FileDispute { .. } => "file_dispute",
            Self::ReviewDispute { .. } => "review_dispute",
            Self::ResolveDispute { .. } => "resolve_dispute",
        }
    }
}

/// Final state of one labelled contract.
#[derive(Debug, Serialize)]
pub struct ContractReport {
    pub label: String,
    pub status: String,
    pub flagged: bool,
    pub escrow: EscrowSummary,
}

/// Outcome of a scenario run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub steps: usize,
    /// Steps that failed as the scenario expected.
    pub expected_errors: usize,
    pub events: u64,
    pub contracts: Vec<ContractReport>,
}

#[derive(Debug, Clone, Copy)]
enum Record {
    Project(ProjectId),
    Proposal(ProposalId),
    Contract(ContractId),
    Milestone(MilestoneId),
    Dispute(DisputeId),
}

/// Scenario runner: an engine plus the label tables.
pub struct Runner {
    engine: Engine,
    feed: Arc<EventFeed>,
    directory: Arc<InMemoryTeamDirectory>,
    users: HashMap<String, UserId>,
    arbitrators: HashSet<String>,
    teams: HashMap<String, TeamId>,
    records: HashMap<String, Record>,
    contract_labels: Vec<(String, ContractId)>,
}

macro_rules! lookup {
    ($fn:ident, $variant:ident, $id:ty, $kind:literal) => {
        fn $fn(&self, label: &str) -> Result<$id> {
            match self.records.get(label) {
                Some(Record::$variant(id)) => Ok(*id),
                Some(other) => bail!("label `{label}` is a {other:?}, expected a {}", $kind),
                None => bail!("unknown {} label `{label}`", $kind),
            }
        }
    };
}

impl Runner {
    /// Fresh engine configured by `config`, with the scenario's teams and
    /// the config's seed teams in its directory.
    pub fn new(config: &GuildConfig, scenario: &Scenario) -> Result<Self> {
        let feed = Arc::new(EventFeed::new(config.feed_capacity));
        let directory = Arc::new(InMemoryTeamDirectory::with_profiles(
            config.teams.iter().cloned(),
        ));
        let sink = Arc::new(
            FanoutSink::new()
                .with(Arc::new(TracingSink))
                .with(feed.clone()),
        );
        let engine = Engine::new(config.engine.clone(), sink, directory.clone())
            .context("engine configuration rejected")?;

        let mut runner = Self {
            engine,
            feed,
            directory,
            users: HashMap::new(),
            arbitrators: scenario.arbitrators.iter().cloned().collect(),
            teams: HashMap::new(),
            records: HashMap::new(),
            contract_labels: Vec::new(),
        };
        for team in &scenario.teams {
            let team_id = TeamId::new();
            let members: BTreeSet<UserId> =
                team.members.iter().map(|m| runner.user(m)).collect();
            runner.directory.upsert(TeamProfile {
                team_id,
                name: team.name.clone(),
                rating: team.rating,
                level: team.level,
                members,
            });
            if runner.teams.insert(team.name.clone(), team_id).is_some() {
                bail!("team `{}` declared twice", team.name);
            }
        }
        Ok(runner)
    }

    /// The engine under test.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn user(&mut self, label: &str) -> UserId {
        *self.users.entry(label.to_string()).or_insert_with(UserId::new)
    }

    fn actor(&mut self, label: &str) -> Actor {
        let user_id = self.user(label);
        self.directory
            .actor_for(user_id, self.arbitrators.contains(label))
    }

    fn team(&self, label: &str) -> Result<TeamId> {
        self.teams
            .get(label)
            .copied()
            .ok_or_else(|| anyhow!("unknown team `{label}`"))
    }

    lookup!(project, Project, ProjectId, "project");
    lookup!(proposal, Proposal, ProposalId, "proposal");
    lookup!(contract, Contract, ContractId, "contract");
    lookup!(milestone, Milestone, MilestoneId, "milestone");
    lookup!(dispute, Dispute, DisputeId, "dispute");

    fn remember(&mut self, label: Option<&String>, record: Record) -> Result<()> {
        let Some(label) = label else {
            return Ok(());
        };
        if self.records.insert(label.clone(), record).is_some() {
            bail!("label `{label}` used twice");
        }
        if let Record::Contract(id) = record {
            self.contract_labels.push((label.clone(), id));
        }
        Ok(())
    }

    /// Run one step. The outer error is a scenario mistake (unknown label,
    /// duplicate label); the inner one is the engine's answer.
    fn execute(&mut self, step: &Step) -> Result<Result<(), EngineError>> {
        let actor = self.actor(&step.actor);
        let label = step.label.as_ref();

        match &step.action {
            Action::RegisterProject {
                title,
                budget_min,
                budget_max,
            } => {
                let project = BudgetRange::new(*budget_min, *budget_max)
                    .map_err(EngineError::from)
                    .and_then(|budget| self.engine.register_project(title, budget, &actor));
                match project {
                    Ok(p) => self.remember(label, Record::Project(p.id))?,
                    Err(e) => return Ok(Err(e)),
                }
            }
            Action::SubmitProposal {
                project,
                team,
                budget,
                weeks,
            } => {
                let (project, team) = (self.project(project)?, self.team(team)?);
                match self
                    .engine
                    .submit_proposal(project, team, *budget, *weeks, &actor)
                {
                    Ok(p) => self.remember(label, Record::Proposal(p.id))?,
                    Err(e) => return Ok(Err(e)),
                }
            }
            Action::WithdrawProposal { proposal } => {
                let proposal = self.proposal(proposal)?;
                if let Err(e) = self.engine.withdraw_proposal(proposal, &actor) {
                    return Ok(Err(e));
                }
            }
            Action::AcceptProposal {
                project,
                proposal,
                milestones,
            } => {
                let (project, proposal) = (self.project(project)?, self.proposal(proposal)?);
                let plan: Vec<MilestoneDraft> = milestones
                    .iter()
                    .map(|m| MilestoneDraft {
                        name: m.name.clone(),
                        amount: m.amount,
                        due_date: m.due_date,
                    })
                    .collect();
                let contract = match self
                    .engine
                    .accept_proposal_with_plan(project, proposal, &plan, &actor)
                {
                    Ok(c) => c,
                    Err(e) => return Ok(Err(e)),
                };
                // A repeated acceptance returns the existing contract.
                if !self.contract_labels.iter().any(|(_, id)| *id == contract.id) {
                    self.remember(label, Record::Contract(contract.id))?;
                    let created = self
                        .engine
                        .list_milestones(&contract.id)
                        .context("listing milestones of the new contract")?;
                    for (planned, milestone) in milestones.iter().zip(created) {
                        self.remember(planned.label.as_ref(), Record::Milestone(milestone.id))?;
                    }
                }
            }
            Action::AddMilestone {
                contract,
                name,
                amount,
                due_date,
            } => {
                let contract = self.contract(contract)?;
                match self
                    .engine
                    .add_milestone(contract, name, *amount, *due_date, &actor)
                {
                    Ok(m) => self.remember(label, Record::Milestone(m.id))?,
                    Err(e) => return Ok(Err(e)),
                }
            }
            Action::FundEscrow { contract, amount } => {
                let contract = self.contract(contract)?;
                return Ok(self.engine.fund_escrow(contract, *amount, &actor).map(drop));
            }
            Action::HoldEscrow { contract, reason } => {
                let contract = self.contract(contract)?;
                return Ok(self.engine.hold_escrow(contract, reason, &actor).map(drop));
            }
            Action::ReleaseHold { contract, reason } => {
                let contract = self.contract(contract)?;
                return Ok(self.engine.release_hold(contract, reason, &actor).map(drop));
            }
            Action::RefundEscrow { contract, reason } => {
                let contract = self.contract(contract)?;
                return Ok(self.engine.refund_escrow(contract, reason, &actor).map(drop));
            }
            Action::StartMilestone { milestone } => {
                let milestone = self.milestone(milestone)?;
                return Ok(self.engine.start_milestone(milestone, &actor).map(drop));
            }
            Action::SubmitMilestone {
                milestone,
                note,
                files,
            } => {
                let milestone = self.milestone(milestone)?;
                return Ok(self
                    .engine
                    .submit_milestone(milestone, note, files.clone(), &actor)
                    .map(drop));
            }
            Action::ReviewMilestone {
                milestone,
                approved,
                note,
            } => {
                let milestone = self.milestone(milestone)?;
                return Ok(self
                    .engine
                    .review_milestone(milestone, *approved, note, &actor)
                    .map(drop));
            }
            Action::FileDispute {
                contract,
                milestone,
                reason,
                evidence,
            } => {
                let contract = self.contract(contract)?;
                let milestone = milestone.as_deref().map(|m| self.milestone(m)).transpose()?;
                match self.engine.file_dispute(
                    contract,
                    milestone,
                    reason,
                    evidence.clone(),
                    &actor,
                ) {
                    Ok(d) => self.remember(label, Record::Dispute(d.id))?,
                    Err(e) => return Ok(Err(e)),
                }
            }
            Action::ReviewDispute { dispute } => {
                let dispute = self.dispute(dispute)?;
                return Ok(self.engine.begin_dispute_review(dispute, &actor).map(drop));
            }
            Action::ResolveDispute {
                dispute,
                outcome,
                note,
            } => {
                let dispute = self.dispute(dispute)?;
                return Ok(self
                    .engine
                    .resolve_dispute(dispute, *outcome, note.clone(), &actor)
                    .map(drop));
            }
        }
        Ok(Ok(()))
    }

    /// Run every step, checking expectations.
    pub fn run(&mut self, scenario: &Scenario) -> Result<RunReport> {
        let mut expected_errors = 0;
        for (index, step) in scenario.steps.iter().enumerate() {
            let n = index + 1;
            let action = step.action.name();
            let outcome = self
                .execute(step)
                .with_context(|| format!("step {n} ({action})"))?;
            match (outcome, step.expect_error.as_deref()) {
                (Ok(()), None) => tracing::info!(step = n, action, "ok"),
                (Err(e), Some(code)) if e.code() == code => {
                    tracing::info!(step = n, action, code, "failed as expected");
                    expected_errors += 1;
                }
                (Err(e), Some(code)) => {
                    bail!("step {n} ({action}): expected {code}, engine answered {}: {e}", e.code())
                }
                (Err(e), None) => bail!("step {n} ({action}) failed: {}: {e}", e.code()),
                (Ok(()), Some(code)) => bail!("step {n} ({action}): expected {code}, but it succeeded"),
            }
        }

        let mut contracts = Vec::with_capacity(self.contract_labels.len());
        for (label, id) in &self.contract_labels {
            let contract = self.engine.get_contract(id)?;
            contracts.push(ContractReport {
                label: label.clone(),
                status: contract.status().to_string(),
                flagged: contract.flagged,
                escrow: contract.escrow().summary(),
            });
        }
        Ok(RunReport {
            scenario: scenario.name.clone().unwrap_or_else(|| "unnamed".to_string()),
            steps: scenario.steps.len(),
            expected_errors,
            events: self.feed.last_sequence(),
            contracts,
        })
    }
}

/// Read and parse a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    serde_yaml::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
}

/// Execute the run subcommand.
pub fn run_scenario(args: &RunArgs, config: Option<&GuildConfig>) -> Result<u8> {
    let scenario = load_scenario(&args.scenario)?;
    let default_config = GuildConfig::default();
    let config = config.unwrap_or(&default_config);

    let mut runner = Runner::new(config, &scenario)?;
    let report = runner.run(&scenario)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(out) = &args.snapshot {
        let snapshot = runner.engine().snapshot();
        std::fs::write(out, serde_json::to_vec_pretty(&snapshot)?)
            .with_context(|| format!("writing snapshot {}", out.display()))?;
        tracing::info!(path = %out.display(), "snapshot written");
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_engine::EngineConfig;

    const HAPPY: &str = r#"
name: happy path
teams:
  - name: rustaceans
    rating: 480
    level: 3
    members: [dev]
steps:
  - { action: register_project, as: client, label: site, title: Landing page, budget_min: 50000, budget_max: 150000 }
  - { action: submit_proposal, as: dev, label: bid, project: site, team: rustaceans, budget: 100000, weeks: 4 }
  - action: accept_proposal
    as: client
    label: deal
    project: site
    proposal: bid
    milestones:
      - { label: design, name: Design, amount: 40000 }
      - { label: build, name: Build, amount: 60000 }
  - { action: start_milestone, as: dev, milestone: design, expect_error: INVALID_STATE }
  - { action: fund_escrow, as: client, contract: deal, amount: 100000 }
  - { action: start_milestone, as: dev, milestone: design }
  - { action: submit_milestone, as: dev, milestone: design, note: first cut }
  - { action: review_milestone, as: client, milestone: design, approved: true }
  - { action: start_milestone, as: dev, milestone: build }
  - { action: submit_milestone, as: dev, milestone: build }
  - { action: review_milestone, as: client, milestone: build, approved: true }
"#;

    fn run(yaml: &str) -> Result<RunReport> {
        let scenario: Scenario = serde_yaml::from_str(yaml)?;
        let mut runner = Runner::new(&GuildConfig::default(), &scenario)?;
        runner.run(&scenario)
    }

    #[test]
    fn happy_path_releases_everything() {
        let report = run(HAPPY).unwrap();
        assert_eq!(report.steps, 11);
        assert_eq!(report.expected_errors, 1);
        assert_eq!(report.contracts.len(), 1);
        let deal = &report.contracts[0];
        assert_eq!(deal.status, "completed");
        assert_eq!(deal.escrow.released.minor_units(), 100_000);
        assert!(deal.escrow.held.is_zero());
        assert!(report.events > 0);
    }

    #[test]
    fn unexpected_engine_error_stops_the_run() {
        let yaml = r#"
steps:
  - { action: register_project, as: client, label: site, title: Site, budget_min: 10, budget_max: 5 }
"#;
        let err = run(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("INVALID_AMOUNT"), "{err:#}");
    }

    #[test]
    fn unmet_expectation_stops_the_run() {
        let yaml = r#"
steps:
  - { action: register_project, as: client, title: Site, budget_min: 10, budget_max: 50, expect_error: CONFLICT }
"#;
        let err = run(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("but it succeeded"), "{err:#}");
    }

    #[test]
    fn unknown_labels_are_reported_with_the_step() {
        let yaml = r#"
steps:
  - { action: fund_escrow, as: client, contract: nowhere, amount: 10 }
"#;
        let err = run(yaml).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("step 1 (fund_escrow)"), "{msg}");
        assert!(msg.contains("unknown contract label `nowhere`"), "{msg}");
    }

    #[test]
    fn labels_are_typed() {
        let yaml = r#"
steps:
  - { action: register_project, as: client, label: site, title: Site, budget_min: 10, budget_max: 50 }
  - { action: fund_escrow, as: client, contract: site, amount: 10 }
"#;
        let err = run(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("expected a contract"));
    }

    #[test]
    fn arbitrator_refund_scenario() {
        let yaml = r#"
arbitrators: [judge]
teams:
  - { name: crew, members: [dev] }
steps:
  - { action: register_project, as: client, label: p, title: Shop, budget_min: 1000, budget_max: 9000 }
  - { action: submit_proposal, as: dev, label: bid, project: p, team: crew, budget: 5000, weeks: 2 }
  - { action: accept_proposal, as: client, label: c, project: p, proposal: bid }
  - { action: fund_escrow, as: client, contract: c, amount: 5000 }
  - { action: file_dispute, as: client, label: d, contract: c, reason: no delivery }
  - { action: resolve_dispute, as: client, dispute: d, outcome: refund, expect_error: FORBIDDEN }
  - { action: review_dispute, as: judge, dispute: d }
  - { action: resolve_dispute, as: judge, dispute: d, outcome: refund, note: refunded }
"#;
        let report = run(yaml).unwrap();
        let c = &report.contracts[0];
        assert_eq!(c.status, "terminated");
        assert!(!c.flagged);
        assert_eq!(c.escrow.status.to_string(), "refunded");
    }

    #[test]
    fn bundled_demos_pass() {
        let demos = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
        for name in ["happy-path.yaml", "dispute-refund.yaml"] {
            let scenario = load_scenario(&demos.join(name)).unwrap();
            let mut runner = Runner::new(&GuildConfig::default(), &scenario).unwrap();
            let report = runner.run(&scenario).unwrap_or_else(|e| panic!("{name}: {e:#}"));
            assert_eq!(report.contracts.len(), 1, "{name}");
        }
    }

    #[test]
    fn snapshot_file_restores() {
        let dir = tempfile::tempdir().unwrap();
        let scenario_path = dir.path().join("happy.yaml");
        let snapshot_path = dir.path().join("out.json");
        std::fs::write(&scenario_path, HAPPY).unwrap();

        let code = run_scenario(
            &RunArgs {
                scenario: scenario_path,
                snapshot: Some(snapshot_path.clone()),
            },
            None,
        )
        .unwrap();
        assert_eq!(code, 0);

        let raw = std::fs::read(&snapshot_path).unwrap();
        let snapshot: guild_engine::EngineSnapshot = serde_json::from_slice(&raw).unwrap();
        assert_eq!(snapshot.projects.len(), 1);
        assert_eq!(snapshot.milestones.len(), 2);
        Engine::restore(
            EngineConfig::default(),
            snapshot,
            Arc::new(FanoutSink::new()),
            Arc::new(InMemoryTeamDirectory::new()),
        )
        .unwrap();
    }
}
