//! Replayable operation scripts.
//!
//! A script is a JSON document listing operations against an in-memory
//! governance engine with a manual clock. Each step records its outcome and
//! may declare whether it is expected to fail, which makes scripts usable
//! as executable scenarios.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

use stakepoll_governance::{
    Clock, CloseReason, Governance, GovernanceError, InMemoryCustody, ManualClock, NewPoll,
    RosterAuthorizer,
};
use stakepoll_types::{Amount, ContentHash, Label, PollId};
use tracing::{debug, warn};

use crate::config::{resolve_member, NodeConfig};

/// Default start time for scripts that do not set one.
pub const DEFAULT_START_TIME: u64 = 1_700_000_000;

pub type ScriptGovernance = Governance<InMemoryCustody, RosterAuthorizer, ManualClock>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub name: String,
    /// Unix time the manual clock starts at.
    #[serde(default)]
    pub start_time: Option<u64>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read script '{}': {}", path.display(), e))?;
        Self::from_json(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse script '{}': {}", path.display(), e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub op: Operation,
    /// Expected outcome; steps without one are expected to succeed.
    #[serde(default)]
    pub expect: Expect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    #[default]
    Ok,
    Error,
    /// Run it, report it, do not judge it.
    Any,
}

/// Members are named by address or by any string their address is derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Credit a member's external wallet.
    Fund { member: String, amount: Amount },
    Deposit { member: String, amount: Amount },
    Withdraw { member: String, amount: Amount },
    CreatePoll {
        owner: String,
        title: String,
        #[serde(default)]
        description: String,
        options: Vec<String>,
        vote_limit: Amount,
        #[serde(default)]
        quorum: u32,
        /// Seconds from the current script time to the deadline.
        duration_secs: u64,
    },
    Activate { poll: PollId, caller: String },
    /// Attach the blake3 digest of `content`.
    AddContent { poll: PollId, caller: String, content: String },
    Vote { poll: PollId, member: String, option: usize },
    /// Administrator force-close.
    Close { poll: PollId, caller: String },
    CloseExpired,
    AdvanceTime { secs: u64 },
    Balance { member: String },
    Tallies { poll: PollId },
    Participation { member: String },
    Poll { poll: PollId },
    Titles,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Fund { .. } => "fund",
            Operation::Deposit { .. } => "deposit",
            Operation::Withdraw { .. } => "withdraw",
            Operation::CreatePoll { .. } => "create_poll",
            Operation::Activate { .. } => "activate",
            Operation::AddContent { .. } => "add_content",
            Operation::Vote { .. } => "vote",
            Operation::Close { .. } => "close",
            Operation::CloseExpired => "close_expired",
            Operation::AdvanceTime { .. } => "advance_time",
            Operation::Balance { .. } => "balance",
            Operation::Tallies { .. } => "tallies",
            Operation::Participation { .. } => "participation",
            Operation::Poll { .. } => "poll",
            Operation::Titles => "titles",
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub as_expected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub name: String,
    pub outcomes: Vec<StepOutcome>,
}

impl Report {
    pub fn unexpected(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|o| !o.as_expected)
    }

    pub fn passed(&self) -> bool {
        self.unexpected().next().is_none()
    }
}

pub struct ScriptRunner {
    governance: ScriptGovernance,
    clock: ManualClock,
}

impl ScriptRunner {
    pub fn new(config: &NodeConfig, start_time: u64) -> anyhow::Result<Self> {
        let clock = ManualClock::new(start_time);
        let governance = Governance::new(
            config.governance.clone(),
            InMemoryCustody::new(),
            config.authorizer(),
            clock.clone(),
        )?;
        Ok(Self { governance, clock })
    }

    /// Build a runner for `script` and replay it.
    pub fn run_script(config: &NodeConfig, script: &Script) -> anyhow::Result<Report> {
        let mut runner = Self::new(config, script.start_time.unwrap_or(DEFAULT_START_TIME))?;
        Ok(runner.run(script))
    }

    pub fn run(&mut self, script: &Script) -> Report {
        let outcomes = script
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let result = self.execute(&step.op);
                let as_expected = match (step.expect, &result) {
                    (Expect::Any, _) => true,
                    (Expect::Ok, Ok(_)) | (Expect::Error, Err(_)) => true,
                    _ => false,
                };
                if !as_expected {
                    warn!(index, op = step.op.name(), ?result, "Step outcome not as expected");
                }
                let (value, error) = match result {
                    Ok(value) => (Some(value), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                StepOutcome {
                    index,
                    op: step.op.name(),
                    value,
                    error,
                    as_expected,
                }
            })
            .collect();

        Report {
            name: script.name.clone(),
            outcomes,
        }
    }

    pub fn governance(&self) -> &ScriptGovernance {
        &self.governance
    }

    fn execute(&mut self, op: &Operation) -> Result<Value, GovernanceError> {
        debug!(op = op.name(), "Executing step");
        let gov = &mut self.governance;
        match op {
            Operation::Fund { member, amount } => {
                let member = resolve_member(member);
                gov.custody_mut().fund(member, *amount)?;
                Ok(json!(gov.deposits().custody().wallet_balance(&member)))
            }
            Operation::Deposit { member, amount } => {
                Ok(json!(gov.deposit(resolve_member(member), *amount)?))
            }
            Operation::Withdraw { member, amount } => {
                Ok(json!(gov.withdraw(resolve_member(member), *amount)?))
            }
            Operation::CreatePoll {
                owner,
                title,
                description,
                options,
                vote_limit,
                quorum,
                duration_secs,
            } => {
                let params = NewPoll {
                    title: Label::new(title)?,
                    description: Label::new(description)?,
                    options: options
                        .iter()
                        .map(|o| Label::new(o))
                        .collect::<Result<Vec<_>, _>>()?,
                    vote_limit: *vote_limit,
                    quorum: *quorum,
                    deadline: self.clock.now().saturating_add(*duration_secs),
                };
                Ok(json!(gov.create_poll(resolve_member(owner), params)?))
            }
            Operation::Activate { poll, caller } => {
                gov.activate_poll(*poll, resolve_member(caller))?;
                Ok(Value::Null)
            }
            Operation::AddContent { poll, caller, content } => {
                let hash = ContentHash::digest(content.as_bytes());
                Ok(json!(gov.add_content_hash(*poll, resolve_member(caller), hash)?))
            }
            Operation::Vote { poll, member, option } => {
                Ok(json!(gov.cast_vote(*poll, resolve_member(member), *option)?))
            }
            Operation::Close { poll, caller } => Ok(json!(gov.close_poll(
                *poll,
                resolve_member(caller),
                CloseReason::AdminForced
            )?)),
            Operation::CloseExpired => Ok(json!(gov.close_expired()?)),
            Operation::AdvanceTime { secs } => {
                self.clock.advance(*secs);
                Ok(json!(self.clock.now()))
            }
            Operation::Balance { member } => Ok(json!(gov.balance_of(&resolve_member(member)))),
            Operation::Tallies { poll } => Ok(json!(gov.tallies_for_poll(*poll)?)),
            Operation::Participation { member } => {
                Ok(json!(gov.polls_member_participates_in(&resolve_member(member))))
            }
            Operation::Poll { poll } => Ok(json!(gov.poll_by_id(*poll)?)),
            Operation::Titles => {
                let titles: Vec<String> = gov.titles_of_all_polls().iter().map(|t| t.to_string()).collect();
                Ok(json!(titles))
            }
        }
    }
}

/// Built-in acceptance scenario run by the `scenario` subcommand.
pub const ACCEPTANCE_SCENARIO: &str = include_str!("../scenarios/acceptance.json");
