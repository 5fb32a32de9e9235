//! Stakepoll Governance - Stake-weighted polls over a live deposit ledger.
//!
//! This crate provides:
//! - A custodial deposit ledger that notifies listeners on every balance change
//! - Poll lifecycle management (creation, activation, closing)
//! - A vote ledger whose tallies follow members' deposit balances
//! - A unit-of-work boundary making balance changes and tally updates atomic

pub mod auth;
pub mod clock;
pub mod config;
pub mod custody;
pub mod deposit;
pub mod engine;
pub mod error;
pub mod governance;
pub mod ledger;
pub mod listener;
pub mod poll;
pub mod service;
pub mod unit_of_work;

pub use auth::{Authorizer, RosterAuthorizer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GovernanceConfig;
pub use custody::{AssetCustody, InMemoryCustody};
pub use deposit::DepositLedger;
pub use engine::{SharedEngine, VotingEngine};
pub use error::GovernanceError;
pub use governance::Governance;
pub use listener::{BalanceChange, BalanceChangeListener, ListenerRegistry, SharedListener};
pub use poll::{CloseReason, NewPoll, Poll, PollStatus};
pub use service::GovernanceService;
pub use unit_of_work::{Transactional, UnitOfWork};
