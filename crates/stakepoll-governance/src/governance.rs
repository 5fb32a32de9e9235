//! Governance facade.
//!
//! Wires the deposit ledger to the voting engine and exposes the operations
//! a client consumes. Authorization and time come from the injected
//! [`Authorizer`] and [`Clock`]; every mutation runs as one unit of work.

use parking_lot::MutexGuard;
use stakepoll_types::{Address, Amount, ContentHash, Label, PollId};
use tracing::info;

use crate::auth::{Authorizer, RosterAuthorizer};
use crate::clock::{Clock, SystemClock};
use crate::config::GovernanceConfig;
use crate::custody::{AssetCustody, InMemoryCustody};
use crate::deposit::DepositLedger;
use crate::engine::{SharedEngine, VotingEngine};
use crate::error::{GovernanceError, Result};
use crate::listener::SharedListener;
use crate::poll::{CloseReason, NewPoll, Poll};

pub struct Governance<C = InMemoryCustody, A = RosterAuthorizer, K = SystemClock> {
    deposits: DepositLedger<C>,
    engine: SharedEngine,
    auth: A,
    clock: K,
}

impl<C: AssetCustody, A: Authorizer, K: Clock> Governance<C, A, K> {
    pub fn new(config: GovernanceConfig, custody: C, auth: A, clock: K) -> Result<Self> {
        config.validate()?;

        let engine = VotingEngine::new(config.vote_limit_ceiling, config.strict_consistency).into_shared();
        let mut deposits = DepositLedger::new(custody);
        deposits.register_listener(engine.clone());

        info!(
            vote_limit_ceiling = config.vote_limit_ceiling,
            strict = config.strict_consistency,
            "Governance engine initialized"
        );
        Ok(Self {
            deposits,
            engine,
            auth,
            clock,
        })
    }

    /// Subscribe an additional balance listener after the voting engine.
    pub fn register_listener(&mut self, listener: SharedListener) -> bool {
        self.deposits.register_listener(listener)
    }

    pub fn deposit(&mut self, member: Address, amount: Amount) -> Result<Amount> {
        let now = self.clock.now();
        self.deposits.deposit(member, amount, now)
    }

    pub fn withdraw(&mut self, member: Address, amount: Amount) -> Result<Amount> {
        let now = self.clock.now();
        self.deposits.withdraw(member, amount, now)
    }

    pub fn balance_of(&self, member: &Address) -> Amount {
        self.deposits.balance_of(member)
    }

    pub fn total_deposited(&self) -> Amount {
        self.deposits.total_deposited()
    }

    pub fn create_poll(&mut self, owner: Address, params: NewPoll) -> Result<PollId> {
        if !self.auth.can_create_poll(&owner) {
            return Err(GovernanceError::Unauthorized(format!(
                "{:#x} may not create polls",
                owner
            )));
        }
        self.engine.lock().atomically(|e| e.create_poll(owner, params))
    }

    pub fn activate_poll(&mut self, poll_id: PollId, caller: Address) -> Result<()> {
        let is_admin = self.auth.is_admin(&caller);
        let now = self.clock.now();
        let mut engine = self.engine.lock();
        // An expired poll is closed even though the activation fails.
        engine.settle_deadline(poll_id, now)?;
        engine.atomically(|e| e.activate_poll(poll_id, &caller, is_admin, now))
    }

    /// Attach a content hash. Non-owners are ignored and get `Ok(false)`.
    pub fn add_content_hash(&mut self, poll_id: PollId, caller: Address, hash: ContentHash) -> Result<bool> {
        self.engine
            .lock()
            .atomically(|e| e.add_content_hash(poll_id, &caller, hash))
    }

    /// Vote with the member's whole current deposit balance.
    ///
    /// Returns the chosen option's new tally.
    pub fn cast_vote(&mut self, poll_id: PollId, member: Address, option: usize) -> Result<Amount> {
        let weight = self.deposits.balance_of(&member);
        let now = self.clock.now();
        let mut engine = self.engine.lock();
        engine.settle_deadline(poll_id, now)?;
        engine.atomically(|e| e.cast_vote(poll_id, member, option, weight, now))
    }

    /// Close a poll.
    ///
    /// `AdminForced` requires an administrator. `DeadlinePassed` only closes
    /// a poll whose deadline really has passed. `VoteLimitReached` happens
    /// on its own and cannot be requested.
    pub fn close_poll(&mut self, poll_id: PollId, caller: Address, reason: CloseReason) -> Result<bool> {
        let now = self.clock.now();
        match reason {
            CloseReason::AdminForced => {
                if !self.auth.is_admin(&caller) {
                    return Err(GovernanceError::Unauthorized(
                        "Only an administrator can end a poll".to_string(),
                    ));
                }
                self.engine
                    .lock()
                    .atomically(|e| e.close_poll(poll_id, CloseReason::AdminForced))
            }
            CloseReason::DeadlinePassed => self
                .engine
                .lock()
                .atomically(|e| e.settle_deadline(poll_id, now)),
            CloseReason::VoteLimitReached => Err(GovernanceError::InvalidParameter(
                "vote limit closure is automatic".to_string(),
            )),
        }
    }

    /// Close every poll whose deadline has passed.
    pub fn close_expired(&mut self) -> Result<Vec<PollId>> {
        let now = self.clock.now();
        self.engine.lock().atomically(|e| e.close_expired(now))
    }

    pub fn tallies_for_poll(&self, poll_id: PollId) -> Result<Vec<Amount>> {
        Ok(self.engine.lock().tallies(poll_id)?.to_vec())
    }

    pub fn polls_member_participates_in(&self, member: &Address) -> Vec<PollId> {
        self.engine.lock().participation(member).to_vec()
    }

    pub fn chosen_option(&self, poll_id: PollId, member: &Address) -> Option<usize> {
        self.engine.lock().chosen_option(poll_id, member)
    }

    pub fn poll_by_id(&self, poll_id: PollId) -> Result<Poll> {
        self.engine.lock().poll(poll_id).cloned()
    }

    pub fn poll_count(&self) -> u64 {
        self.engine.lock().poll_count()
    }

    pub fn titles_of_all_polls(&self) -> Vec<Label> {
        self.engine.lock().titles()
    }

    pub fn options_of_poll(&self, poll_id: PollId) -> Result<Vec<Label>> {
        Ok(self.engine.lock().options(poll_id)?.to_vec())
    }

    pub fn content_hashes_of_poll(&self, poll_id: PollId) -> Result<Vec<ContentHash>> {
        Ok(self.engine.lock().content_hashes(poll_id)?.to_vec())
    }

    pub fn polls_by_owner(&self, owner: &Address) -> Vec<PollId> {
        self.engine
            .lock()
            .polls_by_owner(owner)
            .into_iter()
            .map(|p| p.id)
            .collect()
    }

    /// Tally underflows clamped so far. Always zero in strict mode.
    pub fn clamp_count(&self) -> u64 {
        self.engine.lock().clamp_count()
    }

    /// Direct read access to the engine. Do not hold the guard across a
    /// deposit or withdrawal: the ledger locks the engine to notify it.
    pub fn engine(&self) -> MutexGuard<'_, VotingEngine> {
        self.engine.lock()
    }

    pub fn deposits(&self) -> &DepositLedger<C> {
        &self.deposits
    }

    pub fn custody_mut(&mut self) -> &mut C {
        self.deposits.custody_mut()
    }
}
