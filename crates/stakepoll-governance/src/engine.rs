//! Voting engine: polls plus vote ledger, kept live against deposit balances.
//!
//! The engine is the deposit ledger's balance listener. On every balance
//! change it walks the member's participation set and moves their counted
//! weight in each poll to the new balance.

use std::sync::Arc;

use parking_lot::Mutex;
use stakepoll_types::{Address, Amount, ContentHash, Label, PollId};
use tracing::debug;

use crate::error::{GovernanceError, Result};
use crate::ledger::{Adjustment, VoteLedger};
use crate::listener::{BalanceChange, BalanceChangeListener};
use crate::poll::{CloseReason, NewPoll, Poll, PollRegistry};
use crate::unit_of_work::Transactional;

pub type SharedEngine = Arc<Mutex<VotingEngine>>;

#[derive(Debug)]
pub struct VotingEngine {
    polls: PollRegistry,
    ledger: VoteLedger,
}

impl VotingEngine {
    pub fn new(vote_limit_ceiling: Amount, strict_consistency: bool) -> Self {
        Self {
            polls: PollRegistry::new(vote_limit_ceiling),
            ledger: VoteLedger::new(strict_consistency),
        }
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn create_poll(&mut self, owner: Address, params: NewPoll) -> Result<PollId> {
        let id = self.polls.create(owner, params)?;
        let options = self.polls.get(id)?.option_count();
        self.ledger.open_poll(id, options);
        Ok(id)
    }

    /// Activate a poll, unless its deadline has already passed at `now`.
    pub fn activate_poll(&mut self, poll_id: PollId, caller: &Address, caller_is_admin: bool, now: u64) -> Result<()> {
        self.settle_deadline(poll_id, now)?;
        self.polls.activate(poll_id, caller, caller_is_admin)
    }

    pub fn add_content_hash(&mut self, poll_id: PollId, caller: &Address, hash: ContentHash) -> Result<bool> {
        self.polls.add_content_hash(poll_id, caller, hash)
    }

    /// Cast `weight` for the 1-based `option`.
    ///
    /// A vote that brings the option exactly to the vote limit decides the
    /// poll: it closes with [`CloseReason::VoteLimitReached`].
    pub fn cast_vote(&mut self, poll_id: PollId, member: Address, option: usize, weight: Amount, now: u64) -> Result<Amount> {
        self.settle_deadline(poll_id, now)?;
        let poll = self.polls.get(poll_id)?;
        let tally = self.ledger.cast_vote(poll, member, option, weight)?;
        if tally >= poll.vote_limit {
            self.close_poll(poll_id, CloseReason::VoteLimitReached)?;
        }
        Ok(tally)
    }

    /// Close a poll. Idempotent: a second call changes nothing.
    ///
    /// Returns `true` if this call closed the poll.
    pub fn close_poll(&mut self, poll_id: PollId, reason: CloseReason) -> Result<bool> {
        if !self.polls.mark_closed(poll_id, reason)? {
            return Ok(false);
        }
        self.ledger.settle_closed(poll_id, reason.resets_tallies());
        Ok(true)
    }

    /// Close the poll if its deadline has passed at `now`.
    pub fn settle_deadline(&mut self, poll_id: PollId, now: u64) -> Result<bool> {
        let poll = self.polls.get(poll_id)?;
        if poll.open && poll.is_expired(now) {
            return self.close_poll(poll_id, CloseReason::DeadlinePassed);
        }
        Ok(false)
    }

    /// Close every open poll whose deadline has passed at `now`.
    pub fn close_expired(&mut self, now: u64) -> Result<Vec<PollId>> {
        let expired = self.polls.expired_open(now);
        for poll_id in &expired {
            self.close_poll(*poll_id, CloseReason::DeadlinePassed)?;
        }
        Ok(expired)
    }

    /// Run `f` as one unit: on error every change it made is undone.
    pub fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.begin();
        match f(self) {
            Ok(value) => {
                self.commit();
                Ok(value)
            }
            Err(e) => {
                self.rollback();
                Err(e)
            }
        }
    }

    pub fn poll(&self, poll_id: PollId) -> Result<&Poll> {
        self.polls.get(poll_id)
    }

    pub fn poll_count(&self) -> u64 {
        self.polls.count()
    }

    pub fn titles(&self) -> Vec<Label> {
        self.polls.titles()
    }

    pub fn options(&self, poll_id: PollId) -> Result<&[Label]> {
        self.polls.options(poll_id)
    }

    pub fn content_hashes(&self, poll_id: PollId) -> Result<&[ContentHash]> {
        self.polls.content_hashes(poll_id)
    }

    pub fn polls_by_owner(&self, owner: &Address) -> Vec<&Poll> {
        self.polls.by_owner(owner)
    }

    pub fn tallies(&self, poll_id: PollId) -> Result<&[Amount]> {
        self.polls.get(poll_id)?;
        self.ledger
            .tallies(poll_id)
            .ok_or_else(|| GovernanceError::ConsistencyViolation(format!("no tally for poll {}", poll_id)))
    }

    pub fn participation(&self, member: &Address) -> &[PollId] {
        self.ledger.participation(member)
    }

    pub fn chosen_option(&self, poll_id: PollId, member: &Address) -> Option<usize> {
        self.ledger.chosen_option(poll_id, member)
    }

    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    pub fn clamp_count(&self) -> u64 {
        self.ledger.clamp_count()
    }
}

impl Transactional for VotingEngine {
    fn begin(&mut self) {
        self.polls.begin();
        self.ledger.begin();
    }

    fn commit(&mut self) {
        self.polls.commit();
        self.ledger.commit();
    }

    fn rollback(&mut self) {
        self.ledger.rollback();
        self.polls.rollback();
    }
}

impl BalanceChangeListener for VotingEngine {
    fn on_balance_changed(&mut self, change: &BalanceChange) -> Result<()> {
        // Adjustments and closes remove entries while we walk.
        let polls = self.ledger.participation(&change.member).to_vec();
        for poll_id in polls {
            if self.settle_deadline(poll_id, change.timestamp)? {
                continue;
            }
            let poll = self.polls.get(poll_id)?;
            let vote_limit = poll.vote_limit;
            if let Adjustment::Applied { tally, .. } = self.ledger.adjust_weight(poll, change.member, change.current)? {
                if tally >= vote_limit {
                    self.close_poll(poll_id, CloseReason::VoteLimitReached)?;
                }
            }
        }
        debug!(member = %change.member, balance = change.current, "Balance change reconciled");
        Ok(())
    }
}
