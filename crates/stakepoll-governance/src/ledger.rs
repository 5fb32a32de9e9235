//! Vote records, option tallies and participation sets.
//!
//! A member's weight in a poll equals their deposit balance at the last
//! adjustment. The ledger keeps, for every open poll,
//! `sum(tallies) == sum(record weights)`, and for every member the ordered
//! set of polls where that weight is still live.

use std::collections::HashMap;

use stakepoll_types::{Address, Amount, PollId};
use tracing::{debug, warn};

use crate::error::{GovernanceError, Result};
use crate::poll::Poll;
use crate::unit_of_work::{Journal, Transactional};

/// One member's vote on one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteRecord {
    /// 1-based option number.
    pub option: usize,
    /// Weight currently counted in the option's tally.
    pub weight: Amount,
}

/// Result of a weight adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Nothing to do: no record, or the poll is closed.
    Skipped,
    /// Tally of `option` is now `tally`.
    Applied { option: usize, tally: Amount },
}

#[derive(Debug)]
enum LedgerUndo {
    PollOpened(PollId),
    TallyChanged { poll: PollId, index: usize, previous: Amount },
    TalliesReset { poll: PollId, previous: Vec<Amount> },
    RecordInserted { poll: PollId, member: Address },
    WeightChanged { poll: PollId, member: Address, previous: Amount },
    Joined { member: Address },
    Left { member: Address, poll: PollId, position: usize },
    Clamped,
}

#[derive(Debug)]
pub struct VoteLedger {
    records: HashMap<(PollId, Address), VoteRecord>,
    /// Voters per poll, in voting order.
    voters: HashMap<PollId, Vec<Address>>,
    tallies: HashMap<PollId, Vec<Amount>>,
    /// Per member, polls with live weight, in joining order.
    participation: HashMap<Address, Vec<PollId>>,
    strict: bool,
    clamp_count: u64,
    journal: Journal<LedgerUndo>,
}

impl VoteLedger {
    /// `strict` turns a tally underflow into `ConsistencyViolation`;
    /// otherwise the tally is clamped at zero and counted.
    pub fn new(strict: bool) -> Self {
        Self {
            records: HashMap::new(),
            voters: HashMap::new(),
            tallies: HashMap::new(),
            participation: HashMap::new(),
            strict,
            clamp_count: 0,
            journal: Journal::new(),
        }
    }

    /// Allocate zeroed tallies for a new poll.
    pub fn open_poll(&mut self, poll_id: PollId, options: usize) {
        self.tallies.insert(poll_id, vec![0; options]);
        self.journal.record(LedgerUndo::PollOpened(poll_id));
    }

    /// Record `member`'s vote for the 1-based `option` with `weight`.
    ///
    /// Returns the option's new tally.
    ///
    /// # Errors
    /// - `PollNotActive`, `PollNotOpen` if the poll does not accept votes
    /// - `OptionOutOfRange` for option 0 or past the last option
    /// - `AlreadyVoted` if the member already holds a record on the poll
    /// - `NoVotingPower` with zero weight
    /// - `VoteLimitExceeded` if the tally would pass the poll's limit
    pub fn cast_vote(&mut self, poll: &Poll, member: Address, option: usize, weight: Amount) -> Result<Amount> {
        if !poll.active {
            return Err(GovernanceError::PollNotActive(poll.id));
        }
        if !poll.open {
            return Err(GovernanceError::PollNotOpen(poll.id));
        }
        if option == 0 || option > poll.option_count() {
            return Err(GovernanceError::OptionOutOfRange {
                option,
                options: poll.option_count(),
            });
        }
        if self.records.contains_key(&(poll.id, member)) {
            return Err(GovernanceError::AlreadyVoted(poll.id));
        }
        if weight == 0 {
            return Err(GovernanceError::NoVotingPower);
        }

        let index = option - 1;
        let previous = self.tally_slot(poll.id, index)?;
        let tally = previous
            .checked_add(weight)
            .filter(|t| *t <= poll.vote_limit)
            .ok_or(GovernanceError::VoteLimitExceeded {
                attempted: previous.saturating_add(weight),
                limit: poll.vote_limit,
            })?;

        self.set_tally(poll.id, index, tally);
        self.records.insert((poll.id, member), VoteRecord { option, weight });
        self.voters.entry(poll.id).or_default().push(member);
        self.journal.record(LedgerUndo::RecordInserted { poll: poll.id, member });
        self.join(member, poll.id);

        debug!(poll = poll.id, member = %member, option, weight, tally, "Vote recorded");
        Ok(tally)
    }

    /// Move `member`'s counted weight on `poll` to `new_balance`.
    ///
    /// At zero balance the poll leaves the member's participation set; the
    /// option choice stays on record.
    pub fn adjust_weight(&mut self, poll: &Poll, member: Address, new_balance: Amount) -> Result<Adjustment> {
        if !poll.open {
            return Ok(Adjustment::Skipped);
        }
        let Some(record) = self.records.get(&(poll.id, member)).copied() else {
            return Ok(Adjustment::Skipped);
        };

        let index = record.option - 1;
        let current = self.tally_slot(poll.id, index)?;
        let tally = if new_balance >= record.weight {
            current
                .checked_add(new_balance - record.weight)
                .ok_or(GovernanceError::BalanceOverflow)?
        } else {
            let retract = record.weight - new_balance;
            match current.checked_sub(retract) {
                Some(t) => t,
                None if self.strict => {
                    return Err(GovernanceError::ConsistencyViolation(format!(
                        "tally {} of poll {} option {} cannot retract {}",
                        current, poll.id, record.option, retract
                    )));
                }
                None => {
                    warn!(poll = poll.id, member = %member, current, retract, "Tally underflow clamped");
                    self.clamp_count += 1;
                    self.journal.record(LedgerUndo::Clamped);
                    0
                }
            }
        };

        self.set_tally(poll.id, index, tally);
        if let Some(r) = self.records.get_mut(&(poll.id, member)) {
            r.weight = new_balance;
        }
        self.journal.record(LedgerUndo::WeightChanged {
            poll: poll.id,
            member,
            previous: record.weight,
        });
        if new_balance == 0 {
            self.leave(member, poll.id);
        }

        debug!(poll = poll.id, member = %member, new_balance, tally, "Weight adjusted");
        Ok(Adjustment::Applied { option: record.option, tally })
    }

    /// Drop a closed poll from every participant's set, zeroing its tallies
    /// when `reset_tallies` is set.
    pub fn settle_closed(&mut self, poll_id: PollId, reset_tallies: bool) {
        let voters = self.voters.get(&poll_id).cloned().unwrap_or_default();
        for member in voters {
            self.leave(member, poll_id);
        }

        if reset_tallies {
            if let Some(tallies) = self.tallies.get_mut(&poll_id) {
                let previous = std::mem::replace(tallies, vec![0; tallies.len()]);
                self.journal.record(LedgerUndo::TalliesReset { poll: poll_id, previous });
            }
        }
    }

    pub fn tallies(&self, poll_id: PollId) -> Option<&[Amount]> {
        self.tallies.get(&poll_id).map(Vec::as_slice)
    }

    /// Polls where `member` has live weight, in joining order.
    pub fn participation(&self, member: &Address) -> &[PollId] {
        self.participation.get(member).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn chosen_option(&self, poll_id: PollId, member: &Address) -> Option<usize> {
        self.record(poll_id, member).map(|r| r.option)
    }

    pub fn record(&self, poll_id: PollId, member: &Address) -> Option<&VoteRecord> {
        self.records.get(&(poll_id, *member))
    }

    /// Sum of record weights on a poll.
    pub fn total_weight(&self, poll_id: PollId) -> Amount {
        self.voters
            .get(&poll_id)
            .into_iter()
            .flatten()
            .filter_map(|m| self.records.get(&(poll_id, *m)))
            .map(|r| r.weight)
            .sum()
    }

    /// Number of tally underflows clamped in lenient mode.
    pub fn clamp_count(&self) -> u64 {
        self.clamp_count
    }

    fn tally_slot(&self, poll_id: PollId, index: usize) -> Result<Amount> {
        self.tallies
            .get(&poll_id)
            .and_then(|t| t.get(index))
            .copied()
            .ok_or_else(|| GovernanceError::ConsistencyViolation(format!("no tally for poll {}", poll_id)))
    }

    fn set_tally(&mut self, poll_id: PollId, index: usize, value: Amount) {
        if let Some(slot) = self.tallies.get_mut(&poll_id).and_then(|t| t.get_mut(index)) {
            let previous = std::mem::replace(slot, value);
            self.journal.record(LedgerUndo::TallyChanged { poll: poll_id, index, previous });
        }
    }

    fn join(&mut self, member: Address, poll_id: PollId) {
        let polls = self.participation.entry(member).or_default();
        if !polls.contains(&poll_id) {
            polls.push(poll_id);
            self.journal.record(LedgerUndo::Joined { member });
        }
    }

    fn leave(&mut self, member: Address, poll_id: PollId) {
        if let Some(polls) = self.participation.get_mut(&member) {
            if let Some(position) = polls.iter().position(|p| *p == poll_id) {
                polls.remove(position);
                self.journal.record(LedgerUndo::Left { member, poll: poll_id, position });
            }
        }
    }
}

impl Transactional for VoteLedger {
    fn begin(&mut self) {
        self.journal.begin();
    }

    fn commit(&mut self) {
        self.journal.commit();
    }

    fn rollback(&mut self) {
        for undo in self.journal.drain_for_rollback() {
            match undo {
                LedgerUndo::PollOpened(poll) => {
                    self.tallies.remove(&poll);
                }
                LedgerUndo::TallyChanged { poll, index, previous } => {
                    if let Some(slot) = self.tallies.get_mut(&poll).and_then(|t| t.get_mut(index)) {
                        *slot = previous;
                    }
                }
                LedgerUndo::TalliesReset { poll, previous } => {
                    self.tallies.insert(poll, previous);
                }
                LedgerUndo::RecordInserted { poll, member } => {
                    self.records.remove(&(poll, member));
                    if let Some(voters) = self.voters.get_mut(&poll) {
                        voters.pop();
                    }
                }
                LedgerUndo::WeightChanged { poll, member, previous } => {
                    if let Some(record) = self.records.get_mut(&(poll, member)) {
                        record.weight = previous;
                    }
                }
                LedgerUndo::Joined { member } => {
                    if let Some(polls) = self.participation.get_mut(&member) {
                        polls.pop();
                    }
                }
                LedgerUndo::Left { member, poll, position } => {
                    self.participation.entry(member).or_default().insert(position, poll);
                }
                LedgerUndo::Clamped => {
                    self.clamp_count -= 1;
                }
            }
        }
    }
}
