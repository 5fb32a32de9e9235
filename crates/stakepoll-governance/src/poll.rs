//! Poll lifecycle management.
//!
//! Polls go through states: Created -> Active -> Closed.
//! A poll is created inactive and open, is activated exactly once by its
//! owner (or an administrator), and closes for good when its deadline
//! passes, an administrator ends it, or an option reaches the vote limit.

use serde::{Deserialize, Serialize};
use stakepoll_types::{Address, Amount, ContentHash, Label, PollId};
use tracing::info;

use crate::error::{GovernanceError, Result};
use crate::unit_of_work::{Journal, Transactional};

/// Minimum number of options a poll must offer.
pub const MIN_OPTIONS: usize = 2;

/// Why a poll stopped accepting votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The deadline was observed to have passed.
    DeadlinePassed,
    /// An administrator ended the poll.
    AdminForced,
    /// An option reached the poll's vote limit. A balance increase can
    /// carry the frozen tally past it.
    VoteLimitReached,
}

impl CloseReason {
    /// Whether closing for this reason zeroes the option tallies.
    ///
    /// A poll decided by reaching its vote limit keeps its result.
    pub fn resets_tallies(&self) -> bool {
        matches!(self, CloseReason::DeadlinePassed | CloseReason::AdminForced)
    }
}

/// Poll status in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// Created, not yet accepting votes
    Created,
    /// Activated and open
    Active,
    /// Terminal
    Closed(CloseReason),
}

/// Parameters for a new poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPoll {
    pub title: Label,
    pub description: Label,
    pub options: Vec<Label>,
    /// Maximum weight a single option may accumulate.
    pub vote_limit: Amount,
    /// Stored and reported, not interpreted by the engine.
    pub quorum: u32,
    /// Unix time after which the poll is closed.
    pub deadline: u64,
}

/// A ballot with two or more options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub owner: Address,
    pub title: Label,
    pub description: Label,
    pub options: Vec<Label>,
    pub vote_limit: Amount,
    pub quorum: u32,
    pub deadline: u64,
    pub active: bool,
    pub open: bool,
    pub closed_by: Option<CloseReason>,
    pub content_hashes: Vec<ContentHash>,
}

impl Poll {
    pub fn status(&self) -> PollStatus {
        match (self.open, self.active, self.closed_by) {
            (false, _, Some(reason)) => PollStatus::Closed(reason),
            (false, _, None) => PollStatus::Closed(CloseReason::AdminForced),
            (true, true, _) => PollStatus::Active,
            (true, false, _) => PollStatus::Created,
        }
    }

    /// Votes are still accepted at the deadline instant itself.
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.deadline
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub fn is_owner(&self, who: &Address) -> bool {
        &self.owner == who
    }
}

#[derive(Debug)]
enum RegistryUndo {
    Created,
    Activated(PollId),
    Closed(PollId),
    HashAppended(PollId),
}

/// Arena of polls keyed by sequential id. Polls are never removed.
#[derive(Debug)]
pub struct PollRegistry {
    polls: Vec<Poll>,
    vote_limit_ceiling: Amount,
    journal: Journal<RegistryUndo>,
}

impl PollRegistry {
    pub fn new(vote_limit_ceiling: Amount) -> Self {
        Self {
            polls: Vec::new(),
            vote_limit_ceiling,
            journal: Journal::new(),
        }
    }

    /// Create a poll owned by `owner`.
    ///
    /// # Errors
    /// - `VoteLimitExceeded` if the vote limit is above the ceiling
    /// - `TooFewOptions` with fewer than two options
    ///
    /// No id is consumed by a rejected poll.
    pub fn create(&mut self, owner: Address, params: NewPoll) -> Result<PollId> {
        if params.vote_limit > self.vote_limit_ceiling {
            return Err(GovernanceError::VoteLimitExceeded {
                attempted: params.vote_limit,
                limit: self.vote_limit_ceiling,
            });
        }
        if params.options.len() < MIN_OPTIONS {
            return Err(GovernanceError::TooFewOptions(params.options.len()));
        }

        let id = self.polls.len() as PollId;
        self.polls.push(Poll {
            id,
            owner,
            title: params.title,
            description: params.description,
            options: params.options,
            vote_limit: params.vote_limit,
            quorum: params.quorum,
            deadline: params.deadline,
            active: false,
            open: true,
            closed_by: None,
            content_hashes: Vec::new(),
        });
        self.journal.record(RegistryUndo::Created);

        info!(poll = id, owner = %owner, "Poll created");
        Ok(id)
    }

    /// Activate a poll. Only the owner or an administrator may do so.
    pub fn activate(&mut self, poll_id: PollId, caller: &Address, caller_is_admin: bool) -> Result<()> {
        let poll = self.get_mut(poll_id)?;
        if !poll.is_owner(caller) && !caller_is_admin {
            return Err(GovernanceError::Unauthorized(
                "Only the poll owner can activate".to_string(),
            ));
        }
        if poll.active {
            return Err(GovernanceError::AlreadyActive(poll_id));
        }
        if !poll.open {
            return Err(GovernanceError::PollNotOpen(poll_id));
        }

        poll.active = true;
        self.journal.record(RegistryUndo::Activated(poll_id));
        info!(poll = poll_id, "Poll activated");
        Ok(())
    }

    /// Append a content hash. Calls from anyone but the owner are ignored.
    ///
    /// Returns whether the hash was appended.
    pub fn add_content_hash(&mut self, poll_id: PollId, caller: &Address, hash: ContentHash) -> Result<bool> {
        let poll = self.get_mut(poll_id)?;
        if !poll.is_owner(caller) {
            return Ok(false);
        }
        poll.content_hashes.push(hash);
        self.journal.record(RegistryUndo::HashAppended(poll_id));
        Ok(true)
    }

    /// Mark a poll closed. Idempotent.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn mark_closed(&mut self, poll_id: PollId, reason: CloseReason) -> Result<bool> {
        let poll = self.get_mut(poll_id)?;
        if !poll.open {
            return Ok(false);
        }
        poll.open = false;
        poll.closed_by = Some(reason);
        self.journal.record(RegistryUndo::Closed(poll_id));
        info!(poll = poll_id, ?reason, "Poll closed");
        Ok(true)
    }

    pub fn get(&self, poll_id: PollId) -> Result<&Poll> {
        self.polls
            .get(poll_id as usize)
            .ok_or(GovernanceError::PollNotFound(poll_id))
    }

    fn get_mut(&mut self, poll_id: PollId) -> Result<&mut Poll> {
        self.polls
            .get_mut(poll_id as usize)
            .ok_or(GovernanceError::PollNotFound(poll_id))
    }

    pub fn count(&self) -> u64 {
        self.polls.len() as u64
    }

    /// Titles in creation order.
    pub fn titles(&self) -> Vec<Label> {
        self.polls.iter().map(|p| p.title).collect()
    }

    pub fn options(&self, poll_id: PollId) -> Result<&[Label]> {
        Ok(&self.get(poll_id)?.options)
    }

    pub fn content_hashes(&self, poll_id: PollId) -> Result<&[ContentHash]> {
        Ok(&self.get(poll_id)?.content_hashes)
    }

    pub fn by_owner(&self, owner: &Address) -> Vec<&Poll> {
        self.polls.iter().filter(|p| p.is_owner(owner)).collect()
    }

    /// Open polls whose deadline has passed at `now`.
    pub fn expired_open(&self, now: u64) -> Vec<PollId> {
        self.polls
            .iter()
            .filter(|p| p.open && p.is_expired(now))
            .map(|p| p.id)
            .collect()
    }
}

impl Transactional for PollRegistry {
    fn begin(&mut self) {
        self.journal.begin();
    }

    fn commit(&mut self) {
        self.journal.commit();
    }

    fn rollback(&mut self) {
        for undo in self.journal.drain_for_rollback() {
            match undo {
                RegistryUndo::Created => {
                    self.polls.pop();
                }
                RegistryUndo::Activated(id) => {
                    if let Some(poll) = self.polls.get_mut(id as usize) {
                        poll.active = false;
                    }
                }
                RegistryUndo::Closed(id) => {
                    if let Some(poll) = self.polls.get_mut(id as usize) {
                        poll.open = true;
                        poll.closed_by = None;
                    }
                }
                RegistryUndo::HashAppended(id) => {
                    if let Some(poll) = self.polls.get_mut(id as usize) {
                        poll.content_hashes.pop();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::from_bytes([1u8; 20])
    }

    fn params(vote_limit: Amount) -> NewPoll {
        NewPoll {
            title: Label::new("New Poll").unwrap(),
            description: Label::new("New Description").unwrap(),
            options: vec![Label::new("1").unwrap(), Label::new("2").unwrap()],
            vote_limit,
            quorum: 2,
            deadline: 10_000,
        }
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let mut registry = PollRegistry::new(35_000);
        assert_eq!(registry.create(owner(), params(150)).unwrap(), 0);
        assert_eq!(registry.create(owner(), params(75)).unwrap(), 1);
        assert_eq!(registry.count(), 2);

        let poll = registry.get(0).unwrap();
        assert!(!poll.active);
        assert!(poll.open);
        assert_eq!(poll.status(), PollStatus::Created);
    }

    #[test]
    fn test_vote_limit_ceiling() {
        let mut registry = PollRegistry::new(35_000);
        assert_eq!(
            registry.create(owner(), params(35_001)),
            Err(GovernanceError::VoteLimitExceeded { attempted: 35_001, limit: 35_000 })
        );
        assert_eq!(registry.count(), 0);
        assert!(registry.create(owner(), params(35_000)).is_ok());
    }

    #[test]
    fn test_too_few_options() {
        let mut registry = PollRegistry::new(35_000);
        let mut p = params(10);
        p.options.truncate(1);
        assert_eq!(registry.create(owner(), p), Err(GovernanceError::TooFewOptions(1)));
    }

    #[test]
    fn test_activate_rules() {
        let mut registry = PollRegistry::new(35_000);
        let id = registry.create(owner(), params(150)).unwrap();
        let stranger = Address::from_bytes([9u8; 20]);

        assert!(matches!(
            registry.activate(id, &stranger, false),
            Err(GovernanceError::Unauthorized(_))
        ));
        registry.activate(id, &owner(), false).unwrap();
        assert_eq!(registry.get(id).unwrap().status(), PollStatus::Active);
        assert_eq!(registry.activate(id, &owner(), false), Err(GovernanceError::AlreadyActive(id)));

        let other = registry.create(owner(), params(150)).unwrap();
        registry.activate(other, &stranger, true).unwrap();
    }

    #[test]
    fn test_content_hash_owner_only() {
        let mut registry = PollRegistry::new(35_000);
        let id = registry.create(owner(), params(150)).unwrap();
        let hash = ContentHash::digest(b"1234567890");

        assert!(!registry.add_content_hash(id, &Address::from_bytes([2u8; 20]), hash).unwrap());
        assert!(registry.content_hashes(id).unwrap().is_empty());

        assert!(registry.add_content_hash(id, &owner(), hash).unwrap());
        assert_eq!(registry.content_hashes(id).unwrap(), &[hash]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut registry = PollRegistry::new(35_000);
        let id = registry.create(owner(), params(150)).unwrap();
        assert!(registry.mark_closed(id, CloseReason::AdminForced).unwrap());
        assert!(!registry.mark_closed(id, CloseReason::DeadlinePassed).unwrap());
        assert_eq!(
            registry.get(id).unwrap().status(),
            PollStatus::Closed(CloseReason::AdminForced)
        );
    }

    #[test]
    fn test_rollback_restores_registry() {
        let mut registry = PollRegistry::new(35_000);
        let id = registry.create(owner(), params(150)).unwrap();

        registry.begin();
        registry.activate(id, &owner(), false).unwrap();
        registry.mark_closed(id, CloseReason::VoteLimitReached).unwrap();
        registry.create(owner(), params(10)).unwrap();
        registry.rollback();

        let poll = registry.get(id).unwrap();
        assert!(!poll.active);
        assert!(poll.open);
        assert_eq!(poll.closed_by, None);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_unknown_poll() {
        let registry = PollRegistry::new(35_000);
        assert_eq!(registry.get(7).unwrap_err(), GovernanceError::PollNotFound(7));
    }
}
