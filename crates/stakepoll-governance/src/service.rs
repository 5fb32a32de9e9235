//! Thread-safe handle for hosts that serve concurrent requests.
//!
//! All operations are serialized through one lock, so two requests touching
//! the same member or poll can never interleave.

use std::sync::Arc;

use parking_lot::Mutex;
use stakepoll_types::{Address, Amount, PollId};

use crate::auth::Authorizer;
use crate::clock::Clock;
use crate::custody::AssetCustody;
use crate::error::Result;
use crate::governance::Governance;

pub struct GovernanceService<C, A, K> {
    inner: Arc<Mutex<Governance<C, A, K>>>,
}

impl<C, A, K> Clone for GovernanceService<C, A, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: AssetCustody, A: Authorizer, K: Clock> GovernanceService<C, A, K> {
    pub fn new(governance: Governance<C, A, K>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(governance)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<T>(&self, f: impl FnOnce(&mut Governance<C, A, K>) -> T) -> T {
        f(&mut self.inner.lock())
    }

    pub fn deposit(&self, member: Address, amount: Amount) -> Result<Amount> {
        self.inner.lock().deposit(member, amount)
    }

    pub fn withdraw(&self, member: Address, amount: Amount) -> Result<Amount> {
        self.inner.lock().withdraw(member, amount)
    }

    pub fn cast_vote(&self, poll_id: PollId, member: Address, option: usize) -> Result<Amount> {
        self.inner.lock().cast_vote(poll_id, member, option)
    }

    pub fn balance_of(&self, member: &Address) -> Amount {
        self.inner.lock().balance_of(member)
    }

    pub fn tallies_for_poll(&self, poll_id: PollId) -> Result<Vec<Amount>> {
        self.inner.lock().tallies_for_poll(poll_id)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use stakepoll_types::Label;

    use super::*;
    use crate::auth::RosterAuthorizer;
    use crate::clock::ManualClock;
    use crate::config::GovernanceConfig;
    use crate::custody::InMemoryCustody;
    use crate::poll::NewPoll;

    #[test]
    fn test_concurrent_members_keep_tallies_consistent() {
        let members: Vec<Address> = (1..=8u8).map(|n| Address::from_bytes([n; 20])).collect();
        let mut custody = InMemoryCustody::new();
        for m in &members {
            custody.fund(*m, 1_000).unwrap();
        }
        let gov = Governance::new(
            GovernanceConfig::default(),
            custody,
            RosterAuthorizer::open(),
            ManualClock::new(0),
        )
        .unwrap();
        let service = GovernanceService::new(gov);

        let poll = service
            .with(|g| {
                let id = g.create_poll(
                    members[0],
                    NewPoll {
                        title: Label::new("Load").unwrap(),
                        description: Label::EMPTY,
                        options: vec![Label::new("a").unwrap(), Label::new("b").unwrap()],
                        vote_limit: 35_000,
                        quorum: 1,
                        deadline: u64::MAX,
                    },
                )?;
                g.activate_poll(id, members[0])?;
                Ok::<_, crate::GovernanceError>(id)
            })
            .unwrap();

        let handles: Vec<_> = members
            .iter()
            .enumerate()
            .map(|(i, member)| {
                let service = service.clone();
                let member = *member;
                thread::spawn(move || {
                    service.deposit(member, 10).unwrap();
                    service.cast_vote(poll, member, 1 + i % 2).unwrap();
                    for _ in 0..20 {
                        service.deposit(member, 5).unwrap();
                        service.withdraw(member, 3).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let tallies = service.tallies_for_poll(poll).unwrap();
        let expected_each = 10 + 20 * 2;
        assert_eq!(tallies.iter().sum::<Amount>(), expected_each * members.len() as Amount);
        for member in &members {
            assert_eq!(service.balance_of(member), expected_each);
        }
    }
}
