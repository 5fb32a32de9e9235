//! Authorization boundary.
//!
//! Callers are authenticated upstream; this predicate only decides what an
//! identity may do.

use std::collections::HashSet;

use stakepoll_types::Address;

pub trait Authorizer: Send {
    /// Privileged administrator: may force-close any poll and activate
    /// polls it does not own.
    fn is_admin(&self, who: &Address) -> bool;

    /// May create polls.
    fn can_create_poll(&self, who: &Address) -> bool;
}

/// Set-based roster of administrators and poll creators.
#[derive(Debug, Clone, Default)]
pub struct RosterAuthorizer {
    admins: HashSet<Address>,
    /// `None` lets anyone create polls.
    creators: Option<HashSet<Address>>,
}

impl RosterAuthorizer {
    /// No administrators, anyone may create polls.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn with_admin(mut self, admin: Address) -> Self {
        self.admins.insert(admin);
        self
    }

    /// Restrict poll creation to the listed creators (administrators are
    /// always allowed).
    pub fn with_creator(mut self, creator: Address) -> Self {
        self.creators.get_or_insert_with(HashSet::new).insert(creator);
        self
    }
}

impl Authorizer for RosterAuthorizer {
    fn is_admin(&self, who: &Address) -> bool {
        self.admins.contains(who)
    }

    fn can_create_poll(&self, who: &Address) -> bool {
        match &self.creators {
            None => true,
            Some(creators) => creators.contains(who) || self.is_admin(who),
        }
    }
}
