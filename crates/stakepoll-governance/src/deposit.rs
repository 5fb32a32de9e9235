//! Custodial share ledger.
//!
//! Tracks each member's deposited shares and tells every listener about
//! every balance change before the change becomes visible. Listener
//! notification, the custody transfer and the balance update commit
//! together or not at all.

use std::collections::HashMap;

use stakepoll_types::{Address, Amount};
use tracing::{debug, info};

use crate::custody::AssetCustody;
use crate::error::{GovernanceError, Result};
use crate::listener::{BalanceChange, ListenerRegistry, SharedListener};
use crate::unit_of_work::UnitOfWork;

#[derive(Debug)]
pub struct DepositLedger<C> {
    balances: HashMap<Address, Amount>,
    total: Amount,
    listeners: ListenerRegistry,
    custody: C,
}

impl<C: AssetCustody> DepositLedger<C> {
    pub fn new(custody: C) -> Self {
        Self {
            balances: HashMap::new(),
            total: 0,
            listeners: ListenerRegistry::new(),
            custody,
        }
    }

    /// Subscribe to balance changes. Duplicate registrations are ignored.
    pub fn register_listener(&mut self, listener: SharedListener) -> bool {
        self.listeners.register(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deposit `amount` shares for `member`.
    ///
    /// Returns the new balance.
    pub fn deposit(&mut self, member: Address, amount: Amount, timestamp: u64) -> Result<Amount> {
        if amount == 0 {
            return Err(GovernanceError::InvalidAmount);
        }
        let previous = self.balance_of(&member);
        let current = previous
            .checked_add(amount)
            .ok_or(GovernanceError::BalanceOverflow)?;
        self.total
            .checked_add(amount)
            .ok_or(GovernanceError::BalanceOverflow)?;

        let change = BalanceChange { member, previous, current, timestamp };
        self.apply(change, |custody| custody.transfer_in(&member, amount))?;

        info!(member = %member, amount, balance = current, "Shares deposited");
        Ok(current)
    }

    /// Withdraw `amount` shares for `member`.
    ///
    /// # Errors
    /// - `InsufficientBalance` if `amount` exceeds the balance
    pub fn withdraw(&mut self, member: Address, amount: Amount, timestamp: u64) -> Result<Amount> {
        if amount == 0 {
            return Err(GovernanceError::InvalidAmount);
        }
        let previous = self.balance_of(&member);
        let current = previous
            .checked_sub(amount)
            .ok_or(GovernanceError::InsufficientBalance {
                requested: amount,
                available: previous,
            })?;

        let change = BalanceChange { member, previous, current, timestamp };
        self.apply(change, |custody| custody.transfer_out(&member, amount))?;

        info!(member = %member, amount, balance = current, "Shares withdrawn");
        Ok(current)
    }

    pub fn balance_of(&self, member: &Address) -> Amount {
        self.balances.get(member).copied().unwrap_or(0)
    }

    pub fn total_deposited(&self) -> Amount {
        self.total
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    /// Notify listeners, move the asset, then record the balance.
    ///
    /// Any error drops the unit of work before commit, which rolls back
    /// every listener; the balance is only written once nothing can fail.
    fn apply<F>(&mut self, change: BalanceChange, transfer: F) -> Result<()>
    where
        F: FnOnce(&mut C) -> Result<()>,
    {
        let unit = UnitOfWork::begin(self.listeners.handles());
        self.listeners.notify_all(&change)?;
        transfer(&mut self.custody)?;

        if change.current == 0 {
            self.balances.remove(&change.member);
        } else {
            self.balances.insert(change.member, change.current);
        }
        self.total = self.total - change.previous + change.current;
        unit.commit();

        debug!(member = %change.member, previous = change.previous, current = change.current, "Balance committed");
        Ok(())
    }
}
