//! Asset custody boundary.
//!
//! The share token itself lives outside the engine. The deposit ledger only
//! asks custody to move shares into or out of the pool, and updates its own
//! records once custody has agreed.

use std::collections::HashMap;

use stakepoll_types::{Address, Amount};

use crate::error::{GovernanceError, Result};

/// Moves the underlying fungible asset between a member and the pool.
pub trait AssetCustody: Send {
    /// Pull `amount` from the member's wallet into the pool.
    fn transfer_in(&mut self, member: &Address, amount: Amount) -> Result<()>;

    /// Pay `amount` from the pool back to the member's wallet.
    fn transfer_out(&mut self, member: &Address, amount: Amount) -> Result<()>;
}

/// In-memory token balances, for tests and script replay.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCustody {
    wallets: HashMap<Address, Amount>,
    pool: Amount,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a wallet outside of the pool (an external transfer).
    pub fn fund(&mut self, member: Address, amount: Amount) -> Result<()> {
        let wallet = self.wallets.entry(member).or_default();
        *wallet = wallet.checked_add(amount).ok_or(GovernanceError::BalanceOverflow)?;
        Ok(())
    }

    pub fn wallet_balance(&self, member: &Address) -> Amount {
        self.wallets.get(member).copied().unwrap_or(0)
    }

    /// Shares currently held by the pool.
    pub fn pool_balance(&self) -> Amount {
        self.pool
    }
}

impl AssetCustody for InMemoryCustody {
    fn transfer_in(&mut self, member: &Address, amount: Amount) -> Result<()> {
        let wallet = self.wallets.entry(*member).or_default();
        if *wallet < amount {
            return Err(GovernanceError::CustodyFailed(format!(
                "wallet {:#x} holds {}, cannot transfer {}",
                member, wallet, amount
            )));
        }
        let pool = self
            .pool
            .checked_add(amount)
            .ok_or_else(|| GovernanceError::CustodyFailed("pool balance overflow".to_string()))?;
        *wallet -= amount;
        self.pool = pool;
        Ok(())
    }

    fn transfer_out(&mut self, member: &Address, amount: Amount) -> Result<()> {
        if self.pool < amount {
            return Err(GovernanceError::CustodyFailed(format!(
                "pool holds {}, cannot pay out {}",
                self.pool, amount
            )));
        }
        let wallet = self.wallets.entry(*member).or_default();
        *wallet = wallet.checked_add(amount).ok_or_else(|| {
            GovernanceError::CustodyFailed(format!("wallet {:#x} cannot hold {} more", member, amount))
        })?;
        self.pool -= amount;
        Ok(())
    }
}
