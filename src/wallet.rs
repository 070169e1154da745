use std::collections::HashMap;

use crate::auth::ensure_owner;
use crate::decimal::Money;
use crate::errors::{ProtocolError, Result};
use crate::types::AccountId;

/// token balances held by participants outside the protocol ledgers
#[derive(Debug, Clone)]
pub struct WalletLedger {
    owner: AccountId,
    balances: HashMap<AccountId, Money>,
    total_supply: Money,
}

impl WalletLedger {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            balances: HashMap::new(),
            total_supply: Money::ZERO,
        }
    }

    pub fn balance(&self, account: &AccountId) -> Money {
        self.balances.get(account).copied().unwrap_or(Money::ZERO)
    }

    pub fn total_supply(&self) -> Money {
        self.total_supply
    }

    /// create new units for an account
    pub fn mint(&mut self, caller: &AccountId, to: &AccountId, amount: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "mint")?;
        let total = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| ProtocolError::overflow("wallet mint"))?;
        *self.balances.entry(to.clone()).or_default() += amount;
        self.total_supply = total;
        Ok(())
    }

    pub fn debit(&mut self, caller: &AccountId, from: &AccountId, amount: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "debit wallet")?;
        let available = self.balance(from);
        let remaining = available
            .checked_sub(amount)
            .ok_or_else(|| ProtocolError::InsufficientBalance {
                owner: from.clone(),
                available,
                requested: amount,
            })?;
        self.balances.insert(from.clone(), remaining);
        Ok(())
    }

    pub fn credit(&mut self, caller: &AccountId, to: &AccountId, amount: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "credit wallet")?;
        *self.balances.entry(to.clone()).or_default() += amount;
        Ok(())
    }

    pub(crate) fn restore_balance(&mut self, account: AccountId, balance: Money) {
        self.balances.insert(account, balance);
    }

    pub(crate) fn restore_supply(&mut self, total: Money) {
        self.total_supply = total;
    }
}
