use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::auth::ensure_owner;
use crate::decimal::Money;
use crate::errors::{ProtocolError, Result};
use crate::types::{AccountId, CollateralStatus};

/// custody record for one borrower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralRecord {
    pub amount: Money,
    pub locked_amount: Money,
    pub status: CollateralStatus,
}

impl CollateralRecord {
    fn new() -> Self {
        Self {
            amount: Money::ZERO,
            locked_amount: Money::ZERO,
            status: CollateralStatus::Active,
        }
    }

    /// balance not held by a lock
    pub fn available(&self) -> Money {
        self.amount - self.locked_amount
    }

    fn refresh_status(&mut self) {
        self.status = if self.locked_amount.is_positive() {
            CollateralStatus::Locked
        } else {
            CollateralStatus::Active
        };
    }
}

/// collateral custody, written only by its owner (seizure also by liquidators)
#[derive(Debug, Clone)]
pub struct CollateralLedger {
    owner: AccountId,
    liquidators: BTreeSet<AccountId>,
    records: HashMap<AccountId, CollateralRecord>,
    total_collateral: Money,
}

impl CollateralLedger {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            liquidators: BTreeSet::new(),
            records: HashMap::new(),
            total_collateral: Money::ZERO,
        }
    }

    pub fn record(&self, borrower: &AccountId) -> Option<&CollateralRecord> {
        self.records.get(borrower)
    }

    pub fn balance(&self, borrower: &AccountId) -> Money {
        self.records
            .get(borrower)
            .map(|r| r.amount)
            .unwrap_or(Money::ZERO)
    }

    pub fn total_collateral(&self) -> Money {
        self.total_collateral
    }

    pub fn set_liquidator(&mut self, caller: &AccountId, liquidator: AccountId, enabled: bool) -> Result<()> {
        ensure_owner(&self.owner, caller, "set collateral liquidator")?;
        if enabled {
            self.liquidators.insert(liquidator);
        } else {
            self.liquidators.remove(&liquidator);
        }
        Ok(())
    }

    pub fn deposit(&mut self, caller: &AccountId, borrower: &AccountId, amount: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "deposit collateral")?;
        require_positive(amount)?;

        let record = self.records.entry(borrower.clone()).or_insert_with(CollateralRecord::new);
        record.amount += amount;
        record.refresh_status();
        self.total_collateral += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, caller: &AccountId, borrower: &AccountId, amount: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "withdraw collateral")?;
        require_positive(amount)?;

        let record = self.record_mut(borrower)?;
        let available = record.available();
        if amount > available {
            return Err(ProtocolError::InsufficientCollateral {
                available,
                requested: amount,
            });
        }
        record.amount -= amount;
        record.refresh_status();
        self.total_collateral -= amount;
        Ok(())
    }

    pub fn lock(&mut self, caller: &AccountId, borrower: &AccountId, amount: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "lock collateral")?;
        require_positive(amount)?;

        let record = self.record_mut(borrower)?;
        let available = record.available();
        if amount > available {
            return Err(ProtocolError::InsufficientCollateral {
                available,
                requested: amount,
            });
        }
        record.locked_amount += amount;
        record.refresh_status();
        Ok(())
    }

    pub fn unlock(&mut self, caller: &AccountId, borrower: &AccountId, amount: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "unlock collateral")?;
        require_positive(amount)?;

        let record = self.record_mut(borrower)?;
        if amount > record.locked_amount {
            return Err(ProtocolError::InsufficientCollateral {
                available: record.locked_amount,
                requested: amount,
            });
        }
        record.locked_amount -= amount;
        record.refresh_status();
        Ok(())
    }

    /// remove collateral for transfer to `to`; locked balance may be seized
    pub fn seize(
        &mut self,
        caller: &AccountId,
        borrower: &AccountId,
        amount: Money,
        to: &AccountId,
    ) -> Result<Money> {
        if !self.liquidators.contains(caller) {
            ensure_owner(&self.owner, caller, "seize collateral")?;
        }
        require_positive(amount)?;

        let record = self.record_mut(borrower)?;
        if amount > record.amount {
            return Err(ProtocolError::InsufficientCollateral {
                available: record.amount,
                requested: amount,
            });
        }
        record.amount -= amount;
        record.locked_amount = record.locked_amount.min(record.amount);
        if record.amount.is_zero() {
            record.status = CollateralStatus::Liquidating;
        } else {
            record.refresh_status();
        }
        self.total_collateral -= amount;

        debug!(borrower = %borrower, to = %to, amount = %amount, "collateral seized");
        Ok(amount)
    }

    fn record_mut(&mut self, borrower: &AccountId) -> Result<&mut CollateralRecord> {
        self.records.get_mut(borrower).ok_or_else(|| ProtocolError::NotFound {
            kind: "collateral record",
            owner: borrower.clone(),
        })
    }

    pub(crate) fn restore_record(&mut self, borrower: AccountId, previous: Option<CollateralRecord>) {
        let current = self.balance(&borrower);
        let restored = previous.as_ref().map(|r| r.amount).unwrap_or(Money::ZERO);
        self.total_collateral = self.total_collateral - current + restored;
        match previous {
            Some(record) => {
                self.records.insert(borrower, record);
            }
            None => {
                self.records.remove(&borrower);
            }
        }
    }
}

fn require_positive(amount: Money) -> Result<()> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(ProtocolError::InvalidAmount {
            amount,
            reason: "must be greater than zero".to_string(),
        })
    }
}
