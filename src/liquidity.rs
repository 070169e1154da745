use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::auth::ensure_owner;
use crate::decimal::{Bps, Money, BPS_DENOMINATOR};
use crate::errors::{ProtocolError, Result};
use crate::types::AccountId;

/// a lender's stake in the pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LenderPosition {
    pub deposited_amount: Money,
    pub earned_interest: Money,
    pub deposit_timestamp: DateTime<Utc>,
}

/// pool-wide aggregates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PoolTotals {
    pub total_deposited: Money,
    pub available_liquidity: Money,
    pub total_borrowed: Money,
    pub protocol_fees_collected: Money,
    /// distributed to lenders and not yet claimed
    pub unclaimed_interest: Money,
    pub bad_debt: Money,
}

/// split of a repayment's interest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseReceipt {
    pub principal: Money,
    pub protocol_fee: Money,
    pub distributed: Money,
}

/// lender deposits and the liquidity borrowers draw from
#[derive(Debug, Clone)]
pub struct LiquidityLedger {
    owner: AccountId,
    protocol_fee_bps: Bps,
    totals: PoolTotals,
    positions: BTreeMap<AccountId, LenderPosition>,
}

impl LiquidityLedger {
    pub fn new(owner: AccountId, protocol_fee_bps: Bps) -> Self {
        Self {
            owner,
            protocol_fee_bps: protocol_fee_bps.min(BPS_DENOMINATOR),
            totals: PoolTotals::default(),
            positions: BTreeMap::new(),
        }
    }

    pub fn totals(&self) -> PoolTotals {
        self.totals
    }

    pub fn available_liquidity(&self) -> Money {
        self.totals.available_liquidity
    }

    pub fn depositor_balance(&self, lender: &AccountId) -> Money {
        self.positions
            .get(lender)
            .map(|p| p.deposited_amount)
            .unwrap_or(Money::ZERO)
    }

    pub fn position(&self, lender: &AccountId) -> Option<&LenderPosition> {
        self.positions.get(lender)
    }

    pub fn lender_count(&self) -> usize {
        self.positions.len()
    }

    /// borrowed share of deposits in bps, capped at 100%
    pub fn utilization_bps(&self) -> Bps {
        let deposited = self.totals.total_deposited;
        if deposited.is_zero() {
            return 0;
        }
        self.totals
            .total_borrowed
            .mul_div(Money::from_units(BPS_DENOMINATOR as u64), deposited)
            .and_then(|u| u.to_units())
            .map(|u| u.min(BPS_DENOMINATOR as u128) as Bps)
            .unwrap_or(BPS_DENOMINATOR)
    }

    pub fn set_protocol_fee(&mut self, caller: &AccountId, fee_bps: Bps) -> Result<()> {
        ensure_owner(&self.owner, caller, "set protocol fee")?;
        if fee_bps > BPS_DENOMINATOR {
            return Err(ProtocolError::invalid_parameter(
                "protocol_fee_bps",
                "must not exceed 10000 bps",
            ));
        }
        self.protocol_fee_bps = fee_bps;
        Ok(())
    }

    pub fn deposit(
        &mut self,
        caller: &AccountId,
        lender: &AccountId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<()> {
        ensure_owner(&self.owner, caller, "deposit liquidity")?;
        require_positive(amount)?;

        let position = self
            .positions
            .entry(lender.clone())
            .or_insert_with(|| LenderPosition {
                deposited_amount: Money::ZERO,
                earned_interest: Money::ZERO,
                deposit_timestamp: now,
            });
        position.deposited_amount += amount;
        position.deposit_timestamp = now;

        self.totals.total_deposited += amount;
        self.totals.available_liquidity += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, caller: &AccountId, lender: &AccountId, amount: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "withdraw liquidity")?;
        require_positive(amount)?;

        let deposited = self.depositor_balance(lender);
        if amount > deposited {
            return Err(ProtocolError::InvalidAmount {
                amount,
                reason: format!("exceeds deposited balance {}", deposited),
            });
        }
        if amount > self.totals.available_liquidity {
            return Err(ProtocolError::InsufficientLiquidity {
                available: self.totals.available_liquidity,
                requested: amount,
            });
        }

        if let Some(position) = self.positions.get_mut(lender) {
            position.deposited_amount -= amount;
        }
        self.totals.total_deposited -= amount;
        self.totals.available_liquidity -= amount;
        Ok(())
    }

    /// hand out everything the lender has earned so far
    pub fn claim_interest(&mut self, caller: &AccountId, lender: &AccountId) -> Result<Money> {
        ensure_owner(&self.owner, caller, "claim interest")?;
        let position = self.positions.get_mut(lender).ok_or_else(|| ProtocolError::NotFound {
            kind: "lender position",
            owner: lender.clone(),
        })?;

        let earned = position.earned_interest;
        position.earned_interest = Money::ZERO;
        self.totals.unclaimed_interest -= earned;
        Ok(earned)
    }

    /// take funds out of the pool for a borrower
    pub fn reserve(&mut self, caller: &AccountId, amount: Money) -> Result<Money> {
        ensure_owner(&self.owner, caller, "reserve liquidity")?;
        require_positive(amount)?;

        let available = self.totals.available_liquidity;
        let remaining = available
            .checked_sub(amount)
            .ok_or(ProtocolError::InsufficientLiquidity {
                available,
                requested: amount,
            })?;

        self.totals.available_liquidity = remaining;
        self.totals.total_borrowed += amount;
        debug!(amount = %amount, available = %remaining, "liquidity reserved");
        Ok(amount)
    }

    /// accept repaid principal and interest; fee first, remainder pro-rata to lenders
    pub fn release(
        &mut self,
        caller: &AccountId,
        principal: Money,
        interest: Money,
    ) -> Result<ReleaseReceipt> {
        ensure_owner(&self.owner, caller, "release liquidity")?;
        if principal > self.totals.total_borrowed {
            return Err(ProtocolError::InvalidAmount {
                amount: principal,
                reason: format!("exceeds pool borrowed total {}", self.totals.total_borrowed),
            });
        }

        let fee = interest
            .mul_bps(self.protocol_fee_bps)
            .ok_or_else(|| ProtocolError::overflow("protocol fee"))?;
        let distributable = interest - fee;

        let mut distributed = Money::ZERO;
        let total_deposited = self.totals.total_deposited;
        if distributable.is_positive() && total_deposited.is_positive() {
            for position in self.positions.values_mut() {
                let share = distributable
                    .mul_div(position.deposited_amount, total_deposited)
                    .ok_or_else(|| ProtocolError::overflow("interest distribution"))?;
                position.earned_interest += share;
                distributed += share;
            }
        }

        // truncation dust and undistributable interest stay with the protocol
        let protocol_fee = interest - distributed;

        self.totals.total_borrowed -= principal;
        self.totals.available_liquidity += principal;
        self.totals.protocol_fees_collected += protocol_fee;
        self.totals.unclaimed_interest += distributed;

        debug!(
            principal = %principal,
            interest = %interest,
            fee = %protocol_fee,
            distributed = %distributed,
            "liquidity released"
        );

        Ok(ReleaseReceipt {
            principal,
            protocol_fee,
            distributed,
        })
    }

    /// recognise principal that will never come back
    pub fn write_off(&mut self, caller: &AccountId, principal: Money) -> Result<()> {
        ensure_owner(&self.owner, caller, "write off")?;
        let borrowed = self.totals.total_borrowed;
        self.totals.total_borrowed = borrowed.checked_sub(principal).ok_or(
            ProtocolError::InvalidAmount {
                amount: principal,
                reason: format!("exceeds pool borrowed total {}", borrowed),
            },
        )?;
        self.totals.bad_debt += principal;
        Ok(())
    }

    pub(crate) fn restore_totals(&mut self, totals: PoolTotals) {
        self.totals = totals;
    }

    pub(crate) fn restore_position(&mut self, lender: AccountId, previous: Option<LenderPosition>) {
        match previous {
            Some(position) => {
                self.positions.insert(lender, position);
            }
            None => {
                self.positions.remove(&lender);
            }
        }
    }

    pub(crate) fn positions_snapshot(&self) -> BTreeMap<AccountId, LenderPosition> {
        self.positions.clone()
    }

    pub(crate) fn restore_positions(&mut self, positions: BTreeMap<AccountId, LenderPosition>) {
        self.positions = positions;
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
