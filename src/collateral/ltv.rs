use chrono::{DateTime, Utc};

use crate::decimal::{Bps, Money, Rate, BPS_DENOMINATOR};
use crate::state::CreditLine;
use crate::types::LiquidationTrigger;

/// ltv checks against the liquidation threshold
#[derive(Debug, Clone, Copy)]
pub struct LtvCalculator {
    threshold_bps: Bps,
}

impl LtvCalculator {
    pub fn new(threshold_bps: Bps) -> Self {
        Self { threshold_bps }
    }

    pub fn threshold_bps(&self) -> Bps {
        self.threshold_bps
    }

    /// debt / collateral in bps; None without collateral
    pub fn ltv_bps(debt: Money, collateral: Money) -> Option<Bps> {
        if collateral.is_zero() {
            return None;
        }
        let ratio = debt.mul_div(Money::from_units(BPS_DENOMINATOR as u64), collateral)?;
        Some(ratio.to_units().map(|r| r.min(Bps::MAX as u128) as Bps).unwrap_or(Bps::MAX))
    }

    pub fn ltv(debt: Money, collateral: Money) -> Option<Rate> {
        Self::ltv_bps(debt, collateral).map(Rate::from_bps)
    }

    /// zero collateral is always unsafe
    pub fn is_over_ltv(&self, debt: Money, collateral: Money) -> bool {
        match Self::ltv_bps(debt, collateral) {
            Some(ltv) => ltv > self.threshold_bps,
            None => true,
        }
    }

    pub fn evaluate(&self, line: &CreditLine, now: DateTime<Utc>) -> LiquidationTrigger {
        LiquidationTrigger {
            over_ltv: self.is_over_ltv(line.total_debt(), line.collateral_deposited),
            overdue: line.is_overdue(now),
        }
    }
}
