//! serializable read models returned by protocol queries
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collateral::LtvCalculator;
use crate::decimal::{Bps, Money, Rate};
use crate::liquidity::PoolTotals;
use crate::reputation::ReputationRecord;
use crate::state::CreditLine;
use crate::types::{AccountId, LineStatus, Tier};

/// serializable view of a credit line, with interest brought current
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLineView {
    pub borrower: AccountId,
    pub status: LineStatus,
    pub as_of: DateTime<Utc>,
    pub balances: BalanceView,
    pub risk: RiskView,
    pub history: HistoryView,
    pub reputation: Option<ReputationView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceView {
    pub collateral_deposited: Money,
    pub credit_limit: Money,
    pub borrowed_amount: Money,
    pub interest_accrued: Money,
    pub total_debt: Money,
    pub available_credit: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskView {
    pub ltv: Option<Rate>,
    pub liquidation_threshold: Rate,
    pub repayment_due_date: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub is_liquidatable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryView {
    pub opened_at: DateTime<Utc>,
    pub last_borrow_time: Option<DateTime<Utc>>,
    pub last_interest_update_time: DateTime<Utc>,
    pub total_repaid: Money,
    pub on_time_count: u32,
    pub late_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationView {
    pub score: u32,
    pub tier: Tier,
    pub default_count: u32,
}

impl CreditLineView {
    /// `line` is expected to carry interest accrued up to `as_of`
    pub fn from_line(
        line: &CreditLine,
        reputation: Option<&ReputationRecord>,
        ltv: &LtvCalculator,
        as_of: DateTime<Utc>,
    ) -> Self {
        let trigger = ltv.evaluate(line, as_of);
        CreditLineView {
            borrower: line.borrower.clone(),
            status: line.status(),
            as_of,
            balances: BalanceView {
                collateral_deposited: line.collateral_deposited,
                credit_limit: line.credit_limit,
                borrowed_amount: line.borrowed_amount,
                interest_accrued: line.interest_accrued,
                total_debt: line.total_debt(),
                available_credit: line.available_credit(),
            },
            risk: RiskView {
                ltv: LtvCalculator::ltv(line.total_debt(), line.collateral_deposited),
                liquidation_threshold: Rate::from_bps(ltv.threshold_bps()),
                repayment_due_date: line.repayment_due_date,
                is_overdue: trigger.overdue,
                is_liquidatable: line.is_active && trigger.is_eligible(),
            },
            history: HistoryView {
                opened_at: line.opened_at,
                last_borrow_time: line.last_borrow_time,
                last_interest_update_time: line.last_interest_update_time,
                total_repaid: line.total_repaid,
                on_time_count: line.on_time_count,
                late_count: line.late_count,
            },
            reputation: reputation.map(|r| ReputationView {
                score: r.score,
                tier: r.tier,
                default_count: r.default_count,
            }),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// pool-wide view for lenders and dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolView {
    pub total_deposited: Money,
    pub available_liquidity: Money,
    pub total_borrowed: Money,
    pub protocol_fees_collected: Money,
    pub unclaimed_interest: Money,
    pub bad_debt: Money,
    pub utilization: Rate,
    pub borrow_rate: Rate,
    pub lender_count: usize,
    pub total_collateral: Money,
}

impl PoolView {
    pub fn new(
        totals: PoolTotals,
        utilization_bps: Bps,
        borrow_rate_bps: Bps,
        lender_count: usize,
        total_collateral: Money,
    ) -> Self {
        PoolView {
            total_deposited: totals.total_deposited,
            available_liquidity: totals.available_liquidity,
            total_borrowed: totals.total_borrowed,
            protocol_fees_collected: totals.protocol_fees_collected,
            unclaimed_interest: totals.unclaimed_interest,
            bad_debt: totals.bad_debt,
            utilization: Rate::from_bps(utilization_bps),
            borrow_rate: Rate::from_bps(borrow_rate_bps),
            lender_count,
            total_collateral,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_line_view_reports_risk() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut line = CreditLine::open(AccountId::from("alice"), Money::from_units(100), start);
        line.record_borrow(Money::from_units(95), start, start + Duration::days(37));

        let view = CreditLineView::from_line(&line, None, &LtvCalculator::new(9_000), start);
        assert_eq!(view.status, LineStatus::ActiveWithDebt);
        assert_eq!(view.balances.available_credit, Money::from_units(5));
        assert_eq!(view.risk.ltv, Some(Rate::from_bps(9_500)));
        assert!(view.risk.is_liquidatable);
        assert!(!view.risk.is_overdue);

        let json = view.to_json_pretty().unwrap();
        assert!(json.contains("\"borrower\": \"alice\""));
        assert!(json.contains("ActiveWithDebt"));
    }

    #[test]
    fn test_pool_view_rates() {
        let totals = PoolTotals {
            total_deposited: Money::from_units(1_000),
            available_liquidity: Money::from_units(600),
            total_borrowed: Money::from_units(400),
            ..PoolTotals::default()
        };
        let view = PoolView::new(totals, 4_000, 1_250, 2, Money::from_units(500));
        assert_eq!(view.utilization, Rate::from_bps(4_000));
        assert_eq!(view.borrow_rate.as_bps(), 1_250);
        assert_eq!(view.lender_count, 2);
    }
}
