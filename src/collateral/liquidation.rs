use crate::decimal::Money;
use crate::state::CreditLine;
use crate::types::{AccountId, LiquidationTrigger};

/// what a liquidation will do to a line, computed before anything moves
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationPlan {
    pub trigger: LiquidationTrigger,
    /// principal plus accrued interest
    pub debt: Money,
    /// collateral moved to the liquidator
    pub seized: Money,
    /// debt not covered by collateral
    pub shortfall: Money,
    /// principal the pool will not see again
    pub principal_written_off: Money,
    pub remaining_collateral: Money,
    pub closes_line: bool,
}

impl LiquidationPlan {
    pub fn for_line(line: &CreditLine, trigger: LiquidationTrigger) -> Self {
        let debt = line.total_debt();
        let seized = debt.min(line.collateral_deposited);
        let remaining_collateral = line.collateral_deposited - seized;

        Self {
            trigger,
            debt,
            seized,
            shortfall: debt - seized,
            principal_written_off: line.borrowed_amount,
            remaining_collateral,
            closes_line: remaining_collateral.is_zero(),
        }
    }
}

/// completed liquidation
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationResult {
    pub borrower: AccountId,
    pub liquidator: AccountId,
    pub plan: LiquidationPlan,
    pub line: CreditLine,
}
