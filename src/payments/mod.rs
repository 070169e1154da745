pub mod escalation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{ProtocolError, Result};
use crate::state::CreditLine;
use crate::types::{AccountId, PaymentTiming};

pub use escalation::LimitEscalation;

/// repayment request against a credit line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaymentRequest {
    pub principal: Money,
    pub interest: Money,
}

impl RepaymentRequest {
    pub fn new(principal: Money, interest: Money) -> Self {
        Self { principal, interest }
    }

    pub fn total(&self) -> Money {
        self.principal + self.interest
    }

    /// checked against the line after interest has been brought current
    pub fn validate(&self, line: &CreditLine) -> Result<()> {
        if self.principal.is_zero() && self.interest.is_zero() {
            return Err(ProtocolError::InvalidAmount {
                amount: Money::ZERO,
                reason: "repayment must cover principal or interest".to_string(),
            });
        }

        if self.principal > line.borrowed_amount {
            return Err(ProtocolError::ExceedsBorrowedAmount {
                borrowed: line.borrowed_amount,
                requested: self.principal,
            });
        }

        if self.interest > line.interest_accrued {
            return Err(ProtocolError::ExceedsInterest {
                accrued: line.interest_accrued,
                requested: self.interest,
            });
        }

        Ok(())
    }
}

/// outcome of a completed repayment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepaymentReceipt {
    pub borrower: AccountId,
    pub principal: Money,
    pub interest: Money,
    pub protocol_fee: Money,
    pub distributed_to_lenders: Money,
    pub timing: PaymentTiming,
    pub remaining_borrowed: Money,
    pub remaining_interest: Money,
    pub new_score: u32,
    /// set when the repayment earned a higher limit
    pub new_credit_limit: Option<Money>,
    pub paid_at: DateTime<Utc>,
}

impl RepaymentReceipt {
    pub fn is_fully_repaid(&self) -> bool {
        self.remaining_borrowed.is_zero() && self.remaining_interest.is_zero()
    }
}
