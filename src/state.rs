use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{AccountId, LineStatus, PaymentTiming};

/// per-borrower credit line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditLine {
    pub borrower: AccountId,

    // balances
    pub collateral_deposited: Money,
    pub credit_limit: Money,
    pub borrowed_amount: Money,
    pub interest_accrued: Money,

    // timestamps
    pub opened_at: DateTime<Utc>,
    pub last_borrow_time: Option<DateTime<Utc>>,
    pub last_interest_update_time: DateTime<Utc>,
    pub repayment_due_date: Option<DateTime<Utc>>,

    pub is_active: bool,

    // repayment history
    pub total_repaid: Money,
    pub on_time_count: u32,
    pub late_count: u32,
}

impl CreditLine {
    /// open a line with a 1:1 credit limit
    pub fn open(borrower: AccountId, collateral: Money, now: DateTime<Utc>) -> Self {
        Self {
            borrower,
            collateral_deposited: collateral,
            credit_limit: collateral,
            borrowed_amount: Money::ZERO,
            interest_accrued: Money::ZERO,
            opened_at: now,
            last_borrow_time: None,
            last_interest_update_time: now,
            repayment_due_date: None,
            is_active: true,
            total_repaid: Money::ZERO,
            on_time_count: 0,
            late_count: 0,
        }
    }

    pub fn status(&self) -> LineStatus {
        if !self.is_active {
            LineStatus::Closed
        } else if self.total_debt().is_positive() {
            LineStatus::ActiveWithDebt
        } else {
            LineStatus::Active
        }
    }

    /// principal plus accrued interest
    pub fn total_debt(&self) -> Money {
        self.borrowed_amount + self.interest_accrued
    }

    /// amount that can still be drawn
    pub fn available_credit(&self) -> Money {
        self.credit_limit.saturating_sub(self.total_debt())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.repayment_due_date {
            Some(due) => self.borrowed_amount.is_positive() && now > due,
            None => false,
        }
    }

    /// add collateral, raising the limit 1:1
    pub fn record_collateral(&mut self, amount: Money) {
        self.collateral_deposited += amount;
        self.credit_limit += amount;
    }

    /// record a draw and reset the due date
    pub fn record_borrow(&mut self, amount: Money, now: DateTime<Utc>, due: DateTime<Utc>) {
        self.borrowed_amount += amount;
        self.last_borrow_time = Some(now);
        self.repayment_due_date = Some(due);
    }

    /// record a repayment, returns its timing
    pub fn record_repayment(
        &mut self,
        principal: Money,
        interest: Money,
        now: DateTime<Utc>,
    ) -> PaymentTiming {
        self.borrowed_amount -= principal;
        self.interest_accrued -= interest;
        self.total_repaid += principal + interest;

        let on_time = self.repayment_due_date.map(|due| now <= due).unwrap_or(true);
        if on_time {
            self.on_time_count += 1;
            PaymentTiming::OnTime
        } else {
            self.late_count += 1;
            PaymentTiming::Late
        }
    }

    /// clear debt after seizure; closes the line when collateral is exhausted
    pub fn record_liquidation(&mut self, seized: Money) {
        self.borrowed_amount = Money::ZERO;
        self.interest_accrued = Money::ZERO;
        self.collateral_deposited -= seized;
        self.credit_limit = self.collateral_deposited;
        self.repayment_due_date = None;

        if self.collateral_deposited.is_zero() {
            self.is_active = false;
        }
    }
}

/// point-in-time copy of a credit line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub snapshot_id: Uuid,
    pub borrower: AccountId,
    pub timestamp: DateTime<Utc>,
    pub status: LineStatus,
    pub line: CreditLine,
}

impl StateSnapshot {
    pub fn capture(line: &CreditLine, timestamp: DateTime<Utc>) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            borrower: line.borrower.clone(),
            timestamp,
            status: line.status(),
            line: line.clone(),
        }
    }
}
