use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{RateParameters, RiskParameters};
use crate::decimal::Money;
use crate::types::{AccountId, PaymentTiming, Tier};

/// all events emitted by the protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // credit line events
    CreditLineOpened {
        borrower: AccountId,
        collateral: Money,
        credit_limit: Money,
        timestamp: DateTime<Utc>,
    },
    CollateralAdded {
        borrower: AccountId,
        amount: Money,
        new_collateral: Money,
        new_credit_limit: Money,
        timestamp: DateTime<Utc>,
    },
    Borrowed {
        borrower: AccountId,
        amount: Money,
        new_borrowed: Money,
        repayment_due_date: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    BorrowedAndPaid {
        borrower: AccountId,
        recipient: AccountId,
        amount: Money,
        new_borrowed: Money,
        repayment_due_date: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    Repaid {
        borrower: AccountId,
        principal: Money,
        interest: Money,
        remaining_borrowed: Money,
        remaining_interest: Money,
        timing: PaymentTiming,
        timestamp: DateTime<Utc>,
    },
    Liquidated {
        borrower: AccountId,
        liquidator: AccountId,
        debt: Money,
        seized: Money,
        written_off: Money,
        remaining_collateral: Money,
        timestamp: DateTime<Utc>,
    },
    CreditLineClosed {
        borrower: AccountId,
        timestamp: DateTime<Utc>,
    },
    CreditLimitIncreased {
        borrower: AccountId,
        old_limit: Money,
        new_limit: Money,
        score: u32,
        timestamp: DateTime<Utc>,
    },
    InterestAccrued {
        borrower: AccountId,
        amount: Money,
        total_accrued: Money,
        timestamp: DateTime<Utc>,
    },

    // reputation events
    ScoreUpdated {
        user: AccountId,
        old_score: u32,
        new_score: u32,
        timestamp: DateTime<Utc>,
    },
    TierChanged {
        user: AccountId,
        old_tier: Tier,
        new_tier: Tier,
        timestamp: DateTime<Utc>,
    },
    DefaultRecorded {
        user: AccountId,
        debt: Money,
        penalty: u32,
        timestamp: DateTime<Utc>,
    },

    // liquidity events
    LiquidityDeposited {
        lender: AccountId,
        amount: Money,
        total_deposited: Money,
        timestamp: DateTime<Utc>,
    },
    LiquidityWithdrawn {
        lender: AccountId,
        amount: Money,
        total_deposited: Money,
        timestamp: DateTime<Utc>,
    },
    InterestClaimed {
        lender: AccountId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // admin events
    ParametersUpdated {
        rates: RateParameters,
        risk: RiskParameters,
        timestamp: DateTime<Utc>,
    },
    LiquidatorChanged {
        liquidator: AccountId,
        enabled: bool,
        timestamp: DateTime<Utc>,
    },
    Paused {
        timestamp: DateTime<Utc>,
    },
    Unpaused {
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// short name, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::CreditLineOpened { .. } => "credit_line_opened",
            Event::CollateralAdded { .. } => "collateral_added",
            Event::Borrowed { .. } => "borrowed",
            Event::BorrowedAndPaid { .. } => "borrowed_and_paid",
            Event::Repaid { .. } => "repaid",
            Event::Liquidated { .. } => "liquidated",
            Event::CreditLineClosed { .. } => "credit_line_closed",
            Event::CreditLimitIncreased { .. } => "credit_limit_increased",
            Event::InterestAccrued { .. } => "interest_accrued",
            Event::ScoreUpdated { .. } => "score_updated",
            Event::TierChanged { .. } => "tier_changed",
            Event::DefaultRecorded { .. } => "default_recorded",
            Event::LiquidityDeposited { .. } => "liquidity_deposited",
            Event::LiquidityWithdrawn { .. } => "liquidity_withdrawn",
            Event::InterestClaimed { .. } => "interest_claimed",
            Event::ParametersUpdated { .. } => "parameters_updated",
            Event::LiquidatorChanged { .. } => "liquidator_changed",
            Event::Paused { .. } => "paused",
            Event::Unpaused { .. } => "unpaused",
        }
    }
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
