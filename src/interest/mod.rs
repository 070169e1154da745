pub mod accrual;
pub mod rate_model;

use chrono::{DateTime, Utc};

use crate::decimal::{Bps, Money};
use crate::errors::Result;

pub use accrual::AccrualEngine;
pub use rate_model::RateModel;

/// interest calculation result
#[derive(Debug, Clone, PartialEq)]
pub struct InterestCalculation {
    pub interest_amount: Money,
    pub rate_bps: Bps,
    pub seconds: u64,
    pub principal_base: Money,
    /// first instant interest was charged for, if any
    pub accrual_start: Option<DateTime<Utc>>,
}

impl InterestCalculation {
    pub fn none(principal: Money, rate_bps: Bps) -> Self {
        Self {
            interest_amount: Money::ZERO,
            rate_bps,
            seconds: 0,
            principal_base: principal,
            accrual_start: None,
        }
    }
}

/// trait for interest calculations
pub trait InterestCalculator {
    fn calculate_interest(
        &self,
        principal: Money,
        rate_bps: Bps,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<InterestCalculation>;
}
