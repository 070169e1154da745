use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::SECONDS_PER_YEAR;
use crate::decimal::{floor_div, Bps, Money, BPS_DENOMINATOR};
use crate::errors::{ProtocolError, Result};
use crate::interest::{InterestCalculation, InterestCalculator};
use crate::state::CreditLine;

/// grace-aware simple interest accrual
#[derive(Debug, Clone, Copy)]
pub struct AccrualEngine {
    pub grace_period: Duration,
}

impl AccrualEngine {
    pub fn new(grace_period_seconds: u64) -> Self {
        Self {
            grace_period: Duration::seconds(grace_period_seconds as i64),
        }
    }

    /// principal * rate_bps * seconds / (10000 * seconds_per_year), truncated
    pub fn simple_interest(principal: Money, rate_bps: Bps, seconds: u64) -> Result<Money> {
        if principal.is_zero() || rate_bps == 0 || seconds == 0 {
            return Ok(Money::ZERO);
        }

        let numerator = principal
            .as_decimal()
            .checked_mul(Decimal::from(rate_bps))
            .and_then(|n| n.checked_mul(Decimal::from(seconds)))
            .ok_or_else(|| ProtocolError::overflow("simple interest"))?;
        let denominator = Decimal::from(BPS_DENOMINATOR as u64 * SECONDS_PER_YEAR);

        floor_div(numerator, denominator)
            .map(Money::from_decimal)
            .ok_or_else(|| ProtocolError::overflow("simple interest"))
    }

    /// first instant that may bear interest
    pub fn accrual_start(
        &self,
        last_interest_update: DateTime<Utc>,
        last_borrow: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        match last_borrow {
            Some(borrowed_at) => last_interest_update.max(borrowed_at + self.grace_period),
            None => last_interest_update,
        }
    }

    /// interest owed by a line between its last update and `now`, capped at the remaining limit
    pub fn pending_interest(
        &self,
        line: &CreditLine,
        rate_bps: Bps,
        now: DateTime<Utc>,
    ) -> Result<InterestCalculation> {
        if line.borrowed_amount.is_zero() {
            return Ok(InterestCalculation::none(line.borrowed_amount, rate_bps));
        }

        let start = self.accrual_start(line.last_interest_update_time, line.last_borrow_time);
        let mut calculation = self.calculate_interest(line.borrowed_amount, rate_bps, start, now)?;
        calculation.interest_amount = calculation.interest_amount.min(line.available_credit());
        Ok(calculation)
    }

    /// seconds of interest-bearing time needed to earn `interest`, rounded up
    pub fn seconds_to_earn(principal: Money, rate_bps: Bps, interest: Money) -> Result<u64> {
        if interest.is_zero() {
            return Ok(0);
        }
        if principal.is_zero() || rate_bps == 0 {
            return Err(ProtocolError::overflow("interest time"));
        }

        let numerator = interest
            .as_decimal()
            .checked_mul(Decimal::from(BPS_DENOMINATOR as u64 * SECONDS_PER_YEAR))
            .ok_or_else(|| ProtocolError::overflow("interest time"))?;
        let denominator = principal
            .as_decimal()
            .checked_mul(Decimal::from(rate_bps))
            .ok_or_else(|| ProtocolError::overflow("interest time"))?;

        let seconds = floor_div(numerator, denominator)
            .ok_or_else(|| ProtocolError::overflow("interest time"))?;
        let exact = seconds
            .checked_mul(denominator)
            .map(|product| product == numerator)
            .unwrap_or(false);
        let seconds = if exact { seconds } else { seconds + Decimal::ONE };
        seconds
            .to_u64()
            .ok_or_else(|| ProtocolError::overflow("interest time"))
    }

    /// fold pending interest into the line
    ///
    /// the update time moves forward only by the seconds the charged whole units
    /// pay for, so the truncated fraction carries into the next accrual. a capped
    /// line forfeits the excess and moves to `now`.
    pub fn accrue(
        &self,
        line: &mut CreditLine,
        rate_bps: Bps,
        now: DateTime<Utc>,
    ) -> Result<InterestCalculation> {
        let calculation = self.pending_interest(line, rate_bps, now)?;
        let charged = calculation.interest_amount;
        let settled_until = match calculation.accrual_start {
            Some(start) => {
                let uncapped = Self::simple_interest(calculation.principal_base, rate_bps, calculation.seconds)?;
                if charged < uncapped {
                    now
                } else {
                    let seconds = Self::seconds_to_earn(calculation.principal_base, rate_bps, charged)?;
                    let seconds = i64::try_from(seconds.min(calculation.seconds))
                        .map_err(|_| ProtocolError::overflow("interest time"))?;
                    start + Duration::seconds(seconds)
                }
            }
            None => now,
        };

        line.interest_accrued += charged;
        if settled_until > line.last_interest_update_time {
            line.last_interest_update_time = settled_until;
        }
        Ok(calculation)
    }
}

impl InterestCalculator for AccrualEngine {
    fn calculate_interest(
        &self,
        principal: Money,
        rate_bps: Bps,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<InterestCalculation> {
        if end <= start {
            return Ok(InterestCalculation::none(principal, rate_bps));
        }

        let seconds = (end - start).num_seconds().max(0) as u64;
        let interest = Self::simple_interest(principal, rate_bps, seconds)?;

        Ok(InterestCalculation {
            interest_amount: interest,
            rate_bps,
            seconds,
            principal_base: principal,
            accrual_start: Some(start),
        })
    }
}
