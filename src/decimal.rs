use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// basis points denominator (100% = 10_000)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// raw basis points as stored in configuration
pub type Bps = u32;

/// Money type holding a whole, non-negative number of token units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const ONE: Money = Money(Decimal::ONE);

    /// create from decimal, truncating fractions and clamping negatives to zero
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.trunc().max(Decimal::ZERO))
    }

    /// create from string, truncating any fractional part
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money::from_decimal(Decimal::from_str(s)?))
    }

    /// create from a whole number of units
    pub fn from_units(amount: u64) -> Self {
        Money(Decimal::from(amount))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// whole units as u128, when representable
    pub fn to_units(&self) -> Option<u128> {
        self.0.to_u128()
    }

    /// check if zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// check if strictly positive
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// minimum of two values
    pub fn min(self, other: Self) -> Self {
        Money(self.0.min(other.0))
    }

    /// maximum of two values
    pub fn max(self, other: Self) -> Self {
        Money(self.0.max(other.0))
    }

    /// subtraction that refuses to go below zero
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        if other.0 > self.0 {
            None
        } else {
            Some(Money(self.0 - other.0))
        }
    }

    /// subtraction floored at zero
    pub fn saturating_sub(self, other: Self) -> Self {
        self.checked_sub(other).unwrap_or(Money::ZERO)
    }

    /// addition that reports decimal overflow
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Money)
    }

    /// portion of this amount in basis points, truncated
    pub fn mul_bps(&self, bps: Bps) -> Option<Self> {
        let scaled = self.0.checked_mul(Decimal::from(bps))?;
        Some(Money(floor_div(scaled, Decimal::from(BPS_DENOMINATOR))?))
    }

    /// self * numerator / denominator, truncated
    pub fn mul_div(&self, numerator: Money, denominator: Money) -> Option<Self> {
        if denominator.is_zero() {
            return None;
        }
        let scaled = self.0.checked_mul(numerator.0)?;
        Some(Money(floor_div(scaled, denominator.0)?))
    }
}

/// exact integer division for non-negative whole decimals
pub(crate) fn floor_div(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    let remainder = numerator.checked_rem(denominator)?;
    (numerator - remainder).checked_div(denominator)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl From<u32> for Money {
    fn from(i: u32) -> Self {
        Money::from_units(i as u64)
    }
}

impl From<u64> for Money {
    fn from(i: u64) -> Self {
        Money::from_units(i)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 += other.0;
    }
}

// callers check ordering first; a negative result is clamped to zero
impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        self.saturating_sub(other)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, other: Money) {
        *self = self.saturating_sub(other);
    }
}

/// rate type for interest rates and ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);
    pub const ONE: Rate = Rate(Decimal::ONE);

    /// create from decimal (e.g., 0.05 for 5%)
    pub fn from_decimal(d: Decimal) -> Self {
        Rate(d)
    }

    /// create from basis points (e.g., 500 for 5%)
    pub fn from_bps(bps: Bps) -> Self {
        Rate(Decimal::from(bps) / Decimal::from(BPS_DENOMINATOR))
    }

    /// get as decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// get as percentage
    pub fn as_percentage(&self) -> Decimal {
        self.0 * Decimal::from(100)
    }

    /// get as whole basis points, truncated
    pub fn as_bps(&self) -> Bps {
        (self.0 * Decimal::from(BPS_DENOMINATOR))
            .trunc()
            .to_u32()
            .unwrap_or(Bps::MAX)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage())
    }
}

impl From<Decimal> for Rate {
    fn from(d: Decimal) -> Self {
        Rate::from_decimal(d)
    }
}
