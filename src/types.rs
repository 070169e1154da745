use serde::{Deserialize, Serialize};
use std::fmt;

/// identity of a protocol participant (borrower, lender, admin, liquidator, ledger owner)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        AccountId(s)
    }
}

/// credit line lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineStatus {
    /// open, nothing borrowed
    Active,
    /// open with outstanding principal or interest
    ActiveWithDebt,
    /// collateral exhausted by liquidation, terminal
    Closed,
}

/// collateral custody status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollateralStatus {
    Active,
    /// part of the balance is locked
    Locked,
    /// balance exhausted by seizure
    Liquidating,
}

/// reputation bracket derived from score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub const SILVER_MIN: u32 = 300;
    pub const GOLD_MIN: u32 = 600;
    pub const PLATINUM_MIN: u32 = 850;

    /// boundary values belong to the higher tier
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= Self::PLATINUM_MIN => Tier::Platinum,
            s if s >= Self::GOLD_MIN => Tier::Gold,
            s if s >= Self::SILVER_MIN => Tier::Silver,
            _ => Tier::Bronze,
        }
    }
}

/// interest rate model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateModelType {
    /// always charge the base rate
    Fixed,
    /// utilization-driven piecewise-linear curve
    Dynamic,
}

/// timing classification of a repayment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentTiming {
    OnTime,
    Late,
}

/// why a position became liquidatable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationTrigger {
    pub over_ltv: bool,
    pub overdue: bool,
}

impl LiquidationTrigger {
    pub fn is_eligible(&self) -> bool {
        self.over_ltv || self.overdue
    }
}
