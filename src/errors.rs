use thiserror::Error;

use crate::decimal::{Bps, Money};
use crate::types::AccountId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        caller: AccountId,
        action: String,
    },

    #[error("{kind} already exists for {owner}")]
    AlreadyExists {
        kind: &'static str,
        owner: AccountId,
    },

    #[error("{kind} not found for {owner}")]
    NotFound {
        kind: &'static str,
        owner: AccountId,
    },

    #[error("invalid amount: {amount} ({reason})")]
    InvalidAmount {
        amount: Money,
        reason: String,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },

    #[error("exceeds credit limit: limit {limit}, outstanding {outstanding}, requested {requested}")]
    ExceedsCreditLimit {
        limit: Money,
        outstanding: Money,
        requested: Money,
    },

    #[error("exceeds borrowed amount: borrowed {borrowed}, requested {requested}")]
    ExceedsBorrowedAmount {
        borrowed: Money,
        requested: Money,
    },

    #[error("exceeds accrued interest: accrued {accrued}, requested {requested}")]
    ExceedsInterest {
        accrued: Money,
        requested: Money,
    },

    #[error("insufficient liquidity: available {available}, requested {requested}")]
    InsufficientLiquidity {
        available: Money,
        requested: Money,
    },

    #[error("insufficient collateral: available {available}, requested {requested}")]
    InsufficientCollateral {
        available: Money,
        requested: Money,
    },

    #[error("insufficient balance for {owner}: available {available}, requested {requested}")]
    InsufficientBalance {
        owner: AccountId,
        available: Money,
        requested: Money,
    },

    #[error("liquidation not allowed: ltv {ltv_bps} bps within threshold {threshold_bps} bps and not overdue")]
    LiquidationNotAllowed {
        ltv_bps: Bps,
        threshold_bps: Bps,
    },

    #[error("credit line for {borrower} is closed")]
    LineInactive {
        borrower: AccountId,
    },

    #[error("protocol is paused")]
    Paused,

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl ProtocolError {
    pub(crate) fn overflow(context: &str) -> Self {
        ProtocolError::CalculationError {
            message: format!("arithmetic overflow in {}", context),
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
